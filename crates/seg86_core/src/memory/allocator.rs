/*
    Seg86
    8086/80286 CPU emulation core

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    memory::allocator.rs

    Implements a best-fit heap allocator over a range of a single segment.

    Free blocks are coalesced with their neighbors on free.

*/


use seg86_common::{FarPtr, Seg86HashMap};

use crate::cpu_common::MemoryError;

/// Highest end offset (exclusive) an allocator may manage within a segment.
pub const SEGMENT_LIMIT: u32 = 0x10000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct MemoryBlock {
    offset: u32,
    size: u32,
}

impl MemoryBlock {
    #[inline]
    fn end(&self) -> u32 {
        self.offset + self.size
    }
}

#[derive(Clone, Debug)]
pub struct MemoryAllocator {
    base: FarPtr,
    capacity: u32,
    alignment: u16,
    remaining: u32,
    free_blocks: Vec<MemoryBlock>,
    allocated: Seg86HashMap<u16, u32>,
}

impl MemoryAllocator {
    pub fn new(base: FarPtr, capacity: u32, alignment: u16) -> Result<Self, MemoryError> {
        if alignment == 0 || !base.is_aligned(alignment) {
            return Err(MemoryError::AllocatorAlignment {
                offset: base.offset,
                alignment,
            });
        }
        if base.offset as u32 + capacity > SEGMENT_LIMIT {
            return Err(MemoryError::AllocatorOverflow {
                offset: base.offset,
                size: capacity,
            });
        }

        Ok(Self::with_block(base, capacity, alignment))
    }

    /// An allocator over `[0, capacity)` of `segment`. The capacity is clamped to the segment
    /// and a zero alignment is treated as 1, so construction cannot fail.
    pub fn from_segment_start(segment: u16, capacity: u32, alignment: u16) -> Self {
        Self::with_block(FarPtr::new(segment, 0), capacity.min(SEGMENT_LIMIT), alignment.max(1))
    }

    fn with_block(base: FarPtr, capacity: u32, alignment: u16) -> Self {
        Self {
            base,
            capacity,
            alignment,
            remaining: capacity,
            free_blocks: vec![MemoryBlock {
                offset: base.offset as u32,
                size: capacity,
            }],
            allocated: Seg86HashMap::default(),
        }
    }

    /// Release every allocation.
    pub fn reset(&mut self) {
        *self = Self::with_block(self.base, self.capacity, self.alignment);
    }

    /// `size` rounded up to the allocator's alignment.
    #[inline]
    pub fn aligned_size(&self, size: u32) -> u32 {
        let align = self.alignment as u32;
        (size + align - 1) & !(align - 1)
    }

    #[inline]
    pub fn base(&self) -> FarPtr {
        self.base
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn alignment(&self) -> u16 {
        self.alignment
    }

    #[inline]
    pub fn remaining_bytes(&self) -> u32 {
        self.remaining
    }

    #[inline]
    pub fn free_blocks(&self) -> usize {
        self.free_blocks.len()
    }

    /// Allocate `size` bytes, rounded up to the alignment. Returns None when no free block is
    /// large enough. A zero-byte request returns the null pointer.
    pub fn malloc(&mut self, size: u32) -> Option<FarPtr> {
        if size == 0 {
            return Some(FarPtr::NULL);
        }
        let size = self.aligned_size(size);

        let best = self
            .free_blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.size >= size)
            .min_by_key(|(_, block)| block.size)
            .map(|(i, _)| i);

        let Some(index) = best
        else {
            log::warn!(
                "Failed to allocate {} bytes in segment {:04X}: no free block large enough",
                size,
                self.base.segment
            );
            return None;
        };

        let block = &mut self.free_blocks[index];
        let offset = block.offset as u16;
        if block.size > size {
            block.offset += size;
            block.size -= size;
        }
        else {
            self.free_blocks.remove(index);
        }

        self.allocated.insert(offset, size);
        self.remaining -= size;
        Some(FarPtr::new(self.base.segment, offset))
    }

    /// Release a block. Freeing the null pointer is a no-op; freeing a pointer this allocator
    /// did not hand out is logged and ignored.
    pub fn free(&mut self, ptr: FarPtr) {
        if ptr.is_null() {
            return;
        }
        let Some(size) = self.allocated.remove(&ptr.offset)
        else {
            log::warn!("Attempted to free an unallocated memory block at {}", ptr);
            return;
        };
        self.remaining += size;

        let freed = MemoryBlock {
            offset: ptr.offset as u32,
            size,
        };
        let insert_at = self
            .free_blocks
            .iter()
            .position(|block| block.offset > freed.offset)
            .unwrap_or(self.free_blocks.len());
        self.free_blocks.insert(insert_at, freed);
        self.compact(insert_at);
    }

    /// Size of the block allocated at `ptr`, after alignment.
    pub fn get_allocated_memory_size(&self, ptr: FarPtr) -> Option<u32> {
        if ptr.segment != self.base.segment {
            return None;
        }
        self.allocated.get(&ptr.offset).copied()
    }

    /// Merge the block at `index` with the neighbors it touches. The free list is kept sorted
    /// by offset, so only the adjacent entries need checking.
    fn compact(&mut self, mut index: usize) {
        if index + 1 < self.free_blocks.len() && self.free_blocks[index].end() == self.free_blocks[index + 1].offset {
            let next = self.free_blocks.remove(index + 1);
            self.free_blocks[index].size += next.size;
        }
        if index > 0 && self.free_blocks[index - 1].end() == self.free_blocks[index].offset {
            let current = self.free_blocks.remove(index);
            index -= 1;
            self.free_blocks[index].size += current.size;
        }
    }
}
