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

    memory::real.rs

    Implements the real-mode memory core: one flat store addressed as
    segment * 16 + offset, with a paragraph-aligned heap.

*/


use iced_x86::Instruction;
use seg86_common::{FarPtr, Seg86HashMap};

use crate::{
    cpu_common::{decode::decode_one, MemoryError},
    memory::{allocator::MemoryAllocator, MemoryCore, SEGMENT_SIZE},
};

/// Enough storage for FFFF:FFFF.
pub const REAL_MODE_MEMORY_SIZE: usize = 0x10_FFF0;
pub const DEFAULT_REAL_HEAP_SEGMENT: u16 = 0x8000;

const PARAGRAPH: u16 = 16;
const HEAP_CAPACITY: u32 = 0x10000;

#[derive(Clone, Debug)]
pub struct RealModeMemoryCore {
    memory: Vec<u8>,
    heap: MemoryAllocator,
    heap_segment: u16,
    variables: Seg86HashMap<String, FarPtr>,
}

impl Default for RealModeMemoryCore {
    fn default() -> Self {
        Self::new()
    }
}

impl RealModeMemoryCore {
    pub fn new() -> Self {
        Self::build(DEFAULT_REAL_HEAP_SEGMENT)
    }

    /// Create a core whose heap starts at `heap_segment`:0000. Segment 0 is rejected, since
    /// the first allocation would be the null pointer.
    pub fn with_heap_segment(heap_segment: u16) -> Result<Self, MemoryError> {
        Self::validate_heap_segment(heap_segment)?;
        Ok(Self::build(heap_segment))
    }

    pub fn validate_heap_segment(heap_segment: u16) -> Result<(), MemoryError> {
        if heap_segment == 0 {
            return Err(MemoryError::InvalidHeapSegment(heap_segment));
        }
        Ok(())
    }

    fn build(heap_segment: u16) -> Self {
        Self {
            memory: vec![0; REAL_MODE_MEMORY_SIZE],
            heap: MemoryAllocator::from_segment_start(heap_segment, Self::heap_capacity(heap_segment), PARAGRAPH),
            heap_segment,
            variables: Seg86HashMap::default(),
        }
    }

    /// The heap never extends past paragraph FFFF, so every normalized segment fits in a u16.
    fn heap_capacity(heap_segment: u16) -> u32 {
        ((0x10000 - heap_segment as u32) * PARAGRAPH as u32).min(HEAP_CAPACITY)
    }

    #[inline]
    pub fn physical_address(segment: u16, offset: u16) -> usize {
        ((segment as usize) << 4) + offset as usize
    }

    pub fn remaining_bytes(&self) -> u32 {
        self.heap.remaining_bytes()
    }

    /// Convert a normalized heap pointer back to the allocator's segment-relative form.
    fn denormalize(&self, ptr: FarPtr) -> Option<FarPtr> {
        if ptr.offset != 0 || ptr.segment < self.heap_segment {
            return None;
        }
        let paragraphs = ptr.segment - self.heap_segment;
        if paragraphs as u32 * PARAGRAPH as u32 >= self.heap.capacity() {
            return None;
        }
        Some(FarPtr::new(self.heap_segment, paragraphs * PARAGRAPH))
    }

    fn range(&self, segment: u16, offset: u16) -> (usize, usize) {
        let start = Self::physical_address(segment, offset);
        let end = (Self::physical_address(segment, 0) + SEGMENT_SIZE).min(self.memory.len());
        (start, end)
    }
}

impl MemoryCore for RealModeMemoryCore {
    /// Every segment is addressable in real mode.
    fn add_segment(&mut self, _segment: u16) -> Result<(), MemoryError> {
        Ok(())
    }

    fn has_segment(&self, _segment: u16) -> bool {
        true
    }

    fn remove_segment(&mut self, _segment: u16) {}

    fn add_code_segment(&mut self, segment: u16, code: &[u8]) -> Result<(), MemoryError> {
        let written = self.set_array(segment, 0, code)?;
        if written < code.len() {
            return Err(MemoryError::OutOfBounds {
                segment,
                offset: 0,
                len: code.len(),
            });
        }
        Ok(())
    }

    fn add_segment_with_instructions(&mut self, _segment: u16, _instructions: &[Instruction]) -> Result<(), MemoryError> {
        Err(MemoryError::Unsupported("pre-decoded instructions in real mode"))
    }

    fn get_instruction(&self, segment: u16, ip: u16) -> Result<Instruction, MemoryError> {
        let bytes = self.segment_slice(segment, ip)?;
        Ok(decode_one(bytes, ip))
    }

    fn segment_slice(&self, segment: u16, offset: u16) -> Result<&[u8], MemoryError> {
        let (start, end) = self.range(segment, offset);
        self.memory
            .get(start..end)
            .ok_or(MemoryError::OutOfBounds { segment, offset, len: 1 })
    }

    fn segment_slice_mut(&mut self, segment: u16, offset: u16) -> Result<&mut [u8], MemoryError> {
        let (start, end) = self.range(segment, offset);
        self.memory
            .get_mut(start..end)
            .ok_or(MemoryError::OutOfBounds { segment, offset, len: 1 })
    }

    /// Heap pointers are normalized so that the offset is always 0.
    fn malloc(&mut self, size: u16) -> Result<FarPtr, MemoryError> {
        if size == 0 {
            return Ok(FarPtr::NULL);
        }
        Ok(match self.heap.malloc(size as u32) {
            Some(ptr) => FarPtr::new(self.heap_segment + ptr.offset / PARAGRAPH, 0),
            None => FarPtr::NULL,
        })
    }

    fn free(&mut self, ptr: FarPtr) {
        if ptr.is_null() {
            return;
        }
        match self.denormalize(ptr) {
            Some(heap_ptr) => self.heap.free(heap_ptr),
            None => log::warn!("Attempted to free a pointer outside the real mode heap: {}", ptr),
        }
    }

    fn get_allocated_memory_size(&self, ptr: FarPtr) -> Option<u32> {
        self.denormalize(ptr)
            .and_then(|heap_ptr| self.heap.get_allocated_memory_size(heap_ptr))
    }

    fn clear(&mut self) {
        self.memory.fill(0);
        self.heap.reset();
        self.variables.clear();
    }

    fn variables(&self) -> &Seg86HashMap<String, FarPtr> {
        &self.variables
    }

    fn variables_mut(&mut self) -> &mut Seg86HashMap<String, FarPtr> {
        &mut self.variables
    }
}
