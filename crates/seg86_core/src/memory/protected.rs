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

    memory::protected.rs

    Implements the protected-mode memory core. Every segment is an independently
    allocated buffer looked up by its selector. Heap segments are created on
    demand, starting at the configured heap base segment.

*/


use std::collections::BTreeMap;

use iced_x86::Instruction;
use seg86_common::{FarPtr, Seg86HashMap};

use crate::{
    cpu_common::{
        decode::{decode_linear, decode_one},
        MemoryError,
    },
    memory::{allocator::MemoryAllocator, MemoryCore, SEGMENT_SIZE},
};

pub const DEFAULT_HEAP_BASE_SEGMENT: u16 = 0x1000;
pub const DEFAULT_REAL_MODE_BASE_SEGMENT: u16 = 0x2000;

/// Heap allocators begin at offset 2 so that no allocation has a zero offset.
const HEAP_BASE_OFFSET: u16 = 2;
const HEAP_CAPACITY: u32 = 0xFFFE;
const HEAP_ALIGNMENT: u16 = 2;

#[derive(Clone, Debug)]
struct Segment {
    data: Vec<u8>,
    instructions: Option<Seg86HashMap<u16, Instruction>>,
}

impl Segment {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            instructions: None,
        }
    }

    fn install_instructions(&mut self, instructions: &[Instruction]) {
        let map = self
            .instructions
            .get_or_insert_with(|| Seg86HashMap::with_capacity_and_hasher(instructions.len(), Default::default()));
        for instruction in instructions {
            map.insert(instruction.ip16(), *instruction);
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProtectedModeMemoryCore {
    segments: Seg86HashMap<u16, Segment>,
    heap_allocators: BTreeMap<u16, MemoryAllocator>,
    heap_base_segment: u16,
    next_heap_segment: u16,
    real_mode_base_segment: u16,
    next_real_mode_segment: u16,
    variables: Seg86HashMap<String, FarPtr>,
}

impl Default for ProtectedModeMemoryCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtectedModeMemoryCore {
    pub fn new() -> Self {
        Self::with_bases(DEFAULT_HEAP_BASE_SEGMENT, DEFAULT_REAL_MODE_BASE_SEGMENT)
    }

    /// Create a core whose heap segments start at `heap_base_segment` and whose real-mode
    /// segments are handed out above `real_mode_base_segment`. Segment 0 is always present
    /// for the stack.
    pub fn with_bases(heap_base_segment: u16, real_mode_base_segment: u16) -> Self {
        let mut core = Self {
            segments: Seg86HashMap::default(),
            heap_allocators: BTreeMap::new(),
            heap_base_segment,
            next_heap_segment: heap_base_segment,
            real_mode_base_segment,
            next_real_mode_segment: real_mode_base_segment,
            variables: Seg86HashMap::default(),
        };
        core.segments.insert(0, Segment::new(SEGMENT_SIZE));
        core
    }

    /// Add a segment backed by `size` bytes. Accesses past `size` are out of bounds.
    pub fn add_segment_sized(&mut self, segment: u16, size: usize) -> Result<(), MemoryError> {
        if self.segments.contains_key(&segment) {
            return Err(MemoryError::SegmentExists(segment));
        }
        log::debug!("Adding segment {:04X} of {:X} bytes", segment, size.min(SEGMENT_SIZE));
        self.segments.insert(segment, Segment::new(size.min(SEGMENT_SIZE)));
        Ok(())
    }

    /// Hand out the next segment above the real-mode base.
    pub fn allocate_real_mode_segment(&mut self, size: usize) -> Result<FarPtr, MemoryError> {
        self.next_real_mode_segment = self.next_real_mode_segment.wrapping_add(1);
        let segment = self.next_real_mode_segment;
        self.add_segment_sized(segment, size)?;
        Ok(FarPtr::new(segment, 0))
    }

    pub fn heap_segments(&self) -> usize {
        self.heap_allocators.len()
    }

    /// Bytes still available in existing heap segments.
    pub fn remaining_bytes(&self) -> u32 {
        self.heap_allocators.values().map(|a| a.remaining_bytes()).sum()
    }

    fn segment(&self, segment: u16) -> Result<&Segment, MemoryError> {
        self.segments.get(&segment).ok_or(MemoryError::SegmentNotFound(segment))
    }

    /// Create the next heap segment, skipping numbers the host has already claimed.
    fn add_heap_segment(&mut self) -> Result<u16, MemoryError> {
        let mut segment = self.next_heap_segment;
        let mut skipped = 0u32;
        while self.segments.contains_key(&segment) {
            skipped += 1;
            if skipped > u16::MAX as u32 {
                return Err(MemoryError::NoFreeSegment);
            }
            segment = segment.wrapping_add(1);
        }
        self.add_segment_sized(segment, SEGMENT_SIZE)?;
        let allocator = MemoryAllocator::new(FarPtr::new(segment, HEAP_BASE_OFFSET), HEAP_CAPACITY, HEAP_ALIGNMENT)?;
        self.heap_allocators.insert(segment, allocator);
        self.next_heap_segment = segment.wrapping_add(1);
        log::debug!("Created heap segment {:04X}", segment);
        Ok(segment)
    }
}

impl MemoryCore for ProtectedModeMemoryCore {
    fn add_segment(&mut self, segment: u16) -> Result<(), MemoryError> {
        self.add_segment_sized(segment, SEGMENT_SIZE)
    }

    fn has_segment(&self, segment: u16) -> bool {
        self.segments.contains_key(&segment)
    }

    fn remove_segment(&mut self, segment: u16) {
        if self.segments.remove(&segment).is_some() {
            log::debug!("Removed segment {:04X}", segment);
        }
    }

    fn add_code_segment(&mut self, segment: u16, code: &[u8]) -> Result<(), MemoryError> {
        if code.len() > SEGMENT_SIZE {
            return Err(MemoryError::OutOfBounds {
                segment,
                offset: 0,
                len: code.len(),
            });
        }
        self.add_segment(segment)?;
        let instructions = decode_linear(code);
        if let Some(seg) = self.segments.get_mut(&segment) {
            seg.data[..code.len()].copy_from_slice(code);
            seg.install_instructions(&instructions);
        }
        Ok(())
    }

    fn add_segment_with_instructions(&mut self, segment: u16, instructions: &[Instruction]) -> Result<(), MemoryError> {
        let seg = self
            .segments
            .entry(segment)
            .or_insert_with(|| Segment::new(SEGMENT_SIZE));
        seg.install_instructions(instructions);
        Ok(())
    }

    fn get_instruction(&self, segment: u16, ip: u16) -> Result<Instruction, MemoryError> {
        let seg = self.segment(segment)?;
        if let Some(instruction) = seg.instructions.as_ref().and_then(|map| map.get(&ip)) {
            return Ok(*instruction);
        }
        let bytes = seg.data.get(ip as usize..).unwrap_or(&[]);
        Ok(decode_one(bytes, ip))
    }

    fn segment_slice(&self, segment: u16, offset: u16) -> Result<&[u8], MemoryError> {
        let seg = self.segment(segment)?;
        seg.data
            .get(offset as usize..)
            .ok_or(MemoryError::OutOfBounds { segment, offset, len: 1 })
    }

    fn segment_slice_mut(&mut self, segment: u16, offset: u16) -> Result<&mut [u8], MemoryError> {
        let seg = self
            .segments
            .get_mut(&segment)
            .ok_or(MemoryError::SegmentNotFound(segment))?;
        seg.data
            .get_mut(offset as usize..)
            .ok_or(MemoryError::OutOfBounds { segment, offset, len: 1 })
    }

    fn malloc(&mut self, size: u16) -> Result<FarPtr, MemoryError> {
        if size == 0 {
            return Ok(FarPtr::NULL);
        }
        if (size as u32).next_multiple_of(HEAP_ALIGNMENT as u32) > HEAP_CAPACITY {
            log::warn!("Failed to allocate {} bytes: larger than a heap segment", size);
            return Ok(FarPtr::NULL);
        }
        for allocator in self.heap_allocators.values_mut() {
            if allocator.remaining_bytes() < size as u32 {
                continue;
            }
            if let Some(ptr) = allocator.malloc(size as u32) {
                return Ok(ptr);
            }
        }

        // No existing heap segment could satisfy the request
        let segment = self.add_heap_segment()?;
        Ok(self
            .heap_allocators
            .get_mut(&segment)
            .and_then(|allocator| allocator.malloc(size as u32))
            .unwrap_or(FarPtr::NULL))
    }

    fn free(&mut self, ptr: FarPtr) {
        if ptr.is_null() {
            return;
        }
        match self.heap_allocators.get_mut(&ptr.segment) {
            Some(allocator) => allocator.free(ptr),
            None => log::warn!("Attempted to free memory from an unknown heap segment: {}", ptr),
        }
    }

    fn get_allocated_memory_size(&self, ptr: FarPtr) -> Option<u32> {
        self.heap_allocators
            .get(&ptr.segment)
            .and_then(|allocator| allocator.get_allocated_memory_size(ptr))
    }

    fn clear(&mut self) {
        *self = Self::with_bases(self.heap_base_segment, self.real_mode_base_segment);
    }

    fn variables(&self) -> &Seg86HashMap<String, FarPtr> {
        &self.variables
    }

    fn variables_mut(&mut self) -> &mut Seg86HashMap<String, FarPtr> {
        &mut self.variables
    }
}
