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

    memory::mod.rs

    Defines the MemoryCore trait implemented by the protected-mode and
    real-mode memory cores, and the MemoryCoreType enum the CPU holds.

*/


pub mod allocator;
pub mod protected;
pub mod real;

use enum_dispatch::enum_dispatch;
use iced_x86::Instruction;
use seg86_common::{FarPtr, Seg86HashMap};

pub use crate::memory::{allocator::MemoryAllocator, protected::ProtectedModeMemoryCore, real::RealModeMemoryCore};
use crate::cpu_common::MemoryError;

/// Size of a full segment.
pub const SEGMENT_SIZE: usize = 0x10000;

/// Segmented memory as seen by the CPU.
///
/// Implementors provide segment management, a view of each segment's bytes, and the heap.
/// Typed accessors are provided on top of `segment_slice`. Word and dword accesses that run
/// past offset 0xFFFF wrap to the start of the same segment; array and string accesses stop at
/// the end of the segment.
#[enum_dispatch]
pub trait MemoryCore {
    fn add_segment(&mut self, segment: u16) -> Result<(), MemoryError>;
    fn has_segment(&self, segment: u16) -> bool;
    fn remove_segment(&mut self, segment: u16);

    /// Add a segment holding `code` at offset 0.
    fn add_code_segment(&mut self, segment: u16, code: &[u8]) -> Result<(), MemoryError>;
    /// Install a pre-decoded instruction list for a segment, keyed by each instruction's IP.
    fn add_segment_with_instructions(&mut self, segment: u16, instructions: &[Instruction]) -> Result<(), MemoryError>;
    fn get_instruction(&self, segment: u16, ip: u16) -> Result<Instruction, MemoryError>;

    /// The bytes of `segment` from `offset` to the end of the segment.
    fn segment_slice(&self, segment: u16, offset: u16) -> Result<&[u8], MemoryError>;
    fn segment_slice_mut(&mut self, segment: u16, offset: u16) -> Result<&mut [u8], MemoryError>;

    /// Allocate `size` bytes of heap. Returns the null pointer for a zero-byte request or
    /// when the heap is exhausted.
    fn malloc(&mut self, size: u16) -> Result<FarPtr, MemoryError>;
    fn free(&mut self, ptr: FarPtr);
    fn get_allocated_memory_size(&self, ptr: FarPtr) -> Option<u32>;

    /// Drop all segments, heap state and variables.
    fn clear(&mut self);

    fn variables(&self) -> &Seg86HashMap<String, FarPtr>;
    fn variables_mut(&mut self) -> &mut Seg86HashMap<String, FarPtr>;

    fn get_byte(&self, segment: u16, offset: u16) -> Result<u8, MemoryError> {
        self.segment_slice(segment, offset)?
            .first()
            .copied()
            .ok_or(MemoryError::OutOfBounds { segment, offset, len: 1 })
    }

    fn set_byte(&mut self, segment: u16, offset: u16, value: u8) -> Result<(), MemoryError> {
        let slice = self.segment_slice_mut(segment, offset)?;
        match slice.first_mut() {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(MemoryError::OutOfBounds { segment, offset, len: 1 }),
        }
    }

    fn get_word(&self, segment: u16, offset: u16) -> Result<u16, MemoryError> {
        let slice = self.segment_slice(segment, offset)?;
        if let [b0, b1, ..] = slice {
            return Ok(u16::from_le_bytes([*b0, *b1]));
        }
        let lo = self.get_byte(segment, offset)?;
        let hi = self.get_byte(segment, offset.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn set_word(&mut self, segment: u16, offset: u16, value: u16) -> Result<(), MemoryError> {
        let bytes = value.to_le_bytes();
        let slice = self.segment_slice_mut(segment, offset)?;
        if slice.len() >= 2 {
            slice[..2].copy_from_slice(&bytes);
            return Ok(());
        }
        self.set_byte(segment, offset, bytes[0])?;
        self.set_byte(segment, offset.wrapping_add(1), bytes[1])
    }

    fn get_dword(&self, segment: u16, offset: u16) -> Result<u32, MemoryError> {
        let lo = self.get_word(segment, offset)?;
        let hi = self.get_word(segment, offset.wrapping_add(2))?;
        Ok(((hi as u32) << 16) | lo as u32)
    }

    fn set_dword(&mut self, segment: u16, offset: u16, value: u32) -> Result<(), MemoryError> {
        self.set_word(segment, offset, value as u16)?;
        self.set_word(segment, offset.wrapping_add(2), (value >> 16) as u16)
    }

    fn get_qword(&self, segment: u16, offset: u16) -> Result<u64, MemoryError> {
        let lo = self.get_dword(segment, offset)?;
        let hi = self.get_dword(segment, offset.wrapping_add(4))?;
        Ok(((hi as u64) << 32) | lo as u64)
    }

    fn set_qword(&mut self, segment: u16, offset: u16, value: u64) -> Result<(), MemoryError> {
        self.set_dword(segment, offset, value as u32)?;
        self.set_dword(segment, offset.wrapping_add(4), (value >> 32) as u32)
    }

    /// Read up to `len` bytes. The result is truncated at the end of the segment.
    fn get_array(&self, segment: u16, offset: u16, len: usize) -> Result<&[u8], MemoryError> {
        let slice = self.segment_slice(segment, offset)?;
        Ok(&slice[..len.min(slice.len())])
    }

    /// Write `data`, truncated at the end of the segment. Returns the number of bytes written.
    fn set_array(&mut self, segment: u16, offset: u16, data: &[u8]) -> Result<usize, MemoryError> {
        let slice = self.segment_slice_mut(segment, offset)?;
        let len = data.len().min(slice.len());
        slice[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    /// Read a NUL-terminated string. The terminator is included unless `strip_null` is set.
    fn get_string(&self, segment: u16, offset: u16, strip_null: bool) -> Result<&[u8], MemoryError> {
        let slice = self.segment_slice(segment, offset)?;
        let end = slice
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::InvalidString { segment, offset })?;
        Ok(&slice[..if strip_null { end } else { end + 1 }])
    }

    fn fill_array(&mut self, segment: u16, offset: u16, len: usize, value: u8) -> Result<(), MemoryError> {
        let slice = self.segment_slice_mut(segment, offset)?;
        let len = len.min(slice.len());
        slice[..len].fill(value);
        Ok(())
    }

    fn set_zero(&mut self, ptr: FarPtr, len: usize) -> Result<(), MemoryError> {
        self.fill_array(ptr.segment, ptr.offset, len, 0)
    }

    /// Read a far pointer stored as offset word then segment word.
    fn get_pointer(&self, segment: u16, offset: u16) -> Result<FarPtr, MemoryError> {
        let ptr_offset = self.get_word(segment, offset)?;
        let ptr_segment = self.get_word(segment, offset.wrapping_add(2))?;
        Ok(FarPtr::new(ptr_segment, ptr_offset))
    }

    fn set_pointer(&mut self, segment: u16, offset: u16, ptr: FarPtr) -> Result<(), MemoryError> {
        self.set_word(segment, offset, ptr.offset)?;
        self.set_word(segment, offset.wrapping_add(2), ptr.segment)
    }

    /// Allocate a zeroed, named block. With `declare_pointer`, a second variable named
    /// `*name` is allocated holding a far pointer to the first. Re-allocating an existing
    /// name returns the existing block. Fails with `OutOfMemory` if the heap cannot hold it.
    fn allocate_variable(&mut self, name: &str, size: u16, declare_pointer: bool) -> Result<FarPtr, MemoryError> {
        if let Some(existing) = self.variables().get(name) {
            log::warn!("Attempted to re-allocate variable: {}", name);
            return Ok(*existing);
        }
        if declare_pointer && name.is_empty() {
            return Err(MemoryError::Unsupported("declaring a pointer to an unnamed variable"));
        }

        let ptr = self.malloc(size)?;
        if ptr.is_null() {
            if size > 0 {
                return Err(MemoryError::OutOfMemory(size));
            }
        }
        else {
            self.set_zero(ptr, size as usize)?;
        }

        if !name.is_empty() {
            self.variables_mut().insert(name.to_string(), ptr);
            if declare_pointer {
                let pointer_name = format!("*{}", name);
                let variable_ptr = self.allocate_variable(&pointer_name, FarPtr::SIZE as u16, false)?;
                self.set_pointer(variable_ptr.segment, variable_ptr.offset, ptr)?;
            }
        }
        Ok(ptr)
    }

    fn get_variable_pointer(&self, name: &str) -> Result<FarPtr, MemoryError> {
        self.try_get_variable_pointer(name)
            .ok_or_else(|| MemoryError::UnknownVariable(name.to_string()))
    }

    fn try_get_variable_pointer(&self, name: &str) -> Option<FarPtr> {
        self.variables().get(name).copied()
    }

    fn get_or_allocate_variable_pointer(
        &mut self,
        name: &str,
        size: u16,
        declare_pointer: bool,
    ) -> Result<FarPtr, MemoryError> {
        match self.try_get_variable_pointer(name) {
            Some(ptr) => Ok(ptr),
            None => self.allocate_variable(name, size, declare_pointer),
        }
    }
}

#[enum_dispatch(MemoryCore)]
pub enum MemoryCoreType {
    ProtectedModeMemoryCore,
    RealModeMemoryCore,
}
