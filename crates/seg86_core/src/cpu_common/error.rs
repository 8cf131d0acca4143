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

    cpu_common::error.rs

    This module defines the error types for the CPU and memory cores.

*/


use iced_x86::Mnemonic;
use seg86_common::FarPtr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    #[error("Segment {0:04X} has not been allocated")]
    SegmentNotFound(u16),
    #[error("Segment {0:04X} is already defined")]
    SegmentExists(u16),
    #[error("Access of {len} bytes at {segment:04X}:{offset:04X} is outside the segment")]
    OutOfBounds { segment: u16, offset: u16, len: usize },
    #[error("Allocator base offset {offset:04X} plus capacity {size:X} overflows the segment")]
    AllocatorOverflow { offset: u16, size: u32 },
    #[error("Allocator base offset {offset:04X} is not aligned to {alignment}")]
    AllocatorAlignment { offset: u16, alignment: u16 },
    #[error("Heap segment {0:04X} cannot hold a heap")]
    InvalidHeapSegment(u16),
    #[error("No free segment is left for the heap")]
    NoFreeSegment,
    #[error("Unable to allocate {0} bytes of heap")]
    OutOfMemory(u16),
    #[error("No string terminator found for string at {segment:04X}:{offset:04X}")]
    InvalidString { segment: u16, offset: u16 },
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unsupported memory operation: {0}")]
    Unsupported(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CpuError {
    #[error("Divide by zero at address: {0}")]
    DivideByZero(FarPtr),
    #[error("Division overflow at address: {0}")]
    DivideOverflow(FarPtr),
    #[error("FPU range error executing {mnemonic:?} at address: {address}")]
    FpuRange { mnemonic: Mnemonic, address: FarPtr },
    #[error("An unhandled instruction was encountered: {mnemonic:?} at address: {address}")]
    UnhandledInstruction { mnemonic: Mnemonic, address: FarPtr },
    #[error("An invalid instruction was encountered at address: {0}")]
    InvalidInstruction(FarPtr),
    #[error("Unsupported operand for {mnemonic:?} at address: {address}")]
    InvalidOperand { mnemonic: Mnemonic, address: FarPtr },
    #[error("No handler registered for interrupt {0:02X}")]
    UnhandledInterrupt(u8),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("Host error: {0}")]
    Host(String),
}

impl CpuError {
    /// Fatal numeric faults raised by guest code, as opposed to setup errors made by the host.
    pub fn is_fatal_fault(&self) -> bool {
        matches!(
            self,
            CpuError::DivideByZero(_) | CpuError::DivideOverflow(_) | CpuError::FpuRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        assert!(CpuError::DivideByZero(FarPtr::new(1, 0)).is_fatal_fault());
        assert!(CpuError::DivideOverflow(FarPtr::new(1, 0)).is_fatal_fault());
        assert!(!CpuError::UnhandledInterrupt(0x21).is_fatal_fault());
        assert!(!CpuError::from(MemoryError::SegmentNotFound(3)).is_fatal_fault());
        assert_ne!(
            CpuError::DivideByZero(FarPtr::new(1, 0)),
            CpuError::DivideOverflow(FarPtr::new(1, 0))
        );
    }

    #[test]
    fn test_display() {
        let err = CpuError::DivideByZero(FarPtr::new(0x0001, 0x0010));
        assert_eq!(err.to_string(), "Divide by zero at address: 0001:0010");
        let err = MemoryError::SegmentNotFound(0x2A);
        assert_eq!(err.to_string(), "Segment 002A has not been allocated");
    }
}
