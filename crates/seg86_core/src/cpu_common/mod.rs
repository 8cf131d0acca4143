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

    cpu_common::mod.rs

    Types common to the CPU cores: execution results and operand sizes.

*/


pub mod alu;
pub mod decode;
pub mod error;

pub use error::{CpuError, MemoryError};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionResult {
    #[default]
    Okay,
    /// The handler set IP itself; it must not be advanced past the instruction.
    OkayJump,
    Halt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandSize {
    Byte,
    Word,
    Dword,
}

impl OperandSize {
    #[inline]
    pub fn bits(&self) -> u32 {
        match self {
            OperandSize::Byte => 8,
            OperandSize::Word => 16,
            OperandSize::Dword => 32,
        }
    }

    #[inline]
    pub fn bytes(&self) -> u16 {
        (self.bits() / 8) as u16
    }

    #[inline]
    pub fn mask(&self) -> u32 {
        match self {
            OperandSize::Byte => 0xFF,
            OperandSize::Word => 0xFFFF,
            OperandSize::Dword => 0xFFFF_FFFF,
        }
    }

    #[inline]
    pub fn sign_bit(&self) -> u32 {
        1 << (self.bits() - 1)
    }

    /// Sign-extend a value of this width to 32 bits.
    #[inline]
    pub fn sign_extend(&self, value: u32) -> i32 {
        match self {
            OperandSize::Byte => value as u8 as i8 as i32,
            OperandSize::Word => value as u16 as i16 as i32,
            OperandSize::Dword => value as i32,
        }
    }
}
