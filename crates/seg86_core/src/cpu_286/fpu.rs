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

    cpu_286::fpu.rs

    Implements the x87 register file: the 8-slot register stack, status word
    and control word.

    The stack grows downward. A push decrements TOP and stores to the new ST(0),
    a pop reads ST(0) and increments TOP. ST(i) lives in physical slot (TOP + i) % 8.

*/


use std::cmp::Ordering;

use modular_bitfield::prelude::*;

pub const FPU_STACK_SIZE: usize = 8;

pub const FPU_STATUS_INVALID: u16 = 0x0001;
pub const FPU_STATUS_DENORMAL: u16 = 0x0002;
pub const FPU_STATUS_ZERO_DIVIDE: u16 = 0x0004;
pub const FPU_STATUS_OVERFLOW: u16 = 0x0008;
pub const FPU_STATUS_UNDERFLOW: u16 = 0x0010;
pub const FPU_STATUS_PRECISION: u16 = 0x0020;
pub const FPU_STATUS_EXCEPTION_MASK: u16 = 0x003F;

pub const FPU_STATUS_C0: u16 = 0x0100;
pub const FPU_STATUS_C1: u16 = 0x0200;
pub const FPU_STATUS_C2: u16 = 0x0400;
pub const FPU_STATUS_C3: u16 = 0x4000;
pub const FPU_STATUS_CONDITION_MASK: u16 = FPU_STATUS_C0 | FPU_STATUS_C1 | FPU_STATUS_C2 | FPU_STATUS_C3;

pub const FPU_STATUS_TOP_MASK: u16 = 0x3800;
pub const FPU_STATUS_TOP_SHIFT: u16 = 11;

/// Power-on control word: all exceptions masked, 64-bit precision, round to nearest.
pub const FPU_CONTROL_DEFAULT: u16 = 0x037F;

/// Bits 10-11 of the control word.
#[derive(Debug, Copy, Clone, PartialEq, BitfieldSpecifier)]
pub enum RoundingMode {
    Nearest,
    Down,
    Up,
    Truncate,
}

impl RoundingMode {
    pub fn round(&self, value: f64) -> f64 {
        match self {
            RoundingMode::Nearest => value.round_ties_even(),
            RoundingMode::Down => value.floor(),
            RoundingMode::Up => value.ceil(),
            RoundingMode::Truncate => value.trunc(),
        }
    }
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct FpuControlWord {
    pub invalid_mask: bool,
    pub denormal_mask: bool,
    pub zero_divide_mask: bool,
    pub overflow_mask: bool,
    pub underflow_mask: bool,
    pub precision_mask: bool,
    #[skip]
    unused0: B2,
    pub precision_control: B2,
    #[bits = 2]
    pub rounding_control: RoundingMode,
    pub infinity_control: bool,
    #[skip]
    unused1: B3,
}

impl From<u16> for FpuControlWord {
    fn from(word: u16) -> Self {
        FpuControlWord::from_bytes(word.to_le_bytes())
    }
}

impl From<FpuControlWord> for u16 {
    fn from(cw: FpuControlWord) -> Self {
        u16::from_le_bytes(cw.into_bytes())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FpuRegisters {
    /// Physical register slots. Use `st()` for ST(i) addressing.
    pub st: [f64; FPU_STACK_SIZE],
    pub status_word: u16,
    pub control_word: u16,
}

impl Default for FpuRegisters {
    fn default() -> Self {
        Self {
            st: [0.0; FPU_STACK_SIZE],
            status_word: 0,
            control_word: FPU_CONTROL_DEFAULT,
        }
    }
}

impl FpuRegisters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn stack_top(&self) -> u8 {
        ((self.status_word & FPU_STATUS_TOP_MASK) >> FPU_STATUS_TOP_SHIFT) as u8
    }

    #[inline]
    pub fn set_stack_top(&mut self, top: u8) {
        self.status_word =
            (self.status_word & !FPU_STATUS_TOP_MASK) | (((top & 0x07) as u16) << FPU_STATUS_TOP_SHIFT);
    }

    /// Decrement TOP, wrapping at 0.
    #[inline]
    pub fn push_stack_top(&mut self) {
        self.set_stack_top(self.stack_top().wrapping_sub(1));
    }

    /// Increment TOP, wrapping at 7.
    #[inline]
    pub fn pop_stack_top(&mut self) {
        self.set_stack_top(self.stack_top().wrapping_add(1));
    }

    /// Physical slot index of ST(i).
    #[inline]
    pub fn stack_pointer(&self, i: usize) -> usize {
        (self.stack_top() as usize + i) % FPU_STACK_SIZE
    }

    #[inline]
    pub fn st(&self, i: usize) -> f64 {
        self.st[self.stack_pointer(i)]
    }

    #[inline]
    pub fn set_st(&mut self, i: usize, value: f64) {
        let slot = self.stack_pointer(i);
        self.st[slot] = value;
    }

    pub fn push(&mut self, value: f64) {
        self.push_stack_top();
        self.set_st(0, value);
    }

    pub fn pop(&mut self) -> f64 {
        let value = self.st(0);
        self.pop_stack_top();
        value
    }

    #[inline]
    pub fn control(&self) -> FpuControlWord {
        FpuControlWord::from(self.control_word)
    }

    #[inline]
    pub fn rounding_mode(&self) -> RoundingMode {
        self.control().rounding_control()
    }

    #[inline]
    pub fn set_status_flag(&mut self, mask: u16) {
        self.status_word |= mask;
    }

    #[inline]
    pub fn clear_status_flag(&mut self, mask: u16) {
        self.status_word &= !mask;
    }

    #[inline]
    pub fn get_status_flag(&self, mask: u16) -> bool {
        self.status_word & mask != 0
    }

    pub fn clear_exceptions(&mut self) {
        self.status_word &= !FPU_STATUS_EXCEPTION_MASK;
    }

    /// Set C3, C2 and C0 for a comparison of ST(0) against a source operand.
    /// `None` is the unordered result produced when either operand is NaN.
    pub fn set_compare_result(&mut self, ordering: Option<Ordering>) {
        self.status_word &= !(FPU_STATUS_C0 | FPU_STATUS_C2 | FPU_STATUS_C3);
        self.status_word |= match ordering {
            None => FPU_STATUS_C0 | FPU_STATUS_C2 | FPU_STATUS_C3,
            Some(Ordering::Greater) => 0,
            Some(Ordering::Less) => FPU_STATUS_C0,
            Some(Ordering::Equal) => FPU_STATUS_C3,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_wraps() {
        let mut fpu = FpuRegisters::default();
        assert_eq!(fpu.stack_top(), 0);
        fpu.push_stack_top();
        assert_eq!(fpu.stack_top(), 7);
        fpu.pop_stack_top();
        fpu.pop_stack_top();
        assert_eq!(fpu.stack_top(), 1);
        fpu.set_stack_top(0x0F);
        assert_eq!(fpu.stack_top(), 7);
        assert_eq!(fpu.status_word & FPU_STATUS_TOP_MASK, 0x3800);
    }

    #[test]
    fn test_push_pop_order() {
        let mut fpu = FpuRegisters::default();
        fpu.push(1.0);
        fpu.push(2.0);
        assert_eq!(fpu.st(0), 2.0);
        assert_eq!(fpu.st(1), 1.0);
        assert_eq!(fpu.stack_pointer(1), 7);
        assert_eq!(fpu.pop(), 2.0);
        assert_eq!(fpu.pop(), 1.0);
        assert_eq!(fpu.stack_top(), 0);
    }

    #[test]
    fn test_control_word() {
        let fpu = FpuRegisters::default();
        let cw = fpu.control();
        assert!(cw.invalid_mask());
        assert!(cw.precision_mask());
        assert_eq!(cw.precision_control(), 3);
        assert_eq!(cw.rounding_control(), RoundingMode::Nearest);
        assert_eq!(u16::from(cw), FPU_CONTROL_DEFAULT);

        assert_eq!(FpuControlWord::from(0x0400u16).rounding_control(), RoundingMode::Down);
        assert_eq!(FpuControlWord::from(0x0800u16).rounding_control(), RoundingMode::Up);
        assert_eq!(FpuControlWord::from(0x0C00u16).rounding_control(), RoundingMode::Truncate);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(RoundingMode::Nearest.round(2.5), 2.0);
        assert_eq!(RoundingMode::Nearest.round(3.5), 4.0);
        assert_eq!(RoundingMode::Down.round(-1.5), -2.0);
        assert_eq!(RoundingMode::Up.round(1.1), 2.0);
        assert_eq!(RoundingMode::Truncate.round(-1.9), -1.0);
    }

    #[test]
    fn test_compare_and_exceptions() {
        let mut fpu = FpuRegisters::default();
        fpu.status_word = 0x003F | FPU_STATUS_C1;
        fpu.clear_exceptions();
        assert_eq!(fpu.status_word, FPU_STATUS_C1);

        fpu.set_compare_result(None);
        assert_eq!(fpu.status_word & FPU_STATUS_CONDITION_MASK, 0x4700);
        fpu.set_compare_result(Some(Ordering::Less));
        assert_eq!(fpu.status_word & FPU_STATUS_CONDITION_MASK, FPU_STATUS_C0 | FPU_STATUS_C1);
        fpu.set_compare_result(Some(Ordering::Equal));
        assert!(fpu.get_status_flag(FPU_STATUS_C3));
    }
}
