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

    cpu_common::alu.rs

    This module implements traits for alu operations of different widths
    common across CPU types.

*/


/* ----------------------- Addition & Subtraction ------------------------- */

pub trait AluNeg: Sized {
    fn alu_neg(self) -> (Self, bool, bool, bool);
}

pub trait AluSub<Rhs = Self>: Sized {
    fn alu_sub(self, rhs: Rhs) -> (Self, bool, bool, bool);
}

pub trait AluSbb<Rhs = Self>: Sized {
    fn alu_sbb(self, rhs: Rhs, carry: bool) -> (Self, bool, bool, bool);
}
pub trait AluAdd<Rhs = Self>: Sized {
    fn alu_add(self, rhs: Rhs) -> (Self, bool, bool, bool);
}

pub trait AluAdc<Rhs = Self>: Sized {
    fn alu_adc(self, rhs: Rhs, carry: bool) -> (Self, bool, bool, bool);
}

macro_rules! impl_neg {
    ($prim:ty) => {
        impl AluNeg for $prim {
            /// Negation
            ///
            /// Flags are those of 0 - Self, except that carry is set for any nonzero operand.
            fn alu_neg(self) -> (Self, bool, bool, bool) {
                let (result, _carry, overflow, aux_carry) = (0 as $prim).alu_sub(self);
                (result, self != 0, overflow, aux_carry)
            }
        }
    };
}

macro_rules! impl_sub {
    ($prim:ty) => {
        impl AluSub for $prim {
            /// Subtraction
            ///
            /// Carry flag is set if Unsigned overflow occurred
            /// Overflow flag is set if Signed overflow occurred
            /// AF flag is set if borrow from top nibble
            fn alu_sub(self, rhs: Self) -> (Self, bool, bool, bool) {
                let (result, carry) = self.overflowing_sub(rhs);
                let overflow = (self ^ rhs) & (self ^ result) & (1 << (<$prim>::BITS - 1)) != 0;
                let aux_carry = ((self ^ rhs ^ result) & 0x10) != 0;
                (result, carry, overflow, aux_carry)
            }
        }
    };
}

macro_rules! impl_sbb {
    ($prim:ty) => {
        impl AluSbb for $prim {
            /// Subtraction with borrow from carry flag
            ///
            /// Carry is set if the subtrahend plus the borrow exceeds the minuend.
            fn alu_sbb(self, rhs: Self, carry_in: bool) -> (Self, bool, bool, bool) {
                let lhs_w = self as u64;
                let rhs_w = rhs as u64 + carry_in as u64;
                let result = lhs_w.wrapping_sub(rhs_w) as $prim;
                let carry = rhs_w > lhs_w;

                let overflow = (self ^ rhs) & (self ^ result) & (1 << (<$prim>::BITS - 1)) != 0;
                let aux_carry = ((self ^ rhs ^ result) & 0x10) != 0;

                (result, carry, overflow, aux_carry)
            }
        }
    };
}

macro_rules! impl_add {
    ($prim:ty) => {
        impl AluAdd for $prim {
            /// Addition
            ///
            /// Carry flag is set if Unsigned overflow occurred
            /// Overflow flag is set if Signed overflow occurred
            /// AF flag is set if carry out of the low nibble
            fn alu_add(self, rhs: Self) -> (Self, bool, bool, bool) {
                let (result, carry) = self.overflowing_add(rhs);
                let overflow = (self ^ result) & (rhs ^ result) & (1 << (<$prim>::BITS - 1)) != 0;
                let aux_carry = ((self ^ rhs ^ result) & 0x10) != 0;
                (result, carry, overflow, aux_carry)
            }
        }
    };
}

macro_rules! impl_adc {
    ($prim:ty) => {
        impl AluAdc for $prim {
            /// Addition with carry from carry flag
            fn alu_adc(self, rhs: Self, carry_in: bool) -> (Self, bool, bool, bool) {
                let sum = self as u64 + rhs as u64 + carry_in as u64;
                let result = sum as $prim;
                let carry = (sum >> <$prim>::BITS) != 0;

                let overflow = (self ^ result) & (rhs ^ result) & (1 << (<$prim>::BITS - 1)) != 0;
                let aux_carry = ((self ^ rhs ^ result) & 0x10) != 0;

                (result, carry, overflow, aux_carry)
            }
        }
    };
}

impl_neg!(u8);
impl_neg!(u16);
impl_neg!(u32);
impl_sub!(u8);
impl_sub!(u16);
impl_sub!(u32);
impl_sbb!(u8);
impl_sbb!(u16);
impl_sbb!(u32);
impl_add!(u8);
impl_add!(u16);
impl_add!(u32);
impl_adc!(u8);
impl_adc!(u16);
impl_adc!(u32);

/* ------------------------- Bitwise operations ---------------------------- */

pub trait AluShiftLeft: Sized {
    fn alu_shl(self, count: u8) -> (Self, bool);
}

macro_rules! impl_shl {
    ($prim:ty) => {
        impl AluShiftLeft for $prim {
            fn alu_shl(mut self, mut count: u8) -> (Self, bool) {
                let mut carry = false;
                while count > 0 {
                    carry = self >> (<$prim>::BITS - 1) != 0;
                    self <<= 1;
                    count -= 1;
                }
                (self, carry)
            }
        }
    };
}

pub trait AluShiftRight: Sized {
    fn alu_shr(self, count: u8) -> (Self, bool);
}

macro_rules! impl_shr {
    ($prim:ty) => {
        impl AluShiftRight for $prim {
            fn alu_shr(mut self, mut count: u8) -> (Self, bool) {
                let mut carry = false;
                while count > 0 {
                    carry = self & 0x01 != 0;
                    self >>= 1;
                    count -= 1;
                }
                (self, carry)
            }
        }
    };
}

pub trait AluShiftArithmeticRight: Sized {
    fn alu_sar(self, count: u8) -> (Self, bool);
}

macro_rules! impl_sar {
    ($prim:ty) => {
        impl AluShiftArithmeticRight for $prim {
            fn alu_sar(mut self, mut count: u8) -> (Self, bool) {
                let mut carry = false;
                let sign = self & (1 << (<$prim>::BITS - 1));
                while count > 0 {
                    carry = self & 0x01 != 0;
                    self = (self >> 1) | sign;
                    count -= 1;
                }
                (self, carry)
            }
        }
    };
}

pub trait AluRotateLeft: Sized {
    fn alu_rol(self, count: u8) -> (Self, bool);
}

macro_rules! impl_rol {
    ($prim:ty) => {
        impl AluRotateLeft for $prim {
            fn alu_rol(mut self, count: u8) -> (Self, bool) {
                let mut carry = 0 as $prim;
                for _ in 0..count {
                    carry = self & (1 << (<$prim>::BITS - 1));
                    self <<= 1;
                    self |= carry >> (<$prim>::BITS - 1);
                }
                (self, carry != 0)
            }
        }
    };
}

pub trait AluRotateCarryLeft: Sized {
    fn alu_rcl(self, count: u8, carry: bool) -> (Self, bool);
}

macro_rules! impl_rcl {
    ($prim:ty) => {
        impl AluRotateCarryLeft for $prim {
            fn alu_rcl(mut self, count: u8, carry: bool) -> (Self, bool) {
                let mut carry = carry as $prim;
                for _ in 0..count {
                    let saved_carry = carry;
                    carry = self >> (<$prim>::BITS - 1);
                    self <<= 1;
                    self |= saved_carry;
                }
                (self, carry != 0)
            }
        }
    };
}

pub trait AluRotateRight: Sized {
    fn alu_ror(self, count: u8) -> (Self, bool);
}

macro_rules! impl_ror {
    ($prim:ty) => {
        impl AluRotateRight for $prim {
            fn alu_ror(mut self, count: u8) -> (Self, bool) {
                let mut carry = 0 as $prim;
                for _ in 0..count {
                    carry = self & 0x01;
                    self >>= 1;
                    self |= carry << (<$prim>::BITS - 1);
                }
                (self, carry != 0)
            }
        }
    };
}

pub trait AluRotateCarryRight: Sized {
    fn alu_rcr(self, count: u8, carry: bool) -> (Self, bool);
}

macro_rules! impl_rcr {
    ($prim:ty) => {
        impl AluRotateCarryRight for $prim {
            fn alu_rcr(mut self, count: u8, carry: bool) -> (Self, bool) {
                let mut carry = (carry as $prim) << (<$prim>::BITS - 1);
                for _ in 0..count {
                    let saved_carry = carry;
                    carry = (self & 1) << (<$prim>::BITS - 1);
                    self >>= 1;
                    self |= saved_carry;
                }
                (self, carry != 0)
            }
        }
    };
}

impl_shl!(u8);
impl_shl!(u16);
impl_shl!(u32);
impl_shr!(u8);
impl_shr!(u16);
impl_shr!(u32);
impl_sar!(u8);
impl_sar!(u16);
impl_sar!(u32);
impl_rol!(u8);
impl_rol!(u16);
impl_rol!(u32);
impl_rcl!(u8);
impl_rcl!(u16);
impl_rcl!(u32);
impl_ror!(u8);
impl_ror!(u16);
impl_ror!(u32);
impl_rcr!(u8);
impl_rcr!(u16);
impl_rcr!(u32);

/* --------------------------- Operand widths ------------------------------ */

/// Everything the width-generic ALU paths need from an operand primitive.
pub trait AluOperand:
    Copy
    + PartialEq
    + AluAdd
    + AluAdc
    + AluSub
    + AluSbb
    + AluNeg
    + AluShiftLeft
    + AluShiftRight
    + AluShiftArithmeticRight
    + AluRotateLeft
    + AluRotateRight
    + AluRotateCarryLeft
    + AluRotateCarryRight
    + std::ops::BitAnd<Output = Self>
    + std::ops::BitOr<Output = Self>
    + std::ops::BitXor<Output = Self>
    + std::ops::Not<Output = Self>
{
    const BITS: u32;
    fn from_u32(value: u32) -> Self;
    fn to_u32(self) -> u32;
    fn is_zero(self) -> bool;
    fn msb(self) -> bool;
    fn low_byte(self) -> u8;
}

macro_rules! impl_operand {
    ($prim:ty) => {
        impl AluOperand for $prim {
            const BITS: u32 = <$prim>::BITS;
            #[inline(always)]
            fn from_u32(value: u32) -> Self {
                value as $prim
            }
            #[inline(always)]
            fn to_u32(self) -> u32 {
                self as u32
            }
            #[inline(always)]
            fn is_zero(self) -> bool {
                self == 0
            }
            #[inline(always)]
            fn msb(self) -> bool {
                self >> (<$prim>::BITS - 1) != 0
            }
            #[inline(always)]
            fn low_byte(self) -> u8 {
                self as u8
            }
        }
    };
}

impl_operand!(u8);
impl_operand!(u16);
impl_operand!(u32);
