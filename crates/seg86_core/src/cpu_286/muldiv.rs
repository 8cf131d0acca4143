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

    cpu_286::muldiv.rs

    Multiplication and division instructions.

*/


use iced_x86::{Instruction, Mnemonic};
use seg86_common::util::make_dword;

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult, OperandSize},
};

impl Intel286 {
    #[inline]
    fn set_mul_flags(&mut self, significant: bool) {
        self.set_flag_state(Flag::Carry, significant);
        self.set_flag_state(Flag::Overflow, significant);
    }

    /// Unsigned multiply of the accumulator. CF and OF are set if the upper half is nonzero.
    pub(crate) fn op_mul(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let operand = self.read_operand(instr, 0, size)?;

        let significant = match size {
            OperandSize::Byte => {
                let product = self.regs.a.l() as u16 * operand as u16;
                self.regs.a.set_x(product);
                product > 0xFF
            }
            OperandSize::Word => {
                let product = self.regs.a.x() as u32 * operand;
                self.regs.a.set_x(product as u16);
                self.regs.d.set_x((product >> 16) as u16);
                product > 0xFFFF
            }
            OperandSize::Dword => {
                let product = self.regs.a.e() as u64 * operand as u64;
                self.regs.a.set_e(product as u32);
                self.regs.d.set_e((product >> 32) as u32);
                product > 0xFFFF_FFFF
            }
        };
        self.set_mul_flags(significant);
        Ok(ExecutionResult::Okay)
    }

    /// Signed multiply, in its one-, two- and three-operand forms. CF and OF are set when the
    /// product does not fit in the destination (or lower half) as a signed value.
    pub(crate) fn op_imul(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        if instr.op_count() == 1 {
            let size = self.operand_size(instr, 0)?;
            let operand = size.sign_extend(self.read_operand(instr, 0, size)?) as i64;

            let significant = match size {
                OperandSize::Byte => {
                    let product = self.regs.a.l() as i8 as i64 * operand;
                    self.regs.a.set_x(product as u16);
                    product != product as i8 as i64
                }
                OperandSize::Word => {
                    let product = self.regs.a.x() as i16 as i64 * operand;
                    self.regs.a.set_x(product as u16);
                    self.regs.d.set_x((product >> 16) as u16);
                    product != product as i16 as i64
                }
                OperandSize::Dword => {
                    let product = self.regs.a.e() as i32 as i64 * operand;
                    self.regs.a.set_e(product as u32);
                    self.regs.d.set_e((product >> 32) as u32);
                    product != product as i32 as i64
                }
            };
            self.set_mul_flags(significant);
            return Ok(ExecutionResult::Okay);
        }

        // imul r, r/m  or  imul r, r/m, imm
        let size = self.operand_size(instr, 0)?;
        let (multiplicand, multiplier) = if instr.op_count() == 3 {
            (self.read_operand(instr, 1, size)?, self.read_operand(instr, 2, size)?)
        }
        else {
            (self.read_operand(instr, 0, size)?, self.read_operand(instr, 1, size)?)
        };
        let product = size.sign_extend(multiplicand) as i64 * size.sign_extend(multiplier) as i64;
        let truncated = size.sign_extend(product as u32 & size.mask()) as i64;

        self.write_operand(instr, 0, size, product as u32)?;
        self.set_mul_flags(product != truncated);
        Ok(ExecutionResult::Okay)
    }

    /// DIV and IDIV. A zero divisor and a quotient too wide for the destination are distinct
    /// faults. The IDIV remainder takes the sign of the dividend.
    pub(crate) fn op_div(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let divisor = self.read_operand(instr, 0, size)?;
        let address = self.regs.cs_ip();

        if divisor == 0 {
            return Err(CpuError::DivideByZero(address));
        }

        let (dividend, mask) = match size {
            OperandSize::Byte => (self.regs.a.x() as u64, 0xFFu64),
            OperandSize::Word => (make_dword(self.regs.d.x(), self.regs.a.x()) as u64, 0xFFFF),
            OperandSize::Dword => (((self.regs.d.e() as u64) << 32) | self.regs.a.e() as u64, 0xFFFF_FFFF),
        };

        let (quotient, remainder) = if instr.mnemonic() == Mnemonic::Idiv {
            // Sign-extend the double-width dividend and the divisor. i128 keeps MIN / -1 in range.
            let dividend_bits = size.bits() * 2;
            let dividend = ((dividend as i128) << (128 - dividend_bits)) >> (128 - dividend_bits);
            let divisor = size.sign_extend(divisor) as i128;

            let quotient = dividend / divisor;
            let remainder = dividend % divisor;
            let min = -(1i128 << (size.bits() - 1));
            let max = (1i128 << (size.bits() - 1)) - 1;
            if quotient < min || quotient > max {
                return Err(CpuError::DivideOverflow(address));
            }
            (quotient as u64 & mask, remainder as u64 & mask)
        }
        else {
            let quotient = dividend / divisor as u64;
            if quotient > mask {
                return Err(CpuError::DivideOverflow(address));
            }
            (quotient, dividend % divisor as u64)
        };

        match size {
            OperandSize::Byte => {
                self.regs.a.set_l(quotient as u8);
                self.regs.a.set_h(remainder as u8);
            }
            OperandSize::Word => {
                self.regs.a.set_x(quotient as u16);
                self.regs.d.set_x(remainder as u16);
            }
            OperandSize::Dword => {
                self.regs.a.set_e(quotient as u32);
                self.regs.d.set_e(remainder as u32);
            }
        }
        Ok(ExecutionResult::Okay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu_common::decode::decode_one, memory::ProtectedModeMemoryCore};

    fn cpu() -> Intel286 {
        Intel286::new(ProtectedModeMemoryCore::new().into())
    }

    #[test]
    fn test_imul_three_operand_overflow() {
        let mut cpu = cpu();
        cpu.regs.b.set_x(0x7FFF);
        // imul ax, bx, 2
        let instr = decode_one(&[0x6B, 0xC3, 0x02], 0);
        cpu.op_imul(&instr).unwrap();
        assert_eq!(cpu.regs.a.x(), 0xFFFE);
        assert!(cpu.regs.carry_flag());
        assert!(cpu.regs.overflow_flag());
    }

    #[test]
    fn test_mul_word() {
        let mut cpu = cpu();
        cpu.regs.a.set_x(0x1234);
        cpu.regs.b.set_x(0x0100);
        // mul bx
        cpu.op_mul(&decode_one(&[0xF7, 0xE3], 0)).unwrap();
        assert_eq!(cpu.regs.a.x(), 0x3400);
        assert_eq!(cpu.regs.d.x(), 0x0012);
        assert!(cpu.regs.carry_flag());
    }

    #[test]
    fn test_div_faults_are_distinct() {
        let mut cpu = cpu();
        // div bl
        let instr = decode_one(&[0xF6, 0xF3], 0);

        cpu.regs.a.set_x(0x00FF);
        cpu.regs.b.set_l(0);
        assert!(matches!(cpu.op_div(&instr), Err(CpuError::DivideByZero(_))));

        cpu.regs.a.set_x(0xFFFF);
        cpu.regs.b.set_l(0xFF);
        assert!(matches!(cpu.op_div(&instr), Err(CpuError::DivideOverflow(_))));

        cpu.regs.a.set_x(0x0107);
        cpu.regs.b.set_l(0x10);
        cpu.op_div(&instr).unwrap();
        assert_eq!(cpu.regs.a.l(), 0x10);
        assert_eq!(cpu.regs.a.h(), 0x07);
    }

    #[test]
    fn test_idiv_remainder_sign() {
        let mut cpu = cpu();
        // idiv bx
        let instr = decode_one(&[0xF7, 0xFB], 0);
        cpu.regs.set_pointer(seg86_common::FarPtr::new(0xFFFF, (-7i16) as u16));
        cpu.regs.b.set_x(2);
        cpu.op_div(&instr).unwrap();
        assert_eq!(cpu.regs.a.x() as i16, -3);
        assert_eq!(cpu.regs.d.x() as i16, -1);

        // -32768 / -1 does not fit
        cpu.regs.set_pointer(seg86_common::FarPtr::new(0xFFFF, 0x8000));
        cpu.regs.b.set_x(0xFFFF);
        assert!(matches!(cpu.op_div(&instr), Err(CpuError::DivideOverflow(_))));
    }
}
