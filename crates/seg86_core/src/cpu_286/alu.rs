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

    cpu_286::alu.rs

    Arithmetic and logic instructions and their flag effects.

*/


use iced_x86::{Instruction, Mnemonic};

use crate::{
    cpu_286::*,
    cpu_common::{alu::AluOperand, CpuError, ExecutionResult, OperandSize},
};

impl Intel286 {
    #[inline(always)]
    fn set_arith_flags(&mut self, carry: bool, overflow: bool, aux_carry: bool) {
        self.set_flag_state(Flag::Carry, carry);
        self.set_flag_state(Flag::Overflow, overflow);
        self.set_flag_state(Flag::AuxCarry, aux_carry);
    }

    #[inline(always)]
    fn set_logic_flags<T: AluOperand>(&mut self, result: T) {
        self.clear_flag(Flag::Carry);
        self.clear_flag(Flag::Overflow);
        self.clear_flag(Flag::AuxCarry);
        self.set_szp_flags_from_result(result);
    }

    /// Perform a two-operand or unary ALU operation at the width of `T`, updating flags.
    pub(crate) fn math_op<T: AluOperand>(&mut self, mnemonic: Mnemonic, operand1: T, operand2: T) -> T {
        match mnemonic {
            Mnemonic::Add => {
                let (result, carry, overflow, aux_carry) = operand1.alu_add(operand2);
                self.set_arith_flags(carry, overflow, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Adc => {
                let (result, carry, overflow, aux_carry) = operand1.alu_adc(operand2, self.get_flag(Flag::Carry));
                self.set_arith_flags(carry, overflow, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Sub | Mnemonic::Cmp => {
                let (result, carry, overflow, aux_carry) = operand1.alu_sub(operand2);
                self.set_arith_flags(carry, overflow, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Sbb => {
                let (result, carry, overflow, aux_carry) = operand1.alu_sbb(operand2, self.get_flag(Flag::Carry));
                self.set_arith_flags(carry, overflow, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::And | Mnemonic::Test => {
                let result = operand1 & operand2;
                self.set_logic_flags(result);
                result
            }
            Mnemonic::Or => {
                let result = operand1 | operand2;
                self.set_logic_flags(result);
                result
            }
            Mnemonic::Xor => {
                let result = operand1 ^ operand2;
                self.set_logic_flags(result);
                result
            }
            Mnemonic::Inc => {
                // INC does not modify the carry flag
                let (result, _, overflow, aux_carry) = operand1.alu_add(T::from_u32(1));
                self.set_flag_state(Flag::Overflow, overflow);
                self.set_flag_state(Flag::AuxCarry, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Dec => {
                // DEC does not modify the carry flag
                let (result, _, overflow, aux_carry) = operand1.alu_sub(T::from_u32(1));
                self.set_flag_state(Flag::Overflow, overflow);
                self.set_flag_state(Flag::AuxCarry, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Neg => {
                let (result, carry, overflow, aux_carry) = operand1.alu_neg();
                self.set_arith_flags(carry, overflow, aux_carry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Not => !operand1,
            _ => {
                log::error!("math_op(): unexpected mnemonic {:?}", mnemonic);
                operand1
            }
        }
    }

    pub(crate) fn math_op_sized(&mut self, mnemonic: Mnemonic, size: OperandSize, operand1: u32, operand2: u32) -> u32 {
        match size {
            OperandSize::Byte => self.math_op(mnemonic, operand1 as u8, operand2 as u8) as u32,
            OperandSize::Word => self.math_op(mnemonic, operand1 as u16, operand2 as u16) as u32,
            OperandSize::Dword => self.math_op(mnemonic, operand1, operand2),
        }
    }

    /// ADD, ADC, SUB, SBB, AND, OR, XOR, CMP and TEST. CMP and TEST only update flags.
    pub(crate) fn op_math(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let mnemonic = instr.mnemonic();
        let size = self.operand_size(instr, 0)?;
        let operand1 = self.read_operand(instr, 0, size)?;
        let operand2 = self.read_operand(instr, 1, size)?;

        let result = self.math_op_sized(mnemonic, size, operand1, operand2);
        if !matches!(mnemonic, Mnemonic::Cmp | Mnemonic::Test) {
            self.write_operand(instr, 0, size, result)?;
        }
        Ok(ExecutionResult::Okay)
    }

    /// INC, DEC, NEG and NOT.
    pub(crate) fn op_unary(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let operand = self.read_operand(instr, 0, size)?;
        let result = self.math_op_sized(instr.mnemonic(), size, operand, 0);
        self.write_operand(instr, 0, size, result)?;
        Ok(ExecutionResult::Okay)
    }

    /// AAM imm8: AH = AL / base, AL = AL % base.
    pub(crate) fn op_aam(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let base = instr.immediate8();
        if base == 0 {
            return Err(CpuError::DivideByZero(self.regs.cs_ip()));
        }
        let al = self.regs.a.l();
        self.regs.a.set_h(al / base);
        self.regs.a.set_l(al % base);
        self.set_szp_flags_from_result(self.regs.a.l());
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_daa(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let old_al = self.regs.a.l();
        let old_cf = self.get_flag(Flag::Carry);

        if (old_al & 0x0F) > 9 || self.get_flag(Flag::AuxCarry) {
            let (al, carry) = old_al.overflowing_add(6);
            self.regs.a.set_l(al);
            self.set_flag_state(Flag::Carry, old_cf || carry);
            self.set_flag(Flag::AuxCarry);
        }
        else {
            self.clear_flag(Flag::AuxCarry);
        }

        if old_al > 0x99 || old_cf {
            self.regs.a.set_l(self.regs.a.l().wrapping_add(0x60));
            self.set_flag(Flag::Carry);
        }
        else {
            self.clear_flag(Flag::Carry);
        }

        self.set_szp_flags_from_result(self.regs.a.l());
        Ok(ExecutionResult::Okay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ProtectedModeMemoryCore;

    fn cpu() -> Intel286 {
        Intel286::new(ProtectedModeMemoryCore::new().into())
    }

    #[test]
    fn test_add_flags() {
        let mut cpu = cpu();
        let result = cpu.math_op(Mnemonic::Add, 0x0001u16, 0xFFFF);
        assert_eq!(result, 0);
        assert!(cpu.regs.carry_flag());
        assert!(cpu.regs.zero_flag());
        assert!(!cpu.regs.overflow_flag());
        assert!(!cpu.regs.sign_flag());

        let result = cpu.math_op(Mnemonic::Add, 0x7Fu8, 0x01);
        assert_eq!(result, 0x80);
        assert!(cpu.regs.overflow_flag());
        assert!(cpu.regs.sign_flag());
        assert!(!cpu.regs.carry_flag());
    }

    #[test]
    fn test_inc_dec_preserve_carry() {
        let mut cpu = cpu();
        cpu.set_flag(Flag::Carry);
        assert_eq!(cpu.math_op(Mnemonic::Inc, 0xFFFFu16, 0), 0);
        assert!(cpu.regs.carry_flag());
        assert!(cpu.regs.zero_flag());

        cpu.clear_flag(Flag::Carry);
        assert_eq!(cpu.math_op(Mnemonic::Dec, 0u8, 0), 0xFF);
        assert!(!cpu.regs.carry_flag());
        assert!(cpu.regs.sign_flag());
    }

    #[test]
    fn test_neg_most_negative() {
        let mut cpu = cpu();
        assert_eq!(cpu.math_op(Mnemonic::Neg, 0x80u8, 0), 0x80);
        assert!(cpu.regs.carry_flag());
        assert!(cpu.regs.sign_flag());

        assert_eq!(cpu.math_op(Mnemonic::Neg, 0u8, 0), 0);
        assert!(!cpu.regs.carry_flag());
    }

    #[test]
    fn test_logic_clears_carry_overflow() {
        let mut cpu = cpu();
        cpu.set_flag(Flag::Carry);
        cpu.set_flag(Flag::Overflow);
        assert_eq!(cpu.math_op(Mnemonic::Xor, 0xFFFF_FFFFu32, 0xFFFF_FFFF), 0);
        assert!(!cpu.regs.carry_flag());
        assert!(!cpu.regs.overflow_flag());
        assert!(cpu.regs.zero_flag());
        assert!(cpu.get_flag(Flag::Parity));
    }

    #[test]
    fn test_sbb_borrow_chain() {
        let mut cpu = cpu();
        cpu.set_flag(Flag::Carry);
        assert_eq!(cpu.math_op(Mnemonic::Sbb, 0x0000u16, 0x0000), 0xFFFF);
        assert!(cpu.regs.carry_flag());
        cpu.clear_flag(Flag::Carry);
        assert_eq!(cpu.math_op(Mnemonic::Adc, 0xFFu8, 0x01), 0x00);
        assert!(cpu.regs.carry_flag());
    }
}
