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

    cpu_286::bitwise.rs

    Shift, rotate and double-precision shift instructions.

*/


use iced_x86::{Instruction, Mnemonic};

use crate::{
    cpu_286::*,
    cpu_common::{alu::AluOperand, CpuError, ExecutionResult, OperandSize},
};

/// Counts are masked to 5 bits, as on the 80286 and later.
pub const SHIFT_COUNT_MASK: u8 = 0x1F;

impl Intel286 {
    /// Perform a shift or rotate of `operand` by a nonzero, already masked `count`.
    pub(crate) fn bitshift_op<T: AluOperand>(&mut self, mnemonic: Mnemonic, operand: T, count: u8) -> T {
        let next_msb = |value: T| (value.to_u32() >> (T::BITS - 2)) & 1 != 0;

        match mnemonic {
            Mnemonic::Shl | Mnemonic::Sal => {
                let (result, carry) = operand.alu_shl(count);
                self.set_flag_state(Flag::Carry, carry);
                self.set_flag_state(Flag::Overflow, result.msb() ^ carry);
                self.clear_flag(Flag::AuxCarry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Shr => {
                let (result, carry) = operand.alu_shr(count);
                self.set_flag_state(Flag::Carry, carry);
                self.set_flag_state(Flag::Overflow, operand.msb());
                self.clear_flag(Flag::AuxCarry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Sar => {
                let (result, carry) = operand.alu_sar(count);
                self.set_flag_state(Flag::Carry, carry);
                self.clear_flag(Flag::Overflow);
                self.clear_flag(Flag::AuxCarry);
                self.set_szp_flags_from_result(result);
                result
            }
            Mnemonic::Rol => {
                let (result, carry) = operand.alu_rol(count);
                self.set_flag_state(Flag::Carry, carry);
                self.set_flag_state(Flag::Overflow, result.msb() ^ carry);
                result
            }
            Mnemonic::Ror => {
                let (result, carry) = operand.alu_ror(count);
                self.set_flag_state(Flag::Carry, carry);
                self.set_flag_state(Flag::Overflow, result.msb() ^ next_msb(result));
                result
            }
            Mnemonic::Rcl | Mnemonic::Rcr => {
                // Narrow operands rotate through CF as a width+1 bit quantity
                let count = match T::BITS {
                    8 => count % 9,
                    16 => count % 17,
                    _ => count,
                };
                if count == 0 {
                    return operand;
                }
                let carry_in = self.get_flag(Flag::Carry);
                let (result, carry) = if mnemonic == Mnemonic::Rcl {
                    operand.alu_rcl(count, carry_in)
                }
                else {
                    operand.alu_rcr(count, carry_in)
                };
                self.set_flag_state(Flag::Carry, carry);
                if mnemonic == Mnemonic::Rcl {
                    self.set_flag_state(Flag::Overflow, result.msb() ^ carry);
                }
                else {
                    self.set_flag_state(Flag::Overflow, result.msb() ^ next_msb(result));
                }
                result
            }
            _ => {
                log::error!("bitshift_op(): unexpected mnemonic {:?}", mnemonic);
                operand
            }
        }
    }

    /// SHL, SAL, SHR, SAR, ROL, ROR, RCL and RCR by an immediate or by CL.
    pub(crate) fn op_shift(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let operand = self.read_operand(instr, 0, size)?;
        let count = self.read_operand(instr, 1, OperandSize::Byte)? as u8 & SHIFT_COUNT_MASK;

        if count == 0 {
            return Ok(ExecutionResult::Okay);
        }

        let mnemonic = instr.mnemonic();
        let result = match size {
            OperandSize::Byte => self.bitshift_op(mnemonic, operand as u8, count) as u32,
            OperandSize::Word => self.bitshift_op(mnemonic, operand as u16, count) as u32,
            OperandSize::Dword => self.bitshift_op(mnemonic, operand, count),
        };
        self.write_operand(instr, 0, size, result)?;
        Ok(ExecutionResult::Okay)
    }

    /// SHLD and SHRD. The destination and source are treated as one double-width value.
    pub(crate) fn op_double_shift(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let dest = self.read_operand(instr, 0, size)?;
        let source = self.read_operand(instr, 1, size)?;
        let count = self.read_operand(instr, 2, OperandSize::Byte)? as u32 & SHIFT_COUNT_MASK as u32;
        let width = size.bits();
        let mask = size.mask() as u64;

        if count == 0 {
            self.clear_flag(Flag::Overflow);
            self.set_szp_flags_sized(size, dest);
            return Ok(ExecutionResult::Okay);
        }

        let (result, carry) = if instr.mnemonic() == Mnemonic::Shld {
            let combined = ((dest as u64) << width) | source as u64;
            let result = ((combined << count) >> width) & mask;
            let carry = (combined >> (2 * width - count)) & 1 != 0;
            (result as u32, carry)
        }
        else {
            let combined = ((source as u64) << width) | dest as u64;
            let result = (combined >> count) & mask;
            let carry = (combined >> (count - 1)) & 1 != 0;
            (result as u32, carry)
        };

        let sign = size.sign_bit();
        self.set_flag_state(Flag::Carry, carry);
        if count == 1 {
            self.set_flag_state(Flag::Overflow, (result ^ dest) & sign != 0);
        }
        else {
            self.clear_flag(Flag::Overflow);
        }
        self.set_szp_flags_sized(size, result);
        self.write_operand(instr, 0, size, result)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn set_szp_flags_sized(&mut self, size: OperandSize, value: u32) {
        match size {
            OperandSize::Byte => self.set_szp_flags_from_result(value as u8),
            OperandSize::Word => self.set_szp_flags_from_result(value as u16),
            OperandSize::Dword => self.set_szp_flags_from_result(value),
        }
    }
}
