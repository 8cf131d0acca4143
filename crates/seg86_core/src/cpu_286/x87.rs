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

    cpu_286::x87.rs

    x87 floating point instructions, executed against the FPU register
    stack in FpuRegisters.

*/


use std::f64::consts;

use iced_x86::{Instruction, MemorySize, Mnemonic, OpKind, Register};

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult},
    memory::MemoryCore,
};

/// Maps ST0..ST7 to a stack-relative index.
pub fn st_index(reg: Register) -> Option<usize> {
    match reg {
        Register::ST0 => Some(0),
        Register::ST1 => Some(1),
        Register::ST2 => Some(2),
        Register::ST3 => Some(3),
        Register::ST4 => Some(4),
        Register::ST5 => Some(5),
        Register::ST6 => Some(6),
        Register::ST7 => Some(7),
        _ => None,
    }
}

/// Round `value` and convert it to a signed integer of `bits` width. None when the value is
/// NaN or out of range.
fn fpu_to_integer(value: f64, mode: RoundingMode, bits: u32) -> Option<i64> {
    let rounded = mode.round(value);
    let limit = 2f64.powi(bits as i32 - 1);
    if rounded.is_nan() || rounded < -limit || rounded >= limit {
        return None;
    }
    Some(rounded as i64)
}

fn fpu_arith(mnemonic: Mnemonic, dest: f64, src: f64) -> f64 {
    match mnemonic {
        Mnemonic::Fadd | Mnemonic::Faddp | Mnemonic::Fiadd => dest + src,
        Mnemonic::Fsub | Mnemonic::Fsubp | Mnemonic::Fisub => dest - src,
        Mnemonic::Fsubr | Mnemonic::Fsubrp | Mnemonic::Fisubr => src - dest,
        Mnemonic::Fmul | Mnemonic::Fmulp | Mnemonic::Fimul => dest * src,
        Mnemonic::Fdiv | Mnemonic::Fdivp | Mnemonic::Fidiv => dest / src,
        Mnemonic::Fdivr | Mnemonic::Fdivrp | Mnemonic::Fidivr => src / dest,
        _ => dest,
    }
}

impl Intel286 {
    fn fpu_stack_operand(&self, instr: &Instruction, i: u32) -> Result<usize, CpuError> {
        st_index(instr.op_register(i)).ok_or_else(|| self.invalid_operand(instr))
    }

    /// Read an x87 source operand: a stack register, or a float or integer in memory.
    fn read_fpu_operand(&self, instr: &Instruction, i: u32) -> Result<f64, CpuError> {
        match instr.op_kind(i) {
            OpKind::Register => Ok(self.regs.fpu.st(self.fpu_stack_operand(instr, i)?)),
            OpKind::Memory => {
                let ptr = self.effective_address(instr)?;
                let (segment, offset) = (ptr.segment, ptr.offset);
                Ok(match instr.memory_size() {
                    MemorySize::Float32 => f32::from_bits(self.mem.get_dword(segment, offset)?) as f64,
                    MemorySize::Float64 => f64::from_bits(self.mem.get_qword(segment, offset)?),
                    MemorySize::Int16 => self.mem.get_word(segment, offset)? as i16 as f64,
                    MemorySize::Int32 => self.mem.get_dword(segment, offset)? as i32 as f64,
                    MemorySize::Int64 => self.mem.get_qword(segment, offset)? as i64 as f64,
                    _ => return Err(self.invalid_operand(instr)),
                })
            }
            _ => Err(self.invalid_operand(instr)),
        }
    }

    /// Write ST(0) to a float memory operand or a stack register.
    fn write_fpu_operand(&mut self, instr: &Instruction, value: f64) -> Result<(), CpuError> {
        match instr.op_kind(0) {
            OpKind::Register => {
                let index = self.fpu_stack_operand(instr, 0)?;
                self.regs.fpu.set_st(index, value);
            }
            OpKind::Memory => {
                let ptr = self.effective_address(instr)?;
                match instr.memory_size() {
                    MemorySize::Float32 => self.mem.set_dword(ptr.segment, ptr.offset, (value as f32).to_bits())?,
                    MemorySize::Float64 => self.mem.set_qword(ptr.segment, ptr.offset, value.to_bits())?,
                    _ => return Err(self.invalid_operand(instr)),
                }
            }
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(())
    }

    /// Write a status or control word to AX or a memory word.
    fn write_fpu_word(&mut self, instr: &Instruction, value: u16) -> Result<(), CpuError> {
        match instr.op_kind(0) {
            OpKind::Register if instr.op_register(0) == Register::AX => self.regs.a.set_x(value),
            OpKind::Memory => {
                let ptr = self.effective_address(instr)?;
                self.mem.set_word(ptr.segment, ptr.offset, value)?;
            }
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(())
    }

    /// FLD and FILD push a value from memory or a copy of ST(i).
    pub(crate) fn op_fld(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let value = self.read_fpu_operand(instr, 0)?;
        self.regs.fpu.push(value);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_fld_constant(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let value = match instr.mnemonic() {
            Mnemonic::Fld1 => 1.0,
            Mnemonic::Fldz => 0.0,
            Mnemonic::Fldpi => consts::PI,
            Mnemonic::Fldl2t => consts::LOG2_10,
            Mnemonic::Fldl2e => consts::LOG2_E,
            Mnemonic::Fldlg2 => consts::LOG10_2,
            Mnemonic::Fldln2 => consts::LN_2,
            _ => return Err(self.invalid_operand(instr)),
        };
        self.regs.fpu.push(value);
        Ok(ExecutionResult::Okay)
    }

    /// FST and FSTP.
    pub(crate) fn op_fst(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let value = self.regs.fpu.st(0);
        self.write_fpu_operand(instr, value)?;
        if instr.mnemonic() == Mnemonic::Fstp {
            self.regs.fpu.pop();
        }
        Ok(ExecutionResult::Okay)
    }

    /// FIST and FISTP round ST(0) per the control word. A NaN or out-of-range value raises the
    /// invalid operation exception and stores 0.
    pub(crate) fn op_fist(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let bits = match instr.memory_size() {
            MemorySize::Int16 => 16,
            MemorySize::Int32 => 32,
            MemorySize::Int64 => 64,
            _ => return Err(self.invalid_operand(instr)),
        };

        let value = fpu_to_integer(self.regs.fpu.st(0), self.regs.fpu.rounding_mode(), bits).unwrap_or_else(|| {
            self.regs.fpu.set_status_flag(FPU_STATUS_INVALID);
            0
        });

        let ptr = self.effective_address(instr)?;
        match bits {
            16 => self.mem.set_word(ptr.segment, ptr.offset, value as u16)?,
            32 => self.mem.set_dword(ptr.segment, ptr.offset, value as u32)?,
            _ => self.mem.set_qword(ptr.segment, ptr.offset, value as u64)?,
        }

        if instr.mnemonic() == Mnemonic::Fistp {
            self.regs.fpu.pop();
        }
        Ok(ExecutionResult::Okay)
    }

    /// FADD, FSUB, FSUBR, FMUL, FDIV and FDIVR with their pop and integer forms.
    /// The first operand is the destination; reversed forms swap the operand order.
    pub(crate) fn op_fpu_arith(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let mnemonic = instr.mnemonic();
        let (dest_index, src) = match instr.op_count() {
            1 => (0, self.read_fpu_operand(instr, 0)?),
            2 => (self.fpu_stack_operand(instr, 0)?, self.read_fpu_operand(instr, 1)?),
            _ => (1, self.regs.fpu.st(0)),
        };
        let dest = self.regs.fpu.st(dest_index);

        let divisor = match mnemonic {
            Mnemonic::Fdivr | Mnemonic::Fdivrp | Mnemonic::Fidivr => Some(dest),
            Mnemonic::Fdiv | Mnemonic::Fdivp | Mnemonic::Fidiv => Some(src),
            _ => None,
        };
        if divisor == Some(0.0) {
            self.regs.fpu.set_status_flag(FPU_STATUS_ZERO_DIVIDE);
        }

        self.regs.fpu.set_st(dest_index, fpu_arith(mnemonic, dest, src));

        if matches!(
            mnemonic,
            Mnemonic::Faddp | Mnemonic::Fsubp | Mnemonic::Fsubrp | Mnemonic::Fmulp | Mnemonic::Fdivp | Mnemonic::Fdivrp
        ) {
            self.regs.fpu.pop();
        }
        Ok(ExecutionResult::Okay)
    }

    /// FCOM, FCOMP, FCOMPP and the unordered forms. Only the condition codes are affected.
    pub(crate) fn op_fcom(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let mnemonic = instr.mnemonic();
        let src = match (mnemonic, instr.op_count()) {
            (Mnemonic::Fcompp | Mnemonic::Fucompp, _) | (_, 0) => self.regs.fpu.st(1),
            (_, count) => self.read_fpu_operand(instr, count - 1)?,
        };
        let st0 = self.regs.fpu.st(0);
        self.regs.fpu.set_compare_result(st0.partial_cmp(&src));

        match mnemonic {
            Mnemonic::Fcomp | Mnemonic::Fucomp => {
                self.regs.fpu.pop();
            }
            Mnemonic::Fcompp | Mnemonic::Fucompp => {
                self.regs.fpu.pop();
                self.regs.fpu.pop();
            }
            _ => {}
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_ftst(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let st0 = self.regs.fpu.st(0);
        self.regs.fpu.set_compare_result(st0.partial_cmp(&0.0));
        self.regs.fpu.clear_status_flag(FPU_STATUS_C1);
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_fxch(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let mut other = 1;
        for i in 0..instr.op_count() {
            let index = self.fpu_stack_operand(instr, i)?;
            if index != 0 {
                other = index;
            }
        }
        let st0 = self.regs.fpu.st(0);
        let sti = self.regs.fpu.st(other);
        self.regs.fpu.set_st(0, sti);
        self.regs.fpu.set_st(other, st0);
        Ok(ExecutionResult::Okay)
    }

    /// Single-operand transcendental and rounding operations on ST(0).
    pub(crate) fn op_fpu_unary(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let mnemonic = instr.mnemonic();
        let st0 = self.regs.fpu.st(0);

        let result = match mnemonic {
            Mnemonic::Fchs => -st0,
            Mnemonic::Fabs => st0.abs(),
            Mnemonic::Frndint => self.regs.fpu.rounding_mode().round(st0),
            Mnemonic::Fscale => st0 * 2f64.powf(self.regs.fpu.st(1).trunc()),
            Mnemonic::Fsqrt => {
                if st0 < 0.0 {
                    self.regs.fpu.set_status_flag(FPU_STATUS_INVALID);
                    st0
                }
                else {
                    st0.sqrt()
                }
            }
            Mnemonic::Fsin | Mnemonic::Fcos => {
                if st0.is_infinite() {
                    log::error!("{:?} of {} at {}", mnemonic, st0, self.regs.cs_ip());
                    return Err(CpuError::FpuRange {
                        mnemonic,
                        address: self.regs.cs_ip(),
                    });
                }
                self.regs.fpu.clear_status_flag(FPU_STATUS_C2);
                match (st0.is_nan(), mnemonic) {
                    (true, _) => st0,
                    (false, Mnemonic::Fsin) => st0.sin(),
                    (false, _) => st0.cos(),
                }
            }
            _ => return Err(self.invalid_operand(instr)),
        };
        self.regs.fpu.set_st(0, result);
        Ok(ExecutionResult::Okay)
    }

    /// FPATAN: ST(1) = atan(ST(1) / ST(0)), then pop.
    pub(crate) fn op_fpatan(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let x = self.regs.fpu.st(0);
        let y = self.regs.fpu.st(1);
        self.regs.fpu.set_st(1, y.atan2(x));
        self.regs.fpu.pop();
        Ok(ExecutionResult::Okay)
    }

    /// FSTSW, FSTCW, FLDCW, FCLEX, FINIT, FINCSTP and FDECSTP.
    pub(crate) fn op_fpu_control(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        match instr.mnemonic() {
            Mnemonic::Fstsw | Mnemonic::Fnstsw => self.write_fpu_word(instr, self.regs.fpu.status_word)?,
            Mnemonic::Fstcw | Mnemonic::Fnstcw => self.write_fpu_word(instr, self.regs.fpu.control_word)?,
            Mnemonic::Fldcw => {
                let ptr = self.effective_address(instr)?;
                self.regs.fpu.control_word = self.mem.get_word(ptr.segment, ptr.offset)?;
            }
            Mnemonic::Fclex | Mnemonic::Fnclex => self.regs.fpu.clear_exceptions(),
            Mnemonic::Finit | Mnemonic::Fninit => self.regs.fpu.reset(),
            Mnemonic::Fincstp => self.regs.fpu.pop_stack_top(),
            Mnemonic::Fdecstp => self.regs.fpu.push_stack_top(),
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(ExecutionResult::Okay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu_common::decode::decode_one, memory::ProtectedModeMemoryCore};

    fn cpu() -> Intel286 {
        let mut cpu = Intel286::new(ProtectedModeMemoryCore::new().into());
        cpu.mem.add_segment(2).unwrap();
        cpu.regs.ds = 2;
        cpu
    }

    #[test]
    fn test_fld_order_and_fxch() {
        let mut cpu = cpu();
        cpu.mem.set_qword(2, 0x10, 1.5f64.to_bits()).unwrap();
        // fld qword [0x10]; fld1
        cpu.op_fld(&decode_one(&[0xDD, 0x06, 0x10, 0x00], 0)).unwrap();
        cpu.op_fld_constant(&decode_one(&[0xD9, 0xE8], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), 1.0);
        assert_eq!(cpu.regs.fpu.st(1), 1.5);

        // fxch st1
        cpu.op_fxch(&decode_one(&[0xD9, 0xC9], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), 1.5);
        assert_eq!(cpu.regs.fpu.st(1), 1.0);
        assert_eq!(cpu.regs.fpu.stack_top(), 6);
    }

    #[test]
    fn test_operand_order() {
        let mut cpu = cpu();
        cpu.regs.fpu.push(2.0);
        cpu.regs.fpu.push(8.0);
        // fsubr st0, st1 ; st0 = st1 - st0
        cpu.op_fpu_arith(&decode_one(&[0xD8, 0xE9], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), -6.0);

        // fdivp st1, st0 ; st1 = st1 / st0, pop
        cpu.op_fpu_arith(&decode_one(&[0xDE, 0xF9], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), 2.0 / -6.0);
        assert_eq!(cpu.regs.fpu.stack_top(), 7);
    }

    #[test]
    fn test_fistp_invalid() {
        let mut cpu = cpu();
        cpu.regs.fpu.push(f64::NAN);
        // fistp word [0x20]
        cpu.mem.set_word(2, 0x20, 0xAAAA).unwrap();
        cpu.op_fist(&decode_one(&[0xDF, 0x1E, 0x20, 0x00], 0)).unwrap();
        assert_eq!(cpu.mem.get_word(2, 0x20).unwrap(), 0);
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_INVALID));
        assert_eq!(cpu.regs.fpu.stack_top(), 0);

        cpu.regs.fpu.clear_exceptions();
        cpu.regs.fpu.push(2.5);
        cpu.op_fist(&decode_one(&[0xDF, 0x1E, 0x20, 0x00], 0)).unwrap();
        assert_eq!(cpu.mem.get_word(2, 0x20).unwrap(), 2);
        assert!(!cpu.regs.fpu.get_status_flag(FPU_STATUS_INVALID));
    }

    #[test]
    fn test_fcom_condition_codes() {
        let mut cpu = cpu();
        cpu.regs.fpu.push(1.0);
        cpu.regs.fpu.push(f64::NAN);
        // fcom st1
        cpu.op_fcom(&decode_one(&[0xD8, 0xD1], 0)).unwrap();
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_C0));
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_C2));
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_C3));

        cpu.regs.fpu.set_st(0, 0.5);
        // fcompp
        cpu.op_fcom(&decode_one(&[0xDE, 0xD9], 0)).unwrap();
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_C0));
        assert!(!cpu.regs.fpu.get_status_flag(FPU_STATUS_C3));
        assert_eq!(cpu.regs.fpu.stack_top(), 0);
    }

    #[test]
    fn test_fscale_fixtures() {
        let cases = [
            (f64::NAN, f64::NAN, f64::NAN),
            (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NAN),
            (f64::INFINITY, f64::NEG_INFINITY, f64::NAN),
            (f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            (0.0, f64::INFINITY, f64::NAN),
            (0.0, f64::NEG_INFINITY, 0.0),
            (f64::INFINITY, 0.0, f64::INFINITY),
            (4.0, 2.0, 16.0),
            (-16.0, 8.0, -4096.0),
        ];
        let instr = decode_one(&[0xD9, 0xFD], 0);
        for (st0, st1, expected) in cases {
            let mut cpu = cpu();
            cpu.regs.fpu.push(st1);
            cpu.regs.fpu.push(st0);
            cpu.op_fpu_unary(&instr).unwrap();
            let result = cpu.regs.fpu.st(0);
            if expected.is_nan() {
                assert!(result.is_nan(), "fscale({}, {})", st0, st1);
            }
            else {
                assert_eq!(result, expected, "fscale({}, {})", st0, st1);
            }
        }
    }

    #[test]
    fn test_fsqrt_negative_sets_invalid() {
        let mut cpu = cpu();
        cpu.regs.fpu.push(-4.0);
        cpu.op_fpu_unary(&decode_one(&[0xD9, 0xFA], 0)).unwrap();
        assert!(cpu.regs.fpu.get_status_flag(FPU_STATUS_INVALID));
        assert_eq!(cpu.regs.fpu.st(0), -4.0);

        cpu.regs.fpu.set_st(0, 9.0);
        cpu.op_fpu_unary(&decode_one(&[0xD9, 0xFA], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), 3.0);
    }

    #[test]
    fn test_fsin_infinity_is_fatal() {
        let mut cpu = cpu();
        cpu.regs.fpu.push(f64::INFINITY);
        let result = cpu.op_fpu_unary(&decode_one(&[0xD9, 0xFE], 0));
        assert!(matches!(result, Err(CpuError::FpuRange { mnemonic: Mnemonic::Fsin, .. })));

        cpu.regs.fpu.set_st(0, 0.0);
        cpu.op_fpu_unary(&decode_one(&[0xD9, 0xFF], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.st(0), 1.0);
    }

    #[test]
    fn test_status_and_control_words() {
        let mut cpu = cpu();
        cpu.regs.fpu.set_status_flag(FPU_STATUS_INVALID | FPU_STATUS_C3);
        // fnstsw ax
        cpu.op_fpu_control(&decode_one(&[0xDF, 0xE0], 0)).unwrap();
        assert_eq!(cpu.regs.a.x(), FPU_STATUS_INVALID | FPU_STATUS_C3);

        // fnclex
        cpu.op_fpu_control(&decode_one(&[0xDB, 0xE2], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.status_word, FPU_STATUS_C3);

        // fldcw [0x30] ; fnstcw [0x32]
        cpu.mem.set_word(2, 0x30, 0x0C7F).unwrap();
        cpu.op_fpu_control(&decode_one(&[0xD9, 0x2E, 0x30, 0x00], 0)).unwrap();
        assert_eq!(cpu.regs.fpu.rounding_mode(), RoundingMode::Truncate);
        cpu.op_fpu_control(&decode_one(&[0xD9, 0x3E, 0x32, 0x00], 0)).unwrap();
        assert_eq!(cpu.mem.get_word(2, 0x32).unwrap(), 0x0C7F);
    }
}
