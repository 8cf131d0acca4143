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

    cpu_286::string.rs

    String instructions with REP, REPE and REPNE prefixes.

*/


use iced_x86::{Instruction, Mnemonic, Register};
use seg86_common::{util::relative_offset_u16, FarPtr};

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult, OperandSize},
};

fn element_size(mnemonic: Mnemonic) -> Option<OperandSize> {
    match mnemonic {
        Mnemonic::Movsb | Mnemonic::Stosb | Mnemonic::Lodsb | Mnemonic::Scasb | Mnemonic::Cmpsb => {
            Some(OperandSize::Byte)
        }
        Mnemonic::Movsw | Mnemonic::Stosw | Mnemonic::Lodsw | Mnemonic::Scasw | Mnemonic::Cmpsw => {
            Some(OperandSize::Word)
        }
        Mnemonic::Movsd | Mnemonic::Stosd | Mnemonic::Lodsd | Mnemonic::Scasd | Mnemonic::Cmpsd => {
            Some(OperandSize::Dword)
        }
        _ => None,
    }
}

impl Intel286 {
    /// Segment used for the SI operand: DS unless overridden.
    fn string_source_segment(&self, instr: &Instruction) -> Result<u16, CpuError> {
        match instr.segment_prefix() {
            Register::None => Ok(self.regs.ds),
            segment => Ok(self.read_register(instr, segment)? as u16),
        }
    }

    fn accumulator(&self, size: OperandSize) -> u32 {
        match size {
            OperandSize::Byte => self.regs.a.l() as u32,
            OperandSize::Word => self.regs.a.x() as u32,
            OperandSize::Dword => self.regs.a.e(),
        }
    }

    fn set_accumulator(&mut self, size: OperandSize, value: u32) {
        match size {
            OperandSize::Byte => self.regs.a.set_l(value as u8),
            OperandSize::Word => self.regs.a.set_x(value as u16),
            OperandSize::Dword => self.regs.a.set_e(value),
        }
    }

    /// Perform one element of a string operation and step SI and/or DI.
    fn string_op(&mut self, instr: &Instruction, size: OperandSize) -> Result<(), CpuError> {
        let delta = if self.get_flag(Flag::Direction) {
            -(size.bytes() as i16)
        }
        else {
            size.bytes() as i16
        };
        let source = FarPtr::new(self.string_source_segment(instr)?, self.regs.si.x());
        let dest = FarPtr::new(self.regs.es, self.regs.di.x());

        match instr.mnemonic() {
            Mnemonic::Movsb | Mnemonic::Movsw | Mnemonic::Movsd => {
                let value = self.read_memory(source, size)?;
                self.write_memory(dest, size, value)?;
                self.regs.si.set_x(relative_offset_u16(source.offset, delta));
                self.regs.di.set_x(relative_offset_u16(dest.offset, delta));
            }
            Mnemonic::Stosb | Mnemonic::Stosw | Mnemonic::Stosd => {
                self.write_memory(dest, size, self.accumulator(size))?;
                self.regs.di.set_x(relative_offset_u16(dest.offset, delta));
            }
            Mnemonic::Lodsb | Mnemonic::Lodsw | Mnemonic::Lodsd => {
                let value = self.read_memory(source, size)?;
                self.set_accumulator(size, value);
                self.regs.si.set_x(relative_offset_u16(source.offset, delta));
            }
            Mnemonic::Scasb | Mnemonic::Scasw | Mnemonic::Scasd => {
                let value = self.read_memory(dest, size)?;
                self.math_op_sized(Mnemonic::Cmp, size, self.accumulator(size), value);
                self.regs.di.set_x(relative_offset_u16(dest.offset, delta));
            }
            Mnemonic::Cmpsb | Mnemonic::Cmpsw | Mnemonic::Cmpsd => {
                let left = self.read_memory(source, size)?;
                let right = self.read_memory(dest, size)?;
                self.math_op_sized(Mnemonic::Cmp, size, left, right);
                self.regs.si.set_x(relative_offset_u16(source.offset, delta));
                self.regs.di.set_x(relative_offset_u16(dest.offset, delta));
            }
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(())
    }

    /// MOVS, STOS, LODS, SCAS and CMPS. A repeated form runs to completion within one tick.
    pub(crate) fn op_string(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = element_size(instr.mnemonic()).ok_or_else(|| self.invalid_operand(instr))?;

        if !(instr.has_rep_prefix() || instr.has_repne_prefix()) {
            self.string_op(instr, size)?;
            return Ok(ExecutionResult::Okay);
        }

        // Only SCAS and CMPS test ZF; the other string operations treat F2 and F3 alike.
        let conditional = matches!(
            instr.mnemonic(),
            Mnemonic::Scasb | Mnemonic::Scasw | Mnemonic::Scasd | Mnemonic::Cmpsb | Mnemonic::Cmpsw | Mnemonic::Cmpsd
        );

        while self.regs.c.x() != 0 {
            self.string_op(instr, size)?;
            self.regs.c.decr_x();

            if conditional {
                let zero = self.get_flag(Flag::Zero);
                if (instr.has_repe_prefix() && !zero) || (instr.has_repne_prefix() && zero) {
                    break;
                }
            }
        }
        Ok(ExecutionResult::Okay)
    }
}
