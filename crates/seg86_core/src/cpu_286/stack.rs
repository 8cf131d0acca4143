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

    cpu_286::stack.rs

    Stack primitives and the PUSH, POP, PUSHF, POPF, PUSHA, POPA, ENTER
    and LEAVE instructions.

*/


use iced_x86::{Instruction, Mnemonic};

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult, OperandSize},
    memory::MemoryCore,
};

impl Intel286 {
    pub fn push(&mut self, value: u16) -> Result<(), CpuError> {
        let sp = self.regs.sp.x().wrapping_sub(2);
        self.regs.sp.set_x(sp);
        self.mem.set_word(self.regs.ss, sp, value)?;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, CpuError> {
        let sp = self.regs.sp.x();
        let value = self.mem.get_word(self.regs.ss, sp)?;
        self.regs.sp.set_x(sp.wrapping_add(2));
        Ok(value)
    }

    pub fn push_dword(&mut self, value: u32) -> Result<(), CpuError> {
        let sp = self.regs.sp.x().wrapping_sub(4);
        self.regs.sp.set_x(sp);
        self.mem.set_dword(self.regs.ss, sp, value)?;
        Ok(())
    }

    pub fn pop_dword(&mut self) -> Result<u32, CpuError> {
        let sp = self.regs.sp.x();
        let value = self.mem.get_dword(self.regs.ss, sp)?;
        self.regs.sp.set_x(sp.wrapping_add(4));
        Ok(value)
    }

    fn push_sized(&mut self, size: OperandSize, value: u32) -> Result<(), CpuError> {
        match size {
            OperandSize::Dword => self.push_dword(value),
            _ => self.push(value as u16),
        }
    }

    pub(crate) fn op_push(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        // The value is read before SP moves, so PUSH SP stores the original SP.
        let value = self.read_operand(instr, 0, size)?;
        match size {
            OperandSize::Byte => self.push(size.sign_extend(value) as u16)?,
            _ => self.push_sized(size, value)?,
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_pop(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let value = match size {
            OperandSize::Dword => self.pop_dword()?,
            _ => self.pop()? as u32,
        };
        self.write_operand(instr, 0, size, value)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_pushf(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        if instr.mnemonic() == Mnemonic::Pushfd {
            self.push_dword(self.regs.ef())?;
        }
        else {
            self.push(self.regs.f())?;
        }
        Ok(ExecutionResult::Okay)
    }

    /// POPF and POPFD load only the defined flag bits.
    pub(crate) fn op_popf(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        if instr.mnemonic() == Mnemonic::Popfd {
            let flags = self.pop_dword()?;
            self.regs.set_ef(flags & CPU_FLAGS_DEFINED as u32);
        }
        else {
            let flags = self.pop()?;
            self.regs.set_f(flags & CPU_FLAGS_DEFINED);
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_pusha(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let sp = self.regs.sp.x();
        for value in [
            self.regs.a.x(),
            self.regs.c.x(),
            self.regs.d.x(),
            self.regs.b.x(),
            sp,
            self.regs.bp.x(),
            self.regs.si.x(),
            self.regs.di.x(),
        ] {
            self.push(value)?;
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_popa(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let di = self.pop()?;
        self.regs.di.set_x(di);
        let si = self.pop()?;
        self.regs.si.set_x(si);
        let bp = self.pop()?;
        self.regs.bp.set_x(bp);
        // Stored SP is discarded
        self.pop()?;
        let bx = self.pop()?;
        self.regs.b.set_x(bx);
        let dx = self.pop()?;
        self.regs.d.set_x(dx);
        let cx = self.pop()?;
        self.regs.c.set_x(cx);
        let ax = self.pop()?;
        self.regs.a.set_x(ax);
        Ok(ExecutionResult::Okay)
    }

    /// ENTER size, level: push BP, copy `level - 1` outer frame pointers, then allocate `size`
    /// bytes of locals.
    pub(crate) fn op_enter(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = instr.immediate(0) as u16;
        let level = (instr.immediate(1) as u8) & 0x1F;

        self.push(self.regs.bp.x())?;
        let frame = self.regs.sp.x();

        if level > 0 {
            for _ in 1..level {
                let bp = self.regs.bp.x().wrapping_sub(2);
                self.regs.bp.set_x(bp);
                let outer = self.mem.get_word(self.regs.ss, bp)?;
                self.push(outer)?;
            }
            self.push(frame)?;
        }

        self.regs.bp.set_x(frame);
        self.regs.sp.set_x(self.regs.sp.x().wrapping_sub(size));
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_leave(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.regs.sp.set_x(self.regs.bp.x());
        let bp = self.pop()?;
        self.regs.bp.set_x(bp);
        Ok(ExecutionResult::Okay)
    }
}
