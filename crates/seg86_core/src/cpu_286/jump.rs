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

    cpu_286::jump.rs

    Control transfer: jumps, conditional jumps, loops, calls, returns,
    IRET, INT and HLT.

*/


use iced_x86::{Instruction, MemorySize, Mnemonic, OpKind};
use seg86_common::FarPtr;

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult, OperandSize},
};

impl Intel286 {
    /// Evaluate the condition of a Jcc mnemonic.
    fn condition(&self, mnemonic: Mnemonic) -> Option<bool> {
        let carry = self.get_flag(Flag::Carry);
        let zero = self.get_flag(Flag::Zero);
        let sign = self.get_flag(Flag::Sign);
        let overflow = self.get_flag(Flag::Overflow);
        let parity = self.get_flag(Flag::Parity);

        let taken = match mnemonic {
            Mnemonic::Jo => overflow,
            Mnemonic::Jno => !overflow,
            Mnemonic::Jb => carry,
            Mnemonic::Jae => !carry,
            Mnemonic::Je => zero,
            Mnemonic::Jne => !zero,
            Mnemonic::Jbe => carry || zero,
            Mnemonic::Ja => !carry && !zero,
            Mnemonic::Js => sign,
            Mnemonic::Jns => !sign,
            Mnemonic::Jp => parity,
            Mnemonic::Jnp => !parity,
            Mnemonic::Jl => sign != overflow,
            Mnemonic::Jge => sign == overflow,
            Mnemonic::Jle => zero || (sign != overflow),
            Mnemonic::Jg => !zero && (sign == overflow),
            Mnemonic::Jcxz => self.regs.c.x() == 0,
            Mnemonic::Jecxz => self.regs.c.e() == 0,
            _ => return None,
        };
        Some(taken)
    }

    fn near_target(&self, instr: &Instruction) -> Result<u16, CpuError> {
        match instr.op_kind(0) {
            OpKind::NearBranch16 => Ok(instr.near_branch16()),
            OpKind::Register | OpKind::Memory => Ok(self.read_operand(instr, 0, OperandSize::Word)? as u16),
            _ => Err(self.invalid_operand(instr)),
        }
    }

    fn far_target(&self, instr: &Instruction) -> Result<Option<FarPtr>, CpuError> {
        match instr.op_kind(0) {
            OpKind::FarBranch16 => Ok(Some(FarPtr::new(instr.far_branch_selector(), instr.far_branch16()))),
            OpKind::Memory if instr.memory_size() == MemorySize::SegPtr16 => {
                Ok(Some(self.read_far_pointer_operand(instr, 0)?))
            }
            _ => Ok(None),
        }
    }

    pub(crate) fn op_jcc(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let taken = self.condition(instr.mnemonic()).ok_or_else(|| self.invalid_operand(instr))?;
        if taken {
            self.regs.set_ip(self.near_target(instr)?);
            return Ok(ExecutionResult::OkayJump);
        }
        Ok(ExecutionResult::Okay)
    }

    /// LOOP, LOOPE and LOOPNE decrement CX once per tick.
    pub(crate) fn op_loop(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.regs.c.decr_x();
        let counting = self.regs.c.x() != 0;
        let taken = match instr.mnemonic() {
            Mnemonic::Loope => counting && self.get_flag(Flag::Zero),
            Mnemonic::Loopne => counting && !self.get_flag(Flag::Zero),
            _ => counting,
        };
        if taken {
            self.regs.set_ip(self.near_target(instr)?);
            return Ok(ExecutionResult::OkayJump);
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_jmp(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        if let Some(target) = self.far_target(instr)? {
            self.regs.cs = target.segment;
            self.regs.set_ip(target.offset);
        }
        else {
            let target = self.near_target(instr)?;
            self.regs.set_ip(target);
        }
        Ok(ExecutionResult::OkayJump)
    }

    pub(crate) fn op_call(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let return_ip = self.regs.ip().wrapping_add(instr.len() as u16);

        let Some(target) = self.far_target(instr)?
        else {
            let target = self.near_target(instr)?;
            self.push(return_ip)?;
            self.regs.set_ip(target);
            return Ok(ExecutionResult::OkayJump);
        };

        self.push(self.regs.cs)?;
        self.push(return_ip)?;

        if target.segment > EXTERNAL_CALL_SEGMENT_BASE && self.external_call.is_some() {
            return self.call_external(target, return_ip);
        }

        self.regs.cs = target.segment;
        self.regs.set_ip(target.offset);
        Ok(ExecutionResult::OkayJump)
    }

    /// Hand a far call into the reserved segment range to the host. The return frame is
    /// already on the stack.
    fn call_external(&mut self, target: FarPtr, return_ip: u16) -> Result<ExecutionResult, CpuError> {
        let return_address = FarPtr::new(self.regs.cs, return_ip);
        self.regs.set_ip(return_ip);

        if let Some(handler) = self.external_call.as_mut() {
            handler.call(target, &mut self.regs, &mut self.mem)?;
        }

        if self.regs.cs_ip() == return_address {
            let ip = self.pop()?;
            let cs = self.pop()?;
            self.regs.set_ip(ip);
            self.regs.cs = cs;
        }
        Ok(ExecutionResult::OkayJump)
    }

    /// Near return. A near return while executing in the sentinel segment halts.
    pub(crate) fn op_ret(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let ip = self.pop()?;
        self.regs.set_ip(ip);
        if instr.op_count() == 1 {
            let release = self.read_operand(instr, 0, OperandSize::Word)? as u16;
            self.regs.sp.set_x(self.regs.sp.x().wrapping_add(release));
        }
        if self.regs.cs == RETURN_SENTINEL_SEGMENT {
            return Ok(ExecutionResult::Halt);
        }
        Ok(ExecutionResult::OkayJump)
    }

    /// Far return. Returning to the sentinel segment pushed by `reset()` halts.
    pub(crate) fn op_retf(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let ip = self.pop()?;
        let cs = self.pop()?;
        self.regs.set_ip(ip);
        self.regs.cs = cs;
        if instr.op_count() == 1 {
            let release = self.read_operand(instr, 0, OperandSize::Word)? as u16;
            self.regs.sp.set_x(self.regs.sp.x().wrapping_add(release));
        }
        if cs == RETURN_SENTINEL_SEGMENT {
            log::debug!("Far return to sentinel segment; halting");
            return Ok(ExecutionResult::Halt);
        }
        Ok(ExecutionResult::OkayJump)
    }

    /// IRET pops IP, CS and FLAGS in that order.
    pub(crate) fn op_iret(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let ip = self.pop()?;
        let cs = self.pop()?;
        let flags = self.pop()?;
        self.regs.set_ip(ip);
        self.regs.cs = cs;
        self.regs.set_f(flags & CPU_FLAGS_DEFINED);
        Ok(ExecutionResult::OkayJump)
    }

    pub(crate) fn op_int(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let vector = match instr.mnemonic() {
            Mnemonic::Int3 => 3,
            _ => instr.immediate8(),
        };

        let Some(handler) = self.interrupt_handlers.get_mut(&vector)
        else {
            log::error!("No handler for INT {:02X} at {}", vector, self.regs.cs_ip());
            return Err(CpuError::UnhandledInterrupt(vector));
        };
        handler.handle(&mut self.regs, &mut self.mem)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_hlt(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        self.regs.set_ip(self.regs.ip().wrapping_add(instr.len() as u16));
        Ok(ExecutionResult::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cpu_common::decode::decode_one,
        memory::{MemoryCore, MemoryCoreType, ProtectedModeMemoryCore},
    };

    fn cpu() -> Intel286 {
        let mut cpu = Intel286::new(ProtectedModeMemoryCore::new().into());
        cpu.reset().unwrap();
        cpu.regs.cs = 1;
        cpu
    }

    #[test]
    fn test_jcc_conditions() {
        let mut cpu = cpu();
        cpu.set_flag(Flag::Sign);
        assert_eq!(cpu.condition(Mnemonic::Jl), Some(true));
        assert_eq!(cpu.condition(Mnemonic::Jge), Some(false));
        cpu.set_flag(Flag::Overflow);
        assert_eq!(cpu.condition(Mnemonic::Jg), Some(true));
        assert_eq!(cpu.condition(Mnemonic::Jnp), Some(true));
        assert_eq!(cpu.condition(Mnemonic::Nop), None);
    }

    #[test]
    fn test_loop_decrements_once() {
        let mut cpu = cpu();
        cpu.regs.c.set_x(2);
        // loop $-2 at ip 0x10
        let instr = decode_one(&[0xE2, 0xFE], 0x10);
        cpu.regs.set_ip(0x10);
        assert_eq!(cpu.op_loop(&instr).unwrap(), ExecutionResult::OkayJump);
        assert_eq!(cpu.regs.c.x(), 1);
        assert_eq!(cpu.regs.ip(), 0x10);
        assert_eq!(cpu.op_loop(&instr).unwrap(), ExecutionResult::Okay);
        assert_eq!(cpu.regs.c.x(), 0);
    }

    #[test]
    fn test_far_call_and_return() {
        let mut cpu = cpu();
        cpu.regs.set_ip(0x0100);
        // call 0002:0040
        let instr = decode_one(&[0x9A, 0x40, 0x00, 0x02, 0x00], 0x0100);
        cpu.op_call(&instr).unwrap();
        assert_eq!(cpu.regs.cs_ip(), FarPtr::new(2, 0x40));

        cpu.op_retf(&decode_one(&[0xCB], 0x40)).unwrap();
        assert_eq!(cpu.regs.cs_ip(), FarPtr::new(1, 0x0105));

        assert_eq!(cpu.op_retf(&decode_one(&[0xCB], 0)).unwrap(), ExecutionResult::Halt);
    }

    #[test]
    fn test_iret_order() {
        let mut cpu = cpu();
        cpu.push(CPU_FLAG_CARRY | CPU_FLAG_ZERO).unwrap();
        cpu.push(0x0003).unwrap();
        cpu.push(0x0020).unwrap();
        cpu.op_iret(&decode_one(&[0xCF], 0)).unwrap();
        assert_eq!(cpu.regs.cs_ip(), FarPtr::new(3, 0x20));
        assert!(cpu.regs.carry_flag());
        assert!(cpu.regs.zero_flag());
    }

    struct SetAx(u16);

    impl InterruptHandler for SetAx {
        fn vector(&self) -> u8 {
            0x21
        }
        fn handle(&mut self, regs: &mut Registers, _mem: &mut MemoryCoreType) -> Result<(), CpuError> {
            regs.a.set_x(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_int_dispatch() {
        let mut cpu = cpu();
        let instr = decode_one(&[0xCD, 0x21], 0);
        assert_eq!(cpu.op_int(&instr), Err(CpuError::UnhandledInterrupt(0x21)));

        cpu.register_interrupt_handler(Box::new(SetAx(0x4C00)));
        cpu.op_int(&instr).unwrap();
        assert_eq!(cpu.regs.a.x(), 0x4C00);
    }

    struct Exported;

    impl ExternalCallHandler for Exported {
        fn call(&mut self, target: FarPtr, regs: &mut Registers, mem: &mut MemoryCoreType) -> Result<(), CpuError> {
            regs.a.set_x(target.offset);
            mem.set_word(2, 0, 0xBEEF)?;
            Ok(())
        }
    }

    #[test]
    fn test_external_call_returns_inline() {
        let mut cpu = cpu();
        cpu.mem.add_segment(2).unwrap();
        cpu.set_external_call_handler(Box::new(Exported));
        let sp = cpu.regs.sp.x();
        cpu.regs.set_ip(0x10);

        // call FFFE:0007
        let instr = decode_one(&[0x9A, 0x07, 0x00, 0xFE, 0xFF], 0x10);
        assert_eq!(cpu.op_call(&instr).unwrap(), ExecutionResult::OkayJump);
        assert_eq!(cpu.regs.a.x(), 7);
        assert_eq!(cpu.regs.cs_ip(), FarPtr::new(1, 0x15));
        assert_eq!(cpu.regs.sp.x(), sp);
        assert_eq!(cpu.mem.get_word(2, 0).unwrap(), 0xBEEF);
    }
}
