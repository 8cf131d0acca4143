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

    cpu_286::addressing.rs

    Operand resolution: operand widths, effective addresses and operand
    reads and writes against registers, memory and immediates.

*/


use iced_x86::{Instruction, MemorySize, OpKind, Register};
use seg86_common::FarPtr;

use crate::{
    cpu_286::{register_size, Intel286},
    cpu_common::{CpuError, OperandSize},
    memory::MemoryCore,
};

impl Intel286 {
    pub(crate) fn invalid_operand(&self, instr: &Instruction) -> CpuError {
        CpuError::InvalidOperand {
            mnemonic: instr.mnemonic(),
            address: self.regs.cs_ip(),
        }
    }

    pub(crate) fn read_register(&self, instr: &Instruction, reg: Register) -> Result<u32, CpuError> {
        self.regs.get_value(reg).ok_or_else(|| self.invalid_operand(instr))
    }

    pub(crate) fn write_register(&mut self, instr: &Instruction, reg: Register, value: u32) -> Result<(), CpuError> {
        if self.regs.set_value(reg, value) {
            Ok(())
        }
        else {
            Err(self.invalid_operand(instr))
        }
    }

    /// Width of operand `i`.
    pub fn operand_size(&self, instr: &Instruction, i: u32) -> Result<OperandSize, CpuError> {
        let size = match instr.op_kind(i) {
            OpKind::Register => register_size(instr.op_register(i)),
            OpKind::Memory => match instr.memory_size() {
                MemorySize::UInt8 | MemorySize::Int8 => Some(OperandSize::Byte),
                MemorySize::UInt16 | MemorySize::Int16 | MemorySize::WordOffset => Some(OperandSize::Word),
                MemorySize::UInt32 | MemorySize::Int32 | MemorySize::DwordOffset => Some(OperandSize::Dword),
                _ => None,
            },
            OpKind::Immediate8 | OpKind::Immediate8_2nd => Some(OperandSize::Byte),
            OpKind::Immediate16 | OpKind::Immediate8to16 => Some(OperandSize::Word),
            OpKind::Immediate32 | OpKind::Immediate8to32 => Some(OperandSize::Dword),
            _ => None,
        };
        size.ok_or_else(|| self.invalid_operand(instr))
    }

    /// Offset part of the memory operand: displacement + base + index, wrapped to 16 bits.
    pub(crate) fn effective_offset(&self, instr: &Instruction) -> Result<u16, CpuError> {
        let mut offset = instr.memory_displacement32() as u16;
        if instr.memory_base() != Register::None {
            offset = offset.wrapping_add(self.read_register(instr, instr.memory_base())? as u16);
        }
        if instr.memory_index() != Register::None {
            let index = self.read_register(instr, instr.memory_index())? as u16;
            offset = offset.wrapping_add(index.wrapping_mul(instr.memory_index_scale() as u16));
        }
        Ok(offset)
    }

    /// Segment:offset of the memory operand, honoring segment overrides.
    pub(crate) fn effective_address(&self, instr: &Instruction) -> Result<FarPtr, CpuError> {
        let segment = self.read_register(instr, instr.memory_segment())? as u16;
        Ok(FarPtr::new(segment, self.effective_offset(instr)?))
    }

    pub(crate) fn read_memory(&self, ptr: FarPtr, size: OperandSize) -> Result<u32, CpuError> {
        Ok(match size {
            OperandSize::Byte => self.mem.get_byte(ptr.segment, ptr.offset)? as u32,
            OperandSize::Word => self.mem.get_word(ptr.segment, ptr.offset)? as u32,
            OperandSize::Dword => self.mem.get_dword(ptr.segment, ptr.offset)?,
        })
    }

    pub(crate) fn write_memory(&mut self, ptr: FarPtr, size: OperandSize, value: u32) -> Result<(), CpuError> {
        match size {
            OperandSize::Byte => self.mem.set_byte(ptr.segment, ptr.offset, value as u8)?,
            OperandSize::Word => self.mem.set_word(ptr.segment, ptr.offset, value as u16)?,
            OperandSize::Dword => self.mem.set_dword(ptr.segment, ptr.offset, value)?,
        }
        Ok(())
    }

    /// Read operand `i` at `size`. Immediates are sign-extended by the decoder and then
    /// truncated to `size`, so an imm8 source against a word destination reads correctly.
    pub fn read_operand(&self, instr: &Instruction, i: u32, size: OperandSize) -> Result<u32, CpuError> {
        match instr.op_kind(i) {
            OpKind::Register => Ok(self.read_register(instr, instr.op_register(i))? & size.mask()),
            OpKind::Memory => self.read_memory(self.effective_address(instr)?, size),
            OpKind::Immediate8
            | OpKind::Immediate8_2nd
            | OpKind::Immediate16
            | OpKind::Immediate32
            | OpKind::Immediate8to16
            | OpKind::Immediate8to32 => Ok(instr.immediate(i) as u32 & size.mask()),
            _ => Err(self.invalid_operand(instr)),
        }
    }

    pub fn write_operand(&mut self, instr: &Instruction, i: u32, size: OperandSize, value: u32) -> Result<(), CpuError> {
        match instr.op_kind(i) {
            OpKind::Register => self.write_register(instr, instr.op_register(i), value & size.mask()),
            OpKind::Memory => {
                let ptr = self.effective_address(instr)?;
                self.write_memory(ptr, size, value)
            }
            _ => Err(self.invalid_operand(instr)),
        }
    }

    /// Read a far pointer memory operand (offset word, then segment word).
    pub(crate) fn read_far_pointer_operand(&self, instr: &Instruction, i: u32) -> Result<FarPtr, CpuError> {
        if instr.op_kind(i) != OpKind::Memory || instr.memory_size() != MemorySize::SegPtr16 {
            return Err(self.invalid_operand(instr));
        }
        let ptr = self.effective_address(instr)?;
        Ok(self.mem.get_pointer(ptr.segment, ptr.offset)?)
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
    fn test_effective_address_wraps() {
        let mut cpu = cpu();
        cpu.regs.b.set_x(0xFFFF);
        cpu.regs.si.set_x(0x0002);
        // mov ax, [bx+si+0x10]
        let instr = decode_one(&[0x8B, 0x40, 0x10], 0);
        assert_eq!(cpu.effective_address(&instr).unwrap(), FarPtr::new(2, 0x0011));

        cpu.mem.set_word(2, 0x0011, 0xCAFE).unwrap();
        assert_eq!(cpu.operand_size(&instr, 1).unwrap(), OperandSize::Word);
        assert_eq!(cpu.read_operand(&instr, 1, OperandSize::Word).unwrap(), 0xCAFE);
    }

    #[test]
    fn test_segment_override_and_bp_default() {
        let mut cpu = cpu();
        cpu.regs.ss = 0;
        cpu.regs.es = 2;
        cpu.regs.bp.set_x(0x100);
        // mov al, [bp+2] defaults to SS
        let instr = decode_one(&[0x8A, 0x46, 0x02], 0);
        assert_eq!(cpu.effective_address(&instr).unwrap(), FarPtr::new(0, 0x102));
        // es: mov al, [bp+2]
        let instr = decode_one(&[0x26, 0x8A, 0x46, 0x02], 0);
        assert_eq!(cpu.effective_address(&instr).unwrap(), FarPtr::new(2, 0x102));
    }

    #[test]
    fn test_sign_extended_immediate() {
        let mut cpu = cpu();
        // add word [0x20], -1
        let instr = decode_one(&[0x83, 0x06, 0x20, 0x00, 0xFF], 0);
        assert_eq!(cpu.read_operand(&instr, 1, OperandSize::Word).unwrap(), 0xFFFF);
        cpu.write_operand(&instr, 0, OperandSize::Word, 0x1234).unwrap();
        assert_eq!(cpu.mem.get_word(2, 0x20).unwrap(), 0x1234);
    }
}
