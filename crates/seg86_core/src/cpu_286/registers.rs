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

    cpu_286::registers.rs

    Implements the register file.

    Each 32-bit register is a plain integer. The 16-bit and 8-bit views are
    masked accessors, so writing AL leaves AH and the upper word of EAX intact.

*/


use std::fmt;

use iced_x86::Register;
use seg86_common::{util::make_dword, FarPtr};

use crate::{
    cpu_286::fpu::FpuRegisters,
    cpu_common::OperandSize,
};

pub const CPU_FLAG_CARRY: u16 = 0b0000_0000_0000_0001;
pub const CPU_FLAG_RESERVED1: u16 = 0b0000_0000_0000_0010;
pub const CPU_FLAG_PARITY: u16 = 0b0000_0000_0000_0100;
pub const CPU_FLAG_AUX_CARRY: u16 = 0b0000_0000_0001_0000;
pub const CPU_FLAG_ZERO: u16 = 0b0000_0000_0100_0000;
pub const CPU_FLAG_SIGN: u16 = 0b0000_0000_1000_0000;
pub const CPU_FLAG_TRAP: u16 = 0b0000_0001_0000_0000;
pub const CPU_FLAG_INT_ENABLE: u16 = 0b0000_0010_0000_0000;
pub const CPU_FLAG_DIRECTION: u16 = 0b0000_0100_0000_0000;
pub const CPU_FLAG_OVERFLOW: u16 = 0b0000_1000_0000_0000;

/// Flag bits loaded by POPF and IRET.
pub const CPU_FLAGS_DEFINED: u16 = CPU_FLAG_CARRY
    | CPU_FLAG_PARITY
    | CPU_FLAG_AUX_CARRY
    | CPU_FLAG_ZERO
    | CPU_FLAG_SIGN
    | CPU_FLAG_TRAP
    | CPU_FLAG_INT_ENABLE
    | CPU_FLAG_DIRECTION
    | CPU_FLAG_OVERFLOW;

/// Size of the register packet produced by `to_regs()`.
pub const REGS_PACKET_LEN: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    Carry,
    Parity,
    AuxCarry,
    Zero,
    Sign,
    Trap,
    Interrupt,
    Direction,
    Overflow,
}

impl Flag {
    #[inline(always)]
    pub fn mask(&self) -> u16 {
        match self {
            Flag::Carry => CPU_FLAG_CARRY,
            Flag::Parity => CPU_FLAG_PARITY,
            Flag::AuxCarry => CPU_FLAG_AUX_CARRY,
            Flag::Zero => CPU_FLAG_ZERO,
            Flag::Sign => CPU_FLAG_SIGN,
            Flag::Trap => CPU_FLAG_TRAP,
            Flag::Interrupt => CPU_FLAG_INT_ENABLE,
            Flag::Direction => CPU_FLAG_DIRECTION,
            Flag::Overflow => CPU_FLAG_OVERFLOW,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneralRegister(u32);

impl GeneralRegister {
    #[inline(always)]
    pub fn e(&self) -> u32 {
        self.0
    }
    #[inline(always)]
    pub fn set_e(&mut self, value: u32) {
        self.0 = value;
    }
    #[inline(always)]
    pub fn x(&self) -> u16 {
        self.0 as u16
    }
    #[inline(always)]
    pub fn set_x(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF_0000) | value as u32;
    }
    #[inline(always)]
    pub fn incr_x(&mut self) {
        self.set_x(self.x().wrapping_add(1));
    }
    #[inline(always)]
    pub fn decr_x(&mut self) {
        self.set_x(self.x().wrapping_sub(1));
    }
    #[inline(always)]
    pub fn h(&self) -> u8 {
        (self.0 >> 8) as u8
    }
    #[inline(always)]
    pub fn set_h(&mut self, value: u8) {
        self.0 = (self.0 & 0xFFFF_00FF) | ((value as u32) << 8);
    }
    #[inline(always)]
    pub fn l(&self) -> u8 {
        self.0 as u8
    }
    #[inline(always)]
    pub fn set_l(&mut self, value: u8) {
        self.0 = (self.0 & 0xFFFF_FF00) | value as u32;
    }
}

/// Returns the width of a register the core can address, or None for any other register.
pub fn register_size(reg: Register) -> Option<OperandSize> {
    match reg {
        Register::AL
        | Register::CL
        | Register::DL
        | Register::BL
        | Register::AH
        | Register::CH
        | Register::DH
        | Register::BH => Some(OperandSize::Byte),
        Register::AX
        | Register::CX
        | Register::DX
        | Register::BX
        | Register::SP
        | Register::BP
        | Register::SI
        | Register::DI
        | Register::ES
        | Register::CS
        | Register::SS
        | Register::DS => Some(OperandSize::Word),
        Register::EAX
        | Register::ECX
        | Register::EDX
        | Register::EBX
        | Register::ESP
        | Register::EBP
        | Register::ESI
        | Register::EDI
        | Register::EIP => Some(OperandSize::Dword),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Registers {
    pub a: GeneralRegister,
    pub b: GeneralRegister,
    pub c: GeneralRegister,
    pub d: GeneralRegister,
    pub sp: GeneralRegister,
    pub bp: GeneralRegister,
    pub si: GeneralRegister,
    pub di: GeneralRegister,
    pub ip: GeneralRegister,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
    pub flags: u32,
    /// Emulator control signal. Set by HLT and by a far return to the sentinel segment.
    pub halt: bool,
    pub fpu: FpuRegisters,
}

#[rustfmt::skip]
impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every general, pointer, segment and instruction register.
    pub fn zero(&mut self) {
        self.a = GeneralRegister::default();
        self.b = GeneralRegister::default();
        self.c = GeneralRegister::default();
        self.d = GeneralRegister::default();
        self.sp = GeneralRegister::default();
        self.bp = GeneralRegister::default();
        self.si = GeneralRegister::default();
        self.di = GeneralRegister::default();
        self.ip = GeneralRegister::default();
        self.cs = 0;
        self.ds = 0;
        self.es = 0;
        self.ss = 0;
        self.flags = 0;
    }

    #[inline]
    pub fn ip(&self) -> u16 {
        self.ip.x()
    }

    #[inline]
    pub fn set_ip(&mut self, ip: u16) {
        self.ip.set_x(ip);
    }

    #[inline]
    pub fn cs_ip(&self) -> FarPtr {
        FarPtr::new(self.cs, self.ip())
    }

    /// Read a register by its decoder identifier, zero-extended to 32 bits.
    pub fn get_value(&self, reg: Register) -> Option<u32> {
        let value = match reg {
            Register::AL => self.a.l() as u32,
            Register::CL => self.c.l() as u32,
            Register::DL => self.d.l() as u32,
            Register::BL => self.b.l() as u32,
            Register::AH => self.a.h() as u32,
            Register::CH => self.c.h() as u32,
            Register::DH => self.d.h() as u32,
            Register::BH => self.b.h() as u32,
            Register::AX => self.a.x() as u32,
            Register::CX => self.c.x() as u32,
            Register::DX => self.d.x() as u32,
            Register::BX => self.b.x() as u32,
            Register::SP => self.sp.x() as u32,
            Register::BP => self.bp.x() as u32,
            Register::SI => self.si.x() as u32,
            Register::DI => self.di.x() as u32,
            Register::ES => self.es as u32,
            Register::CS => self.cs as u32,
            Register::SS => self.ss as u32,
            Register::DS => self.ds as u32,
            Register::EAX => self.a.e(),
            Register::ECX => self.c.e(),
            Register::EDX => self.d.e(),
            Register::EBX => self.b.e(),
            Register::ESP => self.sp.e(),
            Register::EBP => self.bp.e(),
            Register::ESI => self.si.e(),
            Register::EDI => self.di.e(),
            Register::EIP => self.ip.e(),
            _ => return None,
        };
        Some(value)
    }

    /// Write a register by its decoder identifier, truncating `value` to the register width.
    /// Returns false if the register is not part of this register file.
    pub fn set_value(&mut self, reg: Register, value: u32) -> bool {
        match reg {
            Register::AL => self.a.set_l(value as u8),
            Register::CL => self.c.set_l(value as u8),
            Register::DL => self.d.set_l(value as u8),
            Register::BL => self.b.set_l(value as u8),
            Register::AH => self.a.set_h(value as u8),
            Register::CH => self.c.set_h(value as u8),
            Register::DH => self.d.set_h(value as u8),
            Register::BH => self.b.set_h(value as u8),
            Register::AX => self.a.set_x(value as u16),
            Register::CX => self.c.set_x(value as u16),
            Register::DX => self.d.set_x(value as u16),
            Register::BX => self.b.set_x(value as u16),
            Register::SP => self.sp.set_x(value as u16),
            Register::BP => self.bp.set_x(value as u16),
            Register::SI => self.si.set_x(value as u16),
            Register::DI => self.di.set_x(value as u16),
            Register::ES => self.es = value as u16,
            Register::CS => self.cs = value as u16,
            Register::SS => self.ss = value as u16,
            Register::DS => self.ds = value as u16,
            Register::EAX => self.a.set_e(value),
            Register::ECX => self.c.set_e(value),
            Register::EDX => self.d.set_e(value),
            Register::EBX => self.b.set_e(value),
            Register::ESP => self.sp.set_e(value),
            Register::EBP => self.bp.set_e(value),
            Register::ESI => self.si.set_e(value),
            Register::EDI => self.di.set_e(value),
            Register::EIP => self.ip.set_e(value),
            _ => return false,
        }
        true
    }

    #[inline(always)]
    pub fn set_flag(&mut self, flag: Flag) {
        self.flags |= flag.mask() as u32;
    }

    #[inline(always)]
    pub fn clear_flag(&mut self, flag: Flag) {
        self.flags &= !(flag.mask() as u32);
    }

    #[inline(always)]
    pub fn set_flag_state(&mut self, flag: Flag, state: bool) {
        if state {
            self.set_flag(flag)
        }
        else {
            self.clear_flag(flag)
        }
    }

    #[inline(always)]
    pub fn get_flag(&self, flag: Flag) -> bool {
        self.flags & flag.mask() as u32 != 0
    }

    /// Test an arbitrary flag mask. True if any bit of the mask is set.
    #[inline]
    pub fn test_flags(&self, mask: u16) -> bool {
        self.flags & mask as u32 != 0
    }

    #[inline]
    pub fn f(&self) -> u16 {
        self.flags as u16
    }

    #[inline]
    pub fn set_f(&mut self, flags: u16) {
        self.flags = (self.flags & 0xFFFF_0000) | flags as u32;
    }

    #[inline]
    pub fn ef(&self) -> u32 {
        self.flags
    }

    #[inline]
    pub fn set_ef(&mut self, flags: u32) {
        self.flags = flags;
    }

    pub fn carry_flag(&self) -> bool { self.get_flag(Flag::Carry) }
    pub fn set_carry_flag(&mut self, state: bool) { self.set_flag_state(Flag::Carry, state) }
    pub fn zero_flag(&self) -> bool { self.get_flag(Flag::Zero) }
    pub fn set_zero_flag(&mut self, state: bool) { self.set_flag_state(Flag::Zero, state) }
    pub fn sign_flag(&self) -> bool { self.get_flag(Flag::Sign) }
    pub fn set_sign_flag(&mut self, state: bool) { self.set_flag_state(Flag::Sign, state) }
    pub fn overflow_flag(&self) -> bool { self.get_flag(Flag::Overflow) }
    pub fn set_overflow_flag(&mut self, state: bool) { self.set_flag_state(Flag::Overflow, state) }
    pub fn direction_flag(&self) -> bool { self.get_flag(Flag::Direction) }
    pub fn set_direction_flag(&mut self, state: bool) { self.set_flag_state(Flag::Direction, state) }

    /// DX:AX as a signed long.
    pub fn get_long(&self) -> i32 {
        make_dword(self.d.x(), self.a.x()) as i32
    }

    /// DX:AX as a far pointer, DX holding the segment.
    pub fn get_pointer(&self) -> FarPtr {
        FarPtr::new(self.d.x(), self.a.x())
    }

    pub fn set_pointer(&mut self, ptr: FarPtr) {
        self.d.set_x(ptr.segment);
        self.a.set_x(ptr.offset);
    }

    /// Serialize the register packet used by the runtime's REGS structure:
    /// AX, BX, CX, DX, SI, DI, carry, flags; all little-endian words.
    pub fn to_regs(&self) -> [u8; REGS_PACKET_LEN] {
        let words = [
            self.a.x(),
            self.b.x(),
            self.c.x(),
            self.d.x(),
            self.si.x(),
            self.di.x(),
            self.carry_flag() as u16,
            self.f(),
        ];
        let mut out = [0u8; REGS_PACKET_LEN];
        for (chunk, word) in out.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Load registers from a packet produced by `to_regs()`. The carry word is ignored;
    /// flags come from the flags word.
    pub fn from_regs(&mut self, regs: &[u8; REGS_PACKET_LEN]) {
        let word = |i: usize| u16::from_le_bytes([regs[i * 2], regs[i * 2 + 1]]);
        self.a.set_x(word(0));
        self.b.set_x(word(1));
        self.c.set_x(word(2));
        self.d.set_x(word(3));
        self.si.set_x(word(4));
        self.di.set_x(word(5));
        self.set_f(word(7));
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AX:{:04X} BX:{:04X} CX:{:04X} DX:{:04X} SP:{:04X} BP:{:04X} SI:{:04X} DI:{:04X} \
             CS:{:04X} DS:{:04X} ES:{:04X} SS:{:04X} IP:{:04X} F:{:04X}",
            self.a.x(),
            self.b.x(),
            self.c.x(),
            self.d.x(),
            self.sp.x(),
            self.bp.x(),
            self.si.x(),
            self.di.x(),
            self.cs,
            self.ds,
            self.es,
            self.ss,
            self.ip(),
            self.f()
        )
    }
}
