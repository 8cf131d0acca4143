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

    cpu_286::mod.rs

    Implements the 80286 execution engine: the CPU structure, reset, flag
    helpers and the host hooks for interrupts and external far calls.

*/


pub mod addressing;
pub mod alu;
pub mod bitwise;
pub mod execute;
pub mod fpu;
pub mod jump;
pub mod muldiv;
pub mod registers;
pub mod stack;
pub mod step;
pub mod string;
pub mod x87;

use seg86_common::{FarPtr, Seg86HashMap};

pub use crate::cpu_286::{fpu::*, registers::*};
use crate::{
    config::CoreConfig,
    cpu_common::{alu::AluOperand, CpuError},
    memory::MemoryCoreType,
};

pub const DEFAULT_STACK_BASE: u16 = 0xFFFE;
pub const DEFAULT_STACK_SEGMENT: u16 = 0x0000;
pub const DEFAULT_EXTRA_SEGMENT: u16 = 0xFFFF;

/// Segment value popped by a far return out of the entry routine. Pushed by `reset()`.
pub const RETURN_SENTINEL_SEGMENT: u16 = 0xFFFF;
/// Far calls to segments above this value are routed to the external call handler, if any.
pub const EXTERNAL_CALL_SEGMENT_BASE: u16 = 0xFF00;

pub const PARITY_TABLE: [bool; 256] = {
    let mut table = [false; 256];
    let mut index = 0;
    loop {
        table[index] = index.count_ones() % 2 == 0;
        index += 1;
        if index == 256 {
            break;
        }
    }
    table
};

/// A host-provided software interrupt service routine.
pub trait InterruptHandler {
    fn vector(&self) -> u8;
    fn handle(&mut self, regs: &mut Registers, mem: &mut MemoryCoreType) -> Result<(), CpuError>;
}

/// A host-provided implementation of far-callable functions living in the reserved segment range.
///
/// The return frame has already been pushed when `call` runs. If the handler leaves CS:IP
/// pointing at the return address the frame is discarded and execution continues after the
/// CALL; otherwise execution continues wherever the handler pointed CS:IP.
pub trait ExternalCallHandler {
    fn call(&mut self, target: FarPtr, regs: &mut Registers, mem: &mut MemoryCoreType) -> Result<(), CpuError>;
}

pub struct Intel286 {
    pub regs: Registers,
    pub mem: MemoryCoreType,

    stack_base: u16,
    stack_segment: u16,
    extra_segment: u16,
    trace: bool,
    instruction_limit: Option<u64>,

    instruction_counter: u64,
    io_counter: u16,
    interrupt_handlers: Seg86HashMap<u8, Box<dyn InterruptHandler>>,
    external_call: Option<Box<dyn ExternalCallHandler>>,
}

impl Intel286 {
    pub fn new(mem: MemoryCoreType) -> Self {
        Self {
            regs: Registers::new(),
            mem,
            stack_base: DEFAULT_STACK_BASE,
            stack_segment: DEFAULT_STACK_SEGMENT,
            extra_segment: DEFAULT_EXTRA_SEGMENT,
            trace: false,
            instruction_limit: None,
            instruction_counter: 0,
            io_counter: 0,
            interrupt_handlers: Seg86HashMap::default(),
            external_call: None,
        }
    }

    /// Build a CPU and its memory core from configuration.
    pub fn from_config(config: &CoreConfig) -> Result<Self, CpuError> {
        let mut cpu = Self::new(config.build_memory()?);
        cpu.stack_base = config.cpu.stack_base;
        cpu.stack_segment = config.cpu.stack_segment;
        cpu.extra_segment = config.cpu.extra_segment;
        cpu.trace = config.cpu.trace;
        cpu.instruction_limit = config.cpu.instruction_limit;
        Ok(cpu)
    }

    /// Zero the register file, point SS:SP at the stack base and push the far return sentinel
    /// so that a RETF out of the entry routine halts the CPU.
    pub fn reset(&mut self) -> Result<(), CpuError> {
        self.reset_with_stack_base(self.stack_base)
    }

    pub fn reset_with_stack_base(&mut self, stack_base: u16) -> Result<(), CpuError> {
        log::debug!("Resetting CPU with stack base {:04X}:{:04X}", self.stack_segment, stack_base);
        self.regs.zero();
        self.regs.halt = false;
        self.regs.fpu.reset();
        self.regs.sp.set_x(stack_base);
        self.regs.bp.set_x(stack_base);
        self.regs.ss = self.stack_segment;
        self.regs.es = self.extra_segment;
        self.instruction_counter = 0;
        self.io_counter = 0;

        self.push_dword(((RETURN_SENTINEL_SEGMENT as u32) << 16) | 0xFFFF)
    }

    #[inline]
    pub fn instruction_counter(&self) -> u64 {
        self.instruction_counter
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.regs.halt
    }

    pub fn set_trace(&mut self, state: bool) {
        self.trace = state;
    }

    /// Install an interrupt handler, replacing any handler previously installed for its vector.
    pub fn register_interrupt_handler(&mut self, handler: Box<dyn InterruptHandler>) {
        let vector = handler.vector();
        if self.interrupt_handlers.insert(vector, handler).is_some() {
            log::debug!("Replaced handler for interrupt {:02X}", vector);
        }
    }

    pub fn set_external_call_handler(&mut self, handler: Box<dyn ExternalCallHandler>) {
        self.external_call = Some(handler);
    }

    #[inline(always)]
    pub fn set_flag(&mut self, flag: Flag) {
        self.regs.set_flag(flag);
    }

    #[inline(always)]
    pub fn clear_flag(&mut self, flag: Flag) {
        self.regs.clear_flag(flag);
    }

    #[inline(always)]
    pub fn set_flag_state(&mut self, flag: Flag, state: bool) {
        self.regs.set_flag_state(flag, state);
    }

    #[inline(always)]
    pub fn get_flag(&self, flag: Flag) -> bool {
        self.regs.get_flag(flag)
    }

    #[inline(always)]
    pub(crate) fn set_parity_flag<T: AluOperand>(&mut self, result: T) {
        self.set_flag_state(Flag::Parity, PARITY_TABLE[result.low_byte() as usize]);
    }

    pub(crate) fn set_szp_flags_from_result<T: AluOperand>(&mut self, result: T) {
        // Set Sign flag to state of Sign (HO) bit
        self.set_flag_state(Flag::Sign, result.msb());
        // Set Zero flag if result is 0, clear it if not
        self.set_flag_state(Flag::Zero, result.is_zero());
        self.set_parity_flag(result);
    }
}
