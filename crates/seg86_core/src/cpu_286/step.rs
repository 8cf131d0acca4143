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

    cpu_286::step.rs

    The fetch, decode and execute loop.

*/


use cfg_if::cfg_if;
use seg86_common::util::fmt_byte_array;

use crate::{
    cpu_286::{execute::DISPATCH_TABLE, Intel286},
    cpu_common::{CpuError, ExecutionResult},
    memory::MemoryCore,
};

impl Intel286 {
    /// Decode and execute the instruction at CS:IP.
    ///
    /// On success IP points at the next instruction, or at the target of a control transfer.
    /// On error IP is left at the faulting instruction.
    pub fn tick(&mut self) -> Result<ExecutionResult, CpuError> {
        let address = self.regs.cs_ip();
        let instr = self.mem.get_instruction(address.segment, address.offset)?;
        if instr.is_invalid() {
            return Err(CpuError::InvalidInstruction(address));
        }

        // The cpu_trace feature traces every instruction regardless of the runtime switch.
        let trace: bool;
        cfg_if! {
            if #[cfg(feature = "cpu_trace")] {
                trace = true;
            } else {
                trace = self.trace;
            }
        }
        if trace {
            let bytes = self
                .mem
                .get_array(address.segment, address.offset, instr.len())
                .map(fmt_byte_array)
                .unwrap_or_default();
            log::trace!("{}  {:<20} {:?}  {}", address, bytes, instr.mnemonic(), self.regs);
        }

        let Some(handler) = DISPATCH_TABLE.get(&instr.mnemonic())
        else {
            log::error!("Unhandled instruction {:?} at {}", instr.mnemonic(), address);
            return Err(CpuError::UnhandledInstruction {
                mnemonic: instr.mnemonic(),
                address,
            });
        };

        let result = handler(self, &instr)?;
        match result {
            ExecutionResult::Okay => self.regs.set_ip(address.offset.wrapping_add(instr.len() as u16)),
            ExecutionResult::OkayJump => {}
            ExecutionResult::Halt => self.regs.halt = true,
        }
        self.instruction_counter += 1;
        Ok(result)
    }

    /// Tick until the CPU halts or `limit` instructions have executed. Without a limit the
    /// configured instruction limit applies, if any. Returns the number of instructions executed.
    pub fn run(&mut self, limit: Option<u64>) -> Result<u64, CpuError> {
        let limit = limit.or(self.instruction_limit);
        let mut executed = 0;
        while !self.regs.halt {
            if let Some(limit) = limit {
                if executed >= limit {
                    break;
                }
            }
            self.tick()?;
            executed += 1;
        }
        Ok(executed)
    }
}
