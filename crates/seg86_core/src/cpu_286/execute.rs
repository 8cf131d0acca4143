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

    cpu_286::execute.rs

    Builds the mnemonic dispatch table and implements data movement, flag
    control and miscellaneous instructions.

*/


use iced_x86::{Instruction, Mnemonic};
use lazy_static::lazy_static;
use seg86_common::{
    util::{sign_extend_u16_to_u32, sign_extend_u8_to_u16},
    Seg86HashMap,
};

use crate::{
    cpu_286::*,
    cpu_common::{CpuError, ExecutionResult, OperandSize},
};

/// An instruction handler. Handlers leave IP alone unless they return `OkayJump` or `Halt`.
pub type OpHandler = fn(&mut Intel286, &Instruction) -> Result<ExecutionResult, CpuError>;

lazy_static! {
    pub static ref DISPATCH_TABLE: Seg86HashMap<Mnemonic, OpHandler> = build_dispatch_table();
}

fn build_dispatch_table() -> Seg86HashMap<Mnemonic, OpHandler> {
    use Mnemonic::*;

    let mut table: Seg86HashMap<Mnemonic, OpHandler> = Seg86HashMap::default();
    let mut register = |mnemonics: &[Mnemonic], handler: OpHandler| {
        for mnemonic in mnemonics {
            table.insert(*mnemonic, handler);
        }
    };

    // Arithmetic and logic
    register(&[Add, Adc, Sub, Sbb, And, Or, Xor, Cmp, Test], Intel286::op_math);
    register(&[Inc, Dec, Neg, Not], Intel286::op_unary);
    register(&[Mul], Intel286::op_mul);
    register(&[Imul], Intel286::op_imul);
    register(&[Div, Idiv], Intel286::op_div);
    register(&[Aam], Intel286::op_aam);
    register(&[Daa], Intel286::op_daa);

    // Shifts and rotates
    register(&[Shl, Sal, Shr, Sar, Rol, Ror, Rcl, Rcr], Intel286::op_shift);
    register(&[Shld, Shrd], Intel286::op_double_shift);

    // String operations
    register(
        &[
            Movsb, Movsw, Movsd, Stosb, Stosw, Stosd, Lodsb, Lodsw, Lodsd, Scasb, Scasw, Scasd, Cmpsb, Cmpsw, Cmpsd,
        ],
        Intel286::op_string,
    );

    // Stack
    register(&[Push], Intel286::op_push);
    register(&[Pop], Intel286::op_pop);
    register(&[Pushf, Pushfd], Intel286::op_pushf);
    register(&[Popf, Popfd], Intel286::op_popf);
    register(&[Pusha], Intel286::op_pusha);
    register(&[Popa], Intel286::op_popa);
    register(&[Enter], Intel286::op_enter);
    register(&[Leave], Intel286::op_leave);

    // Control flow
    register(
        &[Jo, Jno, Jb, Jae, Je, Jne, Jbe, Ja, Js, Jns, Jp, Jnp, Jl, Jge, Jle, Jg, Jcxz, Jecxz],
        Intel286::op_jcc,
    );
    register(&[Loop, Loope, Loopne], Intel286::op_loop);
    register(&[Jmp], Intel286::op_jmp);
    register(&[Call], Intel286::op_call);
    register(&[Ret], Intel286::op_ret);
    register(&[Retf], Intel286::op_retf);
    register(&[Iret], Intel286::op_iret);
    register(&[Int, Int3], Intel286::op_int);
    register(&[Hlt], Intel286::op_hlt);

    // Data movement
    register(&[Mov], Intel286::op_mov);
    register(&[Movsx, Movzx], Intel286::op_mov_extend);
    register(&[Lea], Intel286::op_lea);
    register(&[Les, Lds], Intel286::op_load_far_pointer);
    register(&[Xchg], Intel286::op_xchg);
    register(&[Cbw, Cwde, Cwd, Cdq], Intel286::op_sign_extend_accumulator);
    register(&[Sahf, Lahf], Intel286::op_flags_ah);

    // Flag control
    register(&[Clc, Stc, Cmc, Cli, Sti, Cld, Std], Intel286::op_flag_control);

    // I/O and no-ops
    register(&[In], Intel286::op_in);
    register(&[Out, Nop, Wait], Intel286::op_nop);

    // x87
    register(&[Fld, Fild], Intel286::op_fld);
    register(&[Fld1, Fldz, Fldpi, Fldl2t, Fldl2e, Fldlg2, Fldln2], Intel286::op_fld_constant);
    register(&[Fst, Fstp], Intel286::op_fst);
    register(&[Fist, Fistp], Intel286::op_fist);
    register(
        &[
            Fadd, Faddp, Fiadd, Fsub, Fsubp, Fisub, Fsubr, Fsubrp, Fisubr, Fmul, Fmulp, Fimul, Fdiv, Fdivp, Fidiv, Fdivr,
            Fdivrp, Fidivr,
        ],
        Intel286::op_fpu_arith,
    );
    register(&[Fcom, Fcomp, Fcompp, Fucom, Fucomp, Fucompp], Intel286::op_fcom);
    register(&[Ftst], Intel286::op_ftst);
    register(&[Fxch], Intel286::op_fxch);
    register(&[Fchs, Fabs, Frndint, Fscale, Fsqrt, Fsin, Fcos], Intel286::op_fpu_unary);
    register(&[Fpatan], Intel286::op_fpatan);
    register(
        &[Fstsw, Fnstsw, Fstcw, Fnstcw, Fldcw, Fclex, Fnclex, Finit, Fninit, Fincstp, Fdecstp],
        Intel286::op_fpu_control,
    );

    table
}

impl Intel286 {
    pub(crate) fn op_mov(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let value = self.read_operand(instr, 1, size)?;
        self.write_operand(instr, 0, size, value)?;
        Ok(ExecutionResult::Okay)
    }

    /// MOVSX and MOVZX.
    pub(crate) fn op_mov_extend(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let dest_size = self.operand_size(instr, 0)?;
        let src_size = self.operand_size(instr, 1)?;
        let value = self.read_operand(instr, 1, src_size)?;
        let value = if instr.mnemonic() == Mnemonic::Movsx {
            src_size.sign_extend(value) as u32
        }
        else {
            value
        };
        self.write_operand(instr, 0, dest_size, value)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_lea(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let offset = self.effective_offset(instr)?;
        self.write_operand(instr, 0, size, offset as u32)?;
        Ok(ExecutionResult::Okay)
    }

    /// LES and LDS load a register with the offset and ES or DS with the segment.
    pub(crate) fn op_load_far_pointer(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let ptr = self.read_far_pointer_operand(instr, 1)?;
        self.write_operand(instr, 0, OperandSize::Word, ptr.offset as u32)?;
        if instr.mnemonic() == Mnemonic::Les {
            self.regs.es = ptr.segment;
        }
        else {
            self.regs.ds = ptr.segment;
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_xchg(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let first = self.read_operand(instr, 0, size)?;
        let second = self.read_operand(instr, 1, size)?;
        self.write_operand(instr, 0, size, second)?;
        self.write_operand(instr, 1, size, first)?;
        Ok(ExecutionResult::Okay)
    }

    /// CBW, CWDE, CWD and CDQ.
    pub(crate) fn op_sign_extend_accumulator(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        match instr.mnemonic() {
            Mnemonic::Cbw => self.regs.a.set_x(sign_extend_u8_to_u16(self.regs.a.l())),
            Mnemonic::Cwde => self.regs.a.set_e(sign_extend_u16_to_u32(self.regs.a.x())),
            Mnemonic::Cwd => {
                let high = if self.regs.a.x() & 0x8000 != 0 { 0xFFFF } else { 0 };
                self.regs.d.set_x(high);
            }
            Mnemonic::Cdq => {
                let high = if self.regs.a.e() & 0x8000_0000 != 0 { 0xFFFF_FFFF } else { 0 };
                self.regs.d.set_e(high);
            }
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(ExecutionResult::Okay)
    }

    /// SAHF loads SF, ZF, AF, PF and CF from AH. LAHF stores the low flag byte in AH.
    pub(crate) fn op_flags_ah(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        const AH_FLAGS: u16 = CPU_FLAG_SIGN | CPU_FLAG_ZERO | CPU_FLAG_AUX_CARRY | CPU_FLAG_PARITY | CPU_FLAG_CARRY;
        if instr.mnemonic() == Mnemonic::Sahf {
            let flags = (self.regs.f() & !AH_FLAGS) | (self.regs.a.h() as u16 & AH_FLAGS);
            self.regs.set_f(flags);
        }
        else {
            self.regs.a.set_h(self.regs.f() as u8);
        }
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_flag_control(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        match instr.mnemonic() {
            Mnemonic::Clc => self.clear_flag(Flag::Carry),
            Mnemonic::Stc => self.set_flag(Flag::Carry),
            Mnemonic::Cmc => self.set_flag_state(Flag::Carry, !self.get_flag(Flag::Carry)),
            Mnemonic::Cli => self.clear_flag(Flag::Interrupt),
            Mnemonic::Sti => self.set_flag(Flag::Interrupt),
            Mnemonic::Cld => self.clear_flag(Flag::Direction),
            Mnemonic::Std => self.set_flag(Flag::Direction),
            _ => return Err(self.invalid_operand(instr)),
        }
        Ok(ExecutionResult::Okay)
    }

    /// IN reads a free-running counter; there are no devices behind the ports.
    pub(crate) fn op_in(&mut self, instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        let size = self.operand_size(instr, 0)?;
        let value = self.io_counter;
        self.io_counter = self.io_counter.wrapping_add(1);
        self.write_operand(instr, 0, size, value as u32)?;
        Ok(ExecutionResult::Okay)
    }

    pub(crate) fn op_nop(&mut self, _instr: &Instruction) -> Result<ExecutionResult, CpuError> {
        Ok(ExecutionResult::Okay)
    }
}
