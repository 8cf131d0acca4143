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

    tests::common::mod.rs

    Shared fixtures for the integration tests.

*/


#![allow(dead_code)]

use seg86_core::{Intel286, MemoryCore, MemoryCoreType, ProtectedModeMemoryCore};

pub const CODE_SEGMENT: u16 = 1;
pub const DATA_SEGMENT: u16 = 2;

/// Build a reset CPU over a fresh protected-mode core, with `code` loaded at 0001:0000 and an
/// empty data segment selected in DS.
pub fn cpu_with_code(code: &[u8]) -> Intel286 {
    cpu_with_memory(ProtectedModeMemoryCore::new().into(), code)
}

pub fn cpu_with_memory(mem: MemoryCoreType, code: &[u8]) -> Intel286 {
    let mut cpu = Intel286::new(mem);
    cpu.reset().unwrap();
    cpu.mem.add_code_segment(CODE_SEGMENT, code).unwrap();
    if !cpu.mem.has_segment(DATA_SEGMENT) {
        cpu.mem.add_segment(DATA_SEGMENT).unwrap();
    }
    cpu.regs.cs = CODE_SEGMENT;
    cpu.regs.set_ip(0);
    cpu.regs.ds = DATA_SEGMENT;
    cpu
}

/// Run `code` followed by a HLT to completion.
pub fn run_code(code: &[u8]) -> Intel286 {
    let mut program = code.to_vec();
    program.push(0xF4);
    let mut cpu = cpu_with_code(&program);
    cpu.run(Some(100_000)).unwrap();
    assert!(cpu.is_halted(), "program did not reach HLT");
    cpu
}
