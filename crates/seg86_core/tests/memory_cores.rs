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

    tests::memory_cores.rs

    Integration tests running programs against both memory cores.

*/


mod common;

use common::{cpu_with_code, CODE_SEGMENT};
use seg86_core::{CoreConfig, CpuError, Intel286, MemoryCore, MemoryError, RealModeMemoryCore};

const REAL_CODE_SEGMENT: u16 = 0x100;

fn real_mode_cpu(code: &[u8]) -> Intel286 {
    let mut cpu = Intel286::new(RealModeMemoryCore::new().into());
    cpu.reset().unwrap();
    cpu.mem.add_code_segment(REAL_CODE_SEGMENT, code).unwrap();
    cpu.regs.cs = REAL_CODE_SEGMENT;
    cpu.regs.ds = 0x200;
    cpu
}

#[test]
fn real_mode_segments_alias() {
    // mov word [0x10], 0xBEEF ; mov ax, ds ; inc ax ; mov ds, ax ; mov bx, [0] ; hlt
    let mut cpu = real_mode_cpu(&[
        0xC7, 0x06, 0x10, 0x00, 0xEF, 0xBE, 0x8C, 0xD8, 0x40, 0x8E, 0xD8, 0x8B, 0x1E, 0x00, 0x00, 0xF4,
    ]);
    cpu.run(Some(10)).unwrap();
    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.ds, 0x201);
    assert_eq!(cpu.regs.b.x(), 0xBEEF);
}

#[test]
fn real_mode_heap_block_is_addressable() {
    // lodsb ; lodsb ; hlt
    let mut cpu = real_mode_cpu(&[0xAC, 0xAC, 0xF4]);
    let ptr = cpu.mem.malloc(32).unwrap();
    assert!(!ptr.is_null());
    assert_eq!(ptr.offset, 0);
    cpu.mem.set_array(ptr.segment, ptr.offset, &[0x11, 0x22]).unwrap();
    cpu.regs.ds = ptr.segment;
    cpu.regs.si.set_x(ptr.offset);
    cpu.run(Some(10)).unwrap();
    assert_eq!(cpu.regs.a.l(), 0x22);
    assert_eq!(cpu.regs.si.x(), 2);

    cpu.mem.free(ptr);
    assert_eq!(cpu.mem.get_allocated_memory_size(ptr), None);
}

#[test]
fn configured_real_mode_cpu_honors_instruction_limit() {
    let config = CoreConfig::from_toml_str(
        r#"
        [cpu]
        instruction_limit = 50

        [memory]
        core = "real"
        "#,
    )
    .unwrap();
    let mut cpu = Intel286::from_config(&config).unwrap();
    cpu.reset().unwrap();
    // jmp $
    cpu.mem.add_code_segment(REAL_CODE_SEGMENT, &[0xEB, 0xFE]).unwrap();
    cpu.regs.cs = REAL_CODE_SEGMENT;
    assert_eq!(cpu.run(None).unwrap(), 50);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.instruction_counter(), 50);
}

#[test]
fn protected_mode_rejects_unmapped_segment() {
    // mov ax, [0]
    let mut cpu = cpu_with_code(&[0xA1, 0x00, 0x00]);
    cpu.regs.ds = 0x1234;
    assert_eq!(
        cpu.tick(),
        Err(CpuError::Memory(MemoryError::SegmentNotFound(0x1234)))
    );
    assert_eq!(cpu.regs.cs, CODE_SEGMENT);
    assert_eq!(cpu.regs.ip(), 0);
}

#[test]
fn protected_mode_heap_and_variables() {
    // les di, [0] ; mov al, 0x5A ; stosb ; hlt
    let mut cpu = cpu_with_code(&[0xC4, 0x3E, 0x00, 0x00, 0xB0, 0x5A, 0xAA, 0xF4]);
    let block = cpu.mem.allocate_variable("buffer", 16, false).unwrap();
    cpu.mem.set_pointer(common::DATA_SEGMENT, 0, block).unwrap();
    cpu.run(Some(10)).unwrap();
    assert_eq!(cpu.regs.es, block.segment);
    assert_eq!(cpu.mem.get_byte(block.segment, block.offset).unwrap(), 0x5A);
    assert_eq!(cpu.mem.get_variable_pointer("buffer").unwrap(), block);
}
