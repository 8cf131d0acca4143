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

    tests::strings.rs

    Integration tests for the string instructions and their REP prefixes.

*/


mod common;

use common::{cpu_with_code, DATA_SEGMENT};
use seg86_core::{Intel286, MemoryCore};

// Every program here copies DS into ES first with push ds ; pop es.
fn run_with_data(code: &[u8], setup: impl FnOnce(&mut Intel286)) -> Intel286 {
    let mut program = vec![0x1E, 0x07];
    program.extend_from_slice(code);
    program.push(0xF4);
    let mut cpu = cpu_with_code(&program);
    setup(&mut cpu);
    cpu.run(Some(10_000)).unwrap();
    assert!(cpu.is_halted());
    cpu
}

#[test]
fn rep_movsb_forward() {
    // mov si, 0x100 ; mov di, 0x200 ; mov cx, 5 ; cld ; rep movsb
    let cpu = run_with_data(
        &[0xBE, 0x00, 0x01, 0xBF, 0x00, 0x02, 0xB9, 0x05, 0x00, 0xFC, 0xF3, 0xA4],
        |cpu| {
            cpu.mem.set_array(DATA_SEGMENT, 0x100, b"HELLO").unwrap();
        },
    );
    assert_eq!(cpu.mem.get_array(DATA_SEGMENT, 0x200, 5).unwrap(), b"HELLO");
    assert_eq!(cpu.regs.c.x(), 0);
    assert_eq!(cpu.regs.si.x(), 0x105);
    assert_eq!(cpu.regs.di.x(), 0x205);
}

#[test]
fn rep_movsb_backward() {
    // mov si, 0x104 ; mov di, 0x204 ; mov cx, 5 ; std ; rep movsb
    let cpu = run_with_data(
        &[0xBE, 0x04, 0x01, 0xBF, 0x04, 0x02, 0xB9, 0x05, 0x00, 0xFD, 0xF3, 0xA4],
        |cpu| {
            cpu.mem.set_array(DATA_SEGMENT, 0x100, b"WORLD").unwrap();
        },
    );
    assert_eq!(cpu.mem.get_array(DATA_SEGMENT, 0x200, 5).unwrap(), b"WORLD");
    assert_eq!(cpu.regs.si.x(), 0x0FF);
    assert_eq!(cpu.regs.di.x(), 0x1FF);
}

#[test]
fn rep_stosw_fills_words() {
    // mov ax, 0xABCD ; mov di, 0x10 ; mov cx, 4 ; cld ; rep stosw
    let cpu = run_with_data(&[0xB8, 0xCD, 0xAB, 0xBF, 0x10, 0x00, 0xB9, 0x04, 0x00, 0xFC, 0xF3, 0xAB], |_| {});
    for i in 0..4 {
        assert_eq!(cpu.mem.get_word(DATA_SEGMENT, 0x10 + i * 2).unwrap(), 0xABCD);
    }
    assert_eq!(cpu.mem.get_word(DATA_SEGMENT, 0x18).unwrap(), 0);
    assert_eq!(cpu.regs.di.x(), 0x18);
}

#[test]
fn rep_with_zero_count_is_a_no_op() {
    // mov cx, 0 ; mov di, 0x10 ; mov al, 0xAA ; rep stosb
    let cpu = run_with_data(&[0xB9, 0x00, 0x00, 0xBF, 0x10, 0x00, 0xB0, 0xAA, 0xF3, 0xAA], |_| {});
    assert_eq!(cpu.mem.get_byte(DATA_SEGMENT, 0x10).unwrap(), 0);
    assert_eq!(cpu.regs.di.x(), 0x10);
}

#[test]
fn repne_scasb_finds_byte() {
    // mov al, 'd' ; mov di, 0 ; mov cx, 6 ; cld ; repne scasb
    let cpu = run_with_data(&[0xB0, 0x64, 0xBF, 0x00, 0x00, 0xB9, 0x06, 0x00, 0xFC, 0xF2, 0xAE], |cpu| {
        cpu.mem.set_array(DATA_SEGMENT, 0, b"abcdef").unwrap();
    });
    assert_eq!(cpu.regs.di.x(), 4);
    assert_eq!(cpu.regs.c.x(), 2);
    assert!(cpu.regs.zero_flag());
}

#[test]
fn repe_cmpsb_stops_on_mismatch() {
    // mov si, 0 ; mov di, 0x10 ; mov cx, 8 ; cld ; repe cmpsb
    let cpu = run_with_data(
        &[0xBE, 0x00, 0x00, 0xBF, 0x10, 0x00, 0xB9, 0x08, 0x00, 0xFC, 0xF3, 0xA6],
        |cpu| {
            cpu.mem.set_array(DATA_SEGMENT, 0, b"abcX").unwrap();
            cpu.mem.set_array(DATA_SEGMENT, 0x10, b"abcY").unwrap();
        },
    );
    assert_eq!(cpu.regs.si.x(), 4);
    assert_eq!(cpu.regs.di.x(), 0x14);
    assert_eq!(cpu.regs.c.x(), 4);
    assert!(!cpu.regs.zero_flag());
    assert!(cpu.regs.carry_flag());
}

#[test]
fn lodsw_advances_si() {
    // mov si, 0x40 ; cld ; lodsw
    let cpu = run_with_data(&[0xBE, 0x40, 0x00, 0xFC, 0xAD], |cpu| {
        cpu.mem.set_word(DATA_SEGMENT, 0x40, 0xBEEF).unwrap();
    });
    assert_eq!(cpu.regs.a.x(), 0xBEEF);
    assert_eq!(cpu.regs.si.x(), 0x42);
}

#[test]
fn scasb_index_wraps_below_zero() {
    // std ; xor di, di ; scasb
    let cpu = run_with_data(&[0xFD, 0x31, 0xFF, 0xAE], |_| {});
    assert_eq!(cpu.regs.di.x(), 0xFFFF);
}

#[test]
fn movsb_honors_source_override() {
    // mov si, 0 ; mov di, 0x80 ; cld ; cs movsb
    let cpu = run_with_data(&[0xBE, 0x00, 0x00, 0xBF, 0x80, 0x00, 0xFC, 0x2E, 0xA4], |_| {});
    // First code byte is the push ds prologue.
    assert_eq!(cpu.mem.get_byte(DATA_SEGMENT, 0x80).unwrap(), 0x1E);
}
