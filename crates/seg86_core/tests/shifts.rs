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

    tests::shifts.rs

    Integration tests for shifts, rotates and double-precision shifts.

*/


mod common;

use common::{run_code, DATA_SEGMENT};
use seg86_core::MemoryCore;

#[test]
fn shift_count_is_masked() {
    // mov ax, 1 ; mov cl, 33 ; shl ax, cl
    let cpu = run_code(&[0xB8, 0x01, 0x00, 0xB1, 0x21, 0xD3, 0xE0]);
    assert_eq!(cpu.regs.a.x(), 2);

    // stc ; mov eax, 1 ; mov cl, 32 ; shl eax, cl
    let cpu = run_code(&[0xF9, 0x66, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xB1, 0x20, 0x66, 0xD3, 0xE0]);
    assert_eq!(cpu.regs.a.e(), 1);
    assert!(cpu.regs.carry_flag());
}

#[test]
fn shr_and_sar() {
    // mov ax, 0x8001 ; shr ax, 1
    let cpu = run_code(&[0xB8, 0x01, 0x80, 0xD1, 0xE8]);
    assert_eq!(cpu.regs.a.x(), 0x4000);
    assert!(cpu.regs.carry_flag());
    assert!(cpu.regs.overflow_flag());

    // mov al, 0x80 ; sar al, 3
    let cpu = run_code(&[0xB0, 0x80, 0xC0, 0xF8, 0x03]);
    assert_eq!(cpu.regs.a.l(), 0xF0);
    assert!(!cpu.regs.carry_flag());
    assert!(cpu.regs.sign_flag());
}

#[test]
fn rotates() {
    // mov ax, 1 ; ror ax, 4
    let cpu = run_code(&[0xB8, 0x01, 0x00, 0xC1, 0xC8, 0x04]);
    assert_eq!(cpu.regs.a.x(), 0x1000);
    assert!(!cpu.regs.carry_flag());

    // stc ; mov ax, 0x8000 ; rcl ax, 1
    let cpu = run_code(&[0xF9, 0xB8, 0x00, 0x80, 0xD1, 0xD0]);
    assert_eq!(cpu.regs.a.x(), 0x0001);
    assert!(cpu.regs.carry_flag());

    // clc ; mov al, 1 ; rcr al, 1
    let cpu = run_code(&[0xF8, 0xB0, 0x01, 0xD0, 0xD8]);
    assert_eq!(cpu.regs.a.l(), 0);
    assert!(cpu.regs.carry_flag());
}

#[test]
fn rcl_word_count_wraps_at_seventeen() {
    // clc ; mov ax, 0x1234 ; mov cl, 17 ; rcl ax, cl
    let cpu = run_code(&[0xF8, 0xB8, 0x34, 0x12, 0xB1, 0x11, 0xD3, 0xD0]);
    assert_eq!(cpu.regs.a.x(), 0x1234);
    assert!(!cpu.regs.carry_flag());
}

#[test]
fn shld_dword() {
    // mov eax, 0x12345678 ; mov ebx, 0xF0000000 ; shld eax, ebx, 4
    let cpu = run_code(&[
        0x66, 0xB8, 0x78, 0x56, 0x34, 0x12,
        0x66, 0xBB, 0x00, 0x00, 0x00, 0xF0,
        0x66, 0x0F, 0xA4, 0xD8, 0x04,
    ]);
    assert_eq!(cpu.regs.a.e(), 0x2345678F);
    assert_eq!(cpu.regs.b.e(), 0xF0000000);
    assert!(cpu.regs.carry_flag());
}

#[test]
fn shrd_word() {
    // mov ax, 0x1234 ; mov dx, 0x000F ; shrd ax, dx, 4
    let cpu = run_code(&[0xB8, 0x34, 0x12, 0xBA, 0x0F, 0x00, 0x0F, 0xAC, 0xD0, 0x04]);
    assert_eq!(cpu.regs.a.x(), 0xF123);
    assert!(!cpu.regs.carry_flag());
    assert!(cpu.regs.sign_flag());
}

#[test]
fn shl_memory_byte() {
    // mov byte [0x30], 0x81 ; shl byte [0x30], 1
    let cpu = run_code(&[0xC6, 0x06, 0x30, 0x00, 0x81, 0xD0, 0x26, 0x30, 0x00]);
    assert_eq!(cpu.mem.get_byte(DATA_SEGMENT, 0x30).unwrap(), 0x02);
    assert!(cpu.regs.carry_flag());
    assert!(cpu.regs.overflow_flag());
}
