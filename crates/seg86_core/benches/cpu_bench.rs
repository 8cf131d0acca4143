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

    benches::cpu_bench.rs

    Benchmarks for the decoder and the execution engine.

*/


use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use seg86_core::{cpu_common::decode::decode_one, Intel286, MemoryCore, ProtectedModeMemoryCore};

const CODE_SEGMENT: u16 = 1;
const DATA_SEGMENT: u16 = 2;

fn load(code: &[u8]) -> Intel286 {
    let mut cpu = Intel286::new(ProtectedModeMemoryCore::new().into());
    cpu.reset().unwrap();
    cpu.mem.add_code_segment(CODE_SEGMENT, code).unwrap();
    cpu.mem.add_segment(DATA_SEGMENT).unwrap();
    cpu
}

fn restart(cpu: &mut Intel286) {
    cpu.reset().unwrap();
    cpu.regs.cs = CODE_SEGMENT;
    cpu.regs.ds = DATA_SEGMENT;
    cpu.regs.es = DATA_SEGMENT;
}

pub fn cpu_decode_bench(c: &mut Criterion) {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; 0x10000];
    rng.fill(&mut bytes[..]);

    c.bench_function("cpu_decode_bench", |b| {
        b.iter(|| {
            let ip = rng.random_range(0..0xFFF0usize);
            black_box(decode_one(&bytes[ip..], ip as u16));
        });
    });
}

pub fn cpu_arith_loop_bench(c: &mut Criterion) {
    // mov cx, 0x1000 ; l: add ax, bx ; adc dx, 0 ; loop l ; hlt
    let mut cpu = load(&[0xB9, 0x00, 0x10, 0x01, 0xD8, 0x83, 0xD2, 0x00, 0xE2, 0xF9, 0xF4]);

    c.bench_function("cpu_arith_loop_bench", |b| {
        b.iter(|| {
            restart(&mut cpu);
            cpu.regs.b.set_x(0x1234);
            black_box(cpu.run(None).unwrap());
        });
    });
}

pub fn cpu_rep_movsb_bench(c: &mut Criterion) {
    // cld ; xor si, si ; mov di, 0x8000 ; mov cx, 0x8000 ; rep movsb ; hlt
    let mut cpu = load(&[0xFC, 0x31, 0xF6, 0xBF, 0x00, 0x80, 0xB9, 0x00, 0x80, 0xF3, 0xA4, 0xF4]);

    c.bench_function("cpu_rep_movsb_bench", |b| {
        b.iter(|| {
            restart(&mut cpu);
            black_box(cpu.run(None).unwrap());
        });
    });
}

criterion_group!(cpu_benches, cpu_decode_bench, cpu_arith_loop_bench, cpu_rep_movsb_bench);
criterion_main!(cpu_benches);
