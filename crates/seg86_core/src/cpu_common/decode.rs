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

    cpu_common::decode.rs

    Instruction decoding glue over the iced-x86 decoder.

*/


use iced_x86::{Decoder, DecoderOptions, Instruction};

/// All code is decoded as 16-bit.
pub const DECODE_BITNESS: u32 = 16;
/// Longest legal x86 instruction.
pub const MAX_INSTRUCTION_LEN: usize = 15;

/// Decode a single instruction from `bytes`, which are assumed to start at `ip`.
/// A truncated or undefined encoding yields an instruction for which `is_invalid()` is true.
pub fn decode_one(bytes: &[u8], ip: u16) -> Instruction {
    let window = &bytes[..bytes.len().min(MAX_INSTRUCTION_LEN)];
    let mut decoder = Decoder::with_ip(DECODE_BITNESS, window, ip as u64, DecoderOptions::NONE);
    decoder.decode()
}

/// Decode a byte stream linearly from offset 0, as a code segment would be laid out.
pub fn decode_linear(bytes: &[u8]) -> Vec<Instruction> {
    let mut decoder = Decoder::with_ip(DECODE_BITNESS, bytes, 0, DecoderOptions::NONE);
    let mut instructions = Vec::new();
    while decoder.can_decode() {
        instructions.push(decoder.decode());
    }
    instructions
}
