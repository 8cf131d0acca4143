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

    common::util.rs

    Common Seg86 library.
    Small numeric helpers used by the core and host crates.

*/

pub fn relative_offset_u16(base: u16, offset: i16) -> u16 {
    base.wrapping_add(offset as u16)
}

pub fn sign_extend_u8_to_u16(some_u8: u8) -> u16 {
    some_u8 as i8 as i16 as u16
}

pub fn sign_extend_u16_to_u32(some_u16: u16) -> u32 {
    some_u16 as i16 as i32 as u32
}

/// Combine a high and low word into a dword, as DX:AX pairs are combined.
#[inline]
pub fn make_dword(hi: u16, lo: u16) -> u32 {
    ((hi as u32) << 16) | lo as u32
}

pub fn fmt_byte_array(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}
