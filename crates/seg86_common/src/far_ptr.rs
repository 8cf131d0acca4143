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

    common::far_ptr.rs

    Implements the segment:offset far pointer.

    Pointer arithmetic is performed on the offset only and wraps at 16 bits.
    It never carries into the segment.

*/

use std::{
    fmt,
    fmt::Display,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

/// A segmented (segment, offset) address. Ordering compares the segment first, then the offset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FarPtr {
    pub segment: u16,
    pub offset: u16,
}

impl FarPtr {
    /// Size of a far pointer in guest memory, in bytes.
    pub const SIZE: usize = 4;
    pub const NULL: FarPtr = FarPtr { segment: 0, offset: 0 };

    #[inline]
    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.segment == 0 && self.offset == 0
    }

    #[inline]
    pub fn to_u32(&self) -> u32 {
        ((self.segment as u32) << 16) | self.offset as u32
    }

    #[inline]
    pub fn from_u32(value: u32) -> Self {
        Self {
            segment: (value >> 16) as u16,
            offset: value as u16,
        }
    }

    /// Read a far pointer as it is laid out in guest memory: offset word, then segment word.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [o0, o1, s0, s1, ..] => Some(Self {
                offset: u16::from_le_bytes([*o0, *o1]),
                segment: u16::from_le_bytes([*s0, *s1]),
            }),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let o = self.offset.to_le_bytes();
        let s = self.segment.to_le_bytes();
        [o[0], o[1], s[0], s[1]]
    }

    /// Returns true if the offset is a multiple of `alignment`. An alignment of 0 is never satisfied.
    pub fn is_aligned(&self, alignment: u16) -> bool {
        alignment != 0 && self.offset % alignment == 0
    }
}

impl Display for FarPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.segment, self.offset)
    }
}

impl From<(u16, u16)> for FarPtr {
    fn from((segment, offset): (u16, u16)) -> Self {
        Self::new(segment, offset)
    }
}

impl Add<u16> for FarPtr {
    type Output = FarPtr;
    fn add(self, rhs: u16) -> FarPtr {
        FarPtr::new(self.segment, self.offset.wrapping_add(rhs))
    }
}

impl Add<i32> for FarPtr {
    type Output = FarPtr;
    fn add(self, rhs: i32) -> FarPtr {
        FarPtr::new(self.segment, self.offset.wrapping_add(rhs as u16))
    }
}

impl Sub<u16> for FarPtr {
    type Output = FarPtr;
    fn sub(self, rhs: u16) -> FarPtr {
        FarPtr::new(self.segment, self.offset.wrapping_sub(rhs))
    }
}

impl Sub<i32> for FarPtr {
    type Output = FarPtr;
    fn sub(self, rhs: i32) -> FarPtr {
        FarPtr::new(self.segment, self.offset.wrapping_sub(rhs as u16))
    }
}

impl AddAssign<u16> for FarPtr {
    fn add_assign(&mut self, rhs: u16) {
        self.offset = self.offset.wrapping_add(rhs);
    }
}

impl SubAssign<u16> for FarPtr {
    fn sub_assign(&mut self, rhs: u16) {
        self.offset = self.offset.wrapping_sub(rhs);
    }
}
