//! Bounds-checked cursors over the fixed-size wire buffer
//!
//! Out-of-range accesses never panic: reads yield zero and writes are dropped,
//! and the cursor remembers it ran past the end so the integrity check can
//! report a layout mismatch.

use crate::constants::wire::CONFIG_SIZE;

pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    overrun: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, overrun: false }
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn u8(&mut self) -> u8 {
        let [b] = self.bytes::<1>();
        b
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.bytes::<2>())
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        match self.buf.get(self.pos..self.pos + N) {
            Some(src) => out.copy_from_slice(src),
            None => self.overrun = true,
        }
        self.pos += N;
        out
    }
}

pub(crate) struct WireWriter {
    buf: [u8; CONFIG_SIZE],
    pos: usize,
    overrun: bool,
}

impl WireWriter {
    pub fn new() -> Self {
        Self { buf: [0; CONFIG_SIZE], pos: 0, overrun: false }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    pub fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, src: &[u8]) {
        match self.buf.get_mut(self.pos..self.pos + src.len()) {
            Some(dst) => dst.copy_from_slice(src),
            None => self.overrun = true,
        }
        self.pos += src.len();
    }

    pub fn into_bytes(self) -> [u8; CONFIG_SIZE] {
        self.buf
    }
}
