//! LZ77 decompression for the 2007 container (AC1021).
//!
//! Same literal-run / back-reference shape as the AC18 variant, with its
//! own opcode table and one twist: literal runs are not stored in order.
//! Each full 32-byte block is stored as four 8-byte groups in reverse, and
//! the 1-31 byte tail follows a fixed per-length shuffle of 1, 2, 3, 4, 8
//! and 16 byte pieces (see [`copy_tail`]).

use super::{back_copy, fit_to_size, output_buffer, Decompressor};
use crate::error::{DwgError, Result};

const VARIANT: &str = "LZ77 AC21";

/// Decompressor for the AC21 variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz77Ac21Decompressor;

impl Decompressor for Lz77Ac21Decompressor {
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        decompress(source, decompressed_size)
    }
}

/// Expand `source` into exactly `decompressed_size` bytes. The whole of
/// `source` is the compressed stream.
pub fn decompress(source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut state = State {
        src: source,
        pos: 0,
        out: output_buffer(decompressed_size, VARIANT)?,
        opcode: 0,
        length: 0,
        offset: 0,
    };
    state.run()?;
    fit_to_size(state.out, decompressed_size, VARIANT)
}

struct State<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<u8>,
    opcode: u32,
    length: usize,
    offset: usize,
}

impl State<'_> {
    fn run(&mut self) -> Result<()> {
        let Some(&first) = self.src.first() else {
            return Ok(());
        };
        self.opcode = first as u32;
        self.pos = 1;
        if self.at_end() {
            return Ok(());
        }

        if self.opcode & 0xF0 == 0x20 {
            self.pos += 3;
            self.length = (self.byte_at(self.pos - 1)? & 7) as usize;
        }

        while !self.at_end() {
            if self.length == 0 {
                self.read_literal_length()?;
            }
            self.copy_literal()?;

            if self.at_end() {
                break;
            }
            self.copy_back_references()?;
        }
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn byte_at(&self, index: usize) -> Result<u8> {
        self.src.get(index).copied().ok_or_else(|| {
            DwgError::Decompression(format!("{VARIANT}: input ended at {index}"))
        })
    }

    fn byte(&mut self) -> Result<u32> {
        let b = self.byte_at(self.pos)?;
        self.pos += 1;
        Ok(b as u32)
    }

    fn read_literal_length(&mut self) -> Result<()> {
        self.length = self.opcode as usize + 8;
        if self.length == 0x17 {
            let mut n = self.byte()? as usize;
            self.length += n;
            if n == 0xFF {
                loop {
                    n = self.byte()? as usize;
                    n |= (self.byte()? as usize) << 8;
                    self.length += n;
                    if n != 0xFFFF {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn copy_literal(&mut self) -> Result<()> {
        let end = self.pos + self.length;
        let run = self.src.get(self.pos..end).ok_or_else(|| {
            DwgError::Decompression(format!(
                "{VARIANT}: literal run of {} bytes at {} exceeds input",
                self.length, self.pos
            ))
        })?;
        let mut blocks = run.chunks_exact(32);
        for block in &mut blocks {
            copy_16(&mut self.out, block, 16);
            copy_16(&mut self.out, block, 0);
        }
        copy_tail(&mut self.out, blocks.remainder());
        self.pos = end;
        Ok(())
    }

    fn copy_back_references(&mut self) -> Result<()> {
        self.length = 0;
        self.opcode = self.byte()?;
        self.read_instructions()?;

        loop {
            back_copy(&mut self.out, self.offset, self.length, VARIANT)?;

            self.length = (self.opcode & 7) as usize;
            if self.length != 0 || self.at_end() {
                break;
            }

            self.opcode = self.byte()?;
            if self.opcode >> 4 == 0 {
                break;
            }
            if self.opcode >> 4 == 0xF {
                self.opcode &= 0xF;
            }
            self.read_instructions()?;
        }
        Ok(())
    }

    fn read_instructions(&mut self) -> Result<()> {
        let op = self.opcode;
        match op >> 4 {
            0 => {
                let length = (op & 0xF) as usize + 0x13;
                let low = self.byte()? as usize;
                self.opcode = self.byte()?;
                self.length = length + ((self.opcode >> 3) & 0x10) as usize;
                self.offset = (((self.opcode & 0x78) << 5) as usize) + 1 + low;
            }
            1 => {
                self.length = (op & 0xF) as usize + 3;
                let low = self.byte()? as usize;
                self.opcode = self.byte()?;
                self.offset = (((self.opcode & 0xF8) << 5) as usize) + 1 + low;
            }
            2 => {
                let low = self.byte()?;
                let high = self.byte()?;
                self.offset = ((high << 8) | low) as usize;
                let mut length = (op & 7) as usize;
                if op & 8 == 0 {
                    self.opcode = self.byte()?;
                    length += (self.opcode & 0xF8) as usize;
                } else {
                    self.offset += 1;
                    length += (self.byte()? as usize) << 3;
                    self.opcode = self.byte()?;
                    length += (((self.opcode & 0xF8) as usize) << 8) + 0x100;
                }
                self.length = length;
            }
            _ => {
                self.length = (op >> 4) as usize;
                let low = (op & 0x0F) as usize;
                self.opcode = self.byte()?;
                self.offset = (((self.opcode & 0xF8) << 1) as usize) + low + 1;
            }
        }
        Ok(())
    }
}

fn copy_1(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.push(s[at]);
}

fn copy_2(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.extend_from_slice(&[s[at + 1], s[at]]);
}

fn copy_3(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.extend_from_slice(&[s[at + 2], s[at + 1], s[at]]);
}

fn copy_4(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.extend_from_slice(&s[at..at + 4]);
}

fn copy_8(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.extend_from_slice(&s[at..at + 8]);
}

fn copy_16(out: &mut Vec<u8>, s: &[u8], at: usize) {
    out.extend_from_slice(&s[at + 8..at + 16]);
    out.extend_from_slice(&s[at..at + 8]);
}

/// Unshuffle a literal tail shorter than 32 bytes.
fn copy_tail(out: &mut Vec<u8>, s: &[u8]) {
    match s.len() {
        0 => {}
        1 => copy_1(out, s, 0),
        2 => copy_2(out, s, 0),
        3 => copy_3(out, s, 0),
        4 => copy_4(out, s, 0),
        5 => {
            copy_1(out, s, 4);
            copy_4(out, s, 0);
        }
        6 => {
            copy_1(out, s, 5);
            copy_4(out, s, 1);
            copy_1(out, s, 0);
        }
        7 => {
            copy_2(out, s, 5);
            copy_4(out, s, 1);
            copy_1(out, s, 0);
        }
        8 => copy_8(out, s, 0),
        9 => {
            copy_1(out, s, 8);
            copy_8(out, s, 0);
        }
        10 => {
            copy_1(out, s, 9);
            copy_8(out, s, 1);
            copy_1(out, s, 0);
        }
        11 => {
            copy_2(out, s, 9);
            copy_8(out, s, 1);
            copy_1(out, s, 0);
        }
        12 => {
            copy_4(out, s, 8);
            copy_8(out, s, 0);
        }
        13 => {
            copy_1(out, s, 12);
            copy_4(out, s, 8);
            copy_8(out, s, 0);
        }
        14 => {
            copy_1(out, s, 13);
            copy_4(out, s, 9);
            copy_8(out, s, 1);
            copy_1(out, s, 0);
        }
        15 => {
            copy_2(out, s, 13);
            copy_4(out, s, 9);
            copy_8(out, s, 1);
            copy_1(out, s, 0);
        }
        16 => copy_16(out, s, 0),
        17 => {
            copy_8(out, s, 9);
            copy_1(out, s, 8);
            copy_8(out, s, 0);
        }
        18 => {
            copy_1(out, s, 17);
            copy_16(out, s, 1);
            copy_1(out, s, 0);
        }
        19 => {
            copy_3(out, s, 16);
            copy_16(out, s, 0);
        }
        20 => {
            copy_4(out, s, 16);
            copy_16(out, s, 0);
        }
        21 => {
            copy_1(out, s, 20);
            copy_4(out, s, 16);
            copy_16(out, s, 0);
        }
        22 => {
            copy_2(out, s, 20);
            copy_4(out, s, 16);
            copy_16(out, s, 0);
        }
        23 => {
            copy_3(out, s, 20);
            copy_4(out, s, 16);
            copy_16(out, s, 0);
        }
        24 => {
            copy_8(out, s, 16);
            copy_16(out, s, 0);
        }
        25 => {
            copy_8(out, s, 17);
            copy_1(out, s, 16);
            copy_16(out, s, 0);
        }
        26 => {
            copy_1(out, s, 25);
            copy_8(out, s, 17);
            copy_1(out, s, 16);
            copy_16(out, s, 0);
        }
        27 => {
            copy_2(out, s, 25);
            copy_8(out, s, 17);
            copy_1(out, s, 16);
            copy_16(out, s, 0);
        }
        28 => {
            copy_4(out, s, 24);
            copy_8(out, s, 16);
            copy_16(out, s, 0);
        }
        29 => {
            copy_1(out, s, 28);
            copy_4(out, s, 24);
            copy_8(out, s, 16);
            copy_16(out, s, 0);
        }
        30 => {
            copy_2(out, s, 28);
            copy_4(out, s, 24);
            copy_8(out, s, 16);
            copy_16(out, s, 0);
        }
        _ => {
            copy_1(out, s, 30);
            copy_4(out, s, 26);
            copy_8(out, s, 18);
            copy_16(out, s, 2);
            copy_2(out, s, 0);
        }
    }
}
