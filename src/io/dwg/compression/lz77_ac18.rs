//! LZ77 decompression for the 2004+ container (AC1018, AC1024, AC1027,
//! AC1032).
//!
//! The stream alternates literal runs and back-references. An opcode
//! selects the back-reference encoding:
//!
//! | opcode      | length                 | offset                                   |
//! |-------------|------------------------|------------------------------------------|
//! | `0x40-0xFF` | `(op >> 4) - 1`        | 10 bits from `op` and the next byte, +1  |
//! | `0x12-0x1F` | `op & 7`, extended, +2 | 2 bytes, bit 3 of `op` as bit 14, +0x4000|
//! | `0x20-0x3F` | `op & 0x1F`, extended, +2 | 2 bytes, +1                           |
//!
//! `0x11` ends the stream.

use super::{back_copy, fit_to_size, output_buffer, Decompressor};
use crate::error::{DwgError, Result};

const VARIANT: &str = "LZ77 AC18";

/// Decompressor for the AC18 variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz77Ac18Decompressor;

impl Decompressor for Lz77Ac18Decompressor {
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        decompress(source, decompressed_size)
    }
}

/// Expand `source` into exactly `decompressed_size` bytes.
pub fn decompress(source: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut state = State {
        src: source,
        pos: 0,
        out: output_buffer(decompressed_size, VARIANT)?,
    };
    state.run()?;
    fit_to_size(state.out, decompressed_size, VARIANT)
}

struct State<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<u8>,
}

impl State<'_> {
    fn run(&mut self) -> Result<()> {
        let Some(mut opcode) = self.next_opcode() else {
            return Ok(());
        };

        if opcode & 0xF0 == 0 {
            let count = self.literal_count(opcode)? + 3;
            self.copy_literal(count)?;
            match self.next_opcode() {
                Some(op) => opcode = op,
                None => return Ok(()),
            }
        }

        while opcode != 0x11 {
            let (length, offset) = match opcode {
                0x40..=0xFF => {
                    let next = self.byte()?;
                    let offset = (((opcode >> 2) & 3) as usize | (next as usize) << 2) + 1;
                    ((opcode >> 4) as usize - 1, offset)
                }
                0x20..=0x3F => {
                    let length = self.compressed_length(opcode, 0x1F)?;
                    let (offset, next) = self.two_byte_offset(0, 1)?;
                    opcode = next;
                    (length, offset)
                }
                0x10..=0x1F => {
                    let length = self.compressed_length(opcode, 0x07)?;
                    let base = ((opcode & 8) as usize) << 11;
                    let (offset, next) = self.two_byte_offset(base, 0x4000)?;
                    opcode = next;
                    (length, offset)
                }
                _ => {
                    return Err(DwgError::Decompression(format!(
                        "{VARIANT}: unexpected opcode {opcode:#04X} at {}",
                        self.pos - 1
                    )))
                }
            };

            back_copy(&mut self.out, offset, length, VARIANT)?;

            let mut literal = (opcode & 3) as usize;
            if literal == 0 {
                match self.next_opcode() {
                    Some(op) => opcode = op,
                    None => return Ok(()),
                }
                if opcode & 0xF0 == 0 {
                    literal = self.literal_count(opcode)? + 3;
                }
            }

            if literal > 0 {
                self.copy_literal(literal)?;
                match self.next_opcode() {
                    Some(op) => opcode = op,
                    None => return Ok(()),
                }
            }
        }

        Ok(())
    }

    /// Opcode read; running out of input here ends the stream cleanly.
    fn next_opcode(&mut self) -> Option<u8> {
        let byte = self.src.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn byte(&mut self) -> Result<u8> {
        self.next_opcode().ok_or_else(|| {
            DwgError::Decompression(format!("{VARIANT}: input ended inside a token"))
        })
    }

    fn copy_literal(&mut self, count: usize) -> Result<()> {
        let end = self.pos + count;
        let bytes = self.src.get(self.pos..end).ok_or_else(|| {
            DwgError::Decompression(format!(
                "{VARIANT}: literal run of {count} bytes at {} exceeds input",
                self.pos
            ))
        })?;
        self.out.extend_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Low nibble, or for zero an escape: 0xFF per zero byte, then
    /// `0x0F + byte`.
    fn literal_count(&mut self, code: u8) -> Result<usize> {
        let mut count = (code & 0x0F) as usize;
        if count == 0 {
            let mut byte = self.byte()?;
            while byte == 0 {
                count += 0xFF;
                byte = self.byte()?;
            }
            count += 0x0F + byte as usize;
        }
        Ok(count)
    }

    fn compressed_length(&mut self, opcode: u8, mask: u8) -> Result<usize> {
        let mut length = (opcode & mask) as usize;
        if length == 0 {
            let mut byte = self.byte()?;
            while byte == 0 {
                length += 0xFF;
                byte = self.byte()?;
            }
            length += byte as usize + mask as usize;
        }
        Ok(length + 2)
    }

    /// Returns the offset and the first byte, whose low bits carry the
    /// following literal count.
    fn two_byte_offset(&mut self, base: usize, added: usize) -> Result<(usize, u8)> {
        let first = self.byte()?;
        let second = self.byte()?;
        let offset = (base | (first >> 2) as usize | (second as usize) << 6) + added;
        Ok((offset, first))
    }
}
