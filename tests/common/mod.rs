//! Shared test utilities for acaddwg integration tests.
//!
//! Real drawings are not checked in, so the tests build their inputs:
//! [`BitWriter`] packs bit-coded fields the way the stream readers expect
//! them, and [`builders`] lays out complete containers of each generation.

#![allow(dead_code)]

pub mod builders;

use acaddwg::io::dwg::constants::sentinels;
use acaddwg::io::dwg::crc::{crc16, CRC16_SEED};
use acaddwg::DwgVersion;

// ===========================================================================
// Bit writer
// ===========================================================================

/// MSB-first bit packer, the mirror of `BitCursor`.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits written so far.
    pub fn position_in_bits(&self) -> u64 {
        self.bits
    }

    pub fn bit(&mut self, value: bool) -> &mut Self {
        if self.bits % 8 == 0 {
            self.bytes.push(0);
        }
        if value {
            let index = (self.bits / 8) as usize;
            self.bytes[index] |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
        self
    }

    /// The low `count` bits of `value`, high bit first.
    pub fn bits(&mut self, value: u64, count: u32) -> &mut Self {
        for i in (0..count).rev() {
            self.bit(value >> i & 1 == 1);
        }
        self
    }

    pub fn two_bits(&mut self, value: u8) -> &mut Self {
        self.bits(value as u64, 2)
    }

    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.bits(value as u64, 8)
    }

    pub fn bytes(&mut self, values: &[u8]) -> &mut Self {
        for &b in values {
            self.byte(b);
        }
        self
    }

    pub fn raw_short(&mut self, value: i16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn raw_long(&mut self, value: i32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn raw_double(&mut self, value: f64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// BS in its shortest form.
    pub fn bit_short(&mut self, value: i16) -> &mut Self {
        match value {
            0 => self.two_bits(2),
            256 => self.two_bits(3),
            1..=255 => self.two_bits(1).byte(value as u8),
            _ => self.two_bits(0).raw_short(value),
        }
    }

    /// BL in its shortest form.
    pub fn bit_long(&mut self, value: i32) -> &mut Self {
        match value {
            0 => self.two_bits(2),
            1..=255 => self.two_bits(1).byte(value as u8),
            _ => self.two_bits(0).raw_long(value),
        }
    }

    /// BD in its shortest form.
    pub fn bit_double(&mut self, value: f64) -> &mut Self {
        if value == 1.0 {
            self.two_bits(1)
        } else if value == 0.0 {
            self.two_bits(2)
        } else {
            self.two_bits(0).raw_double(value)
        }
    }

    /// TV before 2007: BS length and single-byte characters.
    pub fn text(&mut self, value: &str) -> &mut Self {
        self.bit_short(value.len() as i16).bytes(value.as_bytes())
    }

    /// H: code nibble, byte count nibble, big-endian value bytes.
    pub fn handle(&mut self, code: u8, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        let significant = &bytes[skip..];
        self.byte(code << 4 | significant.len() as u8).bytes(significant)
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) -> &mut Self {
        while self.bits % 8 != 0 {
            self.bit(false);
        }
        self
    }

    /// Overwrite an RL written earlier at `bit` (little-endian bytes, each
    /// MSB first).
    pub fn patch_raw_long(&mut self, bit: u64, value: i32) {
        for (i, byte) in value.to_le_bytes().iter().enumerate() {
            for j in 0..8u64 {
                let pos = bit + i as u64 * 8 + j;
                let index = (pos / 8) as usize;
                let mask = 0x80u8 >> (pos % 8);
                if byte >> (7 - j) & 1 == 1 {
                    self.bytes[index] |= mask;
                } else {
                    self.bytes[index] &= !mask;
                }
            }
        }
    }

    /// Copy every bit of `other` onto the end of this writer.
    pub fn append(&mut self, other: &BitWriter) -> &mut Self {
        for pos in 0..other.bits {
            let byte = other.bytes[(pos / 8) as usize];
            self.bit(byte >> (7 - pos % 8) & 1 == 1);
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ===========================================================================
// Byte-level encodings
// ===========================================================================

/// MC: 7-bit groups, low first.
pub fn modular_char(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let group = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(group);
            return out;
        }
        out.push(group | 0x80);
    }
}

/// Signed MC: the final byte holds six bits and the sign.
pub fn signed_modular_char(value: i64) -> Vec<u8> {
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::new();
    loop {
        if magnitude < 0x40 {
            out.push(magnitude as u8 | if negative { 0x40 } else { 0 });
            return out;
        }
        out.push((magnitude & 0x7F) as u8 | 0x80);
        magnitude >>= 7;
    }
}

/// MS: little-endian words of 15 bits.
pub fn modular_short(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let word = (value & 0x7FFF) as u16;
        value >>= 15;
        if value == 0 {
            out.extend_from_slice(&word.to_le_bytes());
            return out;
        }
        out.extend_from_slice(&(word | 0x8000).to_le_bytes());
    }
}

/// Literal-only LZ77 AC18 stream for `data` (at least four bytes).
pub fn lz77_ac18_literals(data: &[u8]) -> Vec<u8> {
    assert!(data.len() >= 4, "a literal run holds at least four bytes");
    let count = data.len() - 3;
    let mut out = Vec::new();
    if count < 0x10 {
        out.push(count as u8);
    } else {
        // 0x00, then 0x00 per 0xFF, then the remainder above 0x0F
        out.push(0x00);
        let mut rest = count - 0x0F;
        while rest > 0xFF {
            out.push(0x00);
            rest -= 0xFF;
        }
        out.push(rest as u8);
    }
    out.extend_from_slice(data);
    out.push(0x11);
    out
}

/// Literal-only LZ77 AC21 stream for `data`, a whole number of 32-byte
/// blocks. Each block is stored as its four 8-byte groups in reverse.
pub fn lz77_ac21_literals(data: &[u8]) -> Vec<u8> {
    assert!(!data.is_empty() && data.len() % 32 == 0, "whole 32-byte blocks only");
    // opcode 0x0F: length 0x17 plus the escape bytes
    let mut out = vec![0x0F];
    let mut rest = data.len() - 0x17;
    if rest < 0xFF {
        out.push(rest as u8);
    } else {
        out.push(0xFF);
        rest -= 0xFF;
        while rest >= 0xFFFF {
            out.extend_from_slice(&[0xFF, 0xFF]);
            rest -= 0xFFFF;
        }
        out.extend_from_slice(&(rest as u16).to_le_bytes());
    }
    for block in data.chunks_exact(32) {
        for group in block.chunks_exact(8).rev() {
            out.extend_from_slice(group);
        }
    }
    out
}

// ===========================================================================
// Section payloads
// ===========================================================================

/// One `AcDb:Handles` chunk: big-endian size, body, big-endian CRC.
pub fn handle_chunk(body: &[u8]) -> Vec<u8> {
    let mut chunk = ((body.len() + 2) as u16).to_be_bytes().to_vec();
    chunk.extend_from_slice(body);
    let crc = crc16(CRC16_SEED, &chunk);
    chunk.extend_from_slice(&crc.to_be_bytes());
    chunk
}

/// Handle section for `(handle, offset)` pairs, sorted by handle, in one
/// chunk, followed by the closing empty chunk.
pub fn handles_section(entries: &[(u64, i64)]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_unstable();

    let mut body = Vec::new();
    let (mut last_handle, mut last_offset) = (0u64, 0i64);
    for (handle, offset) in sorted {
        body.extend(modular_char(handle - last_handle));
        body.extend(signed_modular_char(offset - last_offset));
        last_handle = handle;
        last_offset = offset;
    }

    let mut section = handle_chunk(&body);
    section.extend_from_slice(&[0x00, 0x02]);
    section
}

/// Class definition as stored in `AcDb:Classes`.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    pub number: i16,
    pub dxf_name: &'static str,
    pub cpp_name: &'static str,
    pub is_entity: bool,
}

impl ClassSpec {
    pub fn object(number: i16, dxf_name: &'static str, cpp_name: &'static str) -> Self {
        Self {
            number,
            dxf_name,
            cpp_name,
            is_entity: false,
        }
    }

    pub fn entity(number: i16, dxf_name: &'static str, cpp_name: &'static str) -> Self {
        Self {
            is_entity: true,
            ..Self::object(number, dxf_name, cpp_name)
        }
    }
}

/// Pre-2007 class section: sentinel, RL size, records, RS CRC, sentinel.
pub fn classes_section(version: DwgVersion, classes: &[ClassSpec]) -> Vec<u8> {
    assert!(version < DwgVersion::AC1021, "class names move to a string stream in 2007");

    let mut w = BitWriter::new();
    if version == DwgVersion::AC1018 {
        let max = classes.iter().map(|c| c.number).max().unwrap_or(0);
        w.bit_short(max).byte(0).byte(0).bit(true);
    }
    for class in classes {
        w.bit_short(class.number)
            .bit_short(0)
            .text("ObjectDBX Classes")
            .text(class.cpp_name)
            .text(class.dxf_name)
            .bit(false)
            .bit_short(if class.is_entity { 0x1F2 } else { 0x1F3 });
        if version >= DwgVersion::AC1018 {
            w.bit_long(1).bit_long(0).bit_long(0).bit_long(0).bit_long(0);
        }
    }
    let body = w.into_bytes();

    let mut data = sentinels::CLASSES_START.to_vec();
    data.extend_from_slice(&(body.len() as i32).to_le_bytes());
    data.extend_from_slice(&body);
    let crc = crc16(CRC16_SEED, &data[16..]);
    data.extend_from_slice(&crc.to_le_bytes());
    data.extend_from_slice(&sentinels::CLASSES_END);
    data
}

// ===========================================================================
// Object records
// ===========================================================================

/// Frame a pre-2010 record body: MS size, body, CRC-16 (little-endian).
pub fn frame_record(body: &[u8]) -> Vec<u8> {
    let mut record = modular_short(body.len() as u32);
    record.extend_from_slice(body);
    let crc = crc16(CRC16_SEED, &record);
    record.extend_from_slice(&crc.to_le_bytes());
    record
}

/// Writes one R2000/2004 record: main data with the RL bit size patched
/// in, then the handle stream right behind it.
pub struct RecordWriter {
    pub main: BitWriter,
    pub handles: BitWriter,
    size_at: u64,
    version: DwgVersion,
}

impl RecordWriter {
    /// Start a record of `object_type` for `handle`: OT, RL placeholder,
    /// own handle, no extended data.
    pub fn new(version: DwgVersion, object_type: i16, handle: u64) -> Self {
        assert!(
            (DwgVersion::AC1015..=DwgVersion::AC1018).contains(&version),
            "record writer covers R2000 and 2004 layouts"
        );
        let mut main = BitWriter::new();
        main.bit_short(object_type);
        let size_at = main.position_in_bits();
        main.raw_long(0);
        main.handle(0, handle).bit_short(0);
        Self {
            main,
            handles: BitWriter::new(),
            size_at,
            version,
        }
    }

    /// Reactor count and flags of a non-entity, with the owner and no
    /// extension dictionary.
    pub fn non_entity_prefix(&mut self, owner: u64) -> &mut Self {
        self.object_prefix(owner, &[])
    }

    /// Non-entity prefix with soft-pointer reactors after the owner.
    pub fn object_prefix(&mut self, owner: u64, reactors: &[u64]) -> &mut Self {
        self.main.bit_long(reactors.len() as i32);
        if self.version >= DwgVersion::AC1018 {
            // no extension dictionary
            self.main.bit(true);
        }
        self.handles.handle(4, owner);
        for reactor in reactors {
            self.handles.handle(4, *reactor);
        }
        if self.version < DwgVersion::AC1018 {
            self.handles.handle(3, 0);
        }
        self
    }

    /// Entity prefix with owner, colour index and layer, no links.
    pub fn entity_prefix(&mut self, owner: u64, color: i16, layer: u64) -> &mut Self {
        // no graphics, entity mode 0 (owner stored), no reactors
        self.main.bit(false).two_bits(0).bit_long(0);
        self.handles.handle(4, owner);
        if self.version >= DwgVersion::AC1018 {
            self.main.bit(true);
        } else {
            self.handles.handle(3, 0);
            // no prev/next links
            self.main.bit(true);
        }
        self.main.bit_short(color).bit_double(1.0);
        self.handles.handle(5, layer);
        // linetype and plotstyle BYLAYER, visible, lineweight
        self.main.two_bits(0).two_bits(0).bit_short(0).byte(0x1D);
        self
    }

    /// DICTIONARY body (cloning 1, not hard owner) and its entries.
    pub fn dictionary_body(&mut self, entries: &[(&str, u64)]) -> &mut Self {
        self.main.bit_long(entries.len() as i32).bit_short(1).byte(0);
        for (name, handle) in entries {
            self.main.text(name);
            self.handles.handle(2, *handle);
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let Self {
            mut main,
            handles,
            size_at,
            ..
        } = self;
        let size = main.position_in_bits() as i32;
        main.patch_raw_long(size_at, size);

        main.append(&handles);
        frame_record(&main.into_bytes())
    }
}

/// DICTIONARY record with the given entries.
pub fn dictionary_record(version: DwgVersion, handle: u64, owner: u64, entries: &[(&str, u64)]) -> Vec<u8> {
    let mut record = RecordWriter::new(version, 0x2A, handle);
    record.non_entity_prefix(owner).dictionary_body(entries);
    record.finish()
}

/// Class-based dictionary (e.g. ACDBDICTIONARYWDFLT) under `class_number`.
pub fn class_dictionary_record(
    version: DwgVersion,
    class_number: i16,
    handle: u64,
    owner: u64,
    entries: &[(&str, u64)],
) -> Vec<u8> {
    let mut record = RecordWriter::new(version, class_number, handle);
    record.non_entity_prefix(owner).dictionary_body(entries);
    record.finish()
}

/// LINE record; only the common entity prefix is written.
pub fn line_record(version: DwgVersion, handle: u64, owner: u64, color: i16, layer: u64) -> Vec<u8> {
    let mut record = RecordWriter::new(version, 0x13, handle);
    record.entity_prefix(owner, color, layer);
    record.finish()
}
