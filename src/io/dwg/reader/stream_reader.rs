//! Bit-level read surface shared by single cursors and merged cursors.
//!
//! DWG object data is bit-aligned. Every compound type is built from two
//! primitives, a single bit and a (possibly unaligned) byte, so
//! implementors only supply those plus positioning; everything else is a
//! default method here. A merged cursor overrides the text and handle
//! reads to route them to their own sub-streams.
//!
//! - **B** bit, **BB** 2 bits, **3B** up to 3 bits
//! - **BS** / **BL** / **BLL** compressed short, long, long-long
//! - **BD** compressed double, **DD** double with default
//! - **RC** / **RS** / **RL** / **RD** raw values, little-endian
//! - **MC** / **MS** modular char and short
//! - **H** handle reference
//! - **TV** / **TU** text
//! - **OT** object type

use encoding_rs::Encoding;

use crate::error::{DwgError, Result};
use crate::io::dwg::reference_type::HandleReference;
use crate::types::{DwgVersion, Vector2, Vector3};

/// A cursor location: byte index plus a 0-7 bit shift inside that byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CursorPosition {
    pub byte: usize,
    pub shift: u8,
}

impl CursorPosition {
    pub fn from_bits(bits: u64) -> Self {
        Self {
            byte: (bits >> 3) as usize,
            shift: (bits & 7) as u8,
        }
    }

    pub fn in_bits(&self) -> u64 {
        ((self.byte as u64) << 3) + self.shift as u64
    }
}

/// Colour fields at the start of an entity, as far as the decoder needs
/// them to stay aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityColor {
    pub index: i16,
    pub true_color: Option<u32>,
    pub transparency: Option<u32>,
    /// A colour object handle follows in the handle stream.
    pub has_color_handle: bool,
}

/// Bit-level reader.
pub trait DwgStreamReader {
    fn version(&self) -> DwgVersion;

    /// Code page used for pre-2007 text.
    fn encoding(&self) -> &'static Encoding;

    fn position(&self) -> CursorPosition;

    fn seek(&mut self, position: CursorPosition);

    fn read_bit(&mut self) -> Result<bool>;

    /// Next 8 bits as a byte, whatever the current shift.
    fn read_byte(&mut self) -> Result<u8>;

    // ---------------------------------------------------------------
    // Position
    // ---------------------------------------------------------------

    fn position_in_bits(&self) -> u64 {
        self.position().in_bits()
    }

    fn set_position_in_bits(&mut self, bits: u64) {
        self.seek(CursorPosition::from_bits(bits));
    }

    /// Skip `bytes` whole bytes, keeping the current shift.
    fn advance(&mut self, bytes: usize) {
        let mut pos = self.position();
        pos.byte += bytes;
        self.seek(pos);
    }

    /// Drop any partial byte, then read a raw short (used before CRCs).
    fn reset_shift(&mut self) -> Result<u16> {
        let mut pos = self.position();
        if pos.shift > 0 {
            pos.byte += 1;
            pos.shift = 0;
            self.seek(pos);
        }
        self.read_raw_ushort()
    }

    // ---------------------------------------------------------------
    // Bit codes
    // ---------------------------------------------------------------

    fn read_2bits(&mut self) -> Result<u8> {
        let hi = self.read_bit()? as u8;
        let lo = self.read_bit()? as u8;
        Ok(hi << 1 | lo)
    }

    /// 3B: up to three bits, stopping at the first zero bit.
    fn read_3bits(&mut self) -> Result<u8> {
        let mut value = 0u8;
        for _ in 0..3 {
            let bit = self.read_bit()?;
            value = value << 1 | bit as u8;
            if !bit {
                break;
            }
        }
        Ok(value)
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        (0..length).map(|_| self.read_byte()).collect()
    }

    fn read_bit_short(&mut self) -> Result<i16> {
        match self.read_2bits()? {
            0 => self.read_raw_short(),
            1 => Ok(self.read_byte()? as i16),
            2 => Ok(0),
            _ => Ok(256),
        }
    }

    fn read_bit_long(&mut self) -> Result<i32> {
        match self.read_2bits()? {
            0 => self.read_raw_long(),
            1 => Ok(self.read_byte()? as i32),
            2 => Ok(0),
            _ => Err(DwgError::InvalidFormat("BL code 11 is not used".into())),
        }
    }

    /// BLL: a 3-bit byte count, then that many little-endian bytes.
    fn read_bit_long_long(&mut self) -> Result<u64> {
        let count = self.read_3bits()?;
        let mut value = 0u64;
        for i in 0..count {
            value |= (self.read_byte()? as u64) << (i * 8);
        }
        Ok(value)
    }

    fn read_bit_double(&mut self) -> Result<f64> {
        match self.read_2bits()? {
            0 => self.read_raw_double(),
            1 => Ok(1.0),
            2 => Ok(0.0),
            _ => Err(DwgError::InvalidFormat("BD code 11 is not used".into())),
        }
    }

    /// DD: `00` keeps `default`, `01` patches its low 4 bytes, `10` patches
    /// bytes 4-5 then 0-3, `11` is a full RD.
    fn read_bit_double_with_default(&mut self, default: f64) -> Result<f64> {
        let mut bytes = default.to_le_bytes();
        match self.read_2bits()? {
            0 => return Ok(default),
            1 => {
                for b in &mut bytes[..4] {
                    *b = self.read_byte()?;
                }
            }
            2 => {
                for i in [4, 5, 0, 1, 2, 3] {
                    bytes[i] = self.read_byte()?;
                }
            }
            _ => return self.read_raw_double(),
        }
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_2bit_double(&mut self) -> Result<Vector2> {
        Ok(Vector2::new(self.read_bit_double()?, self.read_bit_double()?))
    }

    fn read_3bit_double(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(
            self.read_bit_double()?,
            self.read_bit_double()?,
            self.read_bit_double()?,
        ))
    }

    fn read_2bit_double_with_default(&mut self, default: Vector2) -> Result<Vector2> {
        Ok(Vector2::new(
            self.read_bit_double_with_default(default.x)?,
            self.read_bit_double_with_default(default.y)?,
        ))
    }

    fn read_3bit_double_with_default(&mut self, default: Vector3) -> Result<Vector3> {
        Ok(Vector3::new(
            self.read_bit_double_with_default(default.x)?,
            self.read_bit_double_with_default(default.y)?,
            self.read_bit_double_with_default(default.z)?,
        ))
    }

    // ---------------------------------------------------------------
    // Raw values
    // ---------------------------------------------------------------

    fn read_raw_char(&mut self) -> Result<u8> {
        self.read_byte()
    }

    fn read_raw_short(&mut self) -> Result<i16> {
        Ok(self.read_raw_ushort()? as i16)
    }

    fn read_raw_ushort(&mut self) -> Result<u16> {
        let lo = self.read_byte()? as u16;
        let hi = self.read_byte()? as u16;
        Ok(lo | hi << 8)
    }

    fn read_raw_long(&mut self) -> Result<i32> {
        Ok(self.read_raw_ulong()? as i32)
    }

    fn read_raw_ulong(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.read_byte()?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_raw_double(&mut self) -> Result<f64> {
        let mut bytes = [0u8; 8];
        for b in &mut bytes {
            *b = self.read_byte()?;
        }
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_2raw_double(&mut self) -> Result<Vector2> {
        Ok(Vector2::new(self.read_raw_double()?, self.read_raw_double()?))
    }

    fn read_3raw_double(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(
            self.read_raw_double()?,
            self.read_raw_double()?,
            self.read_raw_double()?,
        ))
    }

    fn read_sentinel(&mut self) -> Result<[u8; 16]> {
        let mut sentinel = [0u8; 16];
        for b in &mut sentinel {
            *b = self.read_byte()?;
        }
        Ok(sentinel)
    }

    // ---------------------------------------------------------------
    // Modular values
    // ---------------------------------------------------------------

    /// MC: 7-bit groups, low group first, high bit set on all but the last.
    fn read_modular_char(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift < 64 {
                value |= ((byte & 0x7F) as u64) << shift;
            }
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Signed MC: as MC, but bit 0x40 of the final byte is the sign.
    fn read_signed_modular_char(&mut self) -> Result<i64> {
        let mut value = 0i64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if byte & 0x80 == 0 {
                if shift < 64 {
                    value |= ((byte & 0x3F) as i64) << shift;
                }
                return Ok(if byte & 0x40 != 0 { -value } else { value });
            }
            if shift < 64 {
                value |= ((byte & 0x7F) as i64) << shift;
            }
            shift += 7;
        }
    }

    /// MS: little-endian 16-bit words carrying 15 bits each; the high
    /// bit of a word means another word follows.
    fn read_modular_short(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0u32;
        loop {
            let word = self.read_raw_ushort()?;
            if shift < 32 {
                value |= ((word & 0x7FFF) as u32) << shift;
            }
            if word & 0x8000 == 0 {
                return Ok(value);
            }
            shift += 15;
        }
    }

    // ---------------------------------------------------------------
    // Handles
    // ---------------------------------------------------------------

    /// H: the stored form, unresolved.
    fn read_handle(&mut self) -> Result<HandleReference> {
        let form = self.read_byte()?;
        let code = form >> 4;
        let counter = form & 0x0F;
        if counter > 8 {
            return Err(DwgError::InvalidFormat(format!(
                "handle byte count {counter} exceeds 8"
            )));
        }
        let mut value = 0u64;
        for _ in 0..counter {
            value = value << 8 | self.read_byte()? as u64;
        }
        Ok(HandleReference::new(code, counter, value))
    }

    /// H resolved against `reference_handle` (the owning object's handle).
    fn handle_reference_resolved(&mut self, reference_handle: u64) -> Result<u64> {
        let href = self.read_handle()?;
        if href.reference_type().is_none() {
            return Err(DwgError::InvalidFormat(format!(
                "invalid handle reference code {:#X}",
                href.code
            )));
        }
        Ok(href.resolve(reference_handle))
    }

    /// H with no reference handle (absolute forms).
    fn handle_reference(&mut self) -> Result<u64> {
        self.handle_reference_resolved(0)
    }

    // ---------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------

    /// TV: BS length then code-page bytes, or from 2007 on a BS character
    /// count then UTF-16LE.
    fn read_variable_text(&mut self) -> Result<String> {
        let length = self.read_bit_short()?;
        if length <= 0 {
            return Ok(String::new());
        }
        if self.version() >= DwgVersion::AC1021 {
            let bytes = self.read_bytes(length as usize * 2)?;
            Ok(decode_text(&bytes, encoding_rs::UTF_16LE))
        } else {
            let bytes = self.read_bytes(length as usize)?;
            Ok(decode_text(&bytes, self.encoding()))
        }
    }

    /// TU-style text with a raw short length; pre-2007 it also carries its
    /// own code page byte.
    fn read_text_unicode(&mut self) -> Result<String> {
        let length = self.read_raw_short()?;
        if self.version() >= DwgVersion::AC1021 {
            if length <= 0 {
                return Ok(String::new());
            }
            let bytes = self.read_bytes(length as usize * 2)?;
            return Ok(decode_text(&bytes, encoding_rs::UTF_16LE));
        }
        let code_page = self.read_byte()?;
        if length <= 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes(length as usize)?;
        Ok(decode_text(&bytes, encoding_from_code_page(code_page as u16)))
    }

    // ---------------------------------------------------------------
    // Compound fields
    // ---------------------------------------------------------------

    /// OT: from 2010 a 2-bit selector, otherwise a BS.
    fn read_object_type(&mut self) -> Result<i16> {
        if self.version() >= DwgVersion::AC1024 {
            match self.read_2bits()? {
                0 => Ok(self.read_byte()? as i16),
                1 => Ok(0x1F0 + self.read_byte()? as i16),
                _ => self.read_raw_short(),
            }
        } else {
            self.read_bit_short()
        }
    }

    /// BE: from 2000 a set bit means the default (0, 0, 1).
    fn read_bit_extrusion(&mut self) -> Result<Vector3> {
        if self.version() >= DwgVersion::AC1015 && self.read_bit()? {
            return Ok(Vector3::UNIT_Z);
        }
        self.read_3bit_double()
    }

    /// BT: from 2000 a set bit means zero thickness.
    fn read_bit_thickness(&mut self) -> Result<f64> {
        if self.version() >= DwgVersion::AC1015 && self.read_bit()? {
            return Ok(0.0);
        }
        self.read_bit_double()
    }

    /// ENC: entity colour (2004+ flags word, earlier a plain index).
    fn read_en_color(&mut self) -> Result<EntityColor> {
        let size = self.read_bit_short()?;
        if self.version() < DwgVersion::AC1018 {
            return Ok(EntityColor {
                index: size,
                ..Default::default()
            });
        }
        let mut color = EntityColor::default();
        if size == 0 {
            return Ok(color);
        }
        let flags = size as u16 & 0xFF00;
        if flags & 0x4000 != 0 {
            color.has_color_handle = true;
        } else if flags & 0x8000 != 0 {
            color.true_color = Some(self.read_bit_long()? as u32);
        } else {
            color.index = size & 0x0FFF;
        }
        if flags & 0x2000 != 0 {
            color.transparency = Some(self.read_bit_long()? as u32);
        }
        Ok(color)
    }
}

fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.trim_end_matches('\0').to_string()
}

/// Text encoding for a DWG code page number (as stored in the file header).
pub fn encoding_from_code_page(code_page: u16) -> &'static Encoding {
    match code_page {
        3 => encoding_rs::ISO_8859_2,
        4 => encoding_rs::ISO_8859_3,
        5 => encoding_rs::ISO_8859_4,
        6 => encoding_rs::ISO_8859_5,
        7 => encoding_rs::ISO_8859_6,
        8 => encoding_rs::ISO_8859_7,
        9 => encoding_rs::ISO_8859_8,
        10 | 33 => encoding_rs::WINDOWS_1254,
        22 | 38 => encoding_rs::SHIFT_JIS,
        23 => encoding_rs::MACINTOSH,
        24 | 41 => encoding_rs::BIG5,
        25 | 40 => encoding_rs::EUC_KR,
        27 => encoding_rs::IBM866,
        28 => encoding_rs::WINDOWS_1250,
        29 => encoding_rs::WINDOWS_1251,
        31 | 39 => encoding_rs::GBK,
        32 => encoding_rs::WINDOWS_1253,
        34 => encoding_rs::WINDOWS_1255,
        35 => encoding_rs::WINDOWS_1256,
        36 => encoding_rs::WINDOWS_1257,
        37 => encoding_rs::WINDOWS_874,
        44 => encoding_rs::WINDOWS_1258,
        _ => encoding_rs::WINDOWS_1252,
    }
}
