//! Bit cursor over an in-memory section buffer.

use std::sync::Arc;

use encoding_rs::Encoding;

use super::stream_reader::{CursorPosition, DwgStreamReader};
use crate::error::{DwgError, Result};
use crate::types::DwgVersion;

/// MSB-first bit reader over a shared, read-only byte buffer.
///
/// Several cursors may view the same buffer (object, text and handle
/// streams of one record); each only moves its own position.
#[derive(Debug, Clone)]
pub struct BitCursor {
    data: Arc<[u8]>,
    position: CursorPosition,
    version: DwgVersion,
    encoding: &'static Encoding,
    /// Set when a string stream was requested but the object has none.
    is_empty: bool,
}

impl BitCursor {
    pub fn new(data: impl Into<Arc<[u8]>>, version: DwgVersion) -> Self {
        Self {
            data: data.into(),
            position: CursorPosition::default(),
            version,
            encoding: encoding_rs::WINDOWS_1252,
            is_empty: false,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// A second cursor over the same buffer, at the same position.
    pub fn fork(&self) -> Self {
        Self {
            is_empty: false,
            ..self.clone()
        }
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Bytes left after the current position (ignoring the bit shift).
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position.byte)
    }

    /// Place the cursor at the start of a record's string stream.
    ///
    /// `end_bit` is the last bit of the object data. That bit says
    /// whether strings exist; if so the 16 bits before it hold the
    /// stream size in bits, extended by another 16 bits when the high bit
    /// of the size is set. The stream ends where the size field starts.
    /// Returns the start bit, or `None` when the object has no strings.
    pub fn set_position_by_flag(&mut self, end_bit: u64) -> Result<Option<u64>> {
        self.set_position_in_bits(end_bit);
        if !self.read_bit()? {
            self.is_empty = true;
            return Ok(None);
        }

        let mut field_start = end_bit
            .checked_sub(16)
            .ok_or_else(|| DwgError::InvalidFormat("string stream flag before bit 16".into()))?;
        self.set_position_in_bits(field_start);
        let mut size = self.read_raw_ushort()? as u64;

        if size & 0x8000 != 0 {
            field_start = field_start.checked_sub(16).ok_or_else(|| {
                DwgError::InvalidFormat("string stream size extension before bit 0".into())
            })?;
            self.set_position_in_bits(field_start);
            let hi = self.read_raw_ushort()? as u64;
            size = (size & 0x7FFF) | hi << 15;
        }

        let start = field_start.checked_sub(size).ok_or_else(|| {
            DwgError::InvalidFormat(format!(
                "string stream of {size} bits does not fit before bit {field_start}"
            ))
        })?;
        self.set_position_in_bits(start);
        self.is_empty = false;
        Ok(Some(start))
    }

    fn exhausted(&self, requested: usize) -> DwgError {
        DwgError::BufferExhausted {
            requested,
            available: self.remaining(),
        }
    }
}

impl DwgStreamReader for BitCursor {
    fn version(&self) -> DwgVersion {
        self.version
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn position(&self) -> CursorPosition {
        self.position
    }

    fn seek(&mut self, position: CursorPosition) {
        self.position = position;
    }

    fn read_bit(&mut self) -> Result<bool> {
        let byte = *self
            .data
            .get(self.position.byte)
            .ok_or_else(|| self.exhausted(1))?;
        let bit = byte >> (7 - self.position.shift) & 1 == 1;
        if self.position.shift == 7 {
            self.position.byte += 1;
            self.position.shift = 0;
        } else {
            self.position.shift += 1;
        }
        Ok(bit)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let CursorPosition { byte, shift } = self.position;
        if shift == 0 {
            let value = *self.data.get(byte).ok_or_else(|| self.exhausted(1))?;
            self.position.byte += 1;
            return Ok(value);
        }
        let (Some(&hi), Some(&lo)) = (self.data.get(byte), self.data.get(byte + 1)) else {
            return Err(self.exhausted(2));
        };
        self.position.byte += 1;
        Ok(hi << shift | lo >> (8 - shift))
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        if self.position.shift == 0 {
            let start = self.position.byte;
            let bytes = start
                .checked_add(length)
                .and_then(|end| self.data.get(start..end))
                .ok_or_else(|| self.exhausted(length))?;
            let bytes = bytes.to_vec();
            self.position.byte += length;
            return Ok(bytes);
        }
        if self.remaining() <= length {
            return Err(self.exhausted(length + 1));
        }
        (0..length).map(|_| self.read_byte()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;

    fn cursor(bytes: &[u8]) -> BitCursor {
        BitCursor::new(bytes.to_vec(), DwgVersion::AC1015)
    }

    #[test]
    fn test_read_bits_msb_first() {
        let mut c = cursor(&[0b1010_0000]);
        assert!(c.read_bit().unwrap());
        assert!(!c.read_bit().unwrap());
        assert_eq!(c.read_2bits().unwrap(), 0b10);
        assert_eq!(c.position_in_bits(), 4);
    }

    #[test]
    fn test_unaligned_byte() {
        // 1 bit offset: 0b1_1111111 0b0_0000000 -> 0xFE
        let mut c = cursor(&[0xFF, 0x00]);
        c.read_bit().unwrap();
        assert_eq!(c.read_byte().unwrap(), 0xFE);
        assert_eq!(c.position(), CursorPosition { byte: 1, shift: 1 });
    }

    #[test]
    fn test_bit_short_codes() {
        // 10 -> 0, 11 -> 256, 01 + byte 0x05
        let mut c = cursor(&[0b1011_0100, 0b0001_0100]);
        assert_eq!(c.read_bit_short().unwrap(), 0);
        assert_eq!(c.read_bit_short().unwrap(), 256);
        assert_eq!(c.read_bit_short().unwrap(), 5);
    }

    #[test]
    fn test_bit_long_raw() {
        // 00 then 0x12345678 little-endian, shifted by two bits
        let mut c = cursor(&shift_right(&0x1234_5678u32.to_le_bytes(), 2, 0b00));
        assert_eq!(c.read_bit_long().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_bit_double_defaults() {
        // 01 -> 1.0, 10 -> 0.0
        let mut c = cursor(&[0b0110_0000]);
        assert_eq!(c.read_bit_double().unwrap(), 1.0);
        assert_eq!(c.read_bit_double().unwrap(), 0.0);
    }

    #[test]
    fn test_double_with_default_unchanged() {
        let mut c = cursor(&[0x00]);
        assert_eq!(c.read_bit_double_with_default(2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_double_with_default_patch_low() {
        // 01 then four bytes replacing bytes 0..4 of the default
        let default = 1.0f64;
        let mut expected = default.to_le_bytes();
        expected[..4].copy_from_slice(&[1, 2, 3, 4]);
        let mut c = cursor(&shift_right(&[1, 2, 3, 4], 2, 0b01));
        assert_eq!(
            c.read_bit_double_with_default(default).unwrap(),
            f64::from_le_bytes(expected)
        );
    }

    #[test]
    fn test_modular_char() {
        let mut c = cursor(&[0x82, 0x01]);
        assert_eq!(c.read_modular_char().unwrap(), 0x82);
    }

    #[test]
    fn test_signed_modular_char() {
        let mut c = cursor(&[0x45, 0x05]);
        assert_eq!(c.read_signed_modular_char().unwrap(), -5);
        assert_eq!(c.read_signed_modular_char().unwrap(), 5);
    }

    #[test]
    fn test_modular_short() {
        // 0x0001 with continuation, then 0x0001: 1 | 1 << 15
        let mut c = cursor(&[0x01, 0x80, 0x01, 0x00]);
        assert_eq!(c.read_modular_short().unwrap(), 0x8001);
    }

    #[test]
    fn test_handle_reference_absolute() {
        let mut c = cursor(&[0x51, 0x2A]);
        let href = c.read_handle().unwrap();
        assert_eq!((href.code, href.counter, href.value), (5, 1, 0x2A));
    }

    #[test]
    fn test_handle_reference_relative() {
        let mut c = cursor(&[0xA1, 0x03]);
        assert_eq!(c.handle_reference_resolved(0x10).unwrap(), 0x13);
    }

    #[test]
    fn test_variable_text_legacy() {
        // BS 01 + 0x03, then "abc", shifted by two bits
        let mut c = cursor(&shift_right(&[0x03, b'a', b'b', b'c'], 2, 0b01));
        assert_eq!(c.read_variable_text().unwrap(), "abc");
    }

    #[test]
    fn test_variable_text_utf16() {
        let mut raw = vec![0x02];
        raw.extend_from_slice(&[b'h', 0, b'i', 0]);
        let mut c = BitCursor::new(shift_right(&raw, 2, 0b01), DwgVersion::AC1021);
        assert_eq!(c.read_variable_text().unwrap(), "hi");
    }

    #[test]
    fn test_object_type_r2010() {
        // 01 selector, byte 0x02 -> 0x1F2
        let mut c = BitCursor::new(shift_right(&[0x02], 2, 0b01), DwgVersion::AC1024);
        assert_eq!(c.read_object_type().unwrap(), 0x1F2);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut c = cursor(&[0xAB, 0xCD]);
        c.read_bit().unwrap();
        let snap = c.position();
        let first = c.read_byte().unwrap();
        c.seek(snap);
        assert_eq!(c.read_byte().unwrap(), first);
    }

    #[test]
    fn test_exhaustion_is_error() {
        let mut c = cursor(&[0x01]);
        c.read_byte().unwrap();
        assert!(matches!(c.read_bit(), Err(DwgError::BufferExhausted { .. })));
        let mut c = cursor(&[0x01]);
        assert!(matches!(c.read_raw_long(), Err(DwgError::BufferExhausted { .. })));
    }

    #[test]
    fn test_set_position_by_flag_without_strings() {
        let mut c = cursor(&[0x00, 0x00, 0x00]);
        assert_eq!(c.set_position_by_flag(20).unwrap(), None);
        assert!(c.is_empty());
    }

    #[test]
    fn test_set_position_by_flag_with_strings() {
        // bytes 0..2 hold string data, bytes 2..4 the size (16 bits),
        // flag bit at bit 32
        let data = [0xAA, 0xBB, 0x10, 0x00, 0x80];
        let mut c = cursor(&data);
        assert_eq!(c.set_position_by_flag(32).unwrap(), Some(0));
        assert_eq!(c.read_byte().unwrap(), 0xAA);
    }

    #[test]
    fn test_en_color_true_color() {
        // BS 00 + raw 0x8000 (true colour flag), then BL 00 + 0x00FF0000
        let bytes = pack_short_then_long([0x00, 0x80], 0x00FF_0000u32.to_le_bytes());
        let mut c = BitCursor::new(bytes, DwgVersion::AC1018);
        let color = c.read_en_color().unwrap();
        assert_eq!(color.true_color, Some(0x00FF_0000));
        assert!(!color.has_color_handle);
    }

    #[test]
    fn test_extrusion_and_thickness() {
        // 1 -> default extrusion, 1 -> zero thickness
        let mut c = cursor(&[0b1100_0000]);
        assert_eq!(c.read_bit_extrusion().unwrap(), Vector3::UNIT_Z);
        assert_eq!(c.read_bit_thickness().unwrap(), 0.0);

        // 0, then BD 01 01 10
        let mut c = cursor(&[0b0010_1100]);
        assert_eq!(c.read_bit_extrusion().unwrap(), Vector3::new(1.0, 1.0, 0.0));
    }

    /// Prefix `bytes` with a `prefix_len`-bit code and repack.
    fn shift_right(bytes: &[u8], prefix_len: u32, prefix: u8) -> Vec<u8> {
        let mut bits: Vec<bool> = (0..prefix_len)
            .rev()
            .map(|i| prefix >> i & 1 == 1)
            .collect();
        for b in bytes {
            bits.extend((0..8).rev().map(|i| b >> i & 1 == 1));
        }
        pack(&bits)
    }

    /// A raw BS (`00` + 2 bytes) followed by a raw BL (`00` + 4 bytes).
    fn pack_short_then_long(short: [u8; 2], long: [u8; 4]) -> Vec<u8> {
        let mut bits = vec![false, false];
        for b in short {
            bits.extend((0..8).rev().map(|i| b >> i & 1 == 1));
        }
        bits.extend([false, false]);
        for b in long {
            bits.extend((0..8).rev().map(|i| b >> i & 1 == 1));
        }
        pack(&bits)
    }

    fn pack(bits: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; bits.len().div_ceil(8) + 1];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out
    }
}
