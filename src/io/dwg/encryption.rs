//! Obfuscation layers of the 2004+ container.
//!
//! Two schemes are in use:
//!
//! 1. The 0x6C-byte metadata block at 0x80 is XOR'd with a fixed key
//!    stream produced by a linear congruential generator seeded with 1.
//! 2. Every data page starts with eight little-endian `i32` fields, each
//!    XOR'd with `0x4164536B ^ page_seeker`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use once_cell::sync::Lazy;
use std::io::Cursor;

use super::constants::ac18;
use crate::error::Result;

/// Key stream for the metadata block.
pub static HEADER_KEY: Lazy<[u8; ac18::ENCRYPTED_HEADER_SIZE]> = Lazy::new(|| {
    let mut key = [0u8; ac18::ENCRYPTED_HEADER_SIZE];
    let mut seed: u32 = 1;
    for byte in key.iter_mut() {
        seed = seed.wrapping_mul(0x343F_D).wrapping_add(0x269E_C3);
        *byte = (seed >> 16) as u8;
    }
    key
});

/// Remove (or apply, the XOR is symmetric) the metadata block obfuscation.
pub fn xor_header_block(block: &mut [u8]) {
    for (byte, key) in block.iter_mut().zip(HEADER_KEY.iter()) {
        *byte ^= key;
    }
}

/// Clear-text fields of a 2004+ data page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataPageHeader {
    /// `0x4163043B` for section data pages.
    pub page_type: i32,
    pub section_number: i32,
    pub compressed_size: i32,
    pub page_size: i32,
    /// Offset of this page inside the decompressed section.
    pub start_offset: i32,
    pub header_checksum: i32,
    pub data_checksum: i32,
    pub unknown: i32,
}

impl DataPageHeader {
    fn mask(seeker: u64) -> i32 {
        (ac18::DECRYPTION_MASK ^ seeker as u32) as i32
    }

    /// Decode a header read at file offset `seeker`.
    pub fn decrypt(data: &[u8; ac18::DATA_PAGE_HEADER_SIZE], seeker: u64) -> Result<Self> {
        let mask = Self::mask(seeker);
        let mut cursor = Cursor::new(&data[..]);
        let mut next = || -> Result<i32> { Ok(cursor.read_i32::<LittleEndian>()? ^ mask) };
        Ok(DataPageHeader {
            page_type: next()?,
            section_number: next()?,
            compressed_size: next()?,
            page_size: next()?,
            start_offset: next()?,
            header_checksum: next()?,
            data_checksum: next()?,
            unknown: next()?,
        })
    }

    /// Obfuscate this header for storage at `seeker`.
    pub fn encrypt(&self, seeker: u64) -> Result<[u8; ac18::DATA_PAGE_HEADER_SIZE]> {
        let mask = Self::mask(seeker);
        let mut out = [0u8; ac18::DATA_PAGE_HEADER_SIZE];
        let mut cursor = Cursor::new(&mut out[..]);
        for field in [
            self.page_type,
            self.section_number,
            self.compressed_size,
            self.page_size,
            self.start_offset,
            self.header_checksum,
            self.data_checksum,
            self.unknown,
        ] {
            cursor.write_i32::<LittleEndian>(field ^ mask)?;
        }
        Ok(out)
    }
}
