//! Checksums used by the DWG container.
//!
//! - **CRC-16** (reflected polynomial 0xA001, what DWG documents call
//!   "CRC-8"): object records, handle-index chunks and the class table,
//!   seeded with [`CRC16_SEED`].
//! - **CRC-32** (IEEE, 0xEDB88320): the 2004+ obfuscated metadata block,
//!   seeded with zero.

/// Seed for object-record and handle-chunk CRCs.
pub const CRC16_SEED: u16 = 0xC0C1;

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub static CRC16_TABLE: [u16; 256] = build_crc16_table();
pub static CRC32_TABLE: [u32; 256] = build_crc32_table();

/// Running 16-bit CRC over `data`, starting from `seed`.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &byte| {
        (crc >> 8) ^ CRC16_TABLE[(byte ^ crc as u8) as usize]
    })
}

/// CRC-32 with the usual pre/post inversion; `seed` is a previous result
/// (zero for a fresh computation).
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    !data.iter().fold(!seed, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc as u8) ^ byte) as usize]
    })
}
