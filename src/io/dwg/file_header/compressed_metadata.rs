//! Metadata block of the 2007 file header.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DwgError, Result};

macro_rules! metadata_fields {
    ($($field:ident),+ $(,)?) => {
        /// The 34 little-endian u64 fields recovered from the striped,
        /// optionally compressed 2007 header block.
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct Dwg21CompressedMetadata {
            $(pub $field: u64,)+
        }

        impl Dwg21CompressedMetadata {
            /// Number of u64 fields.
            pub const FIELD_COUNT: usize = [$(stringify!($field)),+].len();

            /// Parse the fields in file order from `data`.
            pub fn parse(data: &[u8]) -> Result<Self> {
                if data.len() < Self::FIELD_COUNT * 8 {
                    return Err(DwgError::BufferExhausted {
                        requested: Self::FIELD_COUNT * 8,
                        available: data.len(),
                    });
                }
                let mut cursor = Cursor::new(data);
                Ok(Self {
                    $($field: cursor.read_u64::<LittleEndian>()?,)+
                })
            }

            /// Fields in file order.
            pub fn to_fields(&self) -> Vec<u64> {
                vec![$(self.$field),+]
            }
        }
    };
}

metadata_fields! {
    header_size,
    file_size,
    pages_map_crc_compressed,
    pages_map_correction_factor,
    pages_map_crc_seed,
    map2_offset,
    map2_id,
    pages_map_offset,
    header2_offset,
    pages_map_size_compressed,
    pages_map_size_uncompressed,
    pages_amount,
    pages_max_id,
    sections_map2_id,
    pages_map_id,
    unknow_0x20,
    unknow_0x40,
    pages_map_crc_uncompressed,
    unknown_0xf800,
    unknown_4,
    unknown_1,
    sections_amount,
    sections_map_crc_uncompressed,
    sections_map_size_compressed,
    sections_map_id,
    sections_map_size_uncompressed,
    sections_map_crc_compressed,
    sections_map_correction_factor,
    sections_map_crc_seed,
    stream_version,
    crc_seed,
    crc_seed_encoded,
    random_seed,
    header_crc64,
}
