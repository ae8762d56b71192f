//! Magic numbers, sentinels and well-known section names.

/// Names of the logical sections the readers look up.
pub mod section_names {
    pub const HEADER: &str = "AcDb:Header";
    pub const CLASSES: &str = "AcDb:Classes";
    /// Handle index (handle → record offset)
    pub const HANDLES: &str = "AcDb:Handles";
    /// Object records
    pub const ACDB_OBJECTS: &str = "AcDb:AcDbObjects";
    pub const OBJ_FREE_SPACE: &str = "AcDb:ObjFreeSpace";
    pub const TEMPLATE: &str = "AcDb:Template";
    pub const AUX_HEADER: &str = "AcDb:AuxHeader";
    pub const SUMMARY_INFO: &str = "AcDb:SummaryInfo";
    pub const PREVIEW: &str = "AcDb:Preview";

    /// Record number of a section in the R13-2000 locator table.
    pub fn locator_index(name: &str) -> Option<i32> {
        match name {
            HEADER => Some(0),
            CLASSES => Some(1),
            HANDLES => Some(2),
            OBJ_FREE_SPACE => Some(3),
            TEMPLATE => Some(4),
            AUX_HEADER => Some(5),
            _ => None,
        }
    }

    /// Inverse of [`locator_index`].
    pub fn locator_name(index: i32) -> Option<&'static str> {
        [HEADER, CLASSES, HANDLES, OBJ_FREE_SPACE, TEMPLATE, AUX_HEADER]
            .get(usize::try_from(index).ok()?)
            .copied()
    }
}

/// 16-byte section markers.
pub mod sentinels {
    pub const CLASSES_START: [u8; 16] = [
        0x8D, 0xA1, 0xC4, 0xB8, 0xC4, 0xA9, 0xF8, 0xC5, 0xC0, 0xDC, 0xF4, 0x5F, 0xE7, 0xCF,
        0xB6, 0x8A,
    ];
    pub const CLASSES_END: [u8; 16] = [
        0x72, 0x5E, 0x3B, 0x47, 0x3B, 0x56, 0x07, 0x3A, 0x3F, 0x23, 0x0B, 0xA0, 0x18, 0x30,
        0x49, 0x75,
    ];
    /// Closes the R13-2000 file header.
    pub const FILE_HEADER_END_AC15: [u8; 16] = [
        0x95, 0xA0, 0x4E, 0x28, 0x99, 0x82, 0x1A, 0xE5, 0x5E, 0x41, 0xE0, 0x5F, 0x9D, 0x3A,
        0x4D, 0x00,
    ];
}

/// R13-2000 container.
pub mod ac15 {
    /// Offset of the locator record count.
    pub const RECORD_COUNT_OFFSET: u64 = 0x15;
}

/// 2004+ container.
pub mod ac18 {
    /// Offset of the obfuscated metadata block.
    pub const ENCRYPTED_HEADER_OFFSET: u64 = 0x80;
    pub const ENCRYPTED_HEADER_SIZE: usize = 0x6C;
    /// Position of the CRC-32 inside the decrypted block.
    pub const HEADER_CRC_OFFSET: usize = 0x68;
    pub const FILE_ID: &[u8; 12] = b"AcFssFcAJMB\0";
    /// Base of page-map running offsets and of the page map address.
    pub const PAGE_BASE_OFFSET: u64 = 0x100;
    /// XOR mask for data page headers (combined with the page seeker).
    pub const DECRYPTION_MASK: u32 = 0x4164_536B;
    pub const MAX_PAGE_SIZE: usize = 0x7400;
    pub const DATA_PAGE_HEADER_SIZE: usize = 0x20;
    pub const SYSTEM_PAGE_HEADER_SIZE: usize = 0x14;
    pub const PAGE_TYPE_DATA: u32 = 0x4163_043B;
    pub const PAGE_TYPE_PAGE_MAP: u32 = 0x4163_0E3B;
    pub const PAGE_TYPE_SECTION_MAP: u32 = 0x4163_003B;
    /// Compression code meaning "pages are LZ77 compressed".
    pub const COMPRESSED: i32 = 2;
}

/// 2007 container.
pub mod ac21 {
    /// Data pages are addressed relative to this file offset.
    pub const DATA_PAGE_BASE_OFFSET: u64 = 0x480;
    pub const RS_ENCODED_BLOCK_SIZE: usize = 0x400;
    /// Striped part of the header block; the rest holds check values.
    pub const RS_HEADER_DATA_SIZE: usize = 0x3D8;
    pub const DECOMPRESSED_HEADER_SIZE: usize = 0x110;
    /// Stripe factor of the header block.
    pub const HEADER_STRIPE_FACTOR: usize = 3;
    /// Data bytes per stripe for system pages.
    pub const RS_BLOCK_SIZE: usize = 239;
    /// Data bytes per stripe for section data pages.
    pub const RS_DATA_BLOCK_SIZE: usize = 251;
    /// Full Reed-Solomon codeword length (data plus parity).
    pub const RS_CODEWORD_SIZE: usize = 255;
}

/// Handle index section.
pub mod handle_section {
    /// Largest body of one handle chunk.
    pub const MAX_CHUNK_SIZE: usize = 2032;
}
