//! One page of a logical section.

/// A page within a section, placed at `offset` of the section's
/// decompressed bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DwgLocalSectionMap {
    /// Inferred all-zero page; never stored in the file.
    pub is_empty: bool,
    pub page_number: i32,
    /// Stored byte count (compressed when the section is compressed).
    pub compressed_size: u64,
    pub decompressed_size: u64,
    /// Offset into the section's decompressed stream.
    pub offset: u64,
    /// Absolute file offset of the page, resolved through the page map.
    pub seeker: u64,
    /// Physical page size from the page map (2007 pages are striped).
    pub page_size: u64,
    pub checksum: u64,
    pub crc: u64,
}

impl DwgLocalSectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// An inferred page of `size` zero bytes at `offset`.
    pub fn zero_fill(offset: u64, size: u64) -> Self {
        Self {
            is_empty: true,
            decompressed_size: size,
            offset,
            ..Default::default()
        }
    }

    /// First offset after this page, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.decompressed_size)
    }
}
