//! Named logical section of a paged (2004+) container.

use super::local_section_map::DwgLocalSectionMap;
use crate::io::dwg::constants::ac18;

/// Describes one named section and its pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwgSectionDescriptor {
    /// Section name (e.g. "AcDb:Header").
    pub name: String,
    pub section_id: i32,
    /// Declared size of the reassembled section.
    pub decompressed_size: u64,
    /// Largest decompressed size of a single page.
    pub max_page_size: u64,
    /// Compression code (1 = none, 2 = compressed) for 2004+ sections.
    pub compressed_code: i32,
    /// 0 = no, 1 = yes, 2 = unknown.
    pub encrypted: i32,
    pub hash_code: u64,
    pub encoding: u64,
    /// Pages stored in the file (inferred zero pages excluded).
    pub page_count: u64,
    /// Pages in offset order, zero pages included once resolved.
    pub local_sections: Vec<DwgLocalSectionMap>,
}

impl DwgSectionDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            section_id: 0,
            decompressed_size: 0,
            max_page_size: ac18::MAX_PAGE_SIZE as u64,
            compressed_code: ac18::COMPRESSED,
            encrypted: 0,
            hash_code: 0,
            encoding: 0,
            page_count: 0,
            local_sections: Vec::new(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_code == ac18::COMPRESSED
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted == 1
    }

    /// Sum of the page sizes, inferred zero pages included.
    pub fn reconstructed_size(&self) -> u64 {
        self.local_sections
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.decompressed_size))
    }

    /// Count of pages that were inferred rather than stored.
    pub fn zero_page_count(&self) -> usize {
        self.local_sections.iter().filter(|p| p.is_empty).count()
    }
}
