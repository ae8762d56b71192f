//! DWG file header structures.
//!
//! The file header carries version information, the locator records
//! (R13-2000) or the page map and named section descriptors (2004+), and
//! a few preamble fields such as the preview address and code page.

mod compressed_metadata;
mod local_section_map;
mod section_descriptor;
mod section_locator;

pub use compressed_metadata::Dwg21CompressedMetadata;
pub use local_section_map::DwgLocalSectionMap;
pub use section_descriptor::DwgSectionDescriptor;
pub use section_locator::DwgSectionLocatorRecord;

use ahash::AHashMap;
use encoding_rs::Encoding;
use indexmap::IndexMap;

use super::constants::{ac15, ac21};
use super::reader::stream_reader::encoding_from_code_page;
use crate::types::{DwgVersion, Generation};

/// DWG file header, one variant per container generation.
#[derive(Debug, Clone)]
pub enum DwgFileHeader {
    /// R13-2000 (AC1012/AC1014/AC1015): flat locator table
    AC15(DwgFileHeaderAC15),
    /// 2004, 2010, 2013, 2018 (AC1018/AC1024/AC1027/AC1032): paged sections
    AC18(DwgFileHeaderAC18),
    /// 2007 (AC1021): striped and paged sections
    AC21(DwgFileHeaderAC21),
}

impl DwgFileHeader {
    /// Empty header of the right generation for `version`.
    pub fn create(version: DwgVersion) -> Self {
        match version.generation() {
            Generation::Ac15 => DwgFileHeader::AC15(DwgFileHeaderAC15::new(version)),
            Generation::Ac18 => DwgFileHeader::AC18(DwgFileHeaderAC18::new(version)),
            Generation::Ac21 => DwgFileHeader::AC21(DwgFileHeaderAC21::new(version)),
        }
    }

    pub fn version(&self) -> DwgVersion {
        self.preamble().version
    }

    pub fn generation(&self) -> Generation {
        self.version().generation()
    }

    pub fn preamble(&self) -> &DwgPreamble {
        match self {
            DwgFileHeader::AC15(h) => &h.preamble,
            DwgFileHeader::AC18(h) => &h.preamble,
            DwgFileHeader::AC21(h) => &h.base.preamble,
        }
    }

    pub fn preview_address(&self) -> i64 {
        self.preamble().preview_address
    }

    pub fn maintenance_version(&self) -> u8 {
        self.preamble().maintenance_version
    }

    /// Encoding for legacy single-byte text, from the drawing code page.
    pub fn encoding(&self) -> &'static Encoding {
        encoding_from_code_page(self.preamble().drawing_code_page)
    }

    /// File offset of the page map: the locator table for R13-2000.
    pub fn page_map_address(&self) -> u64 {
        match self {
            DwgFileHeader::AC15(_) => ac15::RECORD_COUNT_OFFSET,
            DwgFileHeader::AC18(h) => h.page_map_address,
            DwgFileHeader::AC21(h) => h.base.page_map_address,
        }
    }

    /// Page number of the section map (0 for R13-2000).
    pub fn section_map_id(&self) -> u64 {
        match self {
            DwgFileHeader::AC15(_) => 0,
            DwgFileHeader::AC18(h) => h.section_map_id as u64,
            DwgFileHeader::AC21(h) => h.metadata.sections_map_id,
        }
    }

    /// CRC seed from the metadata block (0 for R13-2000).
    pub fn crc_seed(&self) -> u64 {
        match self {
            DwgFileHeader::AC15(_) => 0,
            DwgFileHeader::AC18(h) => h.crc_seed as u64,
            DwgFileHeader::AC21(h) => h.metadata.crc_seed,
        }
    }

    /// Named section descriptor (2004+).
    pub fn descriptor(&self, name: &str) -> Option<&DwgSectionDescriptor> {
        match self {
            DwgFileHeader::AC15(_) => None,
            DwgFileHeader::AC18(h) => h.descriptors.get(name),
            DwgFileHeader::AC21(h) => h.base.descriptors.get(name),
        }
    }

    /// Names of every section the header can locate, in directory order.
    pub fn section_names(&self) -> Vec<String> {
        match self {
            DwgFileHeader::AC15(h) => {
                let mut records: Vec<_> = h.records.values().collect();
                records.sort_by_key(|r| r.number);
                records
                    .into_iter()
                    .filter_map(|r| r.section_name())
                    .map(str::to_string)
                    .collect()
            }
            DwgFileHeader::AC18(h) => h.descriptors.keys().cloned().collect(),
            DwgFileHeader::AC21(h) => h.base.descriptors.keys().cloned().collect(),
        }
    }
}

/// Fields read from the clear preamble of every generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwgPreamble {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    /// File offset of the preview image, or -1.
    pub preview_address: i64,
    pub drawing_code_page: u16,
}

impl DwgPreamble {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            version,
            maintenance_version: 0,
            preview_address: -1,
            drawing_code_page: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AC15 (R13-2000) File Header
// ---------------------------------------------------------------------------

/// R13-2000 header: locator records mapping section index to file range.
#[derive(Debug, Clone)]
pub struct DwgFileHeaderAC15 {
    pub preamble: DwgPreamble,
    pub app_version: u8,
    pub app_maintenance_version: u8,
    /// CRC-16 stored after the locator table.
    pub stored_crc: u16,
    pub records: AHashMap<i32, DwgSectionLocatorRecord>,
}

impl DwgFileHeaderAC15 {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            preamble: DwgPreamble::new(version),
            app_version: 0,
            app_maintenance_version: 0,
            stored_crc: 0,
            records: AHashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AC18 (2004+) File Header
// ---------------------------------------------------------------------------

/// 2004+ header: decrypted metadata block, page map and section map.
#[derive(Debug, Clone)]
pub struct DwgFileHeaderAC18 {
    pub preamble: DwgPreamble,

    pub dwg_version: u8,
    pub app_release_version: u8,
    pub security_type: i32,
    pub summary_info_addr: i32,
    pub vba_project_addr: i32,

    /// "AcFssFcAJMB" marker from the decrypted block.
    pub file_id: String,
    pub root_tree_node_gap: i32,
    pub lowermost_left_tree_node_gap: i32,
    pub lowermost_right_tree_node_gap: i32,
    pub last_page_id: i32,
    pub last_section_addr: u64,
    pub second_header_addr: u64,
    pub gap_amount: u32,
    pub section_amount: u32,
    pub section_page_map_id: u32,
    /// Absolute file offset of the page map (stored value + 0x100).
    pub page_map_address: u64,
    pub section_map_id: u32,
    pub section_array_page_size: u32,
    pub gap_array_size: u32,
    pub crc_seed: u32,

    /// Page map: page number to file range.
    pub records: AHashMap<i32, DwgSectionLocatorRecord>,
    /// Section map in file order.
    pub descriptors: IndexMap<String, DwgSectionDescriptor>,
}

impl DwgFileHeaderAC18 {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            preamble: DwgPreamble::new(version),
            dwg_version: 0,
            app_release_version: 0,
            security_type: 0,
            summary_info_addr: 0,
            vba_project_addr: 0,
            file_id: String::new(),
            root_tree_node_gap: 0,
            lowermost_left_tree_node_gap: 0,
            lowermost_right_tree_node_gap: 0,
            last_page_id: 0,
            last_section_addr: 0,
            second_header_addr: 0,
            gap_amount: 0,
            section_amount: 0,
            section_page_map_id: 0,
            page_map_address: 0,
            section_map_id: 0,
            section_array_page_size: 0,
            gap_array_size: 0,
            crc_seed: 0,
            records: AHashMap::new(),
            descriptors: IndexMap::new(),
        }
    }

    pub fn add_descriptor(&mut self, descriptor: DwgSectionDescriptor) {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }
}

// ---------------------------------------------------------------------------
// AC21 (2007) File Header
// ---------------------------------------------------------------------------

/// 2007 header: AC18 layout plus the striped metadata block.
#[derive(Debug, Clone)]
pub struct DwgFileHeaderAC21 {
    pub base: DwgFileHeaderAC18,
    pub metadata: Dwg21CompressedMetadata,
    /// Five u64 check values trailing the striped block (not verified).
    pub check_values: [u64; 5],
}

impl DwgFileHeaderAC21 {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            base: DwgFileHeaderAC18::new(version),
            metadata: Dwg21CompressedMetadata::default(),
            check_values: [0; 5],
        }
    }

    /// Absolute file offset of the page map, `None` when the stored
    /// offset does not fit after rebasing.
    pub fn page_map_address(&self) -> Option<u64> {
        self.metadata
            .pages_map_offset
            .checked_add(ac21::DATA_PAGE_BASE_OFFSET)
    }
}
