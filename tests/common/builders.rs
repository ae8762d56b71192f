//! Whole-file builders for the three container generations.
//!
//! Each builder takes named section payloads and lays them out the way the
//! header reader and section directory look for them. Object records are
//! placed by the caller; their offsets come back so the handle section can
//! point at them.

#![allow(dead_code)]

use acaddwg::io::dwg::constants::{ac18, ac21, sentinels};
use acaddwg::io::dwg::crc::crc32;
use acaddwg::io::dwg::encryption::{xor_header_block, DataPageHeader};
use acaddwg::io::dwg::reed_solomon;
use acaddwg::io::dwg::Dwg21CompressedMetadata;
use acaddwg::DwgVersion;

use super::lz77_ac18_literals;

/// Code page 30: ANSI 1252.
pub const CODE_PAGE_ANSI_1252: u16 = 30;

// ===========================================================================
// R13-2000
// ===========================================================================

/// Flat R13-2000 file: locator table, then header, classes and object
/// records, then the handle section.
#[derive(Debug, Clone)]
pub struct Ac15File {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    pub header_section: Vec<u8>,
    pub classes_section: Vec<u8>,
    /// `(handle, record bytes)` in file order.
    pub records: Vec<(u64, Vec<u8>)>,
    /// Extra index entries pointing anywhere (e.g. past the end).
    pub extra_index: Vec<(u64, i64)>,
}

/// A built file and where its records landed.
#[derive(Debug, Clone)]
pub struct BuiltFile {
    pub bytes: Vec<u8>,
    /// `(handle, offset)` as written to the handle section.
    pub index: Vec<(u64, i64)>,
}

impl Ac15File {
    pub fn new(version: DwgVersion) -> Self {
        assert!(version <= DwgVersion::AC1015);
        Self {
            version,
            maintenance_version: 0,
            header_section: vec![0xCF; 0x20],
            classes_section: super::classes_section(version, &[]),
            records: Vec::new(),
            extra_index: Vec::new(),
        }
    }

    pub fn record(mut self, handle: u64, bytes: Vec<u8>) -> Self {
        self.records.push((handle, bytes));
        self
    }

    pub fn build(&self) -> BuiltFile {
        const RECORDS: usize = 3;
        let locator_end = 0x19 + RECORDS * 9;
        let header_end = locator_end + 2 + 16;

        let header_at = header_end;
        let classes_at = header_at + self.header_section.len();
        let mut cursor = classes_at + self.classes_section.len();

        let mut body = Vec::new();
        body.extend_from_slice(&self.header_section);
        body.extend_from_slice(&self.classes_section);

        let mut index = self.extra_index.clone();
        for (handle, record) in &self.records {
            index.push((*handle, cursor as i64));
            body.extend_from_slice(record);
            cursor += record.len();
        }
        let handles = super::handles_section(&index);
        let handles_at = cursor;
        body.extend_from_slice(&handles);

        let mut out = self.version.to_string().into_bytes();
        let mut flags = [0u8; 7];
        flags[5] = self.maintenance_version;
        out.extend_from_slice(&flags);
        out.extend_from_slice(&(-1i32).to_le_bytes());
        out.extend_from_slice(&[0x1F, 0x00]);
        out.extend_from_slice(&CODE_PAGE_ANSI_1252.to_le_bytes());
        out.extend_from_slice(&(RECORDS as i32).to_le_bytes());
        for (number, at, size) in [
            (0u8, header_at, self.header_section.len()),
            (1, classes_at, self.classes_section.len()),
            (2, handles_at, handles.len()),
        ] {
            out.push(number);
            out.extend_from_slice(&(at as i32).to_le_bytes());
            out.extend_from_slice(&(size as i32).to_le_bytes());
        }
        // header CRC is not verified
        out.extend_from_slice(&[0x00, 0x00]);
        out.extend_from_slice(&sentinels::FILE_HEADER_END_AC15);
        assert_eq!(out.len(), header_end);

        out.extend_from_slice(&body);
        BuiltFile { bytes: out, index }
    }
}

// ===========================================================================
// 2004+
// ===========================================================================

/// A named section of a paged container.
#[derive(Debug, Clone)]
pub struct PagedSection {
    pub name: String,
    pub data: Vec<u8>,
    pub max_page_size: usize,
    /// LZ77 (literal runs) instead of stored pages.
    pub compressed: bool,
    /// Leave all-zero pages out of the file.
    pub omit_zero_pages: bool,
}

impl PagedSection {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
            max_page_size: ac18::MAX_PAGE_SIZE,
            compressed: false,
            omit_zero_pages: false,
        }
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    pub fn omit_zero_pages(mut self) -> Self {
        self.omit_zero_pages = true;
        self
    }

    /// `(offset, bytes)` of every page that is stored.
    fn stored_pages(&self) -> Vec<(usize, &[u8])> {
        self.data
            .chunks(self.max_page_size)
            .enumerate()
            .map(|(i, chunk)| (i * self.max_page_size, chunk))
            .filter(|(_, chunk)| !(self.omit_zero_pages && chunk.iter().all(|&b| b == 0)))
            .collect()
    }
}

/// Section map entry for one stored page.
struct PlacedPage {
    number: i32,
    stored_size: usize,
    offset: usize,
}

/// Fields of the 0x80 metadata block a test may want to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagedLayout {
    pub page_map_address: u64,
    pub section_map_id: u32,
    pub crc: u32,
}

/// 2004-style file: preamble, obfuscated metadata block, data pages,
/// section map page, page map page.
#[derive(Clone)]
pub struct Ac18File {
    pub version: DwgVersion,
    pub maintenance_version: u8,
    pub sections: Vec<PagedSection>,
    /// Compress the section map with literal runs.
    pub compress_section_map: bool,
    /// Applied to the section map body before it is paged.
    pub patch_section_map: Option<fn(&mut Vec<u8>)>,
}

impl Ac18File {
    pub fn new(version: DwgVersion) -> Self {
        assert!(matches!(version.generation(), acaddwg::Generation::Ac18));
        Self {
            version,
            maintenance_version: 0,
            sections: Vec::new(),
            compress_section_map: true,
            patch_section_map: None,
        }
    }

    pub fn section(mut self, section: PagedSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_section_map(mut self, patch: fn(&mut Vec<u8>)) -> Self {
        self.patch_section_map = Some(patch);
        self
    }

    pub fn build(&self) -> (Vec<u8>, PagedLayout) {
        let mut pages: Vec<(i32, Vec<u8>)> = Vec::new();
        let mut map_entries: Vec<Vec<PlacedPage>> = Vec::new();
        let mut seeker = ac18::PAGE_BASE_OFFSET as usize;
        let mut next_number = 1;

        for section in &self.sections {
            let mut placed = Vec::new();
            for (offset, chunk) in section.stored_pages() {
                let stored = if section.compressed {
                    lz77_ac18_literals(chunk)
                } else {
                    chunk.to_vec()
                };
                let header = DataPageHeader {
                    page_type: ac18::PAGE_TYPE_DATA as i32,
                    section_number: map_entries.len() as i32 + 1,
                    compressed_size: stored.len() as i32,
                    page_size: chunk.len() as i32,
                    start_offset: offset as i32,
                    ..Default::default()
                };
                let mut page = header.encrypt(seeker as u64).expect("page header").to_vec();
                page.extend_from_slice(&stored);

                placed.push(PlacedPage {
                    number: next_number,
                    stored_size: stored.len(),
                    offset,
                });
                seeker += page.len();
                pages.push((next_number, page));
                next_number += 1;
            }
            map_entries.push(placed);
        }

        // Section map
        let section_map_id = next_number;
        next_number += 1;
        let mut map = Vec::new();
        for value in [self.sections.len() as i32, 0x02, 0x7400, 0x00, self.sections.len() as i32] {
            map.extend_from_slice(&value.to_le_bytes());
        }
        for (i, (section, placed)) in self.sections.iter().zip(&map_entries).enumerate() {
            map.extend_from_slice(&(section.data.len() as u64).to_le_bytes());
            for value in [
                placed.len() as i32,
                section.max_page_size as i32,
                1,
                if section.compressed { 2 } else { 1 },
                i as i32 + 1,
                0,
            ] {
                map.extend_from_slice(&value.to_le_bytes());
            }
            let mut name = [0u8; 64];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());
            map.extend_from_slice(&name);
            for page in placed {
                map.extend_from_slice(&page.number.to_le_bytes());
                map.extend_from_slice(&(page.stored_size as i32).to_le_bytes());
                map.extend_from_slice(&(page.offset as u64).to_le_bytes());
            }
        }
        if let Some(patch) = self.patch_section_map {
            patch(&mut map);
        }
        let section_map = system_page(ac18::PAGE_TYPE_SECTION_MAP, &map, self.compress_section_map);
        seeker += section_map.len();
        pages.push((section_map_id, section_map));

        // Page map: lists every page, itself last
        let page_map_id = next_number;
        let page_map_address = seeker as u64;
        let page_map_len = ac18::SYSTEM_PAGE_HEADER_SIZE + (pages.len() + 1) * 8;
        let mut page_map_body = Vec::new();
        for (number, page) in &pages {
            page_map_body.extend_from_slice(&number.to_le_bytes());
            page_map_body.extend_from_slice(&(page.len() as i32).to_le_bytes());
        }
        page_map_body.extend_from_slice(&page_map_id.to_le_bytes());
        page_map_body.extend_from_slice(&(page_map_len as i32).to_le_bytes());
        let page_map = system_page(ac18::PAGE_TYPE_PAGE_MAP, &page_map_body, false);
        assert_eq!(page_map.len(), page_map_len);

        // Metadata block
        let mut block = [0u8; ac18::ENCRYPTED_HEADER_SIZE];
        {
            let mut w = Vec::with_capacity(ac18::ENCRYPTED_HEADER_SIZE);
            w.extend_from_slice(ac18::FILE_ID);
            for value in [0x00u32, 0x6C, 0x04, 0, 0, 0, 0, page_map_id as u32] {
                w.extend_from_slice(&value.to_le_bytes());
            }
            w.extend_from_slice(&(seeker as u64).to_le_bytes());
            w.extend_from_slice(&0u64.to_le_bytes());
            for value in [0u32, self.sections.len() as u32, 0x20, 0x80, 0x40, page_map_id as u32] {
                w.extend_from_slice(&value.to_le_bytes());
            }
            w.extend_from_slice(&(page_map_address - ac18::PAGE_BASE_OFFSET).to_le_bytes());
            w.extend_from_slice(&(section_map_id as u32).to_le_bytes());
            w.extend_from_slice(&0u32.to_le_bytes());
            w.extend_from_slice(&0u32.to_le_bytes());
            w.extend_from_slice(&0u32.to_le_bytes());
            block.copy_from_slice(&w);
        }
        let crc = crc32(0, &block);
        block[ac18::HEADER_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        xor_header_block(&mut block);

        let mut out = paged_preamble(self.version, self.maintenance_version);
        out.resize(ac18::ENCRYPTED_HEADER_OFFSET as usize, 0);
        out.extend_from_slice(&block);
        out.resize(ac18::PAGE_BASE_OFFSET as usize, 0);
        for (_, page) in &pages {
            out.extend_from_slice(page);
        }
        out.extend_from_slice(&page_map);

        (
            out,
            PagedLayout {
                page_map_address,
                section_map_id: section_map_id as u32,
                crc,
            },
        )
    }
}

/// 20-byte clear header and body of a 2004 system page.
fn system_page(page_type: u32, body: &[u8], compressed: bool) -> Vec<u8> {
    let stored = if compressed {
        lz77_ac18_literals(body)
    } else {
        body.to_vec()
    };
    let mut page = page_type.to_le_bytes().to_vec();
    page.extend_from_slice(&(body.len() as i32).to_le_bytes());
    page.extend_from_slice(&(stored.len() as i32).to_le_bytes());
    page.extend_from_slice(&(if compressed { 2i32 } else { 1 }).to_le_bytes());
    page.extend_from_slice(&0i32.to_le_bytes());
    page.extend_from_slice(&stored);
    page
}

/// Signature and the clear fields up to 0x28 shared by 2004 and 2007.
fn paged_preamble(version: DwgVersion, maintenance_version: u8) -> Vec<u8> {
    let mut out = version.to_string().into_bytes();
    out.extend_from_slice(&[0u8; 5]);
    out.push(maintenance_version);
    out.push(0x03);
    out.extend_from_slice(&(-1i32).to_le_bytes());
    out.push(0x1F);
    out.push(0x00);
    out.extend_from_slice(&CODE_PAGE_ANSI_1252.to_le_bytes());
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out
}

// ===========================================================================
// 2007
// ===========================================================================

/// 2007 file: striped metadata block at 0x80, striped pages from 0x480.
/// Pages are stored uncompressed.
#[derive(Clone)]
pub struct Ac21File {
    pub maintenance_version: u8,
    pub sections: Vec<PagedSection>,
    /// Applied to the metadata after the layout is computed.
    pub patch_metadata: Option<fn(&mut Dwg21CompressedMetadata)>,
    /// Applied to the section map body before it is striped.
    pub patch_section_map: Option<fn(&mut Vec<u8>)>,
}

/// What the 2007 metadata block declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripedLayout {
    pub pages_map_offset: u64,
    pub sections_map_id: u64,
    pub crc_seed: u64,
}

impl Default for Ac21File {
    fn default() -> Self {
        Self::new()
    }
}

impl Ac21File {
    pub const CRC_SEED: u64 = 0x1234_5678;

    pub fn new() -> Self {
        Self {
            maintenance_version: 0,
            sections: Vec::new(),
            patch_metadata: None,
            patch_section_map: None,
        }
    }

    pub fn section(mut self, section: PagedSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_metadata(mut self, patch: fn(&mut Dwg21CompressedMetadata)) -> Self {
        self.patch_metadata = Some(patch);
        self
    }

    pub fn with_section_map(mut self, patch: fn(&mut Vec<u8>)) -> Self {
        self.patch_section_map = Some(patch);
        self
    }

    pub fn build(&self) -> (Vec<u8>, StripedLayout) {
        let mut pages: Vec<(i64, Vec<u8>)> = Vec::new();
        let mut next_id = 1i64;
        let mut map = Vec::new();

        for section in &self.sections {
            let stored = section.stored_pages();
            let name: Vec<u8> = section
                .name
                .encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(|unit| unit.to_le_bytes())
                .collect();

            for value in [
                section.data.len() as u64,
                section.max_page_size as u64,
                0,
                0,
                name.len() as u64,
                0,
                0,
                stored.len() as u64,
            ] {
                map.extend_from_slice(&value.to_le_bytes());
            }
            map.extend_from_slice(&name);

            for (offset, chunk) in stored {
                let page = data_page_ac21(chunk);
                for value in [
                    offset as u64,
                    page.len() as u64,
                    next_id as u64,
                    chunk.len() as u64,
                    chunk.len() as u64,
                    0,
                    0,
                ] {
                    map.extend_from_slice(&value.to_le_bytes());
                }
                pages.push((next_id, page));
                next_id += 1;
            }
        }

        if let Some(patch) = self.patch_section_map {
            patch(&mut map);
        }
        let sections_map_id = next_id as u64;
        let section_map = system_page_ac21(&map);
        pages.push((next_id, section_map));
        next_id += 1;

        let pages_map_offset: u64 = pages.iter().map(|(_, p)| p.len() as u64).sum();
        let mut page_map_body = Vec::new();
        for (id, page) in &pages {
            page_map_body.extend_from_slice(&(page.len() as i64).to_le_bytes());
            page_map_body.extend_from_slice(&id.to_le_bytes());
        }
        // the page map lists itself last; only its length matters here
        let page_map_len = system_page_ac21(&vec![0u8; page_map_body.len() + 16]).len();
        page_map_body.extend_from_slice(&(page_map_len as i64).to_le_bytes());
        page_map_body.extend_from_slice(&next_id.to_le_bytes());
        let page_map = system_page_ac21(&page_map_body);

        let mut metadata = Dwg21CompressedMetadata {
            header_size: 0x70,
            pages_map_correction_factor: 1,
            pages_map_offset,
            pages_map_size_compressed: page_map_body.len() as u64,
            pages_map_size_uncompressed: page_map_body.len() as u64,
            pages_map_id: next_id as u64,
            pages_amount: pages.len() as u64 + 1,
            pages_max_id: next_id as u64,
            sections_amount: self.sections.len() as u64,
            sections_map_id,
            sections_map_size_compressed: map.len() as u64,
            sections_map_size_uncompressed: map.len() as u64,
            sections_map_correction_factor: 1,
            crc_seed: Self::CRC_SEED,
            ..Default::default()
        };
        if let Some(patch) = self.patch_metadata {
            patch(&mut metadata);
        }
        // negative length: metadata stored raw
        let mut plain = vec![0u8; 32];
        plain[24..28].copy_from_slice(&(-(ac21::DECOMPRESSED_HEADER_SIZE as i32)).to_le_bytes());
        for field in metadata.to_fields() {
            plain.extend_from_slice(&field.to_le_bytes());
        }
        let striped = reed_solomon::encode(&plain, ac21::HEADER_STRIPE_FACTOR, ac21::RS_BLOCK_SIZE);

        let mut out = paged_preamble(DwgVersion::AC1021, self.maintenance_version);
        out.resize(ac18::ENCRYPTED_HEADER_OFFSET as usize, 0);
        out.extend_from_slice(&striped);
        out.resize(ac21::DATA_PAGE_BASE_OFFSET as usize, 0);
        for (_, page) in &pages {
            out.extend_from_slice(page);
        }
        out.extend_from_slice(&page_map);

        (
            out,
            StripedLayout {
                pages_map_offset,
                sections_map_id,
                crc_seed: Self::CRC_SEED,
            },
        )
    }
}

/// Stored data page, striped over 251-byte blocks.
fn data_page_ac21(chunk: &[u8]) -> Vec<u8> {
    let aligned = (chunk.len() + 7) & !7;
    let factor = reed_solomon::stripe_factor(aligned, ac21::RS_DATA_BLOCK_SIZE);
    reed_solomon::encode(chunk, factor, ac21::RS_DATA_BLOCK_SIZE)
}

/// Stored system page, correction factor 1, striped over 239-byte blocks.
fn system_page_ac21(body: &[u8]) -> Vec<u8> {
    let aligned = (body.len() + 7) & !7;
    let factor = reed_solomon::stripe_factor(aligned, ac21::RS_BLOCK_SIZE);
    reed_solomon::encode(body, factor, ac21::RS_BLOCK_SIZE)
}
