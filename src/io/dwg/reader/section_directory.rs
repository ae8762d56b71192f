//! Section directory: page map, section map and section reassembly.
//!
//! The page map lists every physical page as (page number, size); running
//! sums of the sizes give each page's file offset. The section map names
//! the logical sections and lists, per section, the pages it is built
//! from and where each lands in the decompressed section. Pages holding
//! only zeroes are not stored; they are inferred from offset gaps.

use std::io::{Cursor, Read, Seek, SeekFrom};

use ahash::AHashMap;
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, trace};

use crate::error::{DwgError, Result};
use crate::io::dwg::compression::{lz77_ac18, lz77_ac21};
use crate::io::dwg::constants::{ac18, ac21, section_names};
use crate::io::dwg::encryption::DataPageHeader;
use crate::io::dwg::file_header::{
    DwgFileHeader, DwgFileHeaderAC15, DwgFileHeaderAC18, DwgFileHeaderAC21, DwgLocalSectionMap,
    DwgSectionDescriptor, DwgSectionLocatorRecord,
};
use crate::io::dwg::reed_solomon;

const PAGE_MAP: &str = "Page map";
const SECTION_MAP: &str = "Section map";

/// Upper bound on the all-zero pages inferred for one section.
const MAX_ZERO_PAGES: u64 = 0x1_0000;

/// Resolves and reads sections of a seekable DWG stream.
pub struct DwgSectionDirectory<'a, R: Read + Seek> {
    stream: &'a mut R,
}

impl<'a, R: Read + Seek> DwgSectionDirectory<'a, R> {
    pub fn new(stream: &'a mut R) -> Self {
        Self { stream }
    }

    /// Fill the page map and section map of a freshly decoded header.
    pub fn resolve(&mut self, header: &mut DwgFileHeader) -> Result<()> {
        match header {
            DwgFileHeader::AC15(_) => Ok(()),
            DwgFileHeader::AC18(h) => {
                self.read_page_map_ac18(h)?;
                self.read_section_map_ac18(h)
            }
            DwgFileHeader::AC21(h) => {
                self.read_page_map_ac21(h)?;
                self.read_section_map_ac21(h)
            }
        }
    }

    /// Decompressed bytes of the named section, exactly its declared size.
    pub fn read_section(&mut self, header: &DwgFileHeader, name: &str) -> Result<Vec<u8>> {
        match header {
            DwgFileHeader::AC15(h) => self.get_section_buffer_ac15(h, name),
            DwgFileHeader::AC18(h) => {
                let descriptor = find_descriptor(h, name)?;
                self.assemble(descriptor, |dir, page| dir.read_data_page_ac18(descriptor, page))
            }
            DwgFileHeader::AC21(h) => {
                let descriptor = find_descriptor(&h.base, name)?;
                self.assemble(descriptor, |dir, page| dir.read_data_page_ac21(page))
            }
        }
    }

    // ------------------------------------------------------------------
    // AC15
    // ------------------------------------------------------------------

    /// R13-2000 sections are contiguous; object records are addressed by
    /// absolute file offset, so the object section is the whole file.
    fn get_section_buffer_ac15(&mut self, header: &DwgFileHeaderAC15, name: &str) -> Result<Vec<u8>> {
        if name == section_names::ACDB_OBJECTS {
            self.stream.seek(SeekFrom::Start(0))?;
            let mut data = Vec::new();
            self.stream.read_to_end(&mut data)?;
            return Ok(data);
        }

        let record = section_names::locator_index(name)
            .and_then(|index| header.records.get(&index))
            .ok_or_else(|| DwgError::SectionNotFound(name.to_string()))?;

        if record.seeker < 0 || record.size < 0 {
            return Err(DwgError::corrupt(
                name,
                format!("invalid locator {:#X}+{:#X}", record.seeker, record.size),
            ));
        }
        self.stream.seek(SeekFrom::Start(record.seeker as u64))?;
        let mut data = vec![0u8; record.size as usize];
        self.stream.read_exact(&mut data)?;
        Ok(data)
    }

    // ------------------------------------------------------------------
    // AC18 page map and section map
    // ------------------------------------------------------------------

    /// Read a system page: 20-byte clear header (type, decompressed size,
    /// compressed size, compression type, checksum), then the body.
    fn read_system_page_ac18(&mut self, seeker: u64, expected_type: u32, section: &str) -> Result<Vec<u8>> {
        self.stream.seek(SeekFrom::Start(seeker))?;
        let page_type = self.stream.read_u32::<LittleEndian>()?;
        let decompressed_size = self.stream.read_i32::<LittleEndian>()?;
        let compressed_size = self.stream.read_i32::<LittleEndian>()?;
        let compression_type = self.stream.read_i32::<LittleEndian>()?;
        let _checksum = self.stream.read_i32::<LittleEndian>()?;

        if page_type != expected_type {
            return Err(DwgError::corrupt(
                section,
                format!("page type {page_type:#010X} at {seeker:#X}, expected {expected_type:#010X}"),
            ));
        }
        if decompressed_size < 0 || compressed_size < 0 {
            return Err(DwgError::corrupt(section, "negative page size"));
        }

        let body_at = self.stream.stream_position()?;
        let body = self.read_at(body_at, compressed_size as u64, section)?;
        if compression_type == ac18::COMPRESSED {
            lz77_ac18::decompress(&body, decompressed_size as usize)
        } else {
            Ok(body)
        }
    }

    fn read_page_map_ac18(&mut self, header: &mut DwgFileHeaderAC18) -> Result<()> {
        let data = self.read_system_page_ac18(header.page_map_address, ac18::PAGE_TYPE_PAGE_MAP, PAGE_MAP)?;
        header.records = parse_page_map_ac18(&data)?;
        debug!(pages = header.records.len(), "AC18 page map read");
        Ok(())
    }

    fn read_section_map_ac18(&mut self, header: &mut DwgFileHeaderAC18) -> Result<()> {
        let record = page_record(&header.records, header.section_map_id as i64, SECTION_MAP)?;
        let data = self.read_system_page_ac18(record.seeker as u64, ac18::PAGE_TYPE_SECTION_MAP, SECTION_MAP)?;

        let mut c = Cursor::new(&data[..]);
        let count = c.read_i32::<LittleEndian>()?;
        let _x02 = c.read_i32::<LittleEndian>()?;
        let _x7400 = c.read_i32::<LittleEndian>()?;
        let _x00 = c.read_i32::<LittleEndian>()?;
        let _count2 = c.read_i32::<LittleEndian>()?;

        for _ in 0..count.max(0) {
            let total_size = c.read_u64::<LittleEndian>()?;
            let page_count = c.read_i32::<LittleEndian>()?;
            let max_page_size = c.read_i32::<LittleEndian>()?;
            let _unknown = c.read_i32::<LittleEndian>()?;
            let compressed_code = c.read_i32::<LittleEndian>()?;
            let section_id = c.read_i32::<LittleEndian>()?;
            let encrypted = c.read_i32::<LittleEndian>()?;
            let mut name_buf = [0u8; 64];
            c.read_exact(&mut name_buf)?;
            let name_end = name_buf.iter().position(|&b| b == 0).unwrap_or(name_buf.len());
            let name = String::from_utf8_lossy(&name_buf[..name_end]).into_owned();

            let mut descriptor = DwgSectionDescriptor::new(&name);
            descriptor.decompressed_size = total_size;
            descriptor.max_page_size = max_page_size.max(0) as u64;
            descriptor.compressed_code = compressed_code;
            descriptor.section_id = section_id;
            descriptor.encrypted = encrypted;
            descriptor.page_count = page_count.max(0) as u64;

            for _ in 0..page_count.max(0) {
                let page_number = c.read_i32::<LittleEndian>()?;
                let data_size = c.read_i32::<LittleEndian>()?;
                let offset = c.read_u64::<LittleEndian>()?;
                if name.is_empty() {
                    continue;
                }

                let record = page_record(&header.records, page_number as i64, &name)?;
                let mut page = DwgLocalSectionMap::new();
                page.page_number = page_number;
                page.compressed_size = data_size.max(0) as u64;
                page.offset = offset;
                page.seeker = record.seeker as u64;
                page.page_size = record.size.max(0) as u64;
                page.decompressed_size = descriptor
                    .max_page_size
                    .min(total_size.saturating_sub(offset));
                descriptor.local_sections.push(page);
            }

            if name.is_empty() {
                continue;
            }
            infer_zero_pages(&mut descriptor)?;
            trace!(
                section = %descriptor.name,
                pages = descriptor.local_sections.len(),
                zero_pages = descriptor.zero_page_count(),
                "section descriptor"
            );
            header.add_descriptor(descriptor);
        }

        debug!(sections = header.descriptors.len(), "AC18 section map read");
        Ok(())
    }

    /// 32-byte obfuscated header, then the stored page body.
    fn read_data_page_ac18(&mut self, descriptor: &DwgSectionDescriptor, page: &DwgLocalSectionMap) -> Result<Vec<u8>> {
        self.stream.seek(SeekFrom::Start(page.seeker))?;
        let mut raw = [0u8; ac18::DATA_PAGE_HEADER_SIZE];
        self.stream.read_exact(&mut raw)?;
        let page_header = DataPageHeader::decrypt(&raw, page.seeker)?;

        if page_header.page_type as u32 != ac18::PAGE_TYPE_DATA {
            return Err(DwgError::corrupt(
                &descriptor.name,
                format!(
                    "page {} at {:#X} has type {:#010X}",
                    page.page_number, page.seeker, page_header.page_type as u32
                ),
            ));
        }
        if page_header.compressed_size < 0 {
            return Err(DwgError::corrupt(&descriptor.name, "negative page data size"));
        }

        let body_at = self.stream.stream_position()?;
        let body = self.read_at(body_at, page_header.compressed_size as u64, &descriptor.name)?;
        let size = usize::try_from(page.decompressed_size).map_err(|_| {
            DwgError::corrupt(&descriptor.name, format!("page {} size out of range", page.page_number))
        })?;
        if descriptor.is_compressed() {
            lz77_ac18::decompress(&body, size)
        } else {
            fit_stored_page(body, size, &descriptor.name, page.page_number)
        }
    }

    // ------------------------------------------------------------------
    // AC21 page map and section map
    // ------------------------------------------------------------------

    /// Striped page of `stored_size` bytes, rounded up to 8 and scaled by
    /// the correction factor, spread over `block_size`-byte stripes.
    fn read_striped(
        &mut self,
        seeker: u64,
        stored_size: u64,
        correction_factor: u64,
        block_size: usize,
        section: &str,
    ) -> Result<Vec<u8>> {
        let total = stored_size
            .checked_add(7)
            .map(|size| size & !7)
            .and_then(|aligned| aligned.checked_mul(correction_factor.max(1)))
            .ok_or_else(|| {
                DwgError::corrupt(
                    section,
                    format!("stored size {stored_size:#X} x {correction_factor} overflows"),
                )
            })?;
        let factor = total.div_ceil(block_size as u64);
        let encoded_len = factor
            .checked_mul(ac21::RS_CODEWORD_SIZE as u64)
            .ok_or_else(|| DwgError::corrupt(section, format!("{factor} stripes overflow")))?;
        let encoded = self.read_at(seeker, encoded_len, section)?;
        Ok(reed_solomon::decode(&encoded, total as usize, factor as usize, block_size))
    }

    /// Striped system page over 239-byte stripes.
    fn read_system_page_ac21(
        &mut self,
        seeker: u64,
        compressed_size: u64,
        decompressed_size: u64,
        correction_factor: u64,
        section: &str,
    ) -> Result<Vec<u8>> {
        let decoded = self.read_striped(
            seeker,
            compressed_size,
            correction_factor,
            ac21::RS_BLOCK_SIZE,
            section,
        )?;
        unstripe_payload(&decoded, compressed_size, decompressed_size, section)
    }

    fn read_page_map_ac21(&mut self, header: &mut DwgFileHeaderAC21) -> Result<()> {
        let meta = &header.metadata;
        let data = self.read_system_page_ac21(
            header.base.page_map_address,
            meta.pages_map_size_compressed,
            meta.pages_map_size_uncompressed,
            meta.pages_map_correction_factor,
            PAGE_MAP,
        )?;

        let mut c = Cursor::new(&data[..]);
        let mut offset = 0u64;
        let mut records = AHashMap::new();
        while (c.position() as usize) + 16 <= data.len() {
            let size = c.read_i64::<LittleEndian>()?;
            let id = c.read_i64::<LittleEndian>()?;
            if id >= 0 {
                let number = i32::try_from(id)
                    .map_err(|_| DwgError::corrupt(PAGE_MAP, format!("page id {id} out of range")))?;
                let seeker = ac21::DATA_PAGE_BASE_OFFSET
                    .checked_add(offset)
                    .and_then(|seeker| i64::try_from(seeker).ok())
                    .ok_or_else(|| {
                        DwgError::corrupt(PAGE_MAP, format!("page {id} offset {offset:#X} out of range"))
                    })?;
                records.insert(number, DwgSectionLocatorRecord::new(number, seeker, size));
            }
            offset = u64::try_from(size)
                .ok()
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(|| {
                    DwgError::corrupt(PAGE_MAP, format!("page {id} size {size} at offset {offset:#X}"))
                })?;
        }
        header.base.records = records;
        debug!(pages = header.base.records.len(), "AC21 page map read");
        Ok(())
    }

    fn read_section_map_ac21(&mut self, header: &mut DwgFileHeaderAC21) -> Result<()> {
        let record = page_record(&header.base.records, header.metadata.sections_map_id as i64, SECTION_MAP)?;
        let meta = &header.metadata;
        let data = self.read_system_page_ac21(
            record.seeker as u64,
            meta.sections_map_size_compressed,
            meta.sections_map_size_uncompressed,
            meta.sections_map_correction_factor,
            SECTION_MAP,
        )?;

        let mut c = Cursor::new(&data[..]);
        while (c.position() as usize) + 64 <= data.len() {
            let data_size = c.read_u64::<LittleEndian>()?;
            let max_size = c.read_u64::<LittleEndian>()?;
            let encrypted = c.read_u64::<LittleEndian>()?;
            let hash_code = c.read_u64::<LittleEndian>()?;
            let name_length = c.read_u64::<LittleEndian>()?;
            let _unknown = c.read_u64::<LittleEndian>()?;
            let encoding = c.read_u64::<LittleEndian>()?;
            let page_count = c.read_u64::<LittleEndian>()?;

            let remaining = data.len() as u64 - c.position();
            if name_length > remaining {
                return Err(DwgError::corrupt(
                    SECTION_MAP,
                    format!("name length {name_length:#X} exceeds the {remaining} bytes left"),
                ));
            }
            let mut name_bytes = vec![0u8; name_length as usize];
            c.read_exact(&mut name_bytes)?;
            let units: Vec<u16> = name_bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let name = String::from_utf16_lossy(&units).replace('\0', "");

            let mut descriptor = DwgSectionDescriptor::new(&name);
            descriptor.decompressed_size = data_size;
            descriptor.max_page_size = max_size;
            descriptor.encrypted = encrypted as i32;
            descriptor.hash_code = hash_code;
            descriptor.encoding = encoding;
            descriptor.page_count = page_count;

            for _ in 0..page_count {
                let mut page = DwgLocalSectionMap::new();
                page.offset = c.read_u64::<LittleEndian>()?;
                page.page_size = c.read_u64::<LittleEndian>()?;
                let page_number = c.read_i64::<LittleEndian>()?;
                page.decompressed_size = c.read_u64::<LittleEndian>()?;
                page.compressed_size = c.read_u64::<LittleEndian>()?;
                page.checksum = c.read_u64::<LittleEndian>()?;
                page.crc = c.read_u64::<LittleEndian>()?;
                let record = page_record(&header.base.records, page_number, &name)?;
                page.page_number = record.number;
                page.seeker = record.seeker as u64;
                descriptor.local_sections.push(page);
            }

            if name.is_empty() {
                continue;
            }
            infer_zero_pages(&mut descriptor)?;
            trace!(
                section = %descriptor.name,
                pages = descriptor.local_sections.len(),
                zero_pages = descriptor.zero_page_count(),
                "section descriptor"
            );
            header.base.add_descriptor(descriptor);
        }

        debug!(sections = header.base.descriptors.len(), "AC21 section map read");
        Ok(())
    }

    /// Data pages carry no header: striped over 251-byte blocks, then
    /// compressed when the stored size is below the page size.
    fn read_data_page_ac21(&mut self, page: &DwgLocalSectionMap) -> Result<Vec<u8>> {
        let decoded = self.read_striped(
            page.seeker,
            page.compressed_size,
            1,
            ac21::RS_DATA_BLOCK_SIZE,
            "Data page",
        )?;
        unstripe_payload(&decoded, page.compressed_size, page.decompressed_size, "Data page")
    }

    /// Read `length` bytes at `seeker`. The range must lie inside the file.
    fn read_at(&mut self, seeker: u64, length: u64, section: &str) -> Result<Vec<u8>> {
        let file_len = self.stream.seek(SeekFrom::End(0))?;
        if !seeker.checked_add(length).is_some_and(|end| end <= file_len) {
            return Err(DwgError::corrupt(
                section,
                format!("{length:#X} bytes at {seeker:#X} run past the end of the file ({file_len:#X})"),
            ));
        }
        self.stream.seek(SeekFrom::Start(seeker))?;
        let mut data = vec![0u8; length as usize];
        self.stream.read_exact(&mut data)?;
        Ok(data)
    }

    // ------------------------------------------------------------------
    // Reassembly
    // ------------------------------------------------------------------

    fn assemble(
        &mut self,
        descriptor: &DwgSectionDescriptor,
        mut read_page: impl FnMut(&mut Self, &DwgLocalSectionMap) -> Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        if descriptor.is_encrypted() {
            return Err(DwgError::InvalidFormat(format!(
                "section {} is encrypted",
                descriptor.name
            )));
        }

        let declared = usize::try_from(descriptor.decompressed_size).unwrap_or(usize::MAX);
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(declared).map_err(|_| {
            DwgError::corrupt(
                &descriptor.name,
                format!("declared size {:#X} cannot be allocated", descriptor.decompressed_size),
            )
        })?;
        buffer.resize(declared, 0);
        for page in descriptor.local_sections.iter().filter(|p| !p.is_empty) {
            let bytes = read_page(self, page)?;
            let start = page.offset as usize;
            let target = start
                .checked_add(bytes.len())
                .and_then(|end| buffer.get_mut(start..end))
                .ok_or_else(|| {
                    DwgError::corrupt(
                        &descriptor.name,
                        format!(
                            "page {} ({} bytes at {start:#X}) overruns declared size {declared:#X}",
                            page.page_number,
                            bytes.len()
                        ),
                    )
                })?;
            target.copy_from_slice(&bytes);
        }

        trace!(section = %descriptor.name, size = declared, "section assembled");
        Ok(buffer)
    }
}

fn find_descriptor<'h>(header: &'h DwgFileHeaderAC18, name: &str) -> Result<&'h DwgSectionDescriptor> {
    header
        .descriptors
        .get(name)
        .ok_or_else(|| DwgError::SectionNotFound(name.to_string()))
}

fn page_record(
    records: &AHashMap<i32, DwgSectionLocatorRecord>,
    page_number: i64,
    section: &str,
) -> Result<DwgSectionLocatorRecord> {
    i32::try_from(page_number)
        .ok()
        .and_then(|n| records.get(&n))
        .copied()
        .ok_or_else(|| {
            DwgError::corrupt(section, format!("page {page_number} is missing from the page map"))
        })
}

/// Take the stored bytes out of a de-striped buffer and expand them.
fn unstripe_payload(decoded: &[u8], compressed_size: u64, decompressed_size: u64, section: &str) -> Result<Vec<u8>> {
    let stored = usize::try_from(compressed_size)
        .ok()
        .and_then(|size| decoded.get(..size))
        .ok_or_else(|| {
            DwgError::corrupt(section, format!("stored size {compressed_size} exceeds the striped page"))
        })?;
    if compressed_size < decompressed_size {
        let size = usize::try_from(decompressed_size).unwrap_or(usize::MAX);
        lz77_ac21::decompress(stored, size)
    } else {
        Ok(stored[..decompressed_size as usize].to_vec())
    }
}

/// Stored bytes of an uncompressed page, brought to the page size: short
/// data is zero-filled, data past the page size is rejected.
fn fit_stored_page(mut body: Vec<u8>, size: usize, section: &str, page_number: i32) -> Result<Vec<u8>> {
    if body.len() > size {
        return Err(DwgError::corrupt(
            section,
            format!("page {page_number} stores {} bytes, more than its size {size:#X}", body.len()),
        ));
    }
    body.resize(size, 0);
    Ok(body)
}

/// Page map body: (page number, size) pairs from file offset 0x100.
/// A negative page number is a free-space node followed by four more
/// i32 values; its size still advances the running offset.
pub fn parse_page_map_ac18(data: &[u8]) -> Result<AHashMap<i32, DwgSectionLocatorRecord>> {
    let mut c = Cursor::new(data);
    let mut records = AHashMap::new();
    let mut seeker = ac18::PAGE_BASE_OFFSET as i64;

    while (c.position() as usize) + 8 <= data.len() {
        let number = c.read_i32::<LittleEndian>()?;
        let size = c.read_i32::<LittleEndian>()? as i64;
        if number >= 0 {
            records.insert(number, DwgSectionLocatorRecord::new(number, seeker, size));
        } else {
            for _ in 0..4 {
                c.read_i32::<LittleEndian>()?;
            }
        }
        seeker += size;
    }
    Ok(records)
}

/// Insert all-zero pages so the pages cover `[0, decompressed_size)`
/// without gaps. Each inferred page is at most `max_page_size` long.
pub fn infer_zero_pages(descriptor: &mut DwgSectionDescriptor) -> Result<()> {
    let max = descriptor.max_page_size.max(1);
    let declared = descriptor.decompressed_size;

    let mut needed = 0u64;
    let mut covered = 0u64;
    for page in &descriptor.local_sections {
        let end = page.offset.checked_add(page.decompressed_size).ok_or_else(|| {
            DwgError::corrupt(
                &descriptor.name,
                format!("page {} at {:#X} overflows", page.page_number, page.offset),
            )
        })?;
        needed = needed.saturating_add(page.offset.saturating_sub(covered).div_ceil(max));
        covered = covered.max(end);
    }
    needed = needed.saturating_add(declared.saturating_sub(covered).div_ceil(max));
    if needed > MAX_ZERO_PAGES {
        return Err(DwgError::corrupt(
            &descriptor.name,
            format!("declared size {declared:#X} leaves {needed} pages unstored"),
        ));
    }

    let stored = std::mem::take(&mut descriptor.local_sections);

    let mut pages = Vec::with_capacity(stored.len());
    let mut covered = 0u64;
    for page in stored {
        push_zero_pages(&mut pages, covered, page.offset, max);
        covered = covered.max(page.end());
        pages.push(page);
    }
    push_zero_pages(&mut pages, covered, declared, max);
    descriptor.local_sections = pages;
    Ok(())
}

fn push_zero_pages(pages: &mut Vec<DwgLocalSectionMap>, mut from: u64, to: u64, max: u64) {
    while from < to {
        let size = (to - from).min(max);
        pages.push(DwgLocalSectionMap::zero_fill(from, size));
        from += size;
    }
}
