//! File header decoding for the three container generations.
//!
//! Reads the 6-byte signature, the clear preamble, and then the
//! generation-specific metadata:
//!
//! - **AC15**: locator table at 0x15, CRC-16 and end sentinel
//! - **AC18**: 0x6C-byte XOR-obfuscated block at 0x80, CRC-32 checked
//! - **AC21**: 0x400-byte striped block at 0x80, optionally compressed
//!
//! The page map and section map are resolved afterwards by
//! [`super::section_directory`].

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::error::{DwgError, Result};
use crate::io::dwg::compression::lz77_ac21;
use crate::io::dwg::constants::{ac18, ac21, sentinels};
use crate::io::dwg::crc::crc32;
use crate::io::dwg::encryption::xor_header_block;
use crate::io::dwg::file_header::{
    Dwg21CompressedMetadata, DwgFileHeader, DwgFileHeaderAC15, DwgFileHeaderAC18,
    DwgFileHeaderAC21, DwgPreamble, DwgSectionLocatorRecord,
};
use crate::io::dwg::reed_solomon;
use crate::io::dwg::section_io::{check_integrity, check_sentinel};
use crate::notification::NotificationCollection;
use crate::types::{DwgVersion, Generation};

const SECTION: &str = "File header";

/// Preamble fields common to AC18 and AC21 (offsets 0x06-0x27).
struct PagedPreamble {
    preamble: DwgPreamble,
    dwg_version: u8,
    app_release_version: u8,
    security_type: i32,
    summary_info_addr: i32,
    vba_project_addr: i32,
}

/// Decodes the file header of a seekable DWG stream.
pub struct DwgFileHeaderReader<'a, R: Read + Seek> {
    stream: &'a mut R,
    crc_check: bool,
    notifications: &'a mut NotificationCollection,
}

impl<'a, R: Read + Seek> DwgFileHeaderReader<'a, R> {
    pub fn new(
        stream: &'a mut R,
        crc_check: bool,
        notifications: &'a mut NotificationCollection,
    ) -> Self {
        Self {
            stream,
            crc_check,
            notifications,
        }
    }

    /// Read the 6-byte version signature at offset 0.
    pub fn read_version(&mut self) -> Result<DwgVersion> {
        self.stream.seek(SeekFrom::Start(0))?;
        let mut signature = [0u8; 6];
        self.stream.read_exact(&mut signature)?;
        DwgVersion::from_signature(&signature)
    }

    /// Decode the header. Section tables are left empty.
    pub fn read(&mut self) -> Result<DwgFileHeader> {
        let version = self.read_version()?;
        debug!(version = %version, "reading file header");

        Ok(match version.generation() {
            Generation::Ac15 => DwgFileHeader::AC15(self.read_file_header_ac15(version)?),
            Generation::Ac18 => DwgFileHeader::AC18(self.read_file_header_ac18(version)?),
            Generation::Ac21 => DwgFileHeader::AC21(self.read_file_header_ac21(version)?),
        })
    }

    // ------------------------------------------------------------------
    // AC15
    // ------------------------------------------------------------------

    /// R13-2000 layout:
    /// - 0x06: 7 bytes, byte 5 is the maintenance version
    /// - 0x0D: RL preview address
    /// - 0x11: app version, app maintenance version
    /// - 0x13: RS code page
    /// - 0x15: RL record count, then (RC number, RL seeker, RL size) records
    /// - RS CRC, 16-byte end sentinel
    fn read_file_header_ac15(&mut self, version: DwgVersion) -> Result<DwgFileHeaderAC15> {
        let mut header = DwgFileHeaderAC15::new(version);
        self.stream.seek(SeekFrom::Start(6))?;

        let mut flags = [0u8; 7];
        self.stream.read_exact(&mut flags)?;
        header.preamble.maintenance_version = flags[5];
        header.preamble.preview_address = self.stream.read_i32::<LittleEndian>()? as i64;
        header.app_version = self.stream.read_u8()?;
        header.app_maintenance_version = self.stream.read_u8()?;
        header.preamble.drawing_code_page = self.stream.read_u16::<LittleEndian>()?;

        let count = self.stream.read_i32::<LittleEndian>()?;
        if count < 0 {
            return Err(DwgError::corrupt(SECTION, format!("negative record count {count}")));
        }

        for _ in 0..count {
            let number = self.stream.read_u8()? as i32;
            let seeker = self.stream.read_i32::<LittleEndian>()? as i64;
            let size = self.stream.read_i32::<LittleEndian>()? as i64;
            header
                .records
                .insert(number, DwgSectionLocatorRecord::new(number, seeker, size));
        }

        header.stored_crc = self.stream.read_u16::<LittleEndian>()?;

        let mut sentinel = [0u8; 16];
        self.stream.read_exact(&mut sentinel)?;
        check_sentinel(
            &sentinel,
            &sentinels::FILE_HEADER_END_AC15,
            self.crc_check,
            SECTION,
            self.notifications,
        )?;

        debug!(records = header.records.len(), "AC15 locator table read");
        Ok(header)
    }

    // ------------------------------------------------------------------
    // AC18
    // ------------------------------------------------------------------

    fn read_paged_preamble(&mut self, version: DwgVersion) -> Result<PagedPreamble> {
        self.stream.seek(SeekFrom::Start(6))?;
        let mut preamble = DwgPreamble::new(version);

        let mut skip = [0u8; 5];
        self.stream.read_exact(&mut skip)?;
        preamble.maintenance_version = self.stream.read_u8()?;
        self.stream.read_u8()?;
        preamble.preview_address = self.stream.read_i32::<LittleEndian>()? as i64;
        let dwg_version = self.stream.read_u8()?;
        let app_release_version = self.stream.read_u8()?;
        preamble.drawing_code_page = self.stream.read_u16::<LittleEndian>()?;
        let mut filler = [0u8; 3];
        self.stream.read_exact(&mut filler)?;
        let security_type = self.stream.read_i32::<LittleEndian>()?;
        let _unknown = self.stream.read_i32::<LittleEndian>()?;
        let summary_info_addr = self.stream.read_i32::<LittleEndian>()?;
        let vba_project_addr = self.stream.read_i32::<LittleEndian>()?;

        Ok(PagedPreamble {
            preamble,
            dwg_version,
            app_release_version,
            security_type,
            summary_info_addr,
            vba_project_addr,
        })
    }

    fn apply_preamble(header: &mut DwgFileHeaderAC18, p: PagedPreamble) {
        header.preamble = p.preamble;
        header.dwg_version = p.dwg_version;
        header.app_release_version = p.app_release_version;
        header.security_type = p.security_type;
        header.summary_info_addr = p.summary_info_addr;
        header.vba_project_addr = p.vba_project_addr;
    }

    fn read_file_header_ac18(&mut self, version: DwgVersion) -> Result<DwgFileHeaderAC18> {
        let mut header = DwgFileHeaderAC18::new(version);
        let preamble = self.read_paged_preamble(version)?;
        Self::apply_preamble(&mut header, preamble);

        self.stream
            .seek(SeekFrom::Start(ac18::ENCRYPTED_HEADER_OFFSET))?;
        let mut block = [0u8; ac18::ENCRYPTED_HEADER_SIZE];
        self.stream.read_exact(&mut block)?;
        xor_header_block(&mut block);

        self.parse_metadata_ac18(&mut header, &block)?;

        debug!(
            page_map_address = header.page_map_address,
            section_map_id = header.section_map_id,
            "AC18 metadata block decrypted"
        );
        Ok(header)
    }

    /// Decrypted 0x6C-byte block, little-endian:
    ///
    /// | offset | field |
    /// |--------|-------|
    /// | 0x00 | file id "AcFssFcAJMB\0" |
    /// | 0x0C | 0x00, 0x6C, 0x04 |
    /// | 0x18 | root tree node gap, lowermost left/right gaps, unknown |
    /// | 0x28 | last page id |
    /// | 0x2C | last section address (u64) |
    /// | 0x34 | second header address (u64) |
    /// | 0x3C | gap amount, section amount |
    /// | 0x44 | 0x20, 0x80, 0x40 |
    /// | 0x50 | section page map id |
    /// | 0x54 | page map address - 0x100 (u64) |
    /// | 0x5C | section map id |
    /// | 0x60 | section page array size, gap array size |
    /// | 0x68 | CRC-32 of the block with this field zeroed |
    fn parse_metadata_ac18(
        &mut self,
        header: &mut DwgFileHeaderAC18,
        block: &[u8; ac18::ENCRYPTED_HEADER_SIZE],
    ) -> Result<()> {
        let file_id = &block[..12];
        check_integrity(
            file_id == ac18::FILE_ID,
            self.crc_check,
            SECTION,
            || format!("unexpected file id {:?}", String::from_utf8_lossy(file_id)),
            self.notifications,
        )?;
        header.file_id = String::from_utf8_lossy(file_id)
            .trim_end_matches('\0')
            .to_string();

        let mut c = Cursor::new(&block[12..]);
        let _x00 = c.read_i32::<LittleEndian>()?;
        let _x6c = c.read_i32::<LittleEndian>()?;
        let _x04 = c.read_i32::<LittleEndian>()?;
        header.root_tree_node_gap = c.read_i32::<LittleEndian>()?;
        header.lowermost_left_tree_node_gap = c.read_i32::<LittleEndian>()?;
        header.lowermost_right_tree_node_gap = c.read_i32::<LittleEndian>()?;
        let _unknown = c.read_i32::<LittleEndian>()?;
        header.last_page_id = c.read_i32::<LittleEndian>()?;
        header.last_section_addr = c.read_u64::<LittleEndian>()?;
        header.second_header_addr = c.read_u64::<LittleEndian>()?;
        header.gap_amount = c.read_u32::<LittleEndian>()?;
        header.section_amount = c.read_u32::<LittleEndian>()?;
        let _x20 = c.read_u32::<LittleEndian>()?;
        let _x80 = c.read_u32::<LittleEndian>()?;
        let _x40 = c.read_u32::<LittleEndian>()?;
        header.section_page_map_id = c.read_u32::<LittleEndian>()?;
        let page_map_offset = c.read_u64::<LittleEndian>()?;
        header.page_map_address = page_map_offset
            .checked_add(ac18::PAGE_BASE_OFFSET)
            .ok_or_else(|| {
                DwgError::corrupt(SECTION, format!("page map offset {page_map_offset:#X} out of range"))
            })?;
        header.section_map_id = c.read_u32::<LittleEndian>()?;
        header.section_array_page_size = c.read_u32::<LittleEndian>()?;
        header.gap_array_size = c.read_u32::<LittleEndian>()?;
        header.crc_seed = c.read_u32::<LittleEndian>()?;

        let mut zeroed = *block;
        zeroed[ac18::HEADER_CRC_OFFSET..ac18::HEADER_CRC_OFFSET + 4].fill(0);
        let actual = crc32(0, &zeroed);
        check_integrity(
            actual == header.crc_seed,
            self.crc_check,
            SECTION,
            || format!("metadata CRC {actual:#010X} != stored {:#010X}", header.crc_seed),
            self.notifications,
        )
    }

    // ------------------------------------------------------------------
    // AC21
    // ------------------------------------------------------------------

    fn read_file_header_ac21(&mut self, version: DwgVersion) -> Result<DwgFileHeaderAC21> {
        let mut header = DwgFileHeaderAC21::new(version);
        let preamble = self.read_paged_preamble(version)?;
        Self::apply_preamble(&mut header.base, preamble);

        self.stream
            .seek(SeekFrom::Start(ac18::ENCRYPTED_HEADER_OFFSET))?;
        let mut encoded = vec![0u8; ac21::RS_ENCODED_BLOCK_SIZE];
        self.stream.read_exact(&mut encoded)?;

        let mut checks = Cursor::new(&encoded[ac21::RS_HEADER_DATA_SIZE..]);
        for value in header.check_values.iter_mut() {
            *value = checks.read_u64::<LittleEndian>()?;
        }

        let metadata = decode_metadata_ac21(&encoded[..ac21::RS_HEADER_DATA_SIZE])?;
        header.metadata = Dwg21CompressedMetadata::parse(&metadata)?;
        header.base.page_map_address = header.page_map_address().ok_or_else(|| {
            DwgError::corrupt(
                SECTION,
                format!("page map offset {:#X} out of range", header.metadata.pages_map_offset),
            )
        })?;
        header.base.section_map_id = header.metadata.sections_map_id as u32;
        header.base.crc_seed = header.metadata.crc_seed as u32;

        debug!(
            pages_map_offset = header.metadata.pages_map_offset,
            sections_map_id = header.metadata.sections_map_id,
            "AC21 metadata block decoded"
        );
        Ok(header)
    }
}

/// De-stripe the 2007 header block and return its 0x110 metadata bytes.
///
/// The de-striped buffer starts with a 32-byte prefix: CRC, key and
/// compressed CRC (u64 each), then the compressed length and a second
/// length (i32 each). A positive compressed length means the metadata
/// follows LZ77 compressed; otherwise its magnitude is the number of
/// raw bytes stored, and the rest of the block reads as zero.
pub fn decode_metadata_ac21(striped: &[u8]) -> Result<Vec<u8>> {
    let decoded = reed_solomon::decode(
        striped,
        ac21::HEADER_STRIPE_FACTOR * ac21::RS_BLOCK_SIZE,
        ac21::HEADER_STRIPE_FACTOR,
        ac21::RS_BLOCK_SIZE,
    );

    let mut prefix = Cursor::new(&decoded[24..32]);
    let compressed_length = prefix.read_i32::<LittleEndian>()?;
    let _length2 = prefix.read_i32::<LittleEndian>()?;

    if compressed_length > 0 {
        let end = 32 + compressed_length as usize;
        let compressed = decoded.get(32..end).ok_or_else(|| {
            DwgError::corrupt(
                SECTION,
                format!("compressed metadata length {compressed_length} exceeds the header block"),
            )
        })?;
        lz77_ac21::decompress(compressed, ac21::DECOMPRESSED_HEADER_SIZE)
    } else {
        let length = compressed_length.unsigned_abs() as usize;
        let raw = decoded
            .get(32..32 + length)
            .filter(|_| length <= ac21::DECOMPRESSED_HEADER_SIZE)
            .ok_or_else(|| {
                DwgError::corrupt(
                    SECTION,
                    format!("raw metadata length {length} exceeds the header block"),
                )
            })?;
        let mut metadata = vec![0u8; ac21::DECOMPRESSED_HEADER_SIZE];
        metadata[..length].copy_from_slice(raw);
        Ok(metadata)
    }
}
