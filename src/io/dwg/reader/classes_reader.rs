//! DWG Classes section reader.
//!
//! Reads class definitions from the `AcDb:Classes` section. Object type
//! codes of 500 and above are looked up in the resulting [`ClassTable`].
//!
//! Layout: start sentinel, RL data size, class records, RS CRC, end
//! sentinel. From 2007 on the class names live in a trailing string
//! stream located through the flag at the end of the data area.

use encoding_rs::Encoding;
use tracing::debug;

use super::bit_cursor::BitCursor;
use super::merged_reader::DwgMergedReader;
use super::stream_reader::DwgStreamReader;
use crate::classes::{ClassTable, DxfClass, ProxyFlags, ENTITY_ITEM_CLASS_ID};
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::{section_names, sentinels};
use crate::io::dwg::crc::{crc16, CRC16_SEED};
use crate::io::dwg::section_io::{check_integrity, check_sentinel, SectionIO};
use crate::notification::NotificationCollection;
use crate::types::DwgVersion;

/// Smallest class record: two BS, three empty TV, B, BS. Fewer bits left
/// before the end of the data area are padding.
const MIN_CLASS_BITS: u64 = 13;

/// Reader for the DWG `AcDb:Classes` section.
pub struct DwgClassesReader {
    /// Decompressed section bytes.
    data: Vec<u8>,
    version: DwgVersion,
    maintenance_version: u8,
    encoding: &'static Encoding,
}

impl DwgClassesReader {
    pub fn new(version: DwgVersion, maintenance_version: u8, data: Vec<u8>) -> Self {
        Self {
            data,
            version,
            maintenance_version,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// Code page used for pre-2007 class names.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Read every class record. Sentinel and CRC mismatches follow the
    /// `crc_check` policy.
    pub fn read(
        self,
        crc_check: bool,
        notifications: &mut NotificationCollection,
    ) -> Result<ClassTable> {
        let sio = SectionIO::new(self.version);
        let mut classes = ClassTable::new();
        let mut reader =
            BitCursor::new(self.data.clone(), self.version).with_encoding(self.encoding);

        let sentinel = reader.read_sentinel()?;
        check_sentinel(
            &sentinel,
            &sentinels::CLASSES_START,
            crc_check,
            section_names::CLASSES,
            notifications,
        )?;

        // RL: size of the class data area
        let size = reader.read_raw_long()?;

        // R2010+ with maintenance version above 3, or R2018+
        if (self.version >= DwgVersion::AC1024 && self.maintenance_version > 3)
            || self.version > DwgVersion::AC1027
        {
            // RL: high 32 bits of the size, unused
            reader.read_raw_long()?;
        }

        if sio.r2007_plus {
            // RL: bit size of the data area, measured from the RL itself
            let size_pos = reader.position_in_bits();
            let bit_size = reader.read_raw_long()?;
            let flag_pos = u64::try_from(size_pos as i64 + bit_size as i64 - 1).map_err(|_| {
                DwgError::InvalidFormat(format!("class data bit size {bit_size} is negative"))
            })?;

            let mut merged = DwgMergedReader::passthrough(reader);
            let end_section = if merged.set_text_stream_by_flag(flag_pos)? {
                merged.text_reader_mut().position_in_bits()
            } else {
                flag_pos
            };

            // BL: maximum class number
            merged.read_bit_long()?;
            // B: always set
            merged.read_bit()?;

            while merged.position_in_bits() + MIN_CLASS_BITS <= end_section {
                classes.insert(Self::read_class(&mut merged, sio.r2004_plus)?);
            }

            merged.set_position_in_bits(flag_pos + 1);
            // RS: CRC
            merged.reset_shift()?;

            let sentinel = merged.read_sentinel()?;
            check_sentinel(
                &sentinel,
                &sentinels::CLASSES_END,
                crc_check,
                section_names::CLASSES,
                notifications,
            )?;
        } else {
            let data_start = reader.position().byte;
            let end_section = data_start as u64 + size.max(0) as u64;

            if self.version == DwgVersion::AC1018 {
                // BS: maximum class number
                reader.read_bit_short()?;
                // RC: 0x00
                reader.read_raw_char()?;
                // RC: 0x00
                reader.read_raw_char()?;
                // B: true
                reader.read_bit()?;
            }

            while reader.position_in_bits() + MIN_CLASS_BITS <= end_section * 8 {
                classes.insert(Self::read_class(&mut reader, sio.r2004_plus)?);
            }

            let position = reader.position();
            let crc_at = position.byte + usize::from(position.shift > 0);
            // RS: CRC over the size field and the data
            let stored = reader.reset_shift()?;
            let covered = self.data.get(16..crc_at).unwrap_or_default();
            let actual = crc16(CRC16_SEED, covered);
            check_integrity(
                actual == stored,
                crc_check,
                section_names::CLASSES,
                || format!("CRC {actual:#06X} != stored {stored:#06X}"),
                notifications,
            )?;

            let sentinel = reader.read_sentinel()?;
            check_sentinel(
                &sentinel,
                &sentinels::CLASSES_END,
                crc_check,
                section_names::CLASSES,
                notifications,
            )?;
        }

        debug!(classes = classes.len(), "class table read");
        Ok(classes)
    }

    fn read_class<R: DwgStreamReader>(reader: &mut R, r2004_plus: bool) -> Result<DxfClass> {
        let mut class = DxfClass {
            // BS: classnum
            class_number: reader.read_bit_short()?,
            // BS: proxy flags (a version field before R14)
            proxy_flags: ProxyFlags::from_bits_retain(reader.read_bit_short()? as u16),
            // TV: appname
            application_name: reader.read_variable_text()?,
            // TV: cplusplusclassname
            cpp_class_name: reader.read_variable_text()?,
            // TV: classdxfname
            dxf_name: reader.read_variable_text()?,
            // B: wasazombie
            was_zombie: reader.read_bit()?,
            // BS: 0x1F2 for entities, 0x1F3 for objects
            item_class_id: reader.read_bit_short()?,
            ..Default::default()
        };
        class.is_an_entity = class.item_class_id == ENTITY_ITEM_CLASS_ID;

        if r2004_plus {
            class.instance_count = reader.read_bit_long()?;
            class.dwg_version = reader.read_bit_long()?;
            class.maintenance_version = reader.read_bit_long()?;
            // BL, BL: unknown, normally zero
            reader.read_bit_long()?;
            reader.read_bit_long()?;
        }

        Ok(class)
    }
}
