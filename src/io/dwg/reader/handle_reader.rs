//! Handle index (`AcDb:Handles`) reader.
//!
//! The section is a series of chunks. Each chunk starts with a big-endian
//! size (including the size field itself) and holds delta-encoded
//! (handle, offset) pairs, followed by a big-endian CRC-16. A chunk of
//! size 2 ends the section. Chunk bodies are cut off at 2032 bytes.

use ahash::AHashMap;
use tracing::debug;

use super::bit_cursor::BitCursor;
use super::stream_reader::DwgStreamReader;
use crate::error::Result;
use crate::io::dwg::constants::{handle_section, section_names};
use crate::io::dwg::crc::{crc16, CRC16_SEED};
use crate::io::dwg::section_io::check_integrity;
use crate::notification::NotificationCollection;
use crate::types::DwgVersion;

/// Handle to record offset, built once before any object is decoded.
#[derive(Debug, Clone, Default)]
pub struct HandleIndex {
    offsets: AHashMap<u64, i64>,
}

impl HandleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: u64, offset: i64) {
        self.offsets.insert(handle, offset);
    }

    /// Offset of the record for `handle`, or `None` when not indexed.
    pub fn resolve(&self, handle: u64) -> Option<i64> {
        self.offsets.get(&handle).copied()
    }

    pub fn contains(&self, handle: u64) -> bool {
        self.offsets.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Indexed handles in ascending order.
    pub fn handles(&self) -> Vec<u64> {
        let mut handles: Vec<u64> = self.offsets.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.offsets.iter().map(|(&h, &o)| (h, o))
    }
}

impl FromIterator<(u64, i64)> for HandleIndex {
    fn from_iter<I: IntoIterator<Item = (u64, i64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

/// Reader for the `AcDb:Handles` section.
pub struct DwgHandleReader {
    data: Vec<u8>,
    version: DwgVersion,
}

impl DwgHandleReader {
    pub fn new(version: DwgVersion, data: Vec<u8>) -> Self {
        Self { data, version }
    }

    /// Build the index. A chunk CRC mismatch is a warning, or an error
    /// when `crc_check` is set.
    pub fn read(
        self,
        crc_check: bool,
        notifications: &mut NotificationCollection,
    ) -> Result<HandleIndex> {
        let mut index = HandleIndex::new();
        let data = self.data;
        let mut reader = BitCursor::new(data.clone(), self.version);

        loop {
            let chunk_start = reader.position().byte;
            let size = (reader.read_byte()? as usize) << 8 | reader.read_byte()? as usize;
            if size == 2 {
                break;
            }

            let body_len = size.saturating_sub(2).min(handle_section::MAX_CHUNK_SIZE);
            let body_end = chunk_start + 2 + body_len;

            let mut last_handle = 0u64;
            let mut last_loc = 0i64;
            while reader.position().byte < body_end {
                let delta = reader.read_modular_char()?;
                last_handle = last_handle.wrapping_add(delta);
                last_loc = last_loc.wrapping_add(reader.read_signed_modular_char()?);
                if delta > 0 {
                    index.insert(last_handle, last_loc);
                }
            }

            let stored = (reader.read_byte()? as u16) << 8 | reader.read_byte()? as u16;
            let covered = data.get(chunk_start..body_end).unwrap_or_default();
            let actual = crc16(CRC16_SEED, covered);
            check_integrity(
                actual == stored,
                crc_check,
                section_names::HANDLES,
                || format!("chunk at {chunk_start:#X}: CRC {actual:#06X} != stored {stored:#06X}"),
                notifications,
            )?;
        }

        debug!(handles = index.len(), "handle index read");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(body: &[u8]) -> Vec<u8> {
        let size = (body.len() + 2) as u16;
        let mut out = size.to_be_bytes().to_vec();
        out.extend_from_slice(body);
        let crc = crc16(CRC16_SEED, &out);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    #[test]
    fn test_empty_section() {
        let mut notes = NotificationCollection::new();
        let index = DwgHandleReader::new(DwgVersion::AC1015, vec![0x00, 0x02])
            .read(true, &mut notes)
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_deltas_accumulate() {
        // (+1, +0x40), (+2, +0x10), (+1, -0x08)
        let mut data = chunk(&[0x01, 0x40 | 0x80, 0x00, 0x02, 0x10, 0x01, 0x48]);
        data.extend_from_slice(&[0x00, 0x02]);
        let mut notes = NotificationCollection::new();
        let index = DwgHandleReader::new(DwgVersion::AC1018, data)
            .read(true, &mut notes)
            .unwrap();
        assert_eq!(index.resolve(1), Some(0x40));
        assert_eq!(index.resolve(3), Some(0x50));
        assert_eq!(index.resolve(4), Some(0x48));
        assert_eq!(index.resolve(2), None);
        assert_eq!(index.handles(), [1, 3, 4]);
    }

    #[test]
    fn test_chunk_state_resets() {
        let mut data = chunk(&[0x05, 0x20]);
        data.extend(chunk(&[0x07, 0x30]));
        data.extend_from_slice(&[0x00, 0x02]);
        let mut notes = NotificationCollection::new();
        let index = DwgHandleReader::new(DwgVersion::AC1015, data)
            .read(false, &mut notes)
            .unwrap();
        assert_eq!(index.resolve(5), Some(0x20));
        assert_eq!(index.resolve(7), Some(0x30));
    }

    #[test]
    fn test_bad_crc_policy() {
        let mut data = chunk(&[0x05, 0x20]);
        let n = data.len();
        data[n - 1] ^= 0xFF;
        data.extend_from_slice(&[0x00, 0x02]);

        let mut notes = NotificationCollection::new();
        let index = DwgHandleReader::new(DwgVersion::AC1015, data.clone())
            .read(false, &mut notes)
            .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(notes.len(), 1);

        let mut notes = NotificationCollection::new();
        assert!(DwgHandleReader::new(DwgVersion::AC1015, data)
            .read(true, &mut notes)
            .is_err());
    }
}
