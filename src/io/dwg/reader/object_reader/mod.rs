//! DWG object reader: walks the object graph in `AcDb:AcDbObjects`.
//!
//! # Architecture
//!
//! Objects are stored in arbitrary order and reached through the handle
//! index. The reader seeds a FIFO queue with root handles, then for each
//! handle:
//!
//! 1. Look up the record offset in the [`HandleIndex`].
//! 2. Read the record size, check the record CRC, set up the sub-streams.
//! 3. Read the type and the common prefix, dispatch to a decoder.
//! 4. Enqueue every handle the template refers to.
//!
//! A handle enters the queue at most once, so owner/reactor cycles end.
//! Templates keep references as raw handles; resolving them is left to
//! a linking pass over the finished [`TemplateSet`].

pub mod common;
pub mod decoders;
pub mod templates;

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashSet;
use encoding_rs::Encoding;
use tracing::{trace, warn};

use self::decoders::{DecodeContext, DecoderRegistry, PlaceholderDecoder};
use self::templates::{ObjectTemplate, TemplateBody, TemplateSet};
use super::bit_cursor::BitCursor;
use super::handle_reader::HandleIndex;
use super::merged_reader::DwgMergedReader;
use super::stream_reader::DwgStreamReader;
use crate::classes::ClassTable;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::section_names;
use crate::io::dwg::crc::{crc16, CRC16_SEED};
use crate::io::dwg::object_type::DwgObjectType;
use crate::io::dwg::section_io::{check_integrity, SectionIO};
use crate::notification::{NotificationCollection, NotificationType};
use crate::types::DwgVersion;

/// Reader for the object records of one drawing.
pub struct DwgObjectReader<'a> {
    sio: SectionIO,
    /// Cursor over the whole object data; records fork from it.
    cursor: BitCursor,
    index: &'a HandleIndex,
    classes: &'a ClassTable,
    registry: &'a DecoderRegistry,
    crc_check: bool,
    failsafe: bool,

    queue: VecDeque<u64>,
    /// Handles ever queued; nothing is queued twice.
    seen: AHashSet<u64>,
}

impl<'a> DwgObjectReader<'a> {
    /// `data` is the object section (the whole file for R13-2000, where
    /// index offsets are absolute).
    pub fn new(
        version: DwgVersion,
        data: impl Into<Arc<[u8]>>,
        index: &'a HandleIndex,
        classes: &'a ClassTable,
    ) -> Self {
        Self {
            sio: SectionIO::new(version),
            cursor: BitCursor::new(data, version),
            index,
            classes,
            registry: DecoderRegistry::builtin(),
            crc_check: false,
            failsafe: true,
            queue: VecDeque::new(),
            seen: AHashSet::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.cursor = self.cursor.with_encoding(encoding);
        self
    }

    pub fn with_registry(mut self, registry: &'a DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Promote record CRC mismatches to errors.
    pub fn with_crc_check(mut self, crc_check: bool) -> Self {
        self.crc_check = crc_check;
        self
    }

    /// Skip objects that fail to decode instead of stopping.
    pub fn with_failsafe(mut self, failsafe: bool) -> Self {
        self.failsafe = failsafe;
        self
    }

    /// Decode everything reachable from `roots`, in discovery order.
    pub fn read(
        mut self,
        roots: impl IntoIterator<Item = u64>,
        notifications: &mut NotificationCollection,
    ) -> Result<TemplateSet> {
        let mut templates = TemplateSet::new();
        for root in roots {
            self.enqueue(root);
        }

        while let Some(handle) = self.queue.pop_front() {
            let Some(offset) = self.index.resolve(handle) else {
                trace!(handle, "not in handle index");
                continue;
            };

            match self.decode_object(handle, offset, notifications) {
                Ok(template) => {
                    for reference in template.referenced_handles() {
                        self.enqueue(reference);
                    }
                    templates.insert(handle, template);
                }
                Err(err) if err.is_fatal_by_default() || !self.failsafe => return Err(err),
                Err(err) => {
                    warn!(handle, error = %err, "object skipped");
                    notifications.notify(NotificationType::Error, err.to_string());
                }
            }
        }

        Ok(templates)
    }

    fn enqueue(&mut self, handle: u64) {
        if handle != 0 && self.seen.insert(handle) {
            self.queue.push_back(handle);
        }
    }

    fn decode_object(
        &self,
        handle: u64,
        offset: i64,
        notifications: &mut NotificationCollection,
    ) -> Result<ObjectTemplate> {
        let (mut reader, start_bit) = self
            .open_record(offset, notifications)
            .map_err(|e| per_object(handle, "record", e))?;

        let raw_type = reader
            .read_object_type()
            .map_err(|e| per_object(handle, "record", e))?;
        let object_type = DwgObjectType::from_raw(raw_type);
        let mut template = ObjectTemplate::new(handle, object_type, raw_type);

        let is_entity = match object_type {
            DwgObjectType::Unlisted => match self.classes.get(raw_type) {
                Some(class) => {
                    template.dxf_name = class.dxf_name.clone();
                    class.is_an_entity
                }
                None => {
                    // Entity and object prefixes only agree up to the
                    // extended data.
                    let unknown = DwgError::UnknownObjectType {
                        class_number: raw_type,
                    };
                    warn!(handle, class_number = raw_type, "unknown object type");
                    notifications.notify(
                        NotificationType::Unsupported,
                        format!("{unknown} (handle {handle:#X})"),
                    );
                    template.dxf_name = String::new();
                    self.read_common_data(&mut reader, start_bit, &mut template)
                        .map_err(|e| per_object(handle, "UNKNOWN", e))?;
                    return Ok(template);
                }
            },
            fixed => fixed.is_entity(),
        };

        template.body = self
            .decode_body(&mut reader, start_bit, &mut template, is_entity)
            .map_err(|e| per_object(handle, &template.dxf_name, e))?;

        if template.handle != handle {
            notifications.notify(
                NotificationType::Warning,
                format!(
                    "record at {offset:#X} stores handle {:#X}, indexed as {handle:#X}",
                    template.handle
                ),
            );
        }

        trace!(handle, object_type = %template.dxf_name, "object decoded");
        Ok(template)
    }

    fn decode_body(
        &self,
        reader: &mut DwgMergedReader,
        start_bit: u64,
        template: &mut ObjectTemplate,
        is_entity: bool,
    ) -> Result<TemplateBody> {
        if is_entity {
            self.read_common_entity_data(reader, start_bit, template)?;
        } else {
            self.read_common_non_entity_data(reader, start_bit, template)?;
        }

        let decoder = self
            .registry
            .find(template.object_type, &template.dxf_name)
            .unwrap_or(&PlaceholderDecoder);
        let mut ctx = DecodeContext::new(reader, self.sio, template.handle, &mut template.deferred);
        decoder.decode(&mut ctx)
    }

    /// Frame the record at `offset`: MS size (and MC handle-stream size
    /// from 2010), CRC check, sub-streams. Returns the reader positioned at
    /// the type field and the bit where the record body starts.
    fn open_record(
        &self,
        offset: i64,
        notifications: &mut NotificationCollection,
    ) -> Result<(DwgMergedReader, u64)> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&o| o < self.cursor.len())
            .ok_or_else(|| {
                DwgError::InvalidFormat(format!("record offset {offset:#X} outside object data"))
            })?;

        let mut header = self.cursor.fork();
        header.set_position_in_bits(start as u64 * 8);

        // MS: size of the body, CRC excluded
        let size = header.read_modular_short()? as usize;
        if size == 0 {
            return Err(DwgError::InvalidFormat(format!(
                "empty object record at {offset:#X}"
            )));
        }

        // MC: bit size of the handle stream
        let handle_bits = if self.sio.r2010_plus {
            Some(header.read_modular_char()?)
        } else {
            None
        };

        let body_start = header.position().byte;
        let body_end = body_start + size;
        self.check_record_crc(start, body_end, notifications)?;

        let mut main = self.cursor.fork();
        main.set_position_in_bits(body_start as u64 * 8);
        let mut reader = DwgMergedReader::passthrough(main);

        if let Some(handle_bits) = handle_bits {
            let handle_bit = (body_end as u64 * 8)
                .checked_sub(handle_bits)
                .filter(|&bit| bit > body_start as u64 * 8)
                .ok_or_else(|| {
                    DwgError::InvalidFormat(format!(
                        "handle stream of {handle_bits} bits exceeds a {size}-byte record"
                    ))
                })?;
            reader.set_handle_stream(handle_bit);
            reader.set_text_stream_by_flag(handle_bit - 1)?;
        }

        Ok((reader, body_start as u64 * 8))
    }

    /// CRC-16 over the size prefix and body, stored little-endian after it.
    fn check_record_crc(
        &self,
        start: usize,
        body_end: usize,
        notifications: &mut NotificationCollection,
    ) -> Result<()> {
        let data = self.cursor.data();
        let (Some(covered), Some(stored)) =
            (data.get(start..body_end), data.get(body_end..body_end + 2))
        else {
            return Err(DwgError::BufferExhausted {
                requested: body_end + 2,
                available: data.len(),
            });
        };

        let stored = u16::from_le_bytes([stored[0], stored[1]]);
        let actual = crc16(CRC16_SEED, covered);
        check_integrity(
            actual == stored,
            self.crc_check,
            section_names::ACDB_OBJECTS,
            || format!("record at {start:#X}: CRC {actual:#06X} != stored {stored:#06X}"),
            notifications,
        )
    }
}

/// Wrap a decode error for one object. Integrity errors pass through so
/// the CRC policy keeps them fatal.
fn per_object(handle: u64, type_name: &str, source: DwgError) -> DwgError {
    match source {
        DwgError::CorruptSection { .. } | DwgError::PerObjectDecodeFailure { .. } => source,
        source => DwgError::PerObjectDecodeFailure {
            handle,
            type_name: type_name.to_string(),
            source: Box::new(source),
        },
    }
}
