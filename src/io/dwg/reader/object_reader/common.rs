//! Common prefix shared by every object record.
//!
//! All records start with the object handle and its extended data. Entities
//! then carry graphics, entity mode, reactors and their layer/linetype
//! style links; other objects carry the owner, reactors and extension
//! dictionary. Where the handle stream starts depends on the version:
//! R2010+ knows it from the record header, R2000-R2007 store its bit
//! offset right after the type, R13/R14 after the extended data.

use super::templates::{DeferredReference, EntityData, ExtendedDataBlock, ObjectTemplate};
use super::DwgObjectReader;
use crate::error::{DwgError, Result};
use crate::io::dwg::reader::merged_reader::DwgMergedReader;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::types::DwgVersion;

/// Reactor counts beyond this mean the stream is misaligned.
const MAX_REACTORS: i32 = 10_000;

fn defer(template: &mut ObjectTemplate, slot: &str, handle: u64) {
    if handle != 0 {
        template.deferred.push(DeferredReference::new(slot, handle));
    }
}

impl DwgObjectReader<'_> {
    /// Handle and extended data; positions the handle stream for
    /// R2000-R2007.
    pub(super) fn read_common_data(
        &self,
        reader: &mut DwgMergedReader,
        start_bit: u64,
        template: &mut ObjectTemplate,
    ) -> Result<()> {
        if self.sio.r2000_plus && !self.sio.r2010_plus {
            self.update_handle_reader(reader, start_bit)?;
        }

        // H: the object's own handle, in the main stream
        template.handle = reader.main_reader_mut().handle_reference()?;
        template.extended_data = Self::read_extended_data(reader)?;
        Ok(())
    }

    pub(super) fn read_common_non_entity_data(
        &self,
        reader: &mut DwgMergedReader,
        start_bit: u64,
        template: &mut ObjectTemplate,
    ) -> Result<()> {
        self.read_common_data(reader, start_bit, template)?;

        if self.sio.r13_14_only {
            self.update_handle_reader(reader, start_bit)?;
        }

        let (count, xdict_missing) = self.read_reactor_flags(reader)?;
        template.owner_handle = reader.handle_reference_resolved(template.handle)?;
        self.read_reactor_handles(reader, template, count, xdict_missing)
    }

    pub(super) fn read_common_entity_data(
        &self,
        reader: &mut DwgMergedReader,
        start_bit: u64,
        template: &mut ObjectTemplate,
    ) -> Result<()> {
        self.read_common_data(reader, start_bit, template)?;
        let mut entity = EntityData::default();

        // B: proxy graphics present
        if reader.read_bit()? {
            entity.graphics_size = if self.sio.r2010_plus {
                reader.read_bit_long_long()?
            } else {
                let size = reader.read_raw_long()?;
                u64::try_from(size).map_err(|_| {
                    DwgError::InvalidFormat(format!("negative graphics size {size}"))
                })?
            };
            reader.advance(entity.graphics_size as usize);
        }

        if self.sio.r13_14_only {
            self.update_handle_reader(reader, start_bit)?;
        }

        // BB: entity mode; 0 means the owner is stored
        entity.entity_mode = reader.read_2bits()?;
        if entity.entity_mode == 0 {
            template.owner_handle = reader.handle_reference_resolved(template.handle)?;
        }

        let (count, xdict_missing) = self.read_reactor_flags(reader)?;
        self.read_reactor_handles(reader, template, count, xdict_missing)?;

        let own = template.handle;
        if self.sio.r13_14_only {
            let layer = reader.handle_reference_resolved(own)?;
            defer(template, "layer", layer);
            // B: linetype is BYLAYER, no handle
            if !reader.read_bit()? {
                let linetype = reader.handle_reference_resolved(own)?;
                defer(template, "linetype", linetype);
            }
        }

        if !self.sio.r2004_plus {
            // B: no links; otherwise previous and next entity follow
            if !reader.read_bit()? {
                let prev = reader.handle_reference_resolved(own)?;
                defer(template, "prev_entity", prev);
                let next = reader.handle_reference_resolved(own)?;
                defer(template, "next_entity", next);
            }
        }

        let color = reader.read_en_color()?;
        entity.color_index = color.index;
        entity.true_color = color.true_color;
        entity.transparency = color.transparency;
        if self.sio.r2004_plus && color.has_color_handle {
            let book = reader.handle_reference_resolved(own)?;
            defer(template, "color", book);
        }

        entity.linetype_scale = reader.read_bit_double()?;

        if self.sio.r2000_plus {
            let layer = reader.handle_reference_resolved(own)?;
            defer(template, "layer", layer);

            // BB: 00 bylayer, 01 byblock, 10 continuous, 11 handle
            if reader.read_2bits()? == 3 {
                let linetype = reader.handle_reference_resolved(own)?;
                defer(template, "linetype", linetype);
            }

            if self.sio.r2007_plus {
                if reader.read_2bits()? == 3 {
                    let material = reader.handle_reference_resolved(own)?;
                    defer(template, "material", material);
                }
                // RC: shadow flags
                reader.read_raw_char()?;
            }

            if reader.read_2bits()? == 3 {
                let plotstyle = reader.handle_reference_resolved(own)?;
                defer(template, "plotstyle", plotstyle);
            }

            if self.sio.r2010_plus {
                let full = reader.read_bit()?;
                let face = reader.read_bit()?;
                let edge = reader.read_bit()?;
                for (present, slot) in [
                    (full, "full_visual_style"),
                    (face, "face_visual_style"),
                    (edge, "edge_visual_style"),
                ] {
                    if present {
                        let style = reader.handle_reference_resolved(own)?;
                        defer(template, slot, style);
                    }
                }
            }
        }

        // BS: invisibility
        entity.invisible = reader.read_bit_short()? & 1 != 0;

        if self.sio.r2000_plus {
            entity.line_weight = reader.read_raw_char()?;
        }

        template.entity = Some(entity);
        Ok(())
    }

    /// BL reactor count, then the extension-dictionary-missing flag
    /// (2004+) and the binary-data flag (2013+).
    fn read_reactor_flags(&self, reader: &mut DwgMergedReader) -> Result<(usize, bool)> {
        let count = reader.read_bit_long()?;
        if !(0..=MAX_REACTORS).contains(&count) {
            return Err(DwgError::InvalidFormat(format!(
                "reactor count {count} out of range"
            )));
        }

        let xdict_missing = self.sio.r2004_plus && reader.read_bit()?;

        if self.sio.r2013_plus {
            reader.read_bit()?;
        }

        Ok((count as usize, xdict_missing))
    }

    fn read_reactor_handles(
        &self,
        reader: &mut DwgMergedReader,
        template: &mut ObjectTemplate,
        count: usize,
        xdict_missing: bool,
    ) -> Result<()> {
        let own = template.handle;
        template.reactors = (0..count)
            .map(|_| reader.handle_reference_resolved(own))
            .collect::<Result<_>>()?;

        if !xdict_missing {
            let xdict = reader.handle_reference_resolved(own)?;
            template.xdictionary = (xdict != 0).then_some(xdict);
        }
        Ok(())
    }

    /// BS size, H application, `size` bytes; repeated until a zero size.
    fn read_extended_data(reader: &mut DwgMergedReader) -> Result<Vec<ExtendedDataBlock>> {
        let main = reader.main_reader_mut();
        let mut blocks = Vec::new();
        loop {
            let size = main.read_bit_short()? as u16;
            if size == 0 {
                return Ok(blocks);
            }
            let app_handle = main.handle_reference()?;
            let data = main.read_bytes(size as usize)?;
            blocks.push(ExtendedDataBlock { app_handle, data });
        }
    }

    /// RL: bit size of the main data, counted from the start of the record
    /// body. The handle stream starts there; for 2007 the string stream
    /// flag sits on the bit before it.
    fn update_handle_reader(&self, reader: &mut DwgMergedReader, start_bit: u64) -> Result<()> {
        let size = reader.read_raw_long()?;
        let size = u64::try_from(size)
            .map_err(|_| DwgError::InvalidFormat(format!("negative object bit size {size}")))?;
        let end_bit = start_bit + size;

        reader.set_handle_stream(end_bit);

        if self.sio.version() == DwgVersion::AC1021 {
            let flag_bit = end_bit
                .checked_sub(1)
                .ok_or_else(|| DwgError::InvalidFormat("object without main data".into()))?;
            reader.set_text_stream_by_flag(flag_bit)?;
        }
        Ok(())
    }
}
