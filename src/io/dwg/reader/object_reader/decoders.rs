//! Type-specific decoders and their registry.
//!
//! Fixed object types are looked up by [`DwgObjectType`]; class-based
//! types (codes of 500 and above) by upper-case DXF class name. A type
//! with no registered decoder keeps only its common prefix.

use ahash::AHashMap;
use once_cell::sync::Lazy;

use super::templates::{DeferredReference, TemplateBody};
use crate::error::Result;
use crate::io::dwg::object_type::DwgObjectType;
use crate::io::dwg::reader::merged_reader::DwgMergedReader;
use crate::io::dwg::reader::stream_reader::DwgStreamReader;
use crate::io::dwg::section_io::SectionIO;

/// State handed to a decoder: the record's streams, positioned just past
/// the common prefix, and the list collecting its outgoing references.
pub struct DecodeContext<'r> {
    pub reader: &'r mut DwgMergedReader,
    pub sio: SectionIO,
    handle: u64,
    deferred: &'r mut Vec<DeferredReference>,
}

impl<'r> DecodeContext<'r> {
    pub fn new(
        reader: &'r mut DwgMergedReader,
        sio: SectionIO,
        handle: u64,
        deferred: &'r mut Vec<DeferredReference>,
    ) -> Self {
        Self {
            reader,
            sio,
            handle,
            deferred,
        }
    }

    /// Handle of the object being decoded.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Read one handle from the handle stream, resolve it against the
    /// object's own handle and record it under `slot`.
    pub fn reference(&mut self, slot: impl Into<String>) -> Result<u64> {
        let handle = self.reader.handle_reference_resolved(self.handle)?;
        if handle != 0 {
            self.deferred.push(DeferredReference::new(slot, handle));
        }
        Ok(handle)
    }
}

/// Decodes the type-specific part of one record.
pub trait ObjectDecoder: Send + Sync {
    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<TemplateBody>;
}

/// Keeps the common prefix only.
#[derive(Debug, Default)]
pub struct PlaceholderDecoder;

impl ObjectDecoder for PlaceholderDecoder {
    fn decode(&self, _ctx: &mut DecodeContext<'_>) -> Result<TemplateBody> {
        Ok(TemplateBody::Placeholder)
    }
}

/// DICTIONARY: name/handle pairs.
#[derive(Debug, Default)]
pub struct DictionaryDecoder;

impl ObjectDecoder for DictionaryDecoder {
    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<TemplateBody> {
        // BL: number of entries
        let count = ctx.reader.read_bit_long()?.max(0) as usize;

        // R13-R14: unknown RC
        if ctx.sio.r13_14_only {
            ctx.reader.read_raw_char()?;
        }

        let mut cloning_flags = 0;
        let mut hard_owner = false;
        if ctx.sio.r2000_plus {
            cloning_flags = ctx.reader.read_bit_short()?;
            hard_owner = ctx.reader.read_raw_char()? != 0;
        }

        let owner = ctx.handle();
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = ctx.reader.read_variable_text()?;
            let handle = ctx.reader.handle_reference_resolved(owner)?;
            if handle == 0 || name.is_empty() {
                continue;
            }
            ctx.deferred.push(DeferredReference::new(name.clone(), handle));
            entries.push((name, handle));
        }

        Ok(TemplateBody::Dictionary {
            cloning_flags,
            hard_owner,
            entries,
        })
    }
}

/// Decoder lookup by fixed type and by class name.
#[derive(Default)]
pub struct DecoderRegistry {
    by_type: AHashMap<DwgObjectType, Box<dyn ObjectDecoder>>,
    by_name: AHashMap<String, Box<dyn ObjectDecoder>>,
}

static BUILTIN: Lazy<DecoderRegistry> = Lazy::new(|| {
    let mut registry = DecoderRegistry::new();
    registry.register_type(DwgObjectType::Dictionary, DictionaryDecoder);
    registry.register_name("ACDBDICTIONARYWDFLT", DictionaryDecoder);
    registry
});

impl DecoderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the decoders shipped in this crate.
    pub fn builtin() -> &'static DecoderRegistry {
        &BUILTIN
    }

    pub fn register_type(&mut self, object_type: DwgObjectType, decoder: impl ObjectDecoder + 'static) {
        self.by_type.insert(object_type, Box::new(decoder));
    }

    pub fn register_name(&mut self, dxf_name: &str, decoder: impl ObjectDecoder + 'static) {
        self.by_name.insert(dxf_name.to_ascii_uppercase(), Box::new(decoder));
    }

    /// Decoder for a record; class-based types go by `dxf_name`.
    pub fn find(&self, object_type: DwgObjectType, dxf_name: &str) -> Option<&dyn ObjectDecoder> {
        let decoder = match object_type {
            DwgObjectType::Unlisted => self.by_name.get(&dxf_name.to_ascii_uppercase()),
            fixed => self.by_type.get(&fixed),
        };
        decoder.map(|d| d.as_ref())
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("types", &self.by_type.keys().collect::<Vec<_>>())
            .field("names", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}
