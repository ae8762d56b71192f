//! Merged stream reader for one object record.
//!
//! An object record can hold up to three sub-streams over the same bytes:
//! - **Main data**: fixed fields, read from the record start
//! - **String data**: all TV / TU values, trailing the main data (2007+)
//! - **Handle data**: all H values, after the main data (2000+, and the
//!   tail of the common prefix on R13/R14)
//!
//! This reader routes each call to the right sub-stream. Built with only
//! a main cursor it is a plain passthrough.

use encoding_rs::Encoding;

use super::bit_cursor::BitCursor;
use super::stream_reader::{CursorPosition, DwgStreamReader};
use crate::error::Result;
use crate::io::dwg::reference_type::HandleReference;
use crate::types::DwgVersion;

/// Reader that multiplexes main, text and handle streams.
#[derive(Debug, Clone)]
pub struct DwgMergedReader {
    main_reader: BitCursor,
    text_reader: Option<BitCursor>,
    handle_reader: Option<BitCursor>,
}

impl DwgMergedReader {
    /// Single-stream reader; text and handles come from `main_reader`.
    pub fn passthrough(main_reader: BitCursor) -> Self {
        Self {
            main_reader,
            text_reader: None,
            handle_reader: None,
        }
    }

    pub fn new(main_reader: BitCursor, text_reader: BitCursor, handle_reader: BitCursor) -> Self {
        Self {
            main_reader,
            text_reader: Some(text_reader),
            handle_reader: Some(handle_reader),
        }
    }

    pub fn main_reader(&self) -> &BitCursor {
        &self.main_reader
    }

    pub fn main_reader_mut(&mut self) -> &mut BitCursor {
        &mut self.main_reader
    }

    pub fn handle_reader_mut(&mut self) -> &mut BitCursor {
        self.handle_reader.as_mut().unwrap_or(&mut self.main_reader)
    }

    pub fn text_reader_mut(&mut self) -> &mut BitCursor {
        self.text_reader.as_mut().unwrap_or(&mut self.main_reader)
    }

    /// Route handle reads to a cursor at `bit` of the same buffer.
    pub fn set_handle_stream(&mut self, bit: u64) {
        let mut handles = self.main_reader.fork();
        handles.set_position_in_bits(bit);
        self.handle_reader = Some(handles);
    }

    /// Route text reads to the string stream whose presence flag sits at
    /// `end_bit`. Returns whether the object has strings.
    pub fn set_text_stream_by_flag(&mut self, end_bit: u64) -> Result<bool> {
        let mut text = self.main_reader.fork();
        let found = text.set_position_by_flag(end_bit)?.is_some();
        self.text_reader = Some(text);
        Ok(found)
    }
}

impl DwgStreamReader for DwgMergedReader {
    fn version(&self) -> DwgVersion {
        self.main_reader.version()
    }

    fn encoding(&self) -> &'static Encoding {
        self.main_reader.encoding()
    }

    fn position(&self) -> CursorPosition {
        self.main_reader.position()
    }

    fn seek(&mut self, position: CursorPosition) {
        self.main_reader.seek(position);
    }

    fn read_bit(&mut self) -> Result<bool> {
        self.main_reader.read_bit()
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.main_reader.read_byte()
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        self.main_reader.read_bytes(length)
    }

    // ---------------------------------------------------------------
    // Text-reader delegated methods
    // ---------------------------------------------------------------

    fn read_variable_text(&mut self) -> Result<String> {
        match &mut self.text_reader {
            Some(text) if text.is_empty() => Ok(String::new()),
            Some(text) => text.read_variable_text(),
            None => self.main_reader.read_variable_text(),
        }
    }

    fn read_text_unicode(&mut self) -> Result<String> {
        match &mut self.text_reader {
            Some(text) if text.is_empty() => Ok(String::new()),
            Some(text) => text.read_text_unicode(),
            None => self.main_reader.read_text_unicode(),
        }
    }

    // ---------------------------------------------------------------
    // Handle-reader delegated methods
    // ---------------------------------------------------------------

    fn read_handle(&mut self) -> Result<HandleReference> {
        self.handle_reader_mut().read_handle()
    }

    fn handle_reference_resolved(&mut self, reference_handle: u64) -> Result<u64> {
        self.handle_reader_mut().handle_reference_resolved(reference_handle)
    }

    fn handle_reference(&mut self) -> Result<u64> {
        self.handle_reader_mut().handle_reference()
    }
}
