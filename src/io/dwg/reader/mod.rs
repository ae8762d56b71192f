//! DWG bit-level stream readers and section readers.
//!
//! ## Stream readers
//! - [`stream_reader`]: the `DwgStreamReader` trait (bit codes, text, handles)
//! - [`bit_cursor`]: the cursor over one in-memory buffer
//! - [`merged_reader`]: the per-object reader over main/text/handle streams
//!
//! ## Container readers
//! - [`file_header_reader`]: version signature and file header
//! - [`section_directory`]: page map, section map and section assembly
//!
//! ## Section readers
//! - [`classes_reader`]: `AcDb:Classes` section (class definitions)
//! - [`handle_reader`]: `AcDb:Handles` section (handle index)
//! - [`object_reader`]: `AcDb:AcDbObjects` object graph
//!
//! [`dwg_reader`] ties them together.

pub mod bit_cursor;
pub mod merged_reader;
pub mod stream_reader;

pub mod classes_reader;
pub mod dwg_reader;
pub mod file_header_reader;
pub mod handle_reader;
pub mod object_reader;
pub mod section_directory;

pub use bit_cursor::BitCursor;
pub use merged_reader::DwgMergedReader;
pub use stream_reader::{CursorPosition, DwgStreamReader, EntityColor};

pub use classes_reader::DwgClassesReader;
pub use dwg_reader::{DwgReadResult, DwgReader, DwgReaderConfiguration};
pub use file_header_reader::DwgFileHeaderReader;
pub use handle_reader::{DwgHandleReader, HandleIndex};
pub use object_reader::decoders::{DecodeContext, DecoderRegistry, ObjectDecoder};
pub use object_reader::templates::{ObjectTemplate, TemplateBody, TemplateSet};
pub use object_reader::DwgObjectReader;
pub use section_directory::DwgSectionDirectory;
