//! DWG binary container support.
//!
//! # Module Structure
//!
//! - [`constants`]: sentinels, section names, generation-specific offsets
//! - [`crc`]: CRC-16 (seed 0xC0C1) and CRC-32 computation
//! - [`encryption`]: 2004+ header block and data page header obfuscation
//! - [`compression`]: LZ77 AC18 and AC21 decompressors
//! - [`reed_solomon`]: stripe de-interleaving for 2007 pages
//! - [`reference_type`]: handle reference codes and resolution
//! - [`object_type`]: fixed object type codes
//! - [`section_io`]: version flags and integrity-check policy
//! - [`file_header`]: file header structures (AC15, AC18, AC21)
//! - [`reader`]: stream readers, section readers and the [`DwgReader`]

pub mod compression;
pub mod constants;
pub mod crc;
pub mod encryption;
pub mod file_header;
pub mod object_type;
pub mod reader;
pub mod reed_solomon;
pub mod reference_type;
pub mod section_io;

// Re-export commonly used types
pub use compression::{Decompressor, Lz77Ac18Decompressor, Lz77Ac21Decompressor};
pub use file_header::{
    Dwg21CompressedMetadata, DwgFileHeader, DwgFileHeaderAC15, DwgFileHeaderAC18,
    DwgFileHeaderAC21, DwgLocalSectionMap, DwgPreamble, DwgSectionDescriptor,
    DwgSectionLocatorRecord,
};
pub use object_type::DwgObjectType;
pub use reader::{DwgReadResult, DwgReader, DwgReaderConfiguration};
pub use reference_type::{DwgReferenceType, HandleReference};
pub use section_io::SectionIO;
