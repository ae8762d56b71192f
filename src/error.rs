//! Error types for the DWG decoder.

use std::io;
use thiserror::Error;

/// Main error type for acaddwg operations
#[derive(Debug, Error)]
pub enum DwgError {
    /// IO error occurred while reading the container
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unrecognized or obsolete version signature
    #[error("Unsupported DWG version: {0:?}")]
    UnsupportedVersion(String),

    /// Sentinel, checksum or structural mismatch inside a section
    #[error("Corrupt section {section}: {reason}")]
    CorruptSection { section: String, reason: String },

    /// Class number absent from the class table
    #[error("Unknown object type: class number {class_number}")]
    UnknownObjectType { class_number: i16 },

    /// A single object's type-specific decode failed
    #[error("Failed to decode object {handle:#X} ({type_name}): {source}")]
    PerObjectDecodeFailure {
        handle: u64,
        type_name: String,
        #[source]
        source: Box<DwgError>,
    },

    /// A read ran past the end of the supplied buffer
    #[error("Buffer exhausted: requested {requested} bytes, {available} available")]
    BufferExhausted { requested: usize, available: usize },

    /// Named section missing from the section directory
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// Decompression error
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Invalid file format
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

impl DwgError {
    /// Shorthand for [`DwgError::CorruptSection`].
    pub fn corrupt(section: impl Into<String>, reason: impl Into<String>) -> Self {
        DwgError::CorruptSection {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Whether the policy treats this error as fatal regardless of
    /// configuration. Only per-object failures and unknown object types
    /// can be recovered locally.
    pub fn is_fatal_by_default(&self) -> bool {
        !matches!(
            self,
            DwgError::PerObjectDecodeFailure { .. } | DwgError::UnknownObjectType { .. }
        )
    }
}

/// Result type alias for acaddwg operations
pub type Result<T> = std::result::Result<T, DwgError>;
