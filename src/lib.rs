//! # acaddwg
//!
//! A pure Rust decoder for the AutoCAD DWG binary container.
//!
//! ## Features
//!
//! - R13 through 2018 containers (AC1012 to AC1032), across the three
//!   container generations: flat locator table (R13-2000), paged and
//!   compressed sections (2004+), striped pages (2007)
//! - Both LZ77 page decompressors
//! - Section directory with implicit zero pages
//! - Class table and handle index
//! - Object graph walk producing reference-deferred templates
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acaddwg::{DwgReader, DwgReaderConfiguration};
//!
//! let result = DwgReader::from_file("sample.dwg")?
//!     .with_config(DwgReaderConfiguration::default().with_crc_check(true))
//!     .read()?;
//!
//! println!("{} objects", result.templates.len());
//! for note in result.notifications.iter() {
//!     println!("{note}");
//! }
//! # Ok::<(), acaddwg::DwgError>(())
//! ```
//!
//! ## Architecture
//!
//! - `DwgStreamReader`: bit-level primitive reads over a `BitCursor`
//! - `DwgMergedReader`: routes text and handle reads to their sub-streams
//! - `DwgFileHeaderReader` / `DwgSectionDirectory`: container layout
//! - `DwgObjectReader`: handle-driven worklist over the object records
//!
//! Recoverable problems are reported through [`NotificationCollection`]
//! rather than aborting the read.

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod classes;
pub mod error;
pub mod io;
pub mod notification;
pub mod types;

// Re-export commonly used types
pub use classes::{ClassTable, DxfClass, ProxyFlags};
pub use error::{DwgError, Result};
pub use notification::{Notification, NotificationCollection, NotificationType};
pub use types::{DwgVersion, Generation, Vector2, Vector3};

// Re-export I/O types
pub use io::dwg::reader::{HandleIndex, ObjectTemplate, TemplateSet};
pub use io::dwg::{DwgFileHeader, DwgObjectType, DwgReadResult, DwgReader, DwgReaderConfiguration};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
