//! DWG reader orchestrator, the main entry point for reading DWG files.
//!
//! # Usage
//!
//! ```rust,ignore
//! use acaddwg::io::dwg::DwgReader;
//!
//! let result = DwgReader::from_file("sample.dwg")?.read()?;
//! for template in result.templates.iter() {
//!     println!("{:#X} {}", template.handle, template.dxf_name);
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, warn};

use super::classes_reader::DwgClassesReader;
use super::file_header_reader::DwgFileHeaderReader;
use super::handle_reader::{DwgHandleReader, HandleIndex};
use super::object_reader::templates::TemplateSet;
use super::object_reader::DwgObjectReader;
use super::section_directory::DwgSectionDirectory;
use crate::classes::ClassTable;
use crate::error::{DwgError, Result};
use crate::io::dwg::constants::section_names;
use crate::io::dwg::file_header::DwgFileHeader;
use crate::notification::{NotificationCollection, NotificationType};
use crate::types::DwgVersion;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration options for the DWG reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwgReaderConfiguration {
    /// When `true`, sentinel and CRC mismatches (header CRC-32, class
    /// table, handle chunks, object records) are errors instead of
    /// warnings.
    ///
    /// Default: `false`.
    pub crc_check: bool,

    /// When `true`, an object that fails to decode is reported and
    /// skipped; otherwise the first such failure ends the read.
    ///
    /// Default: `true`.
    pub failsafe: bool,
}

impl Default for DwgReaderConfiguration {
    fn default() -> Self {
        Self {
            crc_check: false,
            failsafe: true,
        }
    }
}

impl DwgReaderConfiguration {
    pub fn with_crc_check(mut self, crc_check: bool) -> Self {
        self.crc_check = crc_check;
        self
    }

    pub fn with_failsafe(mut self, failsafe: bool) -> Self {
        self.failsafe = failsafe;
        self
    }
}

/// Everything a whole-file read produces.
#[derive(Debug)]
pub struct DwgReadResult {
    pub file_header: DwgFileHeader,
    pub classes: ClassTable,
    pub handles: HandleIndex,
    pub templates: TemplateSet,
    pub notifications: NotificationCollection,
}

// ---------------------------------------------------------------------------
// DwgReader
// ---------------------------------------------------------------------------

/// DWG file reader.
///
/// The read pipeline is:
///
/// 1. Read the version signature and the file header (AC15 / AC18 / AC21).
/// 2. Resolve the page map and section map.
/// 3. Read the class table and the handle index.
/// 4. Walk the object graph from the indexed handles.
///
/// The header is read lazily and kept, so [`section_names`] and
/// [`read_section`] can be used on their own.
///
/// [`section_names`]: DwgReader::section_names
/// [`read_section`]: DwgReader::read_section
pub struct DwgReader<R: Read + Seek> {
    stream: R,
    config: DwgReaderConfiguration,
    file_header: Option<DwgFileHeader>,
    notifications: NotificationCollection,
}

impl DwgReader<BufReader<File>> {
    /// Open a DWG file by path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: Read + Seek> DwgReader<R> {
    /// Wrap any seekable byte stream. Nothing is read yet.
    pub fn from_reader(stream: R) -> Self {
        Self {
            stream,
            config: DwgReaderConfiguration::default(),
            file_header: None,
            notifications: NotificationCollection::new(),
        }
    }

    pub fn with_config(mut self, config: DwgReaderConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DwgReaderConfiguration {
        &self.config
    }

    /// Notifications collected so far.
    pub fn notifications(&self) -> &NotificationCollection {
        &self.notifications
    }

    /// File header with its page map and section map resolved.
    pub fn read_file_header(&mut self) -> Result<&DwgFileHeader> {
        let header = match self.file_header.take() {
            Some(header) => header,
            None => {
                let mut header = DwgFileHeaderReader::new(
                    &mut self.stream,
                    self.config.crc_check,
                    &mut self.notifications,
                )
                .read()?;
                DwgSectionDirectory::new(&mut self.stream).resolve(&mut header)?;
                debug!(
                    version = %header.version(),
                    sections = header.section_names().len(),
                    "file header read"
                );
                header
            }
        };
        Ok(self.file_header.insert(header))
    }

    pub fn version(&mut self) -> Result<DwgVersion> {
        Ok(self.read_file_header()?.version())
    }

    /// Names of the sections the directory can locate.
    pub fn section_names(&mut self) -> Result<Vec<String>> {
        Ok(self.read_file_header()?.section_names())
    }

    /// Decompressed bytes of a named section, exactly its declared size.
    pub fn read_section(&mut self, name: &str) -> Result<Vec<u8>> {
        let (header, stream) = self.header_and_stream()?;
        DwgSectionDirectory::new(stream).read_section(header, name)
    }

    /// Class table; a drawing without a class section gets an empty one.
    pub fn read_classes(&mut self) -> Result<ClassTable> {
        let (header, stream) = self.header_and_stream()?;
        let version = header.version();
        let maintenance_version = header.maintenance_version();
        let encoding = header.encoding();

        let data = match DwgSectionDirectory::new(stream).read_section(header, section_names::CLASSES) {
            Ok(data) => data,
            Err(DwgError::SectionNotFound(name)) => {
                warn!(section = %name, "no class section");
                self.notifications
                    .notify(NotificationType::Warning, format!("Section not found: {name}"));
                return Ok(ClassTable::new());
            }
            Err(err) => return Err(err),
        };

        DwgClassesReader::new(version, maintenance_version, data)
            .with_encoding(encoding)
            .read(self.config.crc_check, &mut self.notifications)
    }

    /// Handle index from `AcDb:Handles`.
    pub fn read_handles(&mut self) -> Result<HandleIndex> {
        let version = self.version()?;
        let data = self.read_section(section_names::HANDLES)?;
        DwgHandleReader::new(version, data).read(self.config.crc_check, &mut self.notifications)
    }

    /// Decode the objects reachable from `roots`.
    pub fn read_objects(&mut self, roots: impl IntoIterator<Item = u64>) -> Result<TemplateSet> {
        let classes = self.read_classes()?;
        let handles = self.read_handles()?;
        self.read_objects_with(&classes, &handles, roots)
    }

    /// Read the whole drawing, seeding the worklist with every indexed
    /// handle in ascending order.
    pub fn read(mut self) -> Result<DwgReadResult> {
        self.read_file_header()?;
        let classes = self.read_classes()?;
        let handles = self.read_handles()?;
        let templates = self.read_objects_with(&classes, &handles, handles.handles())?;

        let file_header = self
            .file_header
            .take()
            .ok_or_else(|| DwgError::InvalidFormat("file header not read".into()))?;

        debug!(
            objects = templates.len(),
            notifications = self.notifications.len(),
            "drawing read"
        );

        Ok(DwgReadResult {
            file_header,
            classes,
            handles,
            templates,
            notifications: self.notifications,
        })
    }

    fn read_objects_with(
        &mut self,
        classes: &ClassTable,
        handles: &HandleIndex,
        roots: impl IntoIterator<Item = u64>,
    ) -> Result<TemplateSet> {
        let (header, stream) = self.header_and_stream()?;
        let version = header.version();
        let encoding = header.encoding();
        let data = DwgSectionDirectory::new(stream).read_section(header, section_names::ACDB_OBJECTS)?;

        DwgObjectReader::new(version, data, handles, classes)
            .with_encoding(encoding)
            .with_crc_check(self.config.crc_check)
            .with_failsafe(self.config.failsafe)
            .read(roots, &mut self.notifications)
    }

    fn header_and_stream(&mut self) -> Result<(&DwgFileHeader, &mut R)> {
        self.read_file_header()?;
        match &self.file_header {
            Some(header) => Ok((header, &mut self.stream)),
            None => Err(DwgError::InvalidFormat("file header not read".into())),
        }
    }
}
