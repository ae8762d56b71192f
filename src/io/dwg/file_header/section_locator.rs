//! Locator record: where a numbered block of bytes lives in the file.
//!
//! The R13-2000 header lists one per section; the 2004+ page map yields
//! one per physical page.

use crate::io::dwg::constants::section_names;

/// File offset and size of a numbered section or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DwgSectionLocatorRecord {
    /// Locator index (R13-2000) or page number (2004+).
    pub number: i32,
    /// Absolute byte offset in the file.
    pub seeker: i64,
    pub size: i64,
}

impl DwgSectionLocatorRecord {
    pub fn new(number: i32, seeker: i64, size: i64) -> Self {
        Self {
            number,
            seeker,
            size,
        }
    }

    /// Section name for an R13-2000 locator index.
    pub fn section_name(&self) -> Option<&'static str> {
        section_names::locator_name(self.number)
    }

    /// Whether `[seeker, seeker + size)` lies inside a file of `file_len`.
    pub fn fits_in(&self, file_len: u64) -> bool {
        self.seeker >= 0
            && self.size >= 0
            && (self.seeker as u64)
                .checked_add(self.size as u64)
                .is_some_and(|end| end <= file_len)
    }
}
