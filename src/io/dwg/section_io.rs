//! Version flags and integrity-check routing shared by the section readers.

use crate::error::{DwgError, Result};
use crate::notification::{NotificationCollection, NotificationType};
use crate::types::DwgVersion;

/// Pre-computed version flags so readers can branch tersely.
#[derive(Debug, Clone, Copy)]
pub struct SectionIO {
    version: DwgVersion,

    /// R13-R14 only
    pub r13_14_only: bool,
    /// R2000+ (AC1015+)
    pub r2000_plus: bool,
    /// R2004+ (AC1018+)
    pub r2004_plus: bool,
    /// R2007+ (AC1021+)
    pub r2007_plus: bool,
    /// R2010+ (AC1024+)
    pub r2010_plus: bool,
    /// R2013+ (AC1027+)
    pub r2013_plus: bool,
    /// R2018+ (AC1032+)
    pub r2018_plus: bool,
}

impl SectionIO {
    pub fn new(version: DwgVersion) -> Self {
        Self {
            version,
            r13_14_only: version <= DwgVersion::AC1014,
            r2000_plus: version >= DwgVersion::AC1015,
            r2004_plus: version >= DwgVersion::AC1018,
            r2007_plus: version >= DwgVersion::AC1021,
            r2010_plus: version >= DwgVersion::AC1024,
            r2013_plus: version >= DwgVersion::AC1027,
            r2018_plus: version >= DwgVersion::AC1032,
        }
    }

    pub fn version(&self) -> DwgVersion {
        self.version
    }
}

/// Routes a failed sentinel or checksum comparison: a warning when
/// `enforce` is off, a [`DwgError::CorruptSection`] when it is on.
pub fn check_integrity(
    ok: bool,
    enforce: bool,
    section: &str,
    reason: impl FnOnce() -> String,
    notifications: &mut NotificationCollection,
) -> Result<()> {
    if ok {
        return Ok(());
    }
    let reason = reason();
    if enforce {
        return Err(DwgError::corrupt(section, reason));
    }
    notifications.notify(NotificationType::Warning, format!("{section}: {reason}"));
    Ok(())
}

/// Compare a 16-byte sentinel; see [`check_integrity`].
pub fn check_sentinel(
    actual: &[u8; 16],
    expected: &[u8; 16],
    enforce: bool,
    section: &str,
    notifications: &mut NotificationCollection,
) -> Result<()> {
    check_integrity(
        actual == expected,
        enforce,
        section,
        || "invalid section sentinel".to_string(),
        notifications,
    )
}
