//! DWG version signatures and the container generation each one uses.

use std::fmt;

use crate::error::{DwgError, Result};

/// DWG version, identified by the 6-byte ASCII signature at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DwgVersion {
    /// AutoCAD R13
    AC1012,
    /// AutoCAD R14
    AC1014,
    /// AutoCAD 2000
    AC1015,
    /// AutoCAD 2004
    AC1018,
    /// AutoCAD 2007
    AC1021,
    /// AutoCAD 2010
    AC1024,
    /// AutoCAD 2013
    AC1027,
    /// AutoCAD 2018
    AC1032,
}

/// The three mutually incompatible container layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Flat locator table in the clear (R13 through 2000).
    Ac15,
    /// XOR-obfuscated metadata, paged and LZ77 compressed sections.
    Ac18,
    /// Striped metadata and pages, second LZ77 variant (2007 only).
    Ac21,
}

impl DwgVersion {
    /// The signature string (e.g. "AC1018").
    pub fn as_str(&self) -> &'static str {
        match self {
            DwgVersion::AC1012 => "AC1012",
            DwgVersion::AC1014 => "AC1014",
            DwgVersion::AC1015 => "AC1015",
            DwgVersion::AC1018 => "AC1018",
            DwgVersion::AC1021 => "AC1021",
            DwgVersion::AC1024 => "AC1024",
            DwgVersion::AC1027 => "AC1027",
            DwgVersion::AC1032 => "AC1032",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AC1012" => Some(DwgVersion::AC1012),
            "AC1014" => Some(DwgVersion::AC1014),
            "AC1015" => Some(DwgVersion::AC1015),
            "AC1018" => Some(DwgVersion::AC1018),
            "AC1021" => Some(DwgVersion::AC1021),
            "AC1024" => Some(DwgVersion::AC1024),
            "AC1027" => Some(DwgVersion::AC1027),
            "AC1032" => Some(DwgVersion::AC1032),
            _ => None,
        }
    }

    /// Decode the raw 6-byte signature.
    pub fn from_signature(signature: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(signature);
        Self::parse(text.trim_end_matches('\0'))
            .ok_or_else(|| DwgError::UnsupportedVersion(text.into_owned()))
    }

    /// Container layout used by this version.
    pub fn generation(&self) -> Generation {
        match self {
            DwgVersion::AC1012 | DwgVersion::AC1014 | DwgVersion::AC1015 => Generation::Ac15,
            DwgVersion::AC1021 => Generation::Ac21,
            DwgVersion::AC1018 | DwgVersion::AC1024 | DwgVersion::AC1027 | DwgVersion::AC1032 => {
                Generation::Ac18
            }
        }
    }
}

impl fmt::Display for DwgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let v = DwgVersion::from_signature(b"AC1018").unwrap();
        assert_eq!(v, DwgVersion::AC1018);
        assert_eq!(v.to_string(), "AC1018");
    }

    #[test]
    fn test_unknown_signature_is_unsupported() {
        let err = DwgVersion::from_signature(b"AC1009").unwrap_err();
        assert!(matches!(err, DwgError::UnsupportedVersion(s) if s == "AC1009"));
    }

    #[test]
    fn test_generation_mapping() {
        assert_eq!(DwgVersion::AC1014.generation(), Generation::Ac15);
        assert_eq!(DwgVersion::AC1015.generation(), Generation::Ac15);
        assert_eq!(DwgVersion::AC1021.generation(), Generation::Ac21);
        assert_eq!(DwgVersion::AC1032.generation(), Generation::Ac18);
    }

    #[test]
    fn test_ordering() {
        assert!(DwgVersion::AC1015 < DwgVersion::AC1018);
        assert!(DwgVersion::AC1027 < DwgVersion::AC1032);
    }
}
