//! Handle reference encoding.
//!
//! A handle is stored as `|CODE:4|COUNTER:4|` followed by `COUNTER`
//! big-endian bytes. Codes 2-5 carry an absolute handle and name the kind
//! of link; codes 6, 8, 0xA and 0xC are relative to the handle of the
//! object being decoded.

/// Kind of link a handle reference expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DwgReferenceType {
    /// Code 0: absolute, kind not stated.
    Undefined,
    SoftOwnership,
    HardOwnership,
    SoftPointer,
    HardPointer,
    /// Codes 6, 8, 0xA, 0xC: value derived from the reference handle.
    Relative,
}

impl DwgReferenceType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Undefined,
            2 => Self::SoftOwnership,
            3 => Self::HardOwnership,
            4 => Self::SoftPointer,
            5 => Self::HardPointer,
            6 | 8 | 0xA | 0xC => Self::Relative,
            _ => return None,
        })
    }
}

/// A handle reference as stored, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleReference {
    pub code: u8,
    pub counter: u8,
    /// Big-endian value of the `counter` bytes.
    pub value: u64,
}

impl HandleReference {
    pub fn new(code: u8, counter: u8, value: u64) -> Self {
        Self {
            code,
            counter,
            value,
        }
    }

    /// Absolute handle, given the handle of the object being decoded.
    /// Unknown codes are treated as absolute.
    pub fn resolve(&self, reference_handle: u64) -> u64 {
        match self.code {
            0x6 => reference_handle.wrapping_add(1),
            0x8 => reference_handle.wrapping_sub(1),
            0xA => reference_handle.wrapping_add(self.value),
            0xC => reference_handle.wrapping_sub(self.value),
            _ => self.value,
        }
    }

    pub fn reference_type(&self) -> Option<DwgReferenceType> {
        DwgReferenceType::from_code(self.code)
    }
}
