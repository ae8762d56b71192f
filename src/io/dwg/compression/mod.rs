//! Page decompressors.
//!
//! The container uses two LZ77 variants:
//! - **AC18** (2004, 2010, 2013, 2018)
//! - **AC21** (2007), with a different opcode layout and chunked literals
//!
//! Both are pure functions of `(compressed bytes, declared size)`; no
//! state survives a call.

pub mod lz77_ac18;
pub mod lz77_ac21;

use crate::error::{DwgError, Result};

pub use lz77_ac18::Lz77Ac18Decompressor;
pub use lz77_ac21::Lz77Ac21Decompressor;

/// Expands a compressed page to its declared size.
pub trait Decompressor {
    fn decompress(&self, source: &[u8], decompressed_size: usize) -> Result<Vec<u8>>;
}

/// Empty output buffer with room for `size` bytes. A size the allocator
/// cannot satisfy is reported, not aborted on.
pub(crate) fn output_buffer(size: usize, variant: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(size).map_err(|_| {
        DwgError::Decompression(format!("{variant}: cannot allocate declared size {size}"))
    })?;
    Ok(out)
}

/// Bring a finished output buffer to exactly `size` bytes: zero-fill a
/// short result, reject an overlong one.
pub(crate) fn fit_to_size(mut out: Vec<u8>, size: usize, variant: &str) -> Result<Vec<u8>> {
    if out.len() > size {
        return Err(DwgError::Decompression(format!(
            "{variant}: produced {} bytes, declared size is {size}",
            out.len()
        )));
    }
    out.resize(size, 0);
    Ok(out)
}

/// Copy `length` bytes starting `offset` bytes back from the end of `out`.
/// Overlapping copies repeat the pattern byte by byte.
pub(crate) fn back_copy(out: &mut Vec<u8>, offset: usize, length: usize, variant: &str) -> Result<()> {
    if offset == 0 || offset > out.len() {
        return Err(DwgError::Decompression(format!(
            "{variant}: back reference offset {offset} outside {} decoded bytes",
            out.len()
        )));
    }
    let start = out.len() - offset;
    out.reserve(length);
    for i in 0..length {
        let byte = out[start + i];
        out.push(byte);
    }
    Ok(())
}
