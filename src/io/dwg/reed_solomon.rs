//! Stripe de-interleaving for the 2007 container.
//!
//! Pages of the 2007 format are stored as `factor` interleaved Reed-Solomon
//! codewords of 255 bytes: byte `j` of stripe `i` lives at
//! `i + j * factor`. Only the first `block_size` bytes of each codeword
//! carry data; the rest is parity.
//!
//! Parity is never checked or used for correction here. A damaged page
//! comes out damaged.

/// Reassemble `output_size` contiguous bytes from `factor` stripes of
/// `block_size` data bytes each. Bytes missing from a short `encoded`
/// buffer read as zero.
pub fn decode(encoded: &[u8], output_size: usize, factor: usize, block_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(output_size);
    let mut remaining = output_size;
    for stripe in 0..factor {
        let take = remaining.min(block_size);
        out.extend((0..take).map(|j| encoded.get(stripe + j * factor).copied().unwrap_or(0)));
        remaining -= take;
    }
    out.resize(output_size, 0);
    out
}

/// Inverse of [`decode`]: spread `data` over `factor` stripes. Parity
/// positions are left zero. Output length is `factor * 255`.
pub fn encode(data: &[u8], factor: usize, block_size: usize) -> Vec<u8> {
    let mut encoded = vec![0u8; factor * 255];
    for (stripe, chunk) in data.chunks(block_size).take(factor).enumerate() {
        for (j, &byte) in chunk.iter().enumerate() {
            encoded[stripe + j * factor] = byte;
        }
    }
    encoded
}

/// Number of stripes needed to hold `size` data bytes.
pub fn stripe_factor(size: usize, block_size: usize) -> usize {
    size.div_ceil(block_size)
}
