//! 8-row block interleaver: write row-major, read column-major.
//!
//! Spreads a later burst error across many RS-protected positions instead
//! of concentrating it in a single symbol's worth of bytes.

const ROWS: usize = 8;

/// For `n` positions, the source index read at each output position when
/// writing row-major and reading column-major. Shared by the byte-level
/// [`interleave`]/[`deinterleave`] pair and by [`crate::fec_chain`], which
/// applies the same permutation directly to soft bit-group values instead
/// of packed bytes.
pub(crate) fn permutation(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let cols = n.div_ceil(ROWS);
    let mut perm = Vec::with_capacity(n);
    for col in 0..cols {
        for row in 0..ROWS {
            let idx = row * cols + col;
            if idx < n {
                perm.push(idx);
            }
        }
    }
    perm
}

pub fn interleave(data: &[u8]) -> Vec<u8> {
    permutation(data.len()).into_iter().map(|idx| data[idx]).collect()
}

pub fn deinterleave(data: &[u8]) -> Vec<u8> {
    let n = data.len();
    let perm = permutation(n);
    let mut out = vec![0u8; n];
    for (src_pos, &dest_idx) in perm.iter().enumerate() {
        out[dest_idx] = data[src_pos];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_exact_multiple() {
        let data: Vec<u8> = (0..64u8).collect();
        let interleaved = interleave(&data);
        assert_eq!(interleaved.len(), data.len());
        assert_eq!(deinterleave(&interleaved), data);
    }

    #[test]
    fn roundtrip_non_multiple() {
        let data: Vec<u8> = (0..37u8).collect();
        let interleaved = interleave(&data);
        assert_eq!(deinterleave(&interleaved), data);
    }

    #[test]
    fn roundtrip_tiny() {
        for len in [0, 1, 3, 7, 8, 9] {
            let data: Vec<u8> = (0..len as u8).collect();
            let interleaved = interleave(&data);
            assert_eq!(deinterleave(&interleaved), data, "len={len}");
        }
    }

    #[test]
    fn spreads_adjacent_bytes() {
        let data: Vec<u8> = (0..64u8).collect();
        let interleaved = interleave(&data);
        // originally-adjacent bytes 0 and 1 should no longer be adjacent.
        let pos0 = interleaved.iter().position(|&b| b == 0).unwrap();
        let pos1 = interleaved.iter().position(|&b| b == 1).unwrap();
        assert!(pos1 - pos0 > 1);
    }
}
