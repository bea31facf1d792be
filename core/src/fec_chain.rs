//! Glues the outer Reed-Solomon code, LFSR scrambler, inner convolutional
//! code, and block interleaver into the two whole-frame operations the
//! encoder and decoder actually call.

use crate::conv::{puncture, ConvEncoder, Viterbi};
use crate::error::Result;
use crate::interleave::{interleave, permutation};
use crate::rs;
use crate::scrambler;

/// RS-encode, scramble, convolutionally encode, optionally puncture, then
/// interleave one frame's raw bytes. Returns the coded bit stream ready for
/// modulation.
/// Number of coded bits [`encode_frame`] produces for an RS codeword of
/// `rs_encoded_len` bytes (`frame_data_len + rs::PARITY_LEN`), with or
/// without puncturing. Lets the decoder size its per-frame symbol window
/// before decoding anything.
pub fn coded_bit_len(rs_encoded_len: usize, punctured: bool) -> usize {
    let full = (rs_encoded_len * 8 + crate::conv::TAIL_BITS) * 2;
    if punctured {
        crate::conv::punctured_len(full)
    } else {
        full
    }
}

/// Number of M-FSK symbols one [`encode_frame`] output actually occupies on
/// the wire. The encoder pads the coded bit stream out to a whole symbol
/// before packing it into bytes for modulation, and byte-packing itself
/// rounds up to the next multiple of 8 bits — since `bits_per_symbol` always
/// divides 8, that second rounding can add one more whole symbol of
/// zero-padding than `coded_bit_len` alone accounts for. The decoder sizes
/// its per-frame read window with this, not with `coded_bit_len` directly,
/// or it drifts by that padding symbol after every frame.
pub fn symbols_per_frame(coded_len: usize, bits_per_symbol: u32) -> usize {
    let packed_bit_len = coded_len.div_ceil(8) * 8;
    packed_bit_len.div_ceil(bits_per_symbol as usize)
}

pub fn encode_frame(data: &[u8], punctured: bool) -> Vec<bool> {
    let rs_encoded = rs::encode(data);
    let scrambled = scrambler::scramble(&rs_encoded);
    let mut encoder = ConvEncoder::new();
    let coded_bits = encoder.encode(&scrambled);
    let coded_bits = if punctured { puncture(&coded_bits) } else { coded_bits };

    let coded_bytes = pack_bits(&coded_bits);
    let interleaved = interleave(&coded_bytes);
    unpack_bits(&interleaved, coded_bits.len())
}

/// Inverse of [`encode_frame`]: deinterleave, Viterbi-decode (de-puncturing
/// first if needed), descramble, and RS-correct. `rs_encoded_len` is the
/// RS codeword length (`data.len() + rs::PARITY_LEN`) that was originally
/// convolutionally encoded.
///
/// The interleaver moves whole 8-bit groups as a unit, so deinterleaving
/// here reorders 8-wide groups of soft values directly rather than rounding
/// to hard bits first — rounding before Viterbi would throw away exactly
/// the reliability information soft decoding exists to use.
pub fn decode_frame(soft_bits: &[f32], punctured: bool, rs_encoded_len: usize) -> Result<rs::Decoded> {
    let deinterleaved_soft = deinterleave_soft(soft_bits);

    let full_rate_len = (rs_encoded_len * 8 + 6) * 2;
    let soft = if punctured {
        crate::conv::depuncture(&deinterleaved_soft, full_rate_len)
    } else {
        deinterleaved_soft
    };

    let decoded_bytes = Viterbi::decode_soft(&soft)?;
    rs::decode(&decoded_bytes[..rs_encoded_len.min(decoded_bytes.len())])
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &b) in chunk.iter().enumerate() {
            if b {
                byte |= 1 << (7 - i);
            }
        }
        out.push(byte);
    }
    out
}

fn unpack_bits(bytes: &[u8], bit_len: usize) -> Vec<bool> {
    let mut out = Vec::with_capacity(bit_len);
    'outer: for &byte in bytes {
        for i in 0..8 {
            if out.len() >= bit_len {
                break 'outer;
            }
            out.push((byte >> (7 - i)) & 1 == 1);
        }
    }
    out
}

/// Reorder groups of 8 soft values by the interleaver's inverse byte
/// permutation, then flatten back to a bit_len-sized soft stream. Mirrors
/// [`crate::interleave::deinterleave`] but at group granularity, with no
/// intermediate packing into hard bits.
fn deinterleave_soft(soft_bits: &[f32]) -> Vec<f32> {
    let bit_len = soft_bits.len();
    let n_groups = bit_len.div_ceil(8);
    let groups: Vec<[f32; 8]> = soft_bits
        .chunks(8)
        .map(|chunk| {
            let mut arr = [0.5f32; 8];
            arr[..chunk.len()].copy_from_slice(chunk);
            arr
        })
        .collect();

    let perm = permutation(n_groups);
    let mut out_groups = vec![[0.5f32; 8]; n_groups];
    for (src_pos, &dest_idx) in perm.iter().enumerate() {
        out_groups[dest_idx] = groups[src_pos];
    }

    out_groups.into_iter().flatten().take(bit_len).collect()
}
