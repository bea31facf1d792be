//! Top-level encoder: wires payload preparation, framing, FEC, and
//! modulation into one call that renders a complete transmission.

use crate::error::Result;
use crate::fec_chain::encode_frame;
use crate::framing::{packetize, DataFrame, HeaderFrame};
use crate::modes::{Mode, ModeParams};
use crate::modulator::{modulate_frame, preamble};
use crate::payload::prepare;

/// Pad a coded-bit vector out to a whole number of symbols so the modulator
/// never silently drops trailing bits (it groups bits into `bits_per_symbol`
/// chunks and discards any incomplete remainder).
fn pad_to_symbol_boundary(coded_bits: Vec<bool>, bits_per_symbol: u32) -> Vec<bool> {
    let mut bits = coded_bits;
    let remainder = bits.len() % bits_per_symbol as usize;
    if remainder != 0 {
        bits.resize(bits.len() + (bits_per_symbol as usize - remainder), false);
    }
    bits
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

fn encode_and_modulate(raw: &[u8], punctured: bool, params: &ModeParams) -> Vec<f32> {
    let coded_bits = encode_frame(raw, punctured);
    let padded = pad_to_symbol_boundary(coded_bits, params.bits_per_symbol);
    let packed = pack_bits(&padded);
    modulate_frame(&packed, params)
}

fn render_header(header: &HeaderFrame, punctured: bool, params: &ModeParams) -> Vec<f32> {
    encode_and_modulate(&header.to_bytes(), punctured, params)
}

fn render_data_frame(frame: &DataFrame, punctured: bool, params: &ModeParams) -> Vec<f32> {
    encode_and_modulate(&frame.to_bytes(), punctured, params)
}

/// Render `message` as a full acoustic transmission: warmup tone, chirp,
/// calibration tones, sync pattern, header (sent twice for redundancy when
/// the payload spans more than one data frame, once otherwise), then every
/// data frame.
pub fn encode(message: &[u8], mode: Mode, punctured: bool, password: Option<&str>) -> Result<Vec<f32>> {
    let params = mode.params();
    let prepared = prepare(message, password)?;
    let (header, frames) = packetize(&prepared.payload, prepared.original_len, prepared.flags)?;

    let mut audio = preamble(&params);
    audio.extend(render_header(&header, punctured, &params));
    if frames.len() > 1 {
        audio.extend(render_header(&header, punctured, &params));
    }
    for frame in &frames {
        audio.extend(render_data_frame(frame, punctured, &params));
    }
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_nonempty_audio() {
        let audio = encode(b"hello", Mode::Wideband, false, None).unwrap();
        assert!(audio.iter().any(|&s| s.abs() > 0.01));
    }

    #[test]
    fn encode_phone_mode_is_longer_per_bit() {
        let wideband = encode(b"same message", Mode::Wideband, false, None).unwrap();
        let phone = encode(b"same message", Mode::Phone, false, None).unwrap();
        assert!(phone.len() > wideband.len());
    }

    #[test]
    fn encode_with_password_succeeds() {
        let audio = encode(b"secret", Mode::Wideband, false, Some("hunter2")).unwrap();
        assert!(!audio.is_empty());
    }

    #[test]
    fn encode_punctured_is_shorter() {
        let message = b"a somewhat longer test message here";
        let full = encode(message, Mode::Wideband, false, None).unwrap();
        let punctured = encode(message, Mode::Wideband, true, None).unwrap();
        assert!(punctured.len() < full.len());
    }

    #[test]
    fn multi_frame_message_is_longer_than_one_extra_header_plus_frame() {
        // A payload that needs a second data frame should also cost a second
        // header copy, not just the extra frame.
        let one_frame = vec![0xABu8; 10];
        let two_frames = vec![0xABu8; 40];
        let params = Mode::Wideband.params();
        let header = HeaderFrame {
            flags: 0,
            total_frames: 1,
            payload_len: 0,
            original_len: 0,
            session_id: 1,
        };
        let header_audio_len = render_header(&header, false, &params).len();

        let one = encode(&one_frame, Mode::Wideband, false, None).unwrap();
        let two = encode(&two_frames, Mode::Wideband, false, None).unwrap();
        // Two-frame transmission adds a whole data frame's worth of audio
        // *and* a second header copy, so it must exceed one-frame-plus-one-
        // header-copy's worth of extra length.
        assert!(two.len() > one.len() + header_audio_len);
    }
}
