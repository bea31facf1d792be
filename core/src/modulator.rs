//! M-FSK modulator: turns an encoded-frame bitstream into tone bursts, and
//! assembles the full transmission (warmup, chirp, calibration, sync, data).

use std::f32::consts::PI;

use crate::chirp::generate_updown_chirp;
use crate::modes::ModeParams;

const AMPLITUDE: f32 = 0.7;
const TAPER_MS: f32 = 3.0;

/// Render a sine burst at `freq_hz` for `duration_samples`, with a short
/// raised-cosine taper at each edge to avoid clicks between symbols.
fn tone_burst(freq_hz: f32, duration_samples: usize, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let taper_samples = ((sample_rate as f32 * TAPER_MS / 1000.0) as usize).min(duration_samples / 2).max(1);
    (0..duration_samples)
        .map(|n| {
            let phase = 2.0 * PI * freq_hz * n as f32 / sample_rate as f32;
            let mut sample = amplitude * phase.sin();
            if n < taper_samples {
                let w = 0.5 * (1.0 - (PI * n as f32 / taper_samples as f32).cos());
                sample *= w;
            } else if n >= duration_samples - taper_samples {
                let k = duration_samples - 1 - n;
                let w = 0.5 * (1.0 - (PI * k as f32 / taper_samples as f32).cos());
                sample *= w;
            }
            sample
        })
        .collect()
}

fn silence(duration_samples: usize) -> Vec<f32> {
    vec![0.0f32; duration_samples]
}

fn emit_symbol(out: &mut Vec<f32>, tone_index: usize, params: &ModeParams) {
    out.extend(tone_burst(
        params.tone_freq(tone_index),
        params.symbol_samples(),
        params.sample_rate,
        AMPLITUDE,
    ));
    out.extend(silence(params.guard_samples()));
}

/// Pack `data` into `bits_per_symbol`-wide tone indices, MSB-first, dropping
/// any trailing bits that don't fill a whole symbol (callers pad to a whole
/// number of symbols upstream via the convolutional tail).
pub fn bytes_to_symbols(data: &[u8], bits_per_symbol: u32) -> Vec<usize> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for i in 0..8 {
            bits.push((byte >> (7 - i)) & 1);
        }
    }
    bits.chunks(bits_per_symbol as usize)
        .filter(|c| c.len() == bits_per_symbol as usize)
        .map(|chunk| chunk.iter().fold(0usize, |acc, &b| (acc << 1) | b as usize))
        .collect()
}

/// Inverse (in expectation) of [`bytes_to_symbols`]'s bit grouping: turn one
/// symbol's per-tone soft-byte vector into `bits_per_symbol` soft bit
/// likelihoods in `[0,1]`, by marginalizing the tone confidence over which
/// tone indices have that bit set. Feeds the Viterbi decoder, which expects
/// one soft value per coded bit rather than one per M-ary tone.
pub fn symbol_soft_to_bits(soft_tones: &[u8], bits_per_symbol: u32) -> Vec<f32> {
    let total: u32 = soft_tones.iter().map(|&v| v as u32).sum();
    if total == 0 {
        return vec![0.5; bits_per_symbol as usize];
    }
    (0..bits_per_symbol)
        .map(|bit_pos| {
            let shift = bits_per_symbol - 1 - bit_pos;
            let ones: u32 = soft_tones
                .iter()
                .enumerate()
                .filter(|(tone, _)| (*tone as u32 >> shift) & 1 == 1)
                .map(|(_, &v)| v as u32)
                .sum();
            ones as f32 / total as f32
        })
        .collect()
}

/// Render a data-frame's encoded bytes as audio (one tone burst per symbol).
pub fn modulate_frame(encoded: &[u8], params: &ModeParams) -> Vec<f32> {
    let symbols = bytes_to_symbols(encoded, params.bits_per_symbol);
    let mut out = Vec::with_capacity(symbols.len() * params.symbol_period_samples());
    for symbol in symbols {
        emit_symbol(&mut out, symbol, params);
    }
    out
}

/// Render the warmup tone, up-down chirp, calibration tones, and sync
/// pattern that precede every transmission.
pub fn preamble(params: &ModeParams) -> Vec<f32> {
    let mut out = Vec::new();

    out.extend(tone_burst(
        params.tone_freq(0),
        params.warmup_samples(),
        params.sample_rate,
        AMPLITUDE,
    ));

    out.extend(generate_updown_chirp(params, AMPLITUDE));

    for _ in 0..params.calibration_repeats {
        for &tone in &params.calibration_tones {
            emit_symbol(&mut out, tone, params);
        }
    }

    for &tone in &params.sync_pattern {
        emit_symbol(&mut out, tone, params);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::Mode;

    #[test]
    fn bytes_to_symbols_round_numbers() {
        let data = vec![0b11001000u8];
        let symbols = bytes_to_symbols(&data, 4);
        assert_eq!(symbols, vec![0b1100, 0b1000]);
    }

    #[test]
    fn modulate_frame_has_expected_length() {
        let params = Mode::Phone.params();
        let data = vec![0xAAu8, 0x55];
        let audio = modulate_frame(&data, &params);
        let symbols = bytes_to_symbols(&data, params.bits_per_symbol);
        assert_eq!(audio.len(), symbols.len() * params.symbol_period_samples());
    }

    #[test]
    fn preamble_is_nonzero() {
        let params = Mode::Wideband.params();
        let audio = preamble(&params);
        assert!(audio.iter().any(|&s| s.abs() > 0.01));
    }

    #[test]
    fn symbol_soft_to_bits_recovers_one_hot_tone() {
        // Tone 0b10 (index 2) with bits_per_symbol=2: MSB=1, LSB=0.
        let mut soft = vec![0u8; 4];
        soft[2] = 255;
        let bits = symbol_soft_to_bits(&soft, 2);
        assert_eq!(bits.len(), 2);
        assert!(bits[0] > 0.9);
        assert!(bits[1] < 0.1);
    }

    #[test]
    fn tone_burst_tapers_to_near_zero_at_edges() {
        let burst = tone_burst(1000.0, 800, 16000, 0.7);
        assert!(burst[0].abs() < 0.1);
        assert!(burst[burst.len() - 1].abs() < 0.1);
    }
}
