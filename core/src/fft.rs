//! Per-symbol tone detection: FFT magnitude spectrum, hard and soft tone
//! decisions, and a frequency-offset tracker used during calibration.

use std::cell::RefCell;
use realfft::RealFftPlanner;

use crate::modes::ModeParams;

thread_local! {
    static PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
}

fn next_power_of_two(n: usize) -> usize {
    let mut power = 1usize;
    while power < n {
        power <<= 1;
    }
    power
}

/// Magnitude spectrum of `samples`, zero-padded to the next power of two.
/// Returns `(magnitudes, bin_hz)`.
fn magnitude_spectrum(samples: &[f32], sample_rate: u32) -> (Vec<f32>, f32) {
    let fft_size = next_power_of_two(samples.len()).max(2);
    let mut padded = vec![0.0f32; fft_size];
    padded[..samples.len()].copy_from_slice(samples);

    let spectrum = PLANNER.with(|p| {
        let mut planner = p.borrow_mut();
        let r2c = planner.plan_fft_forward(fft_size);
        let mut out = r2c.make_output_vec();
        r2c.process(&mut padded, &mut out).expect("fixed-size real FFT cannot fail");
        out
    });

    let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
    let bin_hz = sample_rate as f32 / fft_size as f32;
    (magnitudes, bin_hz)
}

/// Sum and peak magnitude in the bins covering `[center_hz - half, center_hz + half]`.
fn tone_strength(magnitudes: &[f32], bin_hz: f32, center_hz: f32, half_width_hz: f32) -> (f32, f32) {
    let lo = ((center_hz - half_width_hz) / bin_hz).max(0.0) as usize;
    let hi = (((center_hz + half_width_hz) / bin_hz) as usize).min(magnitudes.len().saturating_sub(1));
    if lo > hi {
        return (0.0, 0.0);
    }
    let slice = &magnitudes[lo..=hi];
    let sum: f32 = slice.iter().sum();
    let peak = slice.iter().cloned().fold(0.0f32, f32::max);
    (sum, peak)
}

/// Result of detecting one symbol: the chosen tone index plus a confidence
/// in `[0,1]`, and a per-tone soft-byte vector for Viterbi-ready output.
pub struct ToneDetection {
    pub hard: usize,
    pub hard_confidence: f32,
    pub soft: Vec<u8>,
}

/// Detect the tone present in `symbol_samples`, using `freq_offset_hz` to
/// shift the expected tone bins (tracked separately, see
/// [`FrequencyOffsetTracker`]).
pub fn detect_symbol(symbol_samples: &[f32], params: &ModeParams, freq_offset_hz: f32) -> ToneDetection {
    let (magnitudes, bin_hz) = magnitude_spectrum(symbol_samples, params.sample_rate);
    let half_width = params.tone_spacing / 2.0;

    let mut strengths = Vec::with_capacity(params.num_tones);
    for i in 0..params.num_tones {
        let center = params.tone_freq(i) + freq_offset_hz;
        let (sum, peak) = tone_strength(&magnitudes, bin_hz, center, half_width);
        strengths.push(0.3 * sum + 0.7 * peak);
    }

    let (hard, &best) = strengths
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, v)| (i, v))
        .unwrap_or((0, &0.0));
    let avg = strengths.iter().sum::<f32>() / strengths.len().max(1) as f32;
    let hard_confidence = if avg > 0.0 { (best / avg).min(1.0) } else { 0.0 };

    let max_strength = strengths.iter().cloned().fold(0.0f32, f32::max);
    let soft = if max_strength > 0.0 {
        strengths
            .iter()
            .map(|&s| ((s / max_strength) * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect()
    } else {
        vec![0u8; strengths.len()]
    };

    ToneDetection {
        hard,
        hard_confidence,
        soft,
    }
}

/// Estimates and tracks a carrier frequency offset, clamped to +/-30Hz, by
/// weighting the magnitude spectrum around each expected calibration tone.
pub struct FrequencyOffsetTracker {
    estimate_hz: f32,
}

impl FrequencyOffsetTracker {
    pub fn new() -> Self {
        FrequencyOffsetTracker { estimate_hz: 0.0 }
    }

    pub fn estimate(&self) -> f32 {
        self.estimate_hz
    }

    /// Update the estimate from a calibration symbol known to carry
    /// `expected_tone`.
    pub fn observe(&mut self, symbol_samples: &[f32], params: &ModeParams, expected_tone: usize) {
        let (magnitudes, bin_hz) = magnitude_spectrum(symbol_samples, params.sample_rate);
        let center = params.tone_freq(expected_tone);
        let search_half = 100.0f32;
        let lo = ((center - search_half) / bin_hz).max(0.0) as usize;
        let hi = (((center + search_half) / bin_hz) as usize).min(magnitudes.len().saturating_sub(1));
        if lo > hi {
            return;
        }

        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;
        for bin in lo..=hi {
            let freq = bin as f32 * bin_hz;
            let w = magnitudes[bin];
            weighted_sum += w * (freq - center);
            weight_total += w;
        }

        if weight_total > 0.0 {
            let error = weighted_sum / weight_total;
            self.estimate_hz = (self.estimate_hz * 0.5 + error * 0.5).clamp(-30.0, 30.0);
        }
    }
}

impl Default for FrequencyOffsetTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::Mode;
    use std::f32::consts::PI;

    fn tone_signal(freq: f32, samples: usize, sample_rate: u32) -> Vec<f32> {
        (0..samples)
            .map(|n| (2.0 * PI * freq * n as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn detects_correct_tone_cleanly() {
        let params = Mode::Wideband.params();
        for tone_idx in [0, 5, 15] {
            let freq = params.tone_freq(tone_idx);
            let signal = tone_signal(freq, params.symbol_samples(), params.sample_rate);
            let detection = detect_symbol(&signal, &params, 0.0);
            assert_eq!(detection.hard, tone_idx);
        }
    }

    #[test]
    fn soft_output_peaks_at_hard_tone() {
        let params = Mode::Phone.params();
        let freq = params.tone_freq(2);
        let signal = tone_signal(freq, params.symbol_samples(), params.sample_rate);
        let detection = detect_symbol(&signal, &params, 0.0);
        let max_idx = detection
            .soft
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_idx, detection.hard);
    }

    #[test]
    fn frequency_offset_tracker_converges() {
        let params = Mode::Wideband.params();
        let true_offset = 15.0f32;
        let mut tracker = FrequencyOffsetTracker::new();
        for _ in 0..5 {
            let signal = tone_signal(
                params.tone_freq(0) + true_offset,
                params.symbol_samples(),
                params.sample_rate,
            );
            tracker.observe(&signal, &params, 0);
        }
        assert!(tracker.estimate() > 0.0);
        assert!(tracker.estimate() <= 30.0);
    }
}
