//! Chirp generation and two-stage (coarse, then refine) matched-filter sync
//! detection, scored against both modes' templates.

use std::f32::consts::PI;

use crate::fft_correlation::{fft_correlate_1d, Mode as CorrMode};
use crate::modes::{Mode, ModeParams};

/// Generate a linear chirp (continuous phase) from `start_freq` to
/// `end_freq` over `duration_samples`, at the given sample rate.
pub fn generate_chirp(duration_samples: usize, start_freq: f32, end_freq: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let sr = sample_rate as f32;
    let duration = duration_samples as f32 / sr;
    let k = (end_freq - start_freq) / duration;
    (0..duration_samples)
        .map(|n| {
            let t = n as f32 / sr;
            let phase = 2.0 * PI * (start_freq * t + k * t * t / 2.0);
            amplitude * phase.sin()
        })
        .collect()
}

/// Up-chirp followed by a matched down-chirp, phase continuous across the
/// splice.
pub fn generate_updown_chirp(params: &ModeParams, amplitude: f32) -> Vec<f32> {
    let half = params.chirp_samples() / 2;
    let mut up = generate_chirp(
        half,
        params.chirp_start_hz,
        params.chirp_peak_hz,
        params.sample_rate,
        amplitude,
    );
    let down = generate_chirp(
        half,
        params.chirp_peak_hz,
        params.chirp_start_hz,
        params.sample_rate,
        amplitude,
    );
    up.extend(down);
    up
}

const COARSE_STEP: usize = 320; // ~20ms at 16kHz
const THRESHOLD: f32 = 0.35;

/// Result of a chirp search: the sample index just past the chirp, the
/// mode whose template scored higher, and a confidence in [0,1].
#[derive(Debug, Clone, Copy)]
pub struct ChirpDetection {
    pub chirp_end_sample: usize,
    pub mode: Mode,
    pub confidence: f32,
}

fn normalized_peak(buffer: &[f32], template: &[f32]) -> Option<(usize, f32)> {
    if buffer.len() < template.len() {
        return None;
    }
    let template_energy: f32 = template.iter().map(|x| x * x).sum::<f32>().sqrt();
    if template_energy == 0.0 {
        return None;
    }

    let corr = fft_correlate_1d(buffer, template, CorrMode::Valid).ok()?;
    if corr.is_empty() {
        return None;
    }

    let mut best_idx = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, &c) in corr.iter().enumerate().step_by(COARSE_STEP.max(1)) {
        let window_energy: f32 = buffer[i..i + template.len()]
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .sqrt();
        let score = if window_energy > 0.0 {
            c.abs() / (window_energy * template_energy)
        } else {
            0.0
        };
        if score > best_score {
            best_score = score;
            best_idx = i;
        }
    }

    // Refine: unit-step search in a neighborhood around the coarse peak.
    let lo = best_idx.saturating_sub(COARSE_STEP);
    let hi = (best_idx + COARSE_STEP).min(corr.len().saturating_sub(1));
    for i in lo..=hi {
        if i >= corr.len() {
            break;
        }
        let window_energy: f32 = buffer[i..i + template.len()]
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .sqrt();
        let score = if window_energy > 0.0 {
            corr[i].abs() / (window_energy * template_energy)
        } else {
            0.0
        };
        if score > best_score {
            best_score = score;
            best_idx = i;
        }
    }

    Some((best_idx, best_score))
}

/// Search `buffer` for either mode's up-down chirp template, returning the
/// higher-scoring mode if it clears [`THRESHOLD`].
pub fn detect(buffer: &[f32]) -> Option<ChirpDetection> {
    let mut best: Option<ChirpDetection> = None;
    for mode in Mode::ALL {
        let params = mode.params();
        let template = generate_updown_chirp(&params, 1.0);
        if let Some((start, score)) = normalized_peak(buffer, &template) {
            if score >= THRESHOLD && best.map(|b| score > b.confidence).unwrap_or(true) {
                best = Some(ChirpDetection {
                    chirp_end_sample: start + template.len(),
                    mode,
                    confidence: score.min(1.0),
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chirp_has_expected_length() {
        let params = Mode::Wideband.params();
        let chirp = generate_updown_chirp(&params, 1.0);
        assert_eq!(chirp.len(), params.chirp_samples());
    }

    #[test]
    fn detects_embedded_chirp() {
        let params = Mode::Wideband.params();
        let template = generate_updown_chirp(&params, 1.0);

        let mut signal = vec![0.0f32; 2000];
        signal.extend_from_slice(&template);
        signal.extend(vec![0.0f32; 2000]);

        let detection = detect(&signal).expect("chirp should be detected");
        assert_eq!(detection.mode, Mode::Wideband);
        let expected_end = 2000 + template.len();
        assert!(
            (detection.chirp_end_sample as i64 - expected_end as i64).abs() < 50,
            "got {}, expected near {}",
            detection.chirp_end_sample,
            expected_end
        );
    }

    #[test]
    fn silence_is_not_detected() {
        let signal = vec![0.0f32; 6000];
        assert!(detect(&signal).is_none());
    }
}
