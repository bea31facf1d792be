//! FFT-based correlation for 1D real-valued signals
//!
//! Provides efficient cross-correlation using FFT with configurable output modes (Full, Same, Valid)
//! matching scipy/numpy conventions. Uses thread-local FFT planner caching for optimal performance.

use std::cell::RefCell;
use realfft::RealFftPlanner;
use crate::error::{ModemError, Result};

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f32>> = RefCell::new(RealFftPlanner::new());
}

/// Output mode for correlation
///
/// Determines the size of the correlation output:
/// - `Full`: Complete correlation (length = signal.len() + template.len() - 1)
/// - `Same`: Centered output matching signal size (length = signal.len())
/// - `Valid`: Only fully-overlapping region (length = signal.len() - template.len() + 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full correlation output (signal.len() + template.len() - 1 samples)
    Full,
    /// Centered output matching first input size (signal.len() samples)
    Same,
    /// Only fully-overlapping region (signal.len() - template.len() + 1 samples)
    Valid,
}

fn next_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let mut power = 1;
    while power < n {
        power <<= 1;
    }
    power
}

/// Correlate two 1D signals using FFT
///
/// Computes cross-correlation efficiently using FFT with O(N log N) complexity.
/// The `mode` parameter controls output size:
/// - `Mode::Full`: Returns complete correlation (signal.len() + template.len() - 1)
/// - `Mode::Same`: Returns centered output matching signal.len()
/// - `Mode::Valid`: Returns only fully-overlapping region (signal.len() - template.len() + 1)
///
/// Returns an empty vector if either input is empty or if Valid mode is used
/// with signal shorter than template.
///
/// # Errors
///
/// Returns `ModemError::FftError` if FFT processing fails.
pub fn fft_correlate_1d(signal: &[f32], template: &[f32], mode: Mode) -> Result<Vec<f32>> {
    // Early validation for empty inputs
    if signal.is_empty() || template.is_empty() {
        return Ok(Vec::new());
    }

    let output_len = signal.len() + template.len() - 1;
    let fft_size = next_power_of_two(output_len);

    // Zero-pad both signal and template to fft_size
    let mut padded_signal = vec![0.0; fft_size];
    let mut padded_template = vec![0.0; fft_size];
    padded_signal[..signal.len()].copy_from_slice(signal);

    // Reverse template for correlation (equivalent to conjugation in frequency domain)
    for (i, &val) in template.iter().enumerate().rev() {
        padded_template[template.len() - 1 - i] = val;
    }

    // Get FFT plans from planner (RealFftPlanner has internal caching)
    let (r2c, c2r) = FFT_PLANNER.with(|planner| {
        let mut planner_ref = planner.borrow_mut();
        let r2c = planner_ref.plan_fft_forward(fft_size);
        let c2r = planner_ref.plan_fft_inverse(fft_size);
        (r2c, c2r)
    });

    // Allocate buffers for FFT output (complex)
    let mut signal_spectrum = r2c.make_output_vec();
    let mut template_spectrum = r2c.make_output_vec();

    // Forward FFT on both signal and template
    debug_assert_eq!(padded_signal.len(), fft_size, "Signal buffer size mismatch");
    debug_assert_eq!(padded_template.len(), fft_size, "Template buffer size mismatch");
    r2c.process(&mut padded_signal, &mut signal_spectrum)
        .map_err(|e| ModemError::FftError(format!("FFT forward process failed for signal: {:?}", e)))?;
    r2c.process(&mut padded_template, &mut template_spectrum)
        .map_err(|e| ModemError::FftError(format!("FFT forward process failed for template: {:?}", e)))?;

    // Frequency domain multiplication (element-wise)
    // For correlation, we already reversed template, so just multiply in-place
    for i in 0..signal_spectrum.len() {
        signal_spectrum[i] *= template_spectrum[i];
    }

    // Inverse FFT
    let mut result_time = vec![0.0; fft_size];
    debug_assert_eq!(signal_spectrum.len(), r2c.make_output_vec().len(), "Spectrum buffer size mismatch");
    debug_assert_eq!(result_time.len(), fft_size, "Output buffer size mismatch");
    c2r.process(&mut signal_spectrum, &mut result_time)
        .map_err(|e| ModemError::FftError(format!("FFT inverse process failed: {:?}", e)))?;

    // Normalize by FFT size
    let normalization = fft_size as f32;
    result_time.iter_mut().for_each(|x| *x /= normalization);

    // Mode-based output trimming
    match mode {
        Mode::Full => {
            result_time.truncate(output_len);
            Ok(result_time)
        }
        Mode::Same => {
            let start = (output_len - signal.len()) / 2;
            Ok(result_time[start..start + signal.len()].to_vec())
        }
        Mode::Valid => {
            if signal.len() < template.len() {
                return Ok(Vec::new());
            }
            let valid_len = signal.len() - template.len() + 1;
            let start = template.len() - 1;
            Ok(result_time[start..start + valid_len].to_vec())
        }
    }
}
