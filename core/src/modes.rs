//! Mode parameter tables.
//!
//! A [`Mode`] is a fixed, named parameter set chosen once per transmission
//! and carried explicitly by the caller on every encode/decode call — there
//! is no process-global "current mode".

/// Acoustic transmission mode. Not carried on the wire; the receiver
/// identifies it from the chirp/calibration templates it correlates best
/// against (see `chirp.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Phone,
    Wideband,
}

impl Mode {
    pub fn params(self) -> ModeParams {
        match self {
            Mode::Phone => ModeParams::phone(),
            Mode::Wideband => ModeParams::wideband(),
        }
    }

    pub const ALL: [Mode; 2] = [Mode::Phone, Mode::Wideband];
}

/// Immutable per-mode configuration. Constructed once and passed by value;
/// cheap to copy (all fields are plain numbers / small fixed arrays).
#[derive(Debug, Clone)]
pub struct ModeParams {
    pub mode: Mode,
    pub sample_rate: u32,
    pub symbol_ms: u32,
    pub guard_ms: u32,
    pub num_tones: usize,
    pub bits_per_symbol: u32,
    pub base_freq: f32,
    pub tone_spacing: f32,
    pub warmup_ms: u32,
    pub chirp_ms: u32,
    pub chirp_start_hz: f32,
    pub chirp_peak_hz: f32,
    pub calibration_tones: Vec<usize>,
    pub calibration_repeats: u32,
    pub sync_pattern: [usize; 8],
}

impl ModeParams {
    pub fn phone() -> Self {
        ModeParams {
            mode: Mode::Phone,
            sample_rate: 16_000,
            symbol_ms: 50,
            guard_ms: 12,
            num_tones: 4,
            bits_per_symbol: 2,
            base_freq: 800.0,
            tone_spacing: 500.0,
            warmup_ms: 200,
            chirp_ms: 200,
            chirp_start_hz: 600.0,
            chirp_peak_hz: 2600.0,
            calibration_tones: vec![0, 3],
            calibration_repeats: 2,
            sync_pattern: [0, 3, 0, 3, 0, 3, 0, 3],
        }
    }

    pub fn wideband() -> Self {
        ModeParams {
            mode: Mode::Wideband,
            sample_rate: 16_000,
            symbol_ms: 40,
            guard_ms: 5,
            num_tones: 16,
            bits_per_symbol: 4,
            base_freq: 1800.0,
            tone_spacing: 260.0,
            warmup_ms: 150,
            chirp_ms: 150,
            chirp_start_hz: 1500.0,
            chirp_peak_hz: 6000.0,
            calibration_tones: vec![0, 15],
            calibration_repeats: 2,
            sync_pattern: [0, 15, 0, 15, 0, 15, 0, 15],
        }
    }

    /// Frequency in Hz of the `i`-th tone (0-indexed).
    pub fn tone_freq(&self, i: usize) -> f32 {
        self.base_freq + i as f32 * self.tone_spacing
    }

    pub fn symbol_samples(&self) -> usize {
        (self.sample_rate as usize * self.symbol_ms as usize) / 1000
    }

    pub fn guard_samples(&self) -> usize {
        (self.sample_rate as usize * self.guard_ms as usize) / 1000
    }

    pub fn symbol_period_samples(&self) -> usize {
        self.symbol_samples() + self.guard_samples()
    }

    pub fn warmup_samples(&self) -> usize {
        (self.sample_rate as usize * self.warmup_ms as usize) / 1000
    }

    pub fn chirp_samples(&self) -> usize {
        (self.sample_rate as usize * self.chirp_ms as usize) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tones_match_bits_per_symbol() {
        for mode in Mode::ALL {
            let p = mode.params();
            assert_eq!(p.num_tones, 1 << p.bits_per_symbol);
        }
    }

    #[test]
    fn tone_frequencies_are_monotonic() {
        let p = Mode::Wideband.params();
        let mut last = 0.0;
        for i in 0..p.num_tones {
            let f = p.tone_freq(i);
            assert!(f > last);
            last = f;
        }
    }

    #[test]
    fn symbol_period_includes_guard() {
        let p = Mode::Phone.params();
        assert_eq!(
            p.symbol_period_samples(),
            p.symbol_samples() + p.guard_samples()
        );
    }
}
