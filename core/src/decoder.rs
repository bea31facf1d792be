//! Decoder state machine: owns the sample ring buffer and carries incoming
//! audio through chirp sync, phase/mode lock, per-symbol FFT detection,
//! FEC decoding, and frame reassembly.
//!
//! Replaces a reactive progress container with an explicit, caller-polled
//! [`Progress`] snapshot (see SPEC_FULL.md §9) and an enum carrying its own
//! per-state data instead of loose booleans.

use log::{debug, warn};

use crate::chirp;
use crate::collector::FrameCollector;
use crate::error::{ModemError, Result};
use crate::fec_chain;
use crate::fft::{detect_symbol, FrequencyOffsetTracker, ToneDetection};
use crate::framing::{data_frame_wire_lengths, DataFrame, HeaderFrame};
use crate::modes::{Mode, ModeParams};
use crate::modulator::symbol_soft_to_bits;
use crate::payload;
use crate::progress::Progress;
use crate::ring_buffer::RingBuffer;
use crate::rs;

const SAMPLE_RATE: u32 = 16_000;
const RING_SECONDS: u32 = 60;
/// Coarse energy probe window (~50ms at 16kHz) used only to decide when to
/// start spending cycles on chirp correlation; not used for symbol timing.
const ENERGY_WINDOW: usize = 800;
const ENERGY_THRESHOLD: f32 = 0.05;
const HEADER_WARN_FAILURES: u32 = 5;
const HEADER_SWITCH_FAILURES: u32 = 15;
const PHASES: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStateKind {
    Idle,
    Listening,
    DetectingPreamble,
    ReceivingHeader,
    ReceivingData,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy)]
struct SyncLock {
    mode: Mode,
    /// Absolute sample index at which the next symbol's tone window begins.
    cursor: u64,
}

enum DecoderState {
    Idle,
    Listening,
    DetectingPreamble,
    ReceivingHeader {
        header_failures: u32,
        lock: SyncLock,
    },
    ReceivingData {
        collector: FrameCollector,
        lock: SyncLock,
        frame_lengths: Vec<usize>,
        next_frame: usize,
        bytes_corrected: u32,
    },
    Complete {
        payload: Vec<u8>,
        sha256: [u8; 32],
        bytes_corrected: u32,
    },
    Error {
        kind: ModemError,
    },
}

impl DecoderState {
    fn kind(&self) -> DecoderStateKind {
        match self {
            DecoderState::Idle => DecoderStateKind::Idle,
            DecoderState::Listening => DecoderStateKind::Listening,
            DecoderState::DetectingPreamble => DecoderStateKind::DetectingPreamble,
            DecoderState::ReceivingHeader { .. } => DecoderStateKind::ReceivingHeader,
            DecoderState::ReceivingData { .. } => DecoderStateKind::ReceivingData,
            DecoderState::Complete { .. } => DecoderStateKind::Complete,
            DecoderState::Error { .. } => DecoderStateKind::Error,
        }
    }
}

/// Expected hard-tone sequence of the calibration-plus-sync block: the
/// calibration tone list repeated `calibration_repeats` times, then the
/// 8-symbol sync pattern.
fn expected_preamble_pattern(params: &ModeParams) -> Vec<usize> {
    let mut seq = Vec::new();
    for _ in 0..params.calibration_repeats {
        seq.extend_from_slice(&params.calibration_tones);
    }
    seq.extend_from_slice(&params.sync_pattern);
    seq
}

fn other_mode(mode: Mode) -> Mode {
    match mode {
        Mode::Phone => Mode::Wideband,
        Mode::Wideband => Mode::Phone,
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Streaming acoustic-modem decoder. Callers push sample chunks of whatever
/// size is convenient (≈100ms is typical) and read back a [`Progress`]
/// snapshot after each push.
pub struct Decoder {
    ring: RingBuffer,
    state: DecoderState,
    punctured: bool,
    password: Option<String>,
    freq_tracker: FrequencyOffsetTracker,
    listening_start: u64,
    modes_tried: Vec<Mode>,
}

impl Decoder {
    pub fn new(punctured: bool, password: Option<String>) -> Self {
        Decoder {
            ring: RingBuffer::with_seconds(SAMPLE_RATE, RING_SECONDS),
            state: DecoderState::Idle,
            punctured,
            password,
            freq_tracker: FrequencyOffsetTracker::new(),
            listening_start: 0,
            modes_tried: Vec::new(),
        }
    }

    /// Enter `Listening`. Must be called once before the first
    /// [`Decoder::push_samples`].
    pub fn start(&mut self) {
        self.listening_start = self.ring.written();
        self.modes_tried.clear();
        self.state = DecoderState::Listening;
    }

    /// Append samples and drive the state machine as far as currently
    /// buffered audio allows, returning a snapshot of where it landed.
    pub fn push_samples(&mut self, samples: &[f32]) -> Progress {
        self.ring.push_slice(samples);
        while self.step() {}
        self.progress()
    }

    pub fn progress(&self) -> Progress {
        let mut progress = Progress::idle();
        progress.state = self.state.kind();
        progress.signal_level = rms(
            &self
                .ring
                .read(
                    self.ring.written().saturating_sub(ENERGY_WINDOW as u64),
                    self.ring.written(),
                )
                .unwrap_or_default(),
        );
        match &self.state {
            DecoderState::ReceivingHeader { header_failures, .. } => {
                progress.warning = *header_failures >= HEADER_WARN_FAILURES;
            }
            DecoderState::ReceivingData {
                collector,
                bytes_corrected,
                ..
            } => {
                progress.frames_received = collector.frames_received() as u32;
                progress.frames_total = collector.total_frames() as u32;
                progress.bytes_corrected = *bytes_corrected;
            }
            DecoderState::Complete { bytes_corrected, .. } => {
                progress.bytes_corrected = *bytes_corrected;
            }
            _ => {}
        }
        progress
    }

    /// The recovered payload and its SHA-256, once `Complete`.
    pub fn result(&self) -> Option<(&[u8], [u8; 32])> {
        match &self.state {
            DecoderState::Complete { payload, sha256, .. } => Some((payload, *sha256)),
            _ => None,
        }
    }

    /// Current state, without the per-state payload. Lets callers like
    /// [`decode_all`] tell "stream ended before any sync lock" apart from
    /// "stream ended mid-frame" once `push_samples` has nothing left to feed.
    pub fn state_kind(&self) -> DecoderStateKind {
        self.state.kind()
    }

    pub fn error(&self) -> Option<&ModemError> {
        match &self.state {
            DecoderState::Error { kind } => Some(kind),
            _ => None,
        }
    }

    /// Advance the state machine by one step. Returns `true` if a
    /// transition happened (caller should call again immediately), `false`
    /// if blocked waiting on more samples.
    fn step(&mut self) -> bool {
        match std::mem::replace(&mut self.state, DecoderState::Idle) {
            DecoderState::Idle => {
                self.state = DecoderState::Idle;
                false
            }
            DecoderState::Listening => self.step_listening(),
            DecoderState::DetectingPreamble => self.step_preamble(),
            DecoderState::ReceivingHeader { header_failures, lock } => {
                self.step_header(header_failures, lock)
            }
            DecoderState::ReceivingData {
                collector,
                lock,
                frame_lengths,
                next_frame,
                bytes_corrected,
            } => self.step_data(collector, lock, frame_lengths, next_frame, bytes_corrected),
            done @ (DecoderState::Complete { .. } | DecoderState::Error { .. }) => {
                self.state = done;
                false
            }
        }
    }

    fn step_listening(&mut self) -> bool {
        let end = self.ring.written();
        if end < self.listening_start + ENERGY_WINDOW as u64 {
            self.state = DecoderState::Listening;
            return false;
        }
        let start = end - ENERGY_WINDOW as u64;
        let window = self.ring.read(start, end).unwrap_or_default();
        if rms(&window) > ENERGY_THRESHOLD {
            debug!("signal energy above threshold, entering preamble detection");
            self.state = DecoderState::DetectingPreamble;
            true
        } else {
            self.listening_start = end;
            self.state = DecoderState::Listening;
            false
        }
    }

    fn step_preamble(&mut self) -> bool {
        let start = self.listening_start;
        let end = self.ring.written();
        let Some(buffer) = self.ring.read(start, end) else {
            self.state = DecoderState::DetectingPreamble;
            return false;
        };

        let Some(detection) = chirp::detect(&buffer) else {
            self.state = DecoderState::DetectingPreamble;
            return false;
        };

        let chirp_end = start + detection.chirp_end_sample as u64;
        match self.lock_sync(chirp_end, detection.mode) {
            Some(lock) => {
                debug!("locked mode {:?} at sample {}", lock.mode, lock.cursor);
                if !self.modes_tried.contains(&lock.mode) {
                    self.modes_tried.push(lock.mode);
                }
                self.state = DecoderState::ReceivingHeader {
                    header_failures: 0,
                    lock,
                };
                true
            }
            None => {
                self.state = DecoderState::DetectingPreamble;
                false
            }
        }
    }

    /// Try to confirm the calibration+sync block at each of four candidate
    /// phase offsets, first against `hinted_mode` (from the chirp template
    /// that scored highest), then the other mode if that fails entirely.
    fn lock_sync(&mut self, chirp_end: u64, hinted_mode: Mode) -> Option<SyncLock> {
        for mode in [hinted_mode, other_mode(hinted_mode)] {
            let params = mode.params();
            let pattern = expected_preamble_pattern(&params);
            let tolerance = if mode == Mode::Wideband { 1 } else { 0 };
            let period = params.symbol_period_samples() as u64;

            for phase_idx in 0..PHASES {
                let phase_offset = phase_idx * period / PHASES;
                let cursor0 = chirp_end + phase_offset;
                let Some(hard) = self.extract_hard_tones(cursor0, &params, pattern.len()) else {
                    // Not enough samples buffered yet for any phase at this
                    // mode; no point trying the other phases or mode either.
                    return None;
                };
                let mismatches = hard.iter().zip(&pattern).filter(|(a, b)| *a != *b).count();
                if mismatches <= tolerance {
                    return Some(SyncLock {
                        mode,
                        cursor: cursor0 + pattern.len() as u64 * period,
                    });
                }
            }
        }
        None
    }

    fn extract_hard_tones(&self, start: u64, params: &ModeParams, count: usize) -> Option<Vec<usize>> {
        Some(
            self.extract_detections(start, params, count)?
                .iter()
                .map(|d| d.hard)
                .collect(),
        )
    }

    fn extract_detections(&self, start: u64, params: &ModeParams, count: usize) -> Option<Vec<ToneDetection>> {
        let symbol_samples = params.symbol_samples();
        let period = params.symbol_period_samples() as u64;
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let s = start + i as u64 * period;
            let e = s + symbol_samples as u64;
            let window = self.ring.read(s, e)?;
            out.push(detect_symbol(&window, params, self.freq_tracker.estimate()));
        }
        Some(out)
    }

    fn step_header(&mut self, header_failures: u32, lock: SyncLock) -> bool {
        let params = lock.mode.params();
        let rs_encoded_len = crate::framing::HEADER_SIZE + rs::PARITY_LEN;
        let coded_len = fec_chain::coded_bit_len(rs_encoded_len, self.punctured);
        let symbols_needed = fec_chain::symbols_per_frame(coded_len, params.bits_per_symbol);
        let period = params.symbol_period_samples() as u64;

        let Some(detections) = self.extract_detections(lock.cursor, &params, symbols_needed) else {
            self.state = DecoderState::ReceivingHeader { header_failures, lock };
            return false;
        };

        let mut bits: Vec<f32> = detections
            .iter()
            .flat_map(|d| symbol_soft_to_bits(&d.soft, params.bits_per_symbol))
            .collect();
        bits.truncate(coded_len);
        let next_cursor = lock.cursor + symbols_needed as u64 * period;

        let header = fec_chain::decode_frame(&bits, self.punctured, rs_encoded_len)
            .ok()
            .and_then(|decoded| HeaderFrame::from_bytes(&decoded.data).ok());

        match header {
            Some(header) => {
                debug!(
                    "header locked: {} data frame(s), session {:#06x}",
                    header.total_frames, header.session_id
                );
                // The encoder repeats the header once more when the payload
                // spans more than one data frame; skip that second copy's
                // symbol span rather than trying to decode it as data.
                let data_cursor = if header.total_frames > 1 {
                    next_cursor + symbols_needed as u64 * period
                } else {
                    next_cursor
                };
                let frame_lengths = data_frame_wire_lengths(&header);
                self.state = DecoderState::ReceivingData {
                    collector: FrameCollector::new(header),
                    lock: SyncLock { mode: lock.mode, cursor: data_cursor },
                    frame_lengths,
                    next_frame: 0,
                    bytes_corrected: 0,
                };
                true
            }
            None => self.handle_header_failure(
                header_failures + 1,
                SyncLock { mode: lock.mode, cursor: next_cursor },
            ),
        }
    }

    fn handle_header_failure(&mut self, header_failures: u32, lock: SyncLock) -> bool {
        if header_failures < HEADER_SWITCH_FAILURES {
            self.state = DecoderState::ReceivingHeader { header_failures, lock };
            return true;
        }
        if self.modes_tried.len() < Mode::ALL.len() {
            warn!("header decoding failed {header_failures} times, switching mode");
            self.state = DecoderState::DetectingPreamble;
            true
        } else {
            warn!("header decoding failed {header_failures} times in both modes, giving up");
            self.state = DecoderState::Error { kind: ModemError::HeaderCrcFailed };
            true
        }
    }

    fn step_data(
        &mut self,
        mut collector: FrameCollector,
        lock: SyncLock,
        frame_lengths: Vec<usize>,
        next_frame: usize,
        bytes_corrected: u32,
    ) -> bool {
        if next_frame >= frame_lengths.len() {
            return self.finish_data(collector, bytes_corrected);
        }

        let params = lock.mode.params();
        let wire_len = frame_lengths[next_frame];
        let rs_encoded_len = wire_len + rs::PARITY_LEN;
        let coded_len = fec_chain::coded_bit_len(rs_encoded_len, self.punctured);
        let symbols_needed = fec_chain::symbols_per_frame(coded_len, params.bits_per_symbol);
        let period = params.symbol_period_samples() as u64;

        let Some(detections) = self.extract_detections(lock.cursor, &params, symbols_needed) else {
            self.state = DecoderState::ReceivingData {
                collector,
                lock,
                frame_lengths,
                next_frame,
                bytes_corrected,
            };
            return false;
        };

        let mut bits: Vec<f32> = detections
            .iter()
            .flat_map(|d| symbol_soft_to_bits(&d.soft, params.bits_per_symbol))
            .collect();
        bits.truncate(coded_len);
        let next_cursor = lock.cursor + symbols_needed as u64 * period;
        let mut bytes_corrected = bytes_corrected;

        match fec_chain::decode_frame(&bits, self.punctured, rs_encoded_len) {
            Ok(decoded) => {
                bytes_corrected += decoded.corrected as u32;
                match DataFrame::from_bytes(&decoded.data) {
                    Ok(frame) => {
                        collector.add(collector.session_id(), frame.index, frame.data);
                    }
                    Err(e) => warn!("data frame {next_frame} failed to parse after FEC: {e}"),
                }
            }
            Err(e) => warn!("data frame {next_frame} FEC decode failed: {e}"),
        }

        self.state = DecoderState::ReceivingData {
            collector,
            lock: SyncLock { mode: lock.mode, cursor: next_cursor },
            frame_lengths,
            next_frame: next_frame + 1,
            bytes_corrected,
        };
        true
    }

    fn finish_data(&mut self, collector: FrameCollector, bytes_corrected: u32) -> bool {
        match collector.reassemble() {
            Some(raw) => {
                let header = collector.header();
                match payload::recover(&raw, header.flags, header.original_len, self.password.as_deref()) {
                    Ok((payload, sha256)) => {
                        self.state = DecoderState::Complete { payload, sha256, bytes_corrected };
                    }
                    Err(e) => {
                        warn!("payload recovery failed: {e}");
                        self.state = DecoderState::Error { kind: e };
                    }
                }
            }
            None => {
                self.state = DecoderState::Error { kind: ModemError::IncompleteTransmission };
            }
        }
        true
    }
}

/// Decode a complete, already-captured sample buffer in one call: feed it
/// to a fresh [`Decoder`] and return the recovered payload once `Complete`,
/// or the first fatal error.
pub fn decode_all(samples: &[f32], punctured: bool, password: Option<&str>) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(punctured, password.map(str::to_owned));
    decoder.start();
    decoder.push_samples(samples);
    if let Some((payload, _)) = decoder.result() {
        return Ok(payload.to_vec());
    }
    if let Some(kind) = decoder.error() {
        return Err(clone_error(kind));
    }
    match decoder.state_kind() {
        DecoderStateKind::Listening | DecoderStateKind::DetectingPreamble => {
            Err(ModemError::ChirpMiss)
        }
        _ => Err(ModemError::IncompleteTransmission),
    }
}

fn clone_error(err: &ModemError) -> ModemError {
    match err {
        ModemError::ChirpMiss => ModemError::ChirpMiss,
        ModemError::HeaderCrcFailed => ModemError::HeaderCrcFailed,
        ModemError::RsUncorrectable => ModemError::RsUncorrectable,
        ModemError::ViterbiDecodeFailed => ModemError::ViterbiDecodeFailed,
        ModemError::SessionMismatch => ModemError::SessionMismatch,
        ModemError::BufferOverrun => ModemError::BufferOverrun,
        ModemError::DecompressError(s) => ModemError::DecompressError(s.clone()),
        ModemError::DecryptError(s) => ModemError::DecryptError(s.clone()),
        ModemError::PayloadCrcFailed => ModemError::PayloadCrcFailed,
        ModemError::InvalidFrameSize => ModemError::InvalidFrameSize,
        ModemError::InvalidConfig(s) => ModemError::InvalidConfig(s.clone()),
        ModemError::UnknownMagic => ModemError::UnknownMagic,
        ModemError::FftError(s) => ModemError::FftError(s.clone()),
        ModemError::IncompleteTransmission => ModemError::IncompleteTransmission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_decoder_is_idle_until_started() {
        let decoder = Decoder::new(false, None);
        assert_eq!(decoder.progress().state, DecoderStateKind::Idle);
    }

    #[test]
    fn start_enters_listening() {
        let mut decoder = Decoder::new(false, None);
        decoder.start();
        assert_eq!(decoder.progress().state, DecoderStateKind::Listening);
    }

    #[test]
    fn silence_stays_in_listening() {
        let mut decoder = Decoder::new(false, None);
        decoder.start();
        let progress = decoder.push_samples(&vec![0.0f32; SAMPLE_RATE as usize]);
        assert_eq!(progress.state, DecoderStateKind::Listening);
    }

    #[test]
    fn full_round_trip_decodes_short_message() {
        let message = b"hi";
        let audio = crate::encoder::encode(message, Mode::Wideband, false, None).unwrap();
        let decoded = decode_all(&audio, false, None).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn silence_only_stream_reports_chirp_miss() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize * 2];
        let err = decode_all(&samples, false, None).unwrap_err();
        assert!(matches!(err, ModemError::ChirpMiss));
    }
}
