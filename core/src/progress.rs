//! Decoder progress events, replacing a reactive signals layer with plain
//! data the caller polls or forwards over a channel of its choosing.

use crate::decoder::DecoderStateKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub state: DecoderStateKind,
    pub signal_level: f32,
    pub sync_confidence: f32,
    pub frames_received: u32,
    pub frames_total: u32,
    pub bytes_corrected: u32,
    pub warning: bool,
}

impl Progress {
    pub fn idle() -> Self {
        Progress {
            state: DecoderStateKind::Idle,
            signal_level: 0.0,
            sync_confidence: 0.0,
            frames_received: 0,
            frames_total: 0,
            bytes_corrected: 0,
            warning: false,
        }
    }
}
