//! Acoustic modem library: M-FSK modulation with concatenated Reed-Solomon
//! plus convolutional FEC, chirp-based synchronization, and a streaming
//! decoder state machine.

pub mod chirp;
pub mod collector;
pub mod conv;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fec_chain;
pub mod fft;
pub mod fft_correlation;
pub mod framing;
pub mod interleave;
pub mod modes;
pub mod modulator;
pub mod payload;
pub mod progress;
pub mod ring_buffer;
pub mod rs;
pub mod scrambler;

pub use decoder::{decode_all, Decoder, DecoderStateKind};
pub use encoder::encode;
pub use error::{ModemError, Result};
pub use modes::{Mode, ModeParams};
pub use progress::Progress;
