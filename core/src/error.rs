use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("no chirp found in stream")]
    ChirpMiss,

    #[error("header CRC16 mismatch")]
    HeaderCrcFailed,

    #[error("Reed-Solomon block uncorrectable")]
    RsUncorrectable,

    #[error("Viterbi decode failed")]
    ViterbiDecodeFailed,

    #[error("data frame session id mismatch")]
    SessionMismatch,

    #[error("sample ring buffer overrun")]
    BufferOverrun,

    #[error("decompression failed: {0}")]
    DecompressError(String),

    #[error("decryption failed: {0}")]
    DecryptError(String),

    #[error("payload CRC32 mismatch")]
    PayloadCrcFailed,

    #[error("invalid frame size")]
    InvalidFrameSize,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown frame magic")]
    UnknownMagic,

    #[error("FFT error: {0}")]
    FftError(String),

    #[error("decoder timed out with an incomplete transmission")]
    IncompleteTransmission,
}

pub type Result<T> = std::result::Result<T, ModemError>;
