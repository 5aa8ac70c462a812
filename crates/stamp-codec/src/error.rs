use thiserror::Error;

/// Data codec and bech32 errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: &'static str, actual: usize },
}
