use thiserror::Error;

use crate::utxo::UtxoRef;

/// Sale-transaction construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsbtError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("utxo not found: {0}")]
    UtxoNotFound(UtxoRef),

    #[error("insufficient funds: have {available} sat, payment plus fee is {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("utxo resolution failed: {0}")]
    ResolutionError(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("utxo {utxo} is not owned by {claimed}")]
    OwnershipMismatch { utxo: UtxoRef, claimed: String },

    #[error("psbt error: {0}")]
    Psbt(String),
}

/// Failure reported by a [`crate::utxo::UtxoProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("not found")]
    NotFound,

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
