use thiserror::Error;

use stamp_codec::CodecError;
use stamp_psbt::PsbtError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampsError {
    #[error("data codec: {0}")]
    Codec(CodecError),

    #[error("sale psbt: {0}")]
    Psbt(PsbtError),
}

impl From<CodecError> for StampsError {
    fn from(e: CodecError) -> Self {
        StampsError::Codec(e)
    }
}

impl From<PsbtError> for StampsError {
    fn from(e: PsbtError) -> Self {
        StampsError::Psbt(e)
    }
}
