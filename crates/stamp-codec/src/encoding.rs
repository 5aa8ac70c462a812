//! Byte-representation conversions between hex and base64 text.
//!
//! Mint flows receive file contents as base64 and feed the codec hex, so
//! both directions are needed. No chunking happens here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CodecError;

/// Decode a hex string (either case) into bytes.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(hex_str).map_err(|e| CodecError::InvalidFormat(format!("invalid hex: {e}")))
}

/// Convert hex text to standard padded base64.
pub fn hex_to_base64(hex_str: &str) -> Result<String, CodecError> {
    let bytes = decode_hex(hex_str)?;
    Ok(STANDARD.encode(bytes))
}

/// Convert standard padded base64 to lowercase hex.
pub fn base64_to_hex(b64: &str) -> Result<String, CodecError> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| CodecError::InvalidFormat(format!("failed to decode base64: {e}")))?;
    Ok(hex::encode(bytes))
}
