//! Entry points for the Stamps mint and sale flows.
//!
//! Minting turns a base64 file into data-carrier addresses; selling turns a
//! single UTXO into an unsigned PSBT. Both crates are re-exported for
//! callers that need the lower-level pieces.

pub mod error;

pub use stamp_codec;
pub use stamp_psbt;

use error::StampsError;
use stamp_codec::encoding::{base64_to_hex, hex_to_base64};
use stamp_codec::CodecNetwork;
use stamp_psbt::utxo::{parse_utxo_reference, validate_ownership, UtxoProvider};
use stamp_psbt::{build_sale_psbt, BtcNetwork, BuilderConfig, SaleRequest};
use tracing::debug;

// ─── Mint side ───────────────────────────────────────────────────────

/// Data-address network for a chain network. Signet and regtest share the
/// testnet `tb` prefix.
pub fn codec_network(network: BtcNetwork) -> CodecNetwork {
    if network.is_mainnet() {
        CodecNetwork::Bitcoin
    } else {
        CodecNetwork::Testnet
    }
}

/// Encode a base64 file into its ordered list of data addresses.
pub fn file_to_data_addresses(
    file_base64: &str,
    network: CodecNetwork,
) -> Result<Vec<String>, StampsError> {
    let hex = base64_to_hex(file_base64)?;
    let addresses = stamp_codec::encode(&hex, network)?;
    debug!(bytes = hex.len() / 2, addresses = addresses.len(), %network, "encoded file");
    Ok(addresses)
}

/// Recover a file, as base64, from its data addresses.
///
/// The last chunk keeps its zero padding, so the result is the original
/// file followed by up to 31 zero bytes.
pub fn data_addresses_to_file<S: AsRef<str>>(addresses: &[S]) -> Result<String, StampsError> {
    let hex = stamp_codec::decode(addresses)?;
    Ok(hex_to_base64(&hex)?)
}

// ─── Sale side ───────────────────────────────────────────────────────

/// Build an unsigned sale PSBT and return it as hex.
pub fn create_sale_psbt<P: UtxoProvider + ?Sized>(
    provider: &P,
    request: &SaleRequest,
    config: &BuilderConfig,
) -> Result<String, StampsError> {
    Ok(build_sale_psbt(provider, request, config)?.to_hex())
}

/// Check that `claimed_address` owns the UTXO `"<txid>:<vout>"`.
pub fn validate_utxo_ownership<P: UtxoProvider + ?Sized>(
    provider: &P,
    utxo: &str,
    claimed_address: &str,
    network: BtcNetwork,
) -> Result<bool, StampsError> {
    let utxo = parse_utxo_reference(utxo)?;
    Ok(validate_ownership(provider, &utxo, claimed_address, network)?)
}
