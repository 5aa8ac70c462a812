use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::Script;

use crate::error::PsbtError;
use crate::network::BtcNetwork;

/// Parse an address string and require that it belongs to `network`.
///
/// Supports P2PKH, P2SH, P2WPKH, P2WSH, and P2TR address formats. Mixing a
/// testnet address into a mainnet build (or the reverse) is an error.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, PsbtError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| PsbtError::InvalidFormat(format!("invalid address {address}: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| PsbtError::InvalidFormat(format!("address {address} wrong network: {e}")))
}

/// Validate a Bitcoin address string for the given network.
///
/// Returns `true` if the address is valid for the specified network,
/// `false` if it is valid but for a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, PsbtError> {
    let parsed = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| PsbtError::InvalidFormat(format!("failed to parse address: {e}")))?;

    Ok(parsed.is_valid_for_network(network.to_bitcoin_network()))
}

/// Derive the address a locking script pays to.
pub fn address_from_script(script: &Script, network: BtcNetwork) -> Result<Address, PsbtError> {
    Address::from_script(script, network.to_bitcoin_network()).map_err(|e| {
        PsbtError::InvalidFormat(format!("locking script has no address form: {e}"))
    })
}
