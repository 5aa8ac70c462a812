//! Data-carrier address codec for Bitcoin Stamps.
//!
//! Embeds arbitrary file bytes into an ordered list of P2WSH-shaped bech32
//! addresses (one 32-byte chunk per address) and reverses the mapping. The
//! bech32 primitives live in [`bech32`]; hex/base64 helpers in [`encoding`].

pub mod bech32;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod network;

pub use codec::{address_to_hex, chunk_to_address, decode, encode};
pub use error::CodecError;
pub use network::CodecNetwork;
