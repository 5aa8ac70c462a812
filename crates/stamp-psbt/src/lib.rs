//! Sale-transaction builder for Bitcoin Stamps.
//!
//! Resolves a single UTXO through a caller-supplied [`utxo::UtxoProvider`],
//! computes the payment/change/fee split with integer satoshi arithmetic, and
//! assembles an unsigned PSBT for an external signer. Private keys never pass
//! through this crate.

pub mod address;
pub mod config;
pub mod error;
pub mod network;
pub mod psbt;
pub mod sale;
pub mod transaction;
pub mod utxo;

pub use config::{BuilderConfig, SizeHeuristic};
pub use error::{PsbtError, ProviderError};
pub use network::BtcNetwork;
pub use psbt::{attach_seller_input, complete_sale_psbt, psbt_from_raw_transaction, SalePsbt};
pub use sale::{build_sale_psbt, SaleRequest};
pub use utxo::{parse_utxo_reference, ResolvedUtxo, UtxoProvider, UtxoRef};
