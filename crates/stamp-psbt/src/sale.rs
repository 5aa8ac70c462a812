use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::address::parse_address;
use crate::config::BuilderConfig;
use crate::error::PsbtError;
use crate::psbt::{assemble_psbt, SalePsbt};
use crate::transaction::compute_outputs;
use crate::utxo::{fetch_previous_transaction, is_owned_by, parse_utxo_reference, resolve_utxo, UtxoProvider};

/// Inputs for a single-UTXO sale.
///
/// `destination_address` receives `sale_price_btc`; whatever remains after
/// the fee goes to `change_address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRequest {
    /// `"<txid>:<vout>"`.
    pub utxo: String,
    pub sale_price_btc: f64,
    /// sat/vB.
    pub fee_rate: f64,
    pub destination_address: String,
    pub change_address: String,
    /// When set, the UTXO must be owned by this address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_owner: Option<String>,
}

/// Build an unsigned sale PSBT spending exactly one UTXO.
///
/// The UTXO is resolved once. Every failure aborts the whole build; nothing
/// partial is returned.
pub fn build_sale_psbt<P: UtxoProvider + ?Sized>(
    provider: &P,
    request: &SaleRequest,
    config: &BuilderConfig,
) -> Result<SalePsbt, PsbtError> {
    build(provider, request, config).inspect_err(|e| {
        warn!(utxo = %request.utxo, error = %e, "sale psbt aborted");
    })
}

fn build<P: UtxoProvider + ?Sized>(
    provider: &P,
    request: &SaleRequest,
    config: &BuilderConfig,
) -> Result<SalePsbt, PsbtError> {
    let utxo = parse_utxo_reference(&request.utxo)?;
    parse_address(&request.destination_address, config.network)?;
    parse_address(&request.change_address, config.network)?;

    let resolved = resolve_utxo(provider, &utxo)?;
    debug!(%utxo, value_sat = resolved.value_sat, "resolved sale utxo");

    if let Some(owner) = &request.expected_owner {
        if !is_owned_by(&resolved, owner, config.network)? {
            return Err(PsbtError::OwnershipMismatch {
                utxo,
                claimed: owner.clone(),
            });
        }
        debug!(%utxo, %owner, "ownership confirmed");
    }

    let plan = compute_outputs(
        resolved.value_sat,
        request.sale_price_btc,
        request.fee_rate,
        &request.destination_address,
        &request.change_address,
        &config.size,
    )?;
    debug!(
        fee_sat = plan.fee_sat,
        vsize = plan.vsize,
        outputs = plan.outputs.len(),
        "computed sale outputs"
    );

    let previous_tx = fetch_previous_transaction(provider, &utxo, &resolved)?;
    let psbt = assemble_psbt(&utxo, &resolved, previous_tx, &plan, config)?;
    info!(%utxo, network = %config.network, fee_sat = plan.fee_sat, "built sale psbt");

    Ok(SalePsbt { psbt, plan, utxo })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::network::BtcNetwork;
    use crate::utxo::{MemoryUtxoProvider, ResolvedUtxo, UtxoRef};
    use bitcoin::ScriptBuf;
    use std::cell::Cell;

    const BUYER: &str = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
    const SELLER: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const SELLER_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";
    const TESTNET: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

    fn utxo_str() -> String {
        format!("{}:0", "5e".repeat(32))
    }

    fn seller_utxo(value_sat: u64) -> ResolvedUtxo {
        ResolvedUtxo {
            value_sat,
            script_pubkey: ScriptBuf::from_hex(SELLER_SCRIPT).unwrap(),
            address: Some(SELLER.into()),
        }
    }

    fn request() -> SaleRequest {
        SaleRequest {
            utxo: utxo_str(),
            sale_price_btc: 0.40,
            fee_rate: 1.0,
            destination_address: BUYER.into(),
            change_address: SELLER.into(),
            expected_owner: None,
        }
    }

    /// Counts resolve calls and serves a single UTXO.
    struct CountingProvider {
        inner: MemoryUtxoProvider,
        calls: Cell<usize>,
    }

    impl CountingProvider {
        fn with_value(value_sat: u64) -> Self {
            let mut inner = MemoryUtxoProvider::new();
            inner.insert(parse_utxo_reference(&utxo_str()).unwrap(), seller_utxo(value_sat));
            Self {
                inner,
                calls: Cell::new(0),
            }
        }
    }

    impl UtxoProvider for CountingProvider {
        fn resolve(&self, utxo: &UtxoRef) -> Result<ResolvedUtxo, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.resolve(utxo)
        }
    }

    #[test]
    fn builds_sale_with_change() {
        let provider = CountingProvider::with_value(44_089_800);
        let sale = build_sale_psbt(&provider, &request(), &BuilderConfig::default()).unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert_eq!(sale.plan.fee_sat, 226);
        assert_eq!(sale.plan.payment().unwrap().value_sat, 40_000_000);
        assert_eq!(sale.plan.change().unwrap().value_sat, 4_089_574);
        assert_eq!(sale.utxo.to_string(), utxo_str());
        assert!(sale.to_hex().starts_with("70736274ff"));

        let tx = &sale.psbt.unsigned_tx;
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output.len(), 2);
        let total: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        assert_eq!(total + sale.plan.fee_sat, 44_089_800);
    }

    #[test]
    fn owner_check_passes_for_matching_address() {
        let provider = CountingProvider::with_value(44_089_800);
        let req = SaleRequest {
            expected_owner: Some(SELLER.to_uppercase()),
            ..request()
        };
        assert!(build_sale_psbt(&provider, &req, &BuilderConfig::default()).is_ok());
        assert_eq!(provider.calls.get(), 1);
    }

    #[test]
    fn owner_mismatch_aborts() {
        let provider = CountingProvider::with_value(44_089_800);
        let req = SaleRequest {
            expected_owner: Some(BUYER.into()),
            ..request()
        };
        let err = build_sale_psbt(&provider, &req, &BuilderConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PsbtError::OwnershipMismatch {
                utxo: parse_utxo_reference(&utxo_str()).unwrap(),
                claimed: BUYER.into(),
            }
        );
    }

    #[test]
    fn owner_on_another_network_is_a_mismatch() {
        let provider = CountingProvider::with_value(44_089_800);
        let req = SaleRequest {
            expected_owner: Some(TESTNET.into()),
            ..request()
        };
        let err = build_sale_psbt(&provider, &req, &BuilderConfig::default()).unwrap_err();
        assert!(matches!(err, PsbtError::OwnershipMismatch { .. }));
    }

    #[test]
    fn insufficient_funds_aborts() {
        let provider = CountingProvider::with_value(1_000);
        let req = SaleRequest {
            sale_price_btc: 0.005,
            ..request()
        };
        let err = build_sale_psbt(&provider, &req, &BuilderConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PsbtError::InsufficientFunds {
                available: 1_000,
                required: 500_226,
            }
        );
    }

    #[test]
    fn unknown_utxo_is_not_found() {
        let provider = MemoryUtxoProvider::new();
        let err = build_sale_psbt(&provider, &request(), &BuilderConfig::default()).unwrap_err();
        assert!(matches!(err, PsbtError::UtxoNotFound(_)));
    }

    #[test]
    fn malformed_reference_never_reaches_provider() {
        let provider = CountingProvider::with_value(44_089_800);
        let req = SaleRequest {
            utxo: "abc:0".into(),
            ..request()
        };
        let err = build_sale_psbt(&provider, &req, &BuilderConfig::default()).unwrap_err();
        assert!(matches!(err, PsbtError::InvalidFormat(_)));
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn wrong_network_address_never_reaches_provider() {
        let provider = CountingProvider::with_value(44_089_800);
        let req = SaleRequest {
            destination_address: TESTNET.into(),
            ..request()
        };
        let err = build_sale_psbt(&provider, &req, &BuilderConfig::default()).unwrap_err();
        assert!(matches!(err, PsbtError::InvalidFormat(_)));
        assert_eq!(provider.calls.get(), 0);
    }

    #[test]
    fn testnet_sale() {
        let mut provider = MemoryUtxoProvider::new();
        let testnet_utxo = ResolvedUtxo {
            address: Some(TESTNET.into()),
            ..seller_utxo(2_000_000)
        };
        provider.insert(parse_utxo_reference(&utxo_str()).unwrap(), testnet_utxo);
        let req = SaleRequest {
            sale_price_btc: 0.01,
            destination_address: TESTNET.into(),
            change_address: TESTNET.into(),
            expected_owner: Some(TESTNET.into()),
            ..request()
        };
        let config = BuilderConfig::for_network(BtcNetwork::Testnet);
        let sale = build_sale_psbt(&provider, &req, &config).unwrap();
        assert_eq!(sale.plan.change().unwrap().value_sat, 2_000_000 - 1_000_000 - 226);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let provider = CountingProvider::with_value(44_089_800);
        for price in [0.0, -1.0] {
            let req = SaleRequest {
                sale_price_btc: price,
                ..request()
            };
            assert!(matches!(
                build_sale_psbt(&provider, &req, &BuilderConfig::default()),
                Err(PsbtError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn request_from_json() {
        let req: SaleRequest = serde_json::from_str(&format!(
            r#"{{"utxo":"{}","sale_price_btc":0.4,"fee_rate":1.0,
                "destination_address":"{BUYER}","change_address":"{SELLER}"}}"#,
            utxo_str()
        ))
        .unwrap();
        assert_eq!(req, request());
    }
}
