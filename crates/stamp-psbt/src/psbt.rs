//! BIP-174 assembly for sale transactions and the PSBT-rewriting helpers
//! used by counterparty and user-funded flows.

use bitcoin::absolute::LockTime;
use bitcoin::psbt::{Input, Output, Psbt};
use bitcoin::script::ScriptBuf;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Sequence, Transaction, TxIn, TxOut, Witness};
use tracing::debug;

use crate::address::parse_address;
use crate::config::BuilderConfig;
use crate::error::PsbtError;
use crate::transaction::{estimate_fee, OutputPlan};
use crate::utxo::{
    check_previous_transaction, fetch_previous_transaction, is_owned_by, parse_utxo_reference,
    resolve_utxo, ResolvedUtxo, UtxoProvider, UtxoRef,
};

/// An assembled, unsigned sale PSBT together with the plan it encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SalePsbt {
    pub psbt: Psbt,
    pub plan: OutputPlan,
    pub utxo: UtxoRef,
}

impl SalePsbt {
    /// Lowercase hex serialization, as consumed by external signers.
    pub fn to_hex(&self) -> String {
        self.psbt.serialize_hex()
    }

    pub fn fee_sat(&self) -> u64 {
        self.plan.fee_sat
    }
}

/// Parse a hex-encoded PSBT.
pub fn decode_psbt_hex(psbt_hex: &str) -> Result<Psbt, PsbtError> {
    let bytes = hex::decode(psbt_hex)
        .map_err(|e| PsbtError::InvalidFormat(format!("psbt is not hex: {e}")))?;
    Psbt::deserialize(&bytes).map_err(|e| PsbtError::InvalidFormat(format!("invalid psbt: {e}")))
}

fn unsigned_input(utxo: &UtxoRef, sequence: Sequence) -> TxIn {
    TxIn {
        previous_output: utxo.outpoint(),
        script_sig: ScriptBuf::new(),
        sequence,
        witness: Witness::default(),
    }
}

/// Signing metadata for one spent output.
///
/// Witness outputs carry `witness_utxo`. Anything else needs the full
/// previous transaction as `non_witness_utxo`, which is checked against the
/// reference before use.
pub fn input_metadata(
    utxo: &UtxoRef,
    resolved: &ResolvedUtxo,
    previous_tx: Option<Transaction>,
) -> Result<Input, PsbtError> {
    if resolved.is_witness() {
        return Ok(Input {
            witness_utxo: Some(resolved.txout()),
            ..Default::default()
        });
    }

    let tx = previous_tx.ok_or_else(|| {
        PsbtError::InvalidFormat(format!(
            "non-witness utxo {utxo} requires its previous transaction"
        ))
    })?;
    check_previous_transaction(&tx, utxo, resolved)?;
    Ok(Input {
        non_witness_utxo: Some(tx),
        ..Default::default()
    })
}

/// Bind one input and the planned outputs into an unsigned PSBT.
///
/// Rejects plans whose outputs plus fee do not add up to the input value,
/// and addresses that are not valid on the configured network.
pub fn assemble_psbt(
    utxo: &UtxoRef,
    resolved: &ResolvedUtxo,
    previous_tx: Option<Transaction>,
    plan: &OutputPlan,
    config: &BuilderConfig,
) -> Result<Psbt, PsbtError> {
    let spent = plan.total_output_sat().checked_add(plan.fee_sat);
    if spent != Some(resolved.value_sat) {
        return Err(PsbtError::InvalidAmount(format!(
            "outputs plus fee ({} + {} sat) do not equal input value {} sat",
            plan.total_output_sat(),
            plan.fee_sat,
            resolved.value_sat
        )));
    }

    let output = plan
        .outputs
        .iter()
        .map(|o| {
            Ok(TxOut {
                value: Amount::from_sat(o.value_sat),
                script_pubkey: parse_address(&o.address, config.network)?.script_pubkey(),
            })
        })
        .collect::<Result<Vec<_>, PsbtError>>()?;

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![unsigned_input(utxo, config.input_sequence())],
        output,
    };

    let input = input_metadata(utxo, resolved, previous_tx)?;
    let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| PsbtError::Psbt(e.to_string()))?;
    psbt.inputs = vec![input];
    Ok(psbt)
}

/// Add the seller's UTXO as an extra input to a buyer-built PSBT.
///
/// The PSBT must already contain an output paying `seller_address`.
pub fn attach_seller_input<P: UtxoProvider + ?Sized>(
    psbt_hex: &str,
    seller_utxo: &str,
    seller_address: &str,
    provider: &P,
    config: &BuilderConfig,
) -> Result<String, PsbtError> {
    let mut psbt = decode_psbt_hex(psbt_hex)?;

    let seller_script = parse_address(seller_address, config.network)?.script_pubkey();
    if !psbt
        .unsigned_tx
        .output
        .iter()
        .any(|o| o.script_pubkey == seller_script)
    {
        return Err(PsbtError::InvalidFormat(format!(
            "psbt does not pay the seller address {seller_address}"
        )));
    }

    let utxo = parse_utxo_reference(seller_utxo)?;
    if psbt
        .unsigned_tx
        .input
        .iter()
        .any(|i| i.previous_output == utxo.outpoint())
    {
        return Err(PsbtError::InvalidFormat(format!(
            "psbt already spends {utxo}"
        )));
    }

    let resolved = resolve_utxo(provider, &utxo)?;
    let previous_tx = fetch_previous_transaction(provider, &utxo, &resolved)?;
    let input = input_metadata(&utxo, &resolved, previous_tx)?;

    psbt.unsigned_tx
        .input
        .push(unsigned_input(&utxo, config.input_sequence()));
    psbt.inputs.push(input);

    debug!(%utxo, inputs = psbt.inputs.len(), "attached seller input");
    Ok(psbt.serialize_hex())
}

/// The output spent by input `index`, read from its PSBT metadata.
fn spent_output(psbt: &Psbt, index: usize) -> Result<TxOut, PsbtError> {
    let input = psbt.inputs.get(index);
    if let Some(out) = input.and_then(|i| i.witness_utxo.as_ref()) {
        return Ok(out.clone());
    }
    let vout = psbt
        .unsigned_tx
        .input
        .get(index)
        .map(|txin| txin.previous_output.vout);
    input
        .and_then(|i| i.non_witness_utxo.as_ref())
        .zip(vout)
        .and_then(|(tx, vout)| tx.output.get(usize::try_from(vout).ok()?))
        .cloned()
        .ok_or_else(|| {
            PsbtError::InvalidFormat(format!("input {index} carries no spent output"))
        })
}

fn sum_sat(values: impl IntoIterator<Item = u64>) -> Result<u64, PsbtError> {
    values
        .into_iter()
        .try_fold(0u64, u64::checked_add)
        .ok_or_else(|| PsbtError::InvalidAmount("total value overflows".into()))
}

/// Fund a seller's sale PSBT with the buyer's UTXO.
///
/// Input 0 is the seller's and must still match what the provider reports.
/// The buyer UTXO must be owned by `buyer_address` and is appended with the
/// configured sequence. The fee covers every input, the existing outputs and
/// a change output; positive change goes back to `buyer_address`.
pub fn complete_sale_psbt<P: UtxoProvider + ?Sized>(
    psbt_hex: &str,
    buyer_utxo: &str,
    buyer_address: &str,
    fee_rate_sat_vbyte: f64,
    provider: &P,
    config: &BuilderConfig,
) -> Result<String, PsbtError> {
    let mut psbt = decode_psbt_hex(psbt_hex)?;
    let buyer_script = parse_address(buyer_address, config.network)?.script_pubkey();

    let seller = psbt
        .unsigned_tx
        .input
        .first()
        .map(|txin| UtxoRef::from(txin.previous_output))
        .ok_or_else(|| PsbtError::InvalidFormat("psbt has no seller input".into()))?;
    if resolve_utxo(provider, &seller)?.txout() != spent_output(&psbt, 0)? {
        return Err(PsbtError::ResolutionError(format!(
            "seller input {seller} does not match the resolved utxo"
        )));
    }

    let buyer = parse_utxo_reference(buyer_utxo)?;
    if psbt
        .unsigned_tx
        .input
        .iter()
        .any(|i| i.previous_output == buyer.outpoint())
    {
        return Err(PsbtError::InvalidFormat(format!(
            "psbt already spends {buyer}"
        )));
    }
    let resolved = resolve_utxo(provider, &buyer)?;
    if !is_owned_by(&resolved, buyer_address, config.network)? {
        return Err(PsbtError::OwnershipMismatch {
            utxo: buyer,
            claimed: buyer_address.to_string(),
        });
    }
    let previous_tx = fetch_previous_transaction(provider, &buyer, &resolved)?;
    let input = input_metadata(&buyer, &resolved, previous_tx)?;
    psbt.unsigned_tx
        .input
        .push(unsigned_input(&buyer, config.input_sequence()));
    psbt.inputs.push(input);

    let total_in = sum_sat(
        (0..psbt.inputs.len())
            .map(|index| spent_output(&psbt, index).map(|o| o.value.to_sat()))
            .collect::<Result<Vec<_>, _>>()?,
    )?;
    let total_out = sum_sat(psbt.unsigned_tx.output.iter().map(|o| o.value.to_sat()))?;
    let fee_sat = estimate_fee(
        psbt.inputs.len(),
        psbt.unsigned_tx.output.len() + 1,
        fee_rate_sat_vbyte,
        &config.size,
    )?;
    let required = total_out
        .checked_add(fee_sat)
        .ok_or_else(|| PsbtError::InvalidAmount("outputs plus fee overflow".into()))?;
    let change_sat = total_in
        .checked_sub(required)
        .ok_or(PsbtError::InsufficientFunds {
            available: total_in,
            required,
        })?;

    if change_sat > 0 {
        psbt.unsigned_tx.output.push(TxOut {
            value: Amount::from_sat(change_sat),
            script_pubkey: buyer_script,
        });
        psbt.outputs.push(Output::default());
    }

    debug!(%seller, %buyer, fee_sat, change_sat, "completed sale psbt");
    Ok(psbt.serialize_hex())
}

/// Wrap an unsigned, user-funded raw transaction into a PSBT.
///
/// Every input's previous output is resolved through `provider`; input
/// sequences are kept as they are. Transactions that already carry
/// signatures are rejected.
pub fn psbt_from_raw_transaction<P: UtxoProvider + ?Sized>(
    raw_tx_hex: &str,
    provider: &P,
) -> Result<String, PsbtError> {
    let bytes = hex::decode(raw_tx_hex)
        .map_err(|e| PsbtError::InvalidFormat(format!("raw transaction is not hex: {e}")))?;
    let tx: Transaction = bitcoin::consensus::deserialize(&bytes)
        .map_err(|e| PsbtError::InvalidFormat(format!("invalid raw transaction: {e}")))?;
    if tx.input.is_empty() {
        return Err(PsbtError::InvalidFormat("raw transaction has no inputs".into()));
    }

    let mut inputs = Vec::with_capacity(tx.input.len());
    for txin in &tx.input {
        let utxo = UtxoRef::from(txin.previous_output);
        let resolved = resolve_utxo(provider, &utxo)?;
        let previous_tx = fetch_previous_transaction(provider, &utxo, &resolved)?;
        inputs.push(input_metadata(&utxo, &resolved, previous_tx)?);
    }

    let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| PsbtError::Psbt(e.to_string()))?;
    psbt.inputs = inputs;

    debug!(inputs = psbt.inputs.len(), "wrapped raw transaction");
    Ok(psbt.serialize_hex())
}
