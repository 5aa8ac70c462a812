use bitcoin::Amount;

use crate::config::SizeHeuristic;
use crate::error::PsbtError;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Inputs spent by a sale transaction.
const SALE_INPUTS: usize = 1;

/// Outputs of a sale transaction: payment and change.
const SALE_OUTPUTS: usize = 2;

/// One output of the planned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub address: String,
    pub value_sat: u64,
}

/// The payment/change/fee split for a sale.
///
/// `outputs[0]` is always the payment; a change output follows when the
/// residual value is positive. `sum(outputs) + fee_sat` equals the input
/// value exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub outputs: Vec<PlannedOutput>,
    pub fee_sat: u64,
    /// Estimated virtual size the fee was computed for.
    pub vsize: u64,
}

impl OutputPlan {
    pub fn payment(&self) -> Option<&PlannedOutput> {
        self.outputs.first()
    }

    pub fn change(&self) -> Option<&PlannedOutput> {
        self.outputs.get(1)
    }

    /// Sum of all output values in satoshis.
    pub fn total_output_sat(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sat).sum()
    }
}

/// Estimate the virtual size of a transaction from its input and output
/// counts.
///
/// The heuristic comes from configuration, so overflow is reported as
/// [`PsbtError::InvalidAmount`] rather than wrapping.
pub fn estimate_vsize(
    num_inputs: usize,
    num_outputs: usize,
    size: &SizeHeuristic,
) -> Result<u64, PsbtError> {
    let inputs = u64::try_from(num_inputs)
        .ok()
        .and_then(|n| n.checked_mul(size.input_vbytes));
    let outputs = u64::try_from(num_outputs)
        .ok()
        .and_then(|n| n.checked_mul(size.output_vbytes));
    inputs
        .zip(outputs)
        .and_then(|(i, o)| size.overhead_vbytes.checked_add(i)?.checked_add(o))
        .ok_or_else(|| {
            PsbtError::InvalidAmount(format!(
                "size estimate for {num_inputs} inputs and {num_outputs} outputs overflows"
            ))
        })
}

/// Estimate the fee in satoshis: `ceil(vsize * fee_rate)`.
///
/// `fee_rate_sat_vbyte` must be finite and positive.
pub fn estimate_fee(
    num_inputs: usize,
    num_outputs: usize,
    fee_rate_sat_vbyte: f64,
    size: &SizeHeuristic,
) -> Result<u64, PsbtError> {
    if !fee_rate_sat_vbyte.is_finite() || fee_rate_sat_vbyte <= 0.0 {
        return Err(PsbtError::InvalidAmount(format!(
            "fee rate must be a positive number of sat/vB, got {fee_rate_sat_vbyte}"
        )));
    }
    let vsize = estimate_vsize(num_inputs, num_outputs, size)?;
    let fee = (vsize as f64 * fee_rate_sat_vbyte).ceil();
    if fee > Amount::MAX_MONEY.to_sat() as f64 {
        return Err(PsbtError::InvalidAmount(format!(
            "fee of {fee} sat exceeds the money supply"
        )));
    }
    Ok(fee as u64)
}

/// Convert a BTC amount to satoshis, rounding to the nearest satoshi.
///
/// This is the only floating-point step in the builder; everything after it
/// is integer arithmetic.
pub fn btc_to_sat(btc: f64) -> Result<u64, PsbtError> {
    if !btc.is_finite() || btc <= 0.0 {
        return Err(PsbtError::InvalidAmount(format!(
            "sale price must be a positive BTC amount, got {btc}"
        )));
    }
    let sats = (btc * SATS_PER_BTC as f64).round();
    if sats < 1.0 {
        return Err(PsbtError::InvalidAmount(format!(
            "sale price {btc} BTC rounds to zero satoshis"
        )));
    }
    if sats > Amount::MAX_MONEY.to_sat() as f64 {
        return Err(PsbtError::InvalidAmount(format!(
            "sale price {btc} BTC exceeds the money supply"
        )));
    }
    Ok(sats as u64)
}

/// Split a UTXO's value into payment, change and fee.
///
/// The fee covers one input and two outputs. Change is
/// `utxo_value - payment - fee`; when that is not strictly positive the sale
/// is rejected with [`PsbtError::InsufficientFunds`] instead of emitting a
/// zero or negative output.
pub fn compute_outputs(
    utxo_value_sat: u64,
    sale_price_btc: f64,
    fee_rate_sat_vbyte: f64,
    destination_address: &str,
    change_address: &str,
    size: &SizeHeuristic,
) -> Result<OutputPlan, PsbtError> {
    let payment_sat = btc_to_sat(sale_price_btc)?;
    let vsize = estimate_vsize(SALE_INPUTS, SALE_OUTPUTS, size)?;
    let fee_sat = estimate_fee(SALE_INPUTS, SALE_OUTPUTS, fee_rate_sat_vbyte, size)?;

    let required = payment_sat
        .checked_add(fee_sat)
        .ok_or_else(|| PsbtError::InvalidAmount("payment plus fee overflows".into()))?;
    let change_sat = match utxo_value_sat.checked_sub(required) {
        Some(change) if change > 0 => change,
        _ => {
            return Err(PsbtError::InsufficientFunds {
                available: utxo_value_sat,
                required,
            })
        }
    };

    Ok(OutputPlan {
        outputs: vec![
            PlannedOutput {
                address: destination_address.to_string(),
                value_sat: payment_sat,
            },
            PlannedOutput {
                address: change_address.to_string(),
                value_sat: change_sat,
            },
        ],
        fee_sat,
        vsize,
    })
}
