use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bitcoin::address::Address;
use bitcoin::script::ScriptBuf;
use bitcoin::{Amount, OutPoint, Transaction, TxOut, Txid};

use crate::address::{address_from_script, parse_address, validate_address};
use crate::error::{PsbtError, ProviderError};
use crate::network::BtcNetwork;

/// Reference to a spendable output: `txid:vout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtxoRef {
    pub txid: Txid,
    pub vout: u32,
}

impl UtxoRef {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

impl From<OutPoint> for UtxoRef {
    fn from(outpoint: OutPoint) -> Self {
        Self {
            txid: outpoint.txid,
            vout: outpoint.vout,
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for UtxoRef {
    type Err = PsbtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_utxo_reference(s)
    }
}

/// Parse a `"<64-hex-char txid>:<vout>"` reference.
pub fn parse_utxo_reference(s: &str) -> Result<UtxoRef, PsbtError> {
    let invalid =
        || PsbtError::InvalidFormat(format!("invalid utxo {s:?}: expected '<64 hex txid>:<vout>'"));

    let (txid_hex, vout_str) = s.split_once(':').ok_or_else(invalid)?;
    if txid_hex.len() != 64 || !txid_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    if vout_str.is_empty() || !vout_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let vout: u32 = vout_str.parse().map_err(|_| invalid())?;
    let txid: Txid = txid_hex
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| invalid())?;

    Ok(UtxoRef { txid, vout })
}

/// A UTXO as reported by the chain-data provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUtxo {
    /// Value in satoshis.
    pub value_sat: u64,
    /// The locking script (scriptPubKey).
    pub script_pubkey: ScriptBuf,
    /// Owner address, when the provider knows it. Derived from the script
    /// otherwise.
    pub address: Option<String>,
}

impl ResolvedUtxo {
    pub fn txout(&self) -> TxOut {
        TxOut {
            value: Amount::from_sat(self.value_sat),
            script_pubkey: self.script_pubkey.clone(),
        }
    }

    /// Whether the locking script is a witness program (spent via
    /// `witness_utxo` rather than the full previous transaction).
    pub fn is_witness(&self) -> bool {
        self.script_pubkey.is_witness_program()
    }

    /// The address that controls this output.
    pub fn owner_address(&self, network: BtcNetwork) -> Result<Address, PsbtError> {
        match &self.address {
            Some(address) => parse_address(address, network),
            None => address_from_script(&self.script_pubkey, network),
        }
    }
}

/// Chain-data collaborator that resolves UTXO references.
///
/// Implementations may retry internally; callers treat each call as a single
/// success-or-failure outcome.
pub trait UtxoProvider {
    fn resolve(&self, utxo: &UtxoRef) -> Result<ResolvedUtxo, ProviderError>;

    /// Full previous transaction, needed to spend non-witness outputs.
    fn previous_transaction(&self, txid: &Txid) -> Result<Transaction, ProviderError> {
        Err(ProviderError::Unavailable(format!(
            "raw transaction lookup not supported for {txid}"
        )))
    }
}

/// Provider backed by data the caller already fetched.
#[derive(Debug, Clone, Default)]
pub struct MemoryUtxoProvider {
    utxos: HashMap<UtxoRef, ResolvedUtxo>,
    transactions: HashMap<Txid, Transaction>,
}

impl MemoryUtxoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, utxo: UtxoRef, resolved: ResolvedUtxo) {
        self.utxos.insert(utxo, resolved);
    }

    /// Register a full transaction and every one of its outputs.
    pub fn insert_transaction(&mut self, tx: Transaction) {
        let txid = tx.compute_txid();
        for (vout, out) in tx.output.iter().enumerate() {
            let Ok(vout) = u32::try_from(vout) else { break };
            self.utxos.insert(
                UtxoRef { txid, vout },
                ResolvedUtxo {
                    value_sat: out.value.to_sat(),
                    script_pubkey: out.script_pubkey.clone(),
                    address: None,
                },
            );
        }
        self.transactions.insert(txid, tx);
    }
}

impl UtxoProvider for MemoryUtxoProvider {
    fn resolve(&self, utxo: &UtxoRef) -> Result<ResolvedUtxo, ProviderError> {
        self.utxos.get(utxo).cloned().ok_or(ProviderError::NotFound)
    }

    fn previous_transaction(&self, txid: &Txid) -> Result<Transaction, ProviderError> {
        self.transactions
            .get(txid)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

/// Resolve a reference through the provider, mapping provider failures onto
/// the builder's error taxonomy.
pub fn resolve_utxo<P: UtxoProvider + ?Sized>(
    provider: &P,
    utxo: &UtxoRef,
) -> Result<ResolvedUtxo, PsbtError> {
    provider.resolve(utxo).map_err(|e| match e {
        ProviderError::NotFound => PsbtError::UtxoNotFound(*utxo),
        ProviderError::Unavailable(reason) => {
            PsbtError::ResolutionError(format!("{utxo}: {reason}"))
        }
    })
}

/// Fetch the previous transaction for a non-witness UTXO.
///
/// Returns `None` for witness outputs, which do not need it. The fetched
/// transaction must hash to the referenced txid and carry the resolved
/// output at `vout`.
pub fn fetch_previous_transaction<P: UtxoProvider + ?Sized>(
    provider: &P,
    utxo: &UtxoRef,
    resolved: &ResolvedUtxo,
) -> Result<Option<Transaction>, PsbtError> {
    if resolved.is_witness() {
        return Ok(None);
    }

    let tx = provider.previous_transaction(&utxo.txid).map_err(|e| match e {
        ProviderError::NotFound => PsbtError::UtxoNotFound(*utxo),
        ProviderError::Unavailable(reason) => {
            PsbtError::ResolutionError(format!("{}: {reason}", utxo.txid))
        }
    })?;
    check_previous_transaction(&tx, utxo, resolved)?;
    Ok(Some(tx))
}

/// Verify that `tx` is the transaction `utxo` points into and that its
/// output matches what the provider resolved.
pub fn check_previous_transaction(
    tx: &Transaction,
    utxo: &UtxoRef,
    resolved: &ResolvedUtxo,
) -> Result<(), PsbtError> {
    let txid = tx.compute_txid();
    if txid != utxo.txid {
        return Err(PsbtError::ResolutionError(format!(
            "previous transaction hashes to {txid}, expected {}",
            utxo.txid
        )));
    }
    let out = usize::try_from(utxo.vout)
        .ok()
        .and_then(|vout| tx.output.get(vout));
    if out != Some(&resolved.txout()) {
        return Err(PsbtError::ResolutionError(format!(
            "previous transaction output {utxo} does not match the resolved utxo"
        )));
    }
    Ok(())
}

/// Whether `claimed_address` controls the resolved output.
///
/// A well-formed address that does not match returns `Ok(false)`, including
/// one that belongs to another network. Only unparseable addresses are
/// errors.
pub fn is_owned_by(
    resolved: &ResolvedUtxo,
    claimed_address: &str,
    network: BtcNetwork,
) -> Result<bool, PsbtError> {
    if !validate_address(claimed_address, network)? {
        return Ok(false);
    }
    if let Some(reported) = &resolved.address {
        if !validate_address(reported, network)? {
            return Ok(false);
        }
    }
    let claimed = parse_address(claimed_address, network)?;
    let owner = resolved.owner_address(network)?;
    Ok(owner == claimed)
}

/// Resolve `utxo` and check that `claimed_address` owns it.
///
/// Resolution failures propagate: ownership of a UTXO that cannot be found
/// is never reported as `false`.
pub fn validate_ownership<P: UtxoProvider + ?Sized>(
    provider: &P,
    utxo: &UtxoRef,
    claimed_address: &str,
    network: BtcNetwork,
) -> Result<bool, PsbtError> {
    let resolved = resolve_utxo(provider, utxo)?;
    is_owned_by(&resolved, claimed_address, network)
}
