use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BtcError;
use crate::network::NetworkParameters;
use crate::script::Script;
use crate::transaction::{OutPoint, Transaction, TxOut};

/// Confirmation metadata reported by a block explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u32>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// How the locking script of a spent output is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousOutput {
    /// The scriptPubKey itself.
    Script(Script),
    /// The full funding transaction; the script is read from `outpoint.vout`.
    RawTransaction(Transaction),
}

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    /// Value in satoshis.
    pub value: u64,
    pub previous_output: PreviousOutput,
    pub status: UtxoStatus,
}

impl UnspentOutput {
    /// Resolve the output being spent.
    ///
    /// A funding transaction must hash to the outpoint's txid, contain the
    /// referenced output and agree on its value; `index` is the input
    /// position used in errors.
    pub fn resolve(&self, index: usize) -> Result<TxOut, BtcError> {
        match &self.previous_output {
            PreviousOutput::Script(script) => Ok(TxOut {
                value: self.value,
                script_pubkey: script.clone(),
            }),
            PreviousOutput::RawTransaction(tx) => {
                let txid = tx.txid();
                if txid != self.outpoint.txid {
                    return Err(BtcError::UnknownInputScript {
                        index,
                        reason: format!(
                            "funding transaction {txid} does not match outpoint {}",
                            self.outpoint
                        ),
                    });
                }
                let output = tx.outputs.get(self.outpoint.vout as usize).ok_or_else(|| {
                    BtcError::UnknownInputScript {
                        index,
                        reason: format!(
                            "funding transaction has {} outputs, vout {} requested",
                            tx.outputs.len(),
                            self.outpoint.vout
                        ),
                    }
                })?;
                if output.value != self.value {
                    return Err(BtcError::UnknownInputScript {
                        index,
                        reason: format!(
                            "utxo claims {} sat but funding output holds {} sat",
                            self.value, output.value
                        ),
                    });
                }
                Ok(output.clone())
            }
        }
    }
}

/// Result of UTXO selection: the chosen UTXOs and their aggregate value.
#[derive(Debug, Clone)]
pub struct UtxoSelection {
    pub selected: Vec<UnspentOutput>,
    /// Total value of the selected UTXOs in satoshis.
    pub total: u64,
}

/// Largest-first coin selection against `amount + fee`.
///
/// Stops at the first prefix of the value-sorted list that covers the
/// target. Fails with `InsufficientFunds` when even every UTXO together falls
/// short.
pub fn select_utxos(utxos: &[UnspentOutput], amount: u64, fee: u64) -> Result<UtxoSelection, BtcError> {
    let required = required_total(amount, fee)?;

    let mut sorted: Vec<&UnspentOutput> = utxos.iter().collect();
    sorted.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total: u64 = 0;
    for utxo in sorted {
        selected.push(utxo.clone());
        total = total.saturating_add(utxo.value);
        if total >= required {
            return Ok(UtxoSelection { selected, total });
        }
    }

    Err(BtcError::InsufficientFunds {
        available: total,
        required,
    })
}

/// `amount + fee`, rejecting overflow as an unpayable target.
pub fn required_total(amount: u64, fee: u64) -> Result<u64, BtcError> {
    amount.checked_add(fee).ok_or(BtcError::InsufficientFunds {
        available: 0,
        required: u64::MAX,
    })
}

/// Anything that can list the unspent outputs of an address.
pub trait UtxoSource: Sync {
    fn fetch(&self, address: &str, params: &NetworkParameters) -> Result<Vec<UnspentOutput>, BtcError>;

    /// Fetch several addresses concurrently.
    ///
    /// One scoped thread per address; results come back in the order of
    /// `addresses` and the first failure is returned.
    fn fetch_all(
        &self,
        addresses: &[String],
        params: &NetworkParameters,
    ) -> Result<Vec<Vec<UnspentOutput>>, BtcError> {
        thread::scope(|scope| {
            let handles: Vec<_> = addresses
                .iter()
                .map(|address| scope.spawn(move || self.fetch(address, params)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| BtcError::UtxoFetchFailed("fetch worker panicked".into()))?
                })
                .collect()
        })
    }
}

/// In-memory UTXO source keyed by address.
#[derive(Debug, Clone, Default)]
pub struct StaticUtxoSource {
    entries: Vec<(String, Vec<UnspentOutput>)>,
}

impl StaticUtxoSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utxos(mut self, address: impl Into<String>, utxos: Vec<UnspentOutput>) -> Self {
        self.insert(address, utxos);
        self
    }

    pub fn insert(&mut self, address: impl Into<String>, utxos: Vec<UnspentOutput>) {
        let address = address.into();
        match self.entries.iter_mut().find(|(a, _)| *a == address) {
            Some((_, existing)) => existing.extend(utxos),
            None => self.entries.push((address, utxos)),
        }
    }
}

impl UtxoSource for StaticUtxoSource {
    fn fetch(&self, address: &str, _params: &NetworkParameters) -> Result<Vec<UnspentOutput>, BtcError> {
        let utxos = self
            .entries
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, utxos)| utxos.clone())
            .unwrap_or_default();
        debug!(address, count = utxos.len(), "static utxo lookup");
        Ok(utxos)
    }
}
