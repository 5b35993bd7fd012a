//! Blocking client for the Esplora block explorer HTTP API.
//!
//! Only the two read endpoints needed to spend coins are used:
//! `GET /address/{addr}/utxo` and `GET /tx/{txid}/hex`.

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use tracing::debug;

use crate::address::address_to_script_pubkey;
use crate::error::BtcError;
use crate::network::NetworkParameters;
use crate::transaction::{OutPoint, Transaction, Txid};
use crate::utxo::{PreviousOutput, UnspentOutput, UtxoSource, UtxoStatus};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry of the `/address/{addr}/utxo` response.
#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    #[serde(default)]
    status: UtxoStatus,
}

/// Esplora-backed [`UtxoSource`].
pub struct EsploraClient {
    base_url: String,
    client: HttpClient,
    fetch_raw_transactions: bool,
}

impl EsploraClient {
    /// Client for `base_url` (for example `https://blockstream.info/testnet/api`).
    ///
    /// Fails with `UtxoFetchFailed` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BtcError> {
        let client = HttpClient::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| transport_failure("building the HTTP client", &e))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            fetch_raw_transactions: true,
        })
    }

    /// Client for the network's default explorer.
    pub fn for_network(params: &NetworkParameters) -> Result<Self, BtcError> {
        Self::new(params.esplora_url.clone(), None)
    }

    /// When disabled, previous outputs carry only the address's locking
    /// script instead of the full funding transaction.
    pub fn with_raw_transactions(mut self, enabled: bool) -> Self {
        self.fetch_raw_transactions = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn utxo_url(&self, address: &str) -> String {
        format!("{}/address/{address}/utxo", self.base_url)
    }

    fn tx_hex_url(&self, txid: &Txid) -> String {
        format!("{}/tx/{txid}/hex", self.base_url)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, BtcError> {
        debug!(url, "esplora request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| transport_failure(&format!("request to {url}"), &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            debug!(url, %status, body = body.trim(), "esplora error response");
            return Err(BtcError::UtxoFetchFailed(format!("{url} returned HTTP {status}")));
        }
        Ok(response)
    }

    /// Download and decode a transaction by txid.
    pub fn fetch_transaction(&self, txid: &Txid) -> Result<Transaction, BtcError> {
        let url = self.tx_hex_url(txid);
        let body = self
            .get(&url)?
            .text()
            .map_err(|e| transport_failure(&format!("reading {url}"), &e))?;
        let tx = Transaction::from_hex(body.trim())
            .map_err(|e| BtcError::UtxoFetchFailed(format!("undecodable transaction {txid}: {e}")))?;
        if tx.txid() != *txid {
            return Err(BtcError::UtxoFetchFailed(format!(
                "explorer returned transaction {} for {txid}",
                tx.txid()
            )));
        }
        Ok(tx)
    }
}

/// Short error for a failed HTTP exchange. The full reqwest error is only
/// logged.
fn transport_failure(context: &str, err: &reqwest::Error) -> BtcError {
    debug!(context, error = %err, "esplora transport error");
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "unreadable response body"
    } else if err.is_builder() {
        "invalid request"
    } else {
        "request failed"
    };
    BtcError::UtxoFetchFailed(format!("{context}: {kind}"))
}

fn parse_utxo_list(body: &str) -> Result<Vec<EsploraUtxo>, BtcError> {
    serde_json::from_str(body)
        .map_err(|e| BtcError::UtxoFetchFailed(format!("unexpected utxo response: {e}")))
}

fn outpoint_of(entry: &EsploraUtxo) -> Result<OutPoint, BtcError> {
    let txid = entry
        .txid
        .parse::<Txid>()
        .map_err(|e| BtcError::UtxoFetchFailed(format!("bad txid {:?}: {e}", entry.txid)))?;
    Ok(OutPoint::new(txid, entry.vout))
}

impl UtxoSource for EsploraClient {
    fn fetch(&self, address: &str, params: &NetworkParameters) -> Result<Vec<UnspentOutput>, BtcError> {
        let url = self.utxo_url(address);
        let body = self
            .get(&url)?
            .text()
            .map_err(|e| transport_failure(&format!("reading {url}"), &e))?;
        let entries = parse_utxo_list(&body)?;
        debug!(address, count = entries.len(), "esplora utxos");

        let address_script = if self.fetch_raw_transactions {
            None
        } else {
            Some(address_to_script_pubkey(address, params)?)
        };

        entries
            .into_iter()
            .map(|entry| {
                let outpoint = outpoint_of(&entry)?;
                let previous_output = match &address_script {
                    Some(script) => PreviousOutput::Script(script.clone()),
                    None => PreviousOutput::RawTransaction(self.fetch_transaction(&outpoint.txid)?),
                };
                Ok(UnspentOutput {
                    outpoint,
                    value: entry.value,
                    previous_output,
                    status: entry.status,
                })
            })
            .collect()
    }
}
