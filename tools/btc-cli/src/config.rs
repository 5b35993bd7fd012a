//! TOML configuration for the `spend` subcommand.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use chain_btc::{
    BtcNetwork, InputSelection, KeyPair, NetworkParameters, OutPoint, PreviousOutput, Script,
    StaticUtxoSource, Transaction, Txid, UnspentOutput, UtxoStatus,
};
use crypto_utils::Seed;
use wallet_core::{
    create_redeem_script, derive_key_pair, seed_from_mnemonic, DerivationPath, TransactionRequest,
    DEFAULT_DERIVATION_PATH,
};

fn default_network() -> BtcNetwork {
    BtcNetwork::Testnet
}

fn default_derivation_path() -> String {
    DEFAULT_DERIVATION_PATH.to_string()
}

/// A string read from the config that must not be logged.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    #[default]
    All,
    LargestFirst,
}

impl From<Selection> for InputSelection {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::All => InputSelection::All,
            Selection::LargestFirst => InputSelection::LargestFirst,
        }
    }
}

/// Seed material for the signing key. Exactly one of `mnemonic` and
/// `seed_hex` must be set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    pub mnemonic: Option<Secret>,
    #[serde(default)]
    pub passphrase: Secret,
    pub seed_hex: Option<Secret>,
    #[serde(default = "default_derivation_path")]
    pub derivation_path: String,
}

impl KeyConfig {
    fn seed(&self) -> Result<Seed> {
        match (&self.mnemonic, &self.seed_hex) {
            (Some(phrase), None) => {
                seed_from_mnemonic(phrase.expose(), self.passphrase.expose()).context("invalid [key] mnemonic")
            }
            (None, Some(seed_hex)) => Seed::from_hex(seed_hex.expose()).context("invalid [key] seed_hex"),
            (Some(_), Some(_)) => bail!("[key] sets both mnemonic and seed_hex"),
            (None, None) => bail!("[key] needs a mnemonic or seed_hex"),
        }
    }

    pub fn key_pair(&self) -> Result<KeyPair> {
        let path: DerivationPath = self
            .derivation_path
            .parse()
            .with_context(|| format!("invalid derivation path {:?}", self.derivation_path))?;
        let seed = self.seed()?;
        Ok(derive_key_pair(&seed, &path)?)
    }
}

/// A UTXO supplied inline instead of fetched from Esplora.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtxoConfig {
    /// Display-order txid.
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: Option<String>,
    /// Full funding transaction, as an alternative to `script_pubkey`.
    pub raw_tx: Option<String>,
}

impl UtxoConfig {
    fn to_unspent(&self) -> Result<UnspentOutput> {
        let txid: Txid = self
            .txid
            .parse()
            .with_context(|| format!("invalid utxo txid {:?}", self.txid))?;
        let previous_output = match (&self.script_pubkey, &self.raw_tx) {
            (Some(script_hex), None) => PreviousOutput::Script(
                Script::from_hex(script_hex).with_context(|| format!("utxo {txid}: bad script_pubkey"))?,
            ),
            (None, Some(tx_hex)) => PreviousOutput::RawTransaction(
                Transaction::from_hex(tx_hex).with_context(|| format!("utxo {txid}: bad raw_tx"))?,
            ),
            _ => bail!("utxo {txid}: set exactly one of script_pubkey and raw_tx"),
        };
        Ok(UnspentOutput {
            outpoint: OutPoint::new(txid, self.vout),
            value: self.value,
            previous_output,
            status: UtxoStatus::default(),
        })
    }
}

/// Everything `spend` needs to build and sign one transaction.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpendConfig {
    #[serde(default = "default_network")]
    pub network: BtcNetwork,
    /// Overrides the network's default explorer.
    pub esplora_url: Option<String>,
    pub source_address: String,
    pub destination: String,
    pub amount: u64,
    pub fee: u64,
    pub change_address: Option<String>,
    #[serde(default)]
    pub selection: Selection,
    pub key: Option<KeyConfig>,
    /// Hex redeem script (P2SH) or witness script (P2WSH).
    pub redeem_script: Option<String>,
    /// Preimage for a hash-lock script. Without `redeem_script`, the
    /// `OP_SHA256 <hash> OP_EQUAL` script is built from it.
    pub secret: Option<Secret>,
    #[serde(default)]
    pub utxos: Vec<UtxoConfig>,
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Default, Clone)]
pub struct SpendOverrides {
    pub network: Option<BtcNetwork>,
    pub esplora_url: Option<String>,
    pub destination: Option<String>,
    pub amount: Option<u64>,
    pub fee: Option<u64>,
    pub change_address: Option<String>,
}

impl SpendConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply(&mut self, overrides: SpendOverrides) {
        if let Some(network) = overrides.network {
            self.network = network;
        }
        if let Some(url) = overrides.esplora_url {
            self.esplora_url = Some(url);
        }
        if let Some(destination) = overrides.destination {
            self.destination = destination;
        }
        if let Some(amount) = overrides.amount {
            self.amount = amount;
        }
        if let Some(fee) = overrides.fee {
            self.fee = fee;
        }
        if let Some(change) = overrides.change_address {
            self.change_address = Some(change);
        }
    }

    pub fn params(&self) -> NetworkParameters {
        let mut params = self.network.params();
        if let Some(url) = &self.esplora_url {
            params.esplora_url = url.clone();
        }
        params
    }

    pub fn to_request(&self) -> Result<TransactionRequest> {
        let mut request = TransactionRequest::new(
            self.source_address.clone(),
            self.destination.clone(),
            self.amount,
            self.fee,
        );
        request.change_address = self.change_address.clone();
        request.selection = self.selection.into();
        request.key = self.key.as_ref().map(KeyConfig::key_pair).transpose()?;
        request.redeem_script = match (&self.redeem_script, &self.secret) {
            (Some(script_hex), _) => Some(Script::from_hex(script_hex).context("invalid redeem_script")?),
            (None, Some(secret)) => Some(create_redeem_script(secret.expose())),
            (None, None) => None,
        };
        request.preimage = self.secret.as_ref().map(|s| s.expose().as_bytes().to_vec());

        if request.key.is_none() && request.preimage.is_none() {
            bail!("nothing to sign with: set [key] or secret");
        }
        Ok(request)
    }

    /// UTXOs listed in the file, if any.
    pub fn inline_source(&self) -> Result<Option<StaticUtxoSource>> {
        if self.utxos.is_empty() {
            return Ok(None);
        }
        let utxos = self
            .utxos
            .iter()
            .map(UtxoConfig::to_unspent)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(
            StaticUtxoSource::new().with_utxos(self.source_address.clone(), utxos),
        ))
    }
}
