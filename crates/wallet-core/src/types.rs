use serde::{Deserialize, Serialize};

use chain_btc::{
    Address, InputSelection, KeyPair, NetworkParameters, Script, Transaction, TxIn, TxOut,
};

/// JSON view of a decoded transaction. Txids are in display order and all
/// byte fields are lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub txid: String,
    pub wtxid: String,
    pub version: i32,
    pub locktime: u32,
    pub size: usize,
    pub vsize: usize,
    pub weight: usize,
    pub inputs: Vec<DecodedInput>,
    pub outputs: Vec<DecodedOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInput {
    pub txid: String,
    pub vout: u32,
    pub script_sig: String,
    /// `None` when the scriptSig does not parse as script.
    pub script_sig_asm: Option<String>,
    pub sequence: u32,
    pub witness: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedOutput {
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: String,
    pub script_asm: Option<String>,
    /// Destination for standard scripts on the decoding network.
    pub address: Option<String>,
}

impl DecodedTransaction {
    pub fn new(tx: &Transaction, params: &NetworkParameters) -> Self {
        Self {
            txid: tx.txid().to_string(),
            wtxid: tx.wtxid().to_string(),
            version: tx.version,
            locktime: tx.lock_time,
            size: tx.encode().len(),
            vsize: tx.vsize(),
            weight: tx.weight(),
            inputs: tx.inputs.iter().map(DecodedInput::from).collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|out| DecodedOutput::new(out, params))
                .collect(),
        }
    }
}

impl From<&TxIn> for DecodedInput {
    fn from(input: &TxIn) -> Self {
        Self {
            txid: input.previous_output.txid.to_string(),
            vout: input.previous_output.vout,
            script_sig: input.script_sig.to_hex(),
            script_sig_asm: input.script_sig.to_asm().ok(),
            sequence: input.sequence,
            witness: input.witness.to_hex_items(),
        }
    }
}

impl DecodedOutput {
    fn new(output: &TxOut, params: &NetworkParameters) -> Self {
        Self {
            value: output.value,
            script_pubkey: output.script_pubkey.to_hex(),
            script_asm: output.script_pubkey.to_asm().ok(),
            address: Address::from_script(&output.script_pubkey)
                .and_then(|address| address.encode(params).ok()),
        }
    }
}

/// A payment from every UTXO of one address, unlocked by one key and/or
/// redeem script.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub source_address: String,
    pub destination: String,
    /// Amount in satoshis.
    pub amount: u64,
    /// Fixed fee in satoshis.
    pub fee: u64,
    pub change_address: Option<String>,
    pub key: Option<KeyPair>,
    /// Redeem script (P2SH) or witness script (P2WSH) of the source address.
    pub redeem_script: Option<Script>,
    pub preimage: Option<Vec<u8>>,
    pub selection: InputSelection,
}

impl TransactionRequest {
    pub fn new(source_address: impl Into<String>, destination: impl Into<String>, amount: u64, fee: u64) -> Self {
        Self {
            source_address: source_address.into(),
            destination: destination.into(),
            amount,
            fee,
            change_address: None,
            key: None,
            redeem_script: None,
            preimage: None,
            selection: InputSelection::All,
        }
    }
}
