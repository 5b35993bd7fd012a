use std::collections::HashSet;

use tracing::{debug, info, warn};

use crypto_utils::sha256;

use crate::address::address_to_script_pubkey;
use crate::error::BtcError;
use crate::key::KeyPair;
use crate::network::NetworkParameters;
use crate::script::{compile, Script, ScriptType, Token};
use crate::sighash::{legacy_sighash, segwit_v0_sighash, SighashType};
use crate::transaction::{Transaction, TxIn, TxOut, Txid, Witness, SEQUENCE_ENABLE_RBF};
use crate::utxo::{required_total, select_utxos, UnspentOutput};

/// Largest stack element a script may push.
const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Default transaction version.
pub const DEFAULT_TX_VERSION: i32 = 2;

/// Which of the offered UTXOs end up as inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputSelection {
    /// Spend every offered UTXO, in the given order.
    #[default]
    All,
    /// Spend the fewest largest UTXOs that cover `amount + fee`.
    LargestFirst,
}

/// What is needed to unlock one input.
#[derive(Debug, Clone)]
pub struct InputSigner {
    pub key: Option<KeyPair>,
    /// Redeem script for a P2SH output, witness script for a P2WSH output.
    pub redeem_script: Option<Script>,
    /// Secret for a hash-preimage redeem script.
    pub preimage: Option<Vec<u8>>,
    pub sighash_type: SighashType,
}

impl InputSigner {
    pub fn new(key: KeyPair) -> Self {
        Self {
            key: Some(key),
            redeem_script: None,
            preimage: None,
            sighash_type: SighashType::All,
        }
    }

    /// Signer for scripts that need no signature (hash preimage locks).
    pub fn without_key() -> Self {
        Self {
            key: None,
            redeem_script: None,
            preimage: None,
            sighash_type: SighashType::All,
        }
    }

    pub fn with_redeem_script(mut self, script: Script) -> Self {
        self.redeem_script = Some(script);
        self
    }

    pub fn with_preimage(mut self, preimage: impl Into<Vec<u8>>) -> Self {
        self.preimage = Some(preimage.into());
        self
    }

    pub fn with_sighash_type(mut self, sighash_type: SighashType) -> Self {
        self.sighash_type = sighash_type;
        self
    }
}

/// A UTXO together with the material that unlocks it.
#[derive(Debug, Clone)]
pub struct SpendInput {
    pub utxo: UnspentOutput,
    pub signer: InputSigner,
}

impl SpendInput {
    pub fn new(utxo: UnspentOutput, signer: InputSigner) -> Self {
        Self { utxo, signer }
    }
}

/// Parameters of a single payment.
#[derive(Debug, Clone)]
pub struct SpendRequest {
    pub utxos: Vec<SpendInput>,
    pub destination: String,
    /// Amount sent to `destination`, in satoshis.
    pub amount: u64,
    /// Receives `inputs - amount - fee` when set. Without it the remainder is
    /// left to the miner.
    pub change_address: Option<String>,
    /// Fixed fee in satoshis.
    pub fee: u64,
    pub selection: InputSelection,
    pub sequence: u32,
    pub lock_time: u32,
    pub version: i32,
}

impl SpendRequest {
    pub fn new(destination: impl Into<String>, amount: u64, fee: u64) -> Self {
        Self {
            utxos: Vec::new(),
            destination: destination.into(),
            amount,
            change_address: None,
            fee,
            selection: InputSelection::All,
            sequence: SEQUENCE_ENABLE_RBF,
            lock_time: 0,
            version: DEFAULT_TX_VERSION,
        }
    }

    pub fn with_input(mut self, utxo: UnspentOutput, signer: InputSigner) -> Self {
        self.utxos.push(SpendInput::new(utxo, signer));
        self
    }

    pub fn with_change_address(mut self, address: impl Into<String>) -> Self {
        self.change_address = Some(address.into());
        self
    }

    pub fn with_selection(mut self, selection: InputSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// A fully signed transaction and its accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    /// `sum(inputs) - sum(outputs)`.
    pub fee: u64,
    /// Value of the change output, 0 when none was added.
    pub change: u64,
}

impl SignedTransaction {
    pub fn txid(&self) -> Txid {
        self.transaction.txid()
    }

    pub fn to_hex(&self) -> String {
        self.transaction.to_hex()
    }
}

/// How a resolved input is spent.
#[derive(Debug)]
enum InputKind {
    P2pk([u8; 33]),
    P2pkh([u8; 20]),
    P2wpkh([u8; 20]),
    P2sh(Script),
    /// P2SH wrapping `OP_0 <20>`: the redeem script is the only scriptSig
    /// push and the key is signed for as P2WPKH.
    P2shP2wpkh(Script, [u8; 20]),
    P2wsh(Script),
}

impl InputKind {
    fn is_segwit(&self) -> bool {
        matches!(
            self,
            InputKind::P2wpkh(_) | InputKind::P2shP2wpkh(..) | InputKind::P2wsh(_)
        )
    }
}

struct ResolvedInput<'a> {
    input: &'a SpendInput,
    prevout: TxOut,
    kind: InputKind,
}

/// Builds and signs spends for one network.
///
/// Each call to [`build`](Self::build) is independent; the builder keeps no
/// state between runs.
#[derive(Debug, Clone, Copy)]
pub struct TransactionBuilder<'a> {
    params: &'a NetworkParameters,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(params: &'a NetworkParameters) -> Self {
        Self { params }
    }

    /// Select inputs, sign them and return the finished transaction.
    ///
    /// Nothing is returned on failure: the transaction only exists once every
    /// input is signed.
    pub fn build(&self, request: &SpendRequest) -> Result<SignedTransaction, BtcError> {
        self.params.validate()?;
        if request.amount == 0 {
            return Err(BtcError::InvalidTransaction("amount must be positive".into()));
        }
        check_unique_outpoints(&request.utxos)?;

        let destination_script = address_to_script_pubkey(&request.destination, self.params)?;
        let change_script = request
            .change_address
            .as_deref()
            .map(|address| address_to_script_pubkey(address, self.params))
            .transpose()?;

        let required = required_total(request.amount, request.fee)?;
        let (chosen, total_in) = choose_inputs(request, required)?;
        debug!(
            inputs = chosen.len(),
            total_in,
            amount = request.amount,
            fee = request.fee,
            "inputs selected"
        );

        let resolved = chosen
            .into_iter()
            .enumerate()
            .map(|(index, input)| resolve_input(index, input))
            .collect::<Result<Vec<_>, _>>()?;

        let change = total_in - required;
        let mut outputs = vec![TxOut {
            value: request.amount,
            script_pubkey: destination_script,
        }];
        let change_value = match change_script {
            Some(script) if change > 0 => {
                outputs.push(TxOut {
                    value: change,
                    script_pubkey: script,
                });
                change
            }
            Some(_) => 0,
            None => {
                if change > 0 {
                    warn!(change, "no change address; remainder goes to the fee");
                }
                0
            }
        };

        let mut tx = Transaction {
            version: request.version,
            inputs: resolved
                .iter()
                .map(|r| TxIn::new(r.input.utxo.outpoint, request.sequence))
                .collect(),
            outputs,
            lock_time: request.lock_time,
        };

        // Every digest is taken over the unsigned transaction; none of them
        // commit to other inputs' unlocking data.
        let unlocks = resolved
            .iter()
            .enumerate()
            .map(|(index, r)| unlock_input(&tx, index, r))
            .collect::<Result<Vec<_>, _>>()?;

        for (txin, (script_sig, witness)) in tx.inputs.iter_mut().zip(unlocks) {
            txin.script_sig = script_sig;
            txin.witness = witness;
        }

        let fee = total_in - request.amount - change_value;
        info!(
            txid = %tx.txid(),
            vsize = tx.vsize(),
            fee,
            change = change_value,
            "transaction signed"
        );

        Ok(SignedTransaction {
            transaction: tx,
            fee,
            change: change_value,
        })
    }
}

/// Shorthand for `TransactionBuilder::new(params).build(request)`.
pub fn build_signed_transaction(
    request: &SpendRequest,
    params: &NetworkParameters,
) -> Result<SignedTransaction, BtcError> {
    TransactionBuilder::new(params).build(request)
}

fn check_unique_outpoints(inputs: &[SpendInput]) -> Result<(), BtcError> {
    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.utxo.outpoint) {
            return Err(BtcError::InvalidTransaction(format!(
                "outpoint {} offered twice",
                input.utxo.outpoint
            )));
        }
    }
    Ok(())
}

fn choose_inputs(request: &SpendRequest, required: u64) -> Result<(Vec<&SpendInput>, u64), BtcError> {
    match request.selection {
        InputSelection::All => {
            let total = request
                .utxos
                .iter()
                .try_fold(0u64, |acc, input| acc.checked_add(input.utxo.value))
                .ok_or_else(|| BtcError::InvalidTransaction("input values overflow".into()))?;
            if total < required {
                return Err(BtcError::InsufficientFunds {
                    available: total,
                    required,
                });
            }
            Ok((request.utxos.iter().collect(), total))
        }
        InputSelection::LargestFirst => {
            let utxos: Vec<UnspentOutput> = request.utxos.iter().map(|i| i.utxo.clone()).collect();
            let selection = select_utxos(&utxos, request.amount, request.fee)?;
            let chosen = selection
                .selected
                .iter()
                .filter_map(|picked| {
                    request
                        .utxos
                        .iter()
                        .find(|input| input.utxo.outpoint == picked.outpoint)
                })
                .collect();
            Ok((chosen, selection.total))
        }
    }
}

fn resolve_input(index: usize, input: &SpendInput) -> Result<ResolvedInput<'_>, BtcError> {
    let prevout = input.utxo.resolve(index)?;
    let unknown = |reason: String| BtcError::UnknownInputScript { index, reason };

    let kind = match prevout.script_pubkey.classify() {
        ScriptType::P2pkh(hash) => InputKind::P2pkh(hash),
        ScriptType::P2wpkh(hash) => InputKind::P2wpkh(hash),
        ScriptType::P2pk(key) => {
            let key: [u8; 33] = key
                .try_into()
                .map_err(|_| unknown("uncompressed pay-to-pubkey outputs are not supported".into()))?;
            InputKind::P2pk(key)
        }
        ScriptType::P2sh(hash) => {
            let redeem = input
                .signer
                .redeem_script
                .clone()
                .ok_or_else(|| unknown("p2sh output needs a redeem script".into()))?;
            if redeem.script_hash() != hash {
                return Err(BtcError::RedeemScriptMismatch { index });
            }
            match redeem.classify() {
                ScriptType::P2wpkh(key_hash) => InputKind::P2shP2wpkh(redeem, key_hash),
                ScriptType::P2wsh(_) => {
                    return Err(unknown("p2sh-wrapped p2wsh outputs are not supported".into()))
                }
                _ => InputKind::P2sh(redeem),
            }
        }
        ScriptType::P2wsh(hash) => {
            let witness_script = input
                .signer
                .redeem_script
                .clone()
                .ok_or_else(|| unknown("p2wsh output needs a witness script".into()))?;
            if witness_script.witness_script_hash() != hash {
                return Err(BtcError::RedeemScriptMismatch { index });
            }
            InputKind::P2wsh(witness_script)
        }
        other => {
            return Err(unknown(format!(
                "cannot spend {other:?} output {}",
                prevout.script_pubkey
            )))
        }
    };

    debug!(
        input = index,
        outpoint = %input.utxo.outpoint,
        value = prevout.value,
        segwit = kind.is_segwit(),
        "input resolved"
    );

    Ok(ResolvedInput {
        input,
        prevout,
        kind,
    })
}

/// Produce the scriptSig and witness for input `index`.
fn unlock_input(tx: &Transaction, index: usize, resolved: &ResolvedInput<'_>) -> Result<(Script, Witness), BtcError> {
    let signer = &resolved.input.signer;
    let ty = signer.sighash_type;
    let value = resolved.prevout.value;

    match &resolved.kind {
        InputKind::P2pk(pubkey) => {
            let key = signing_key(index, signer, |k| k.public_key() == pubkey)?;
            let digest = legacy_sighash(tx, index, &resolved.prevout.script_pubkey, ty)?;
            let sig = key.sign(index, &digest, ty)?;
            Ok((compile(&[Token::Data(sig)]), Witness::new()))
        }
        InputKind::P2pkh(hash) => {
            let key = signing_key(index, signer, |k| k.pubkey_hash() == *hash)?;
            let digest = legacy_sighash(tx, index, &resolved.prevout.script_pubkey, ty)?;
            let sig = key.sign(index, &digest, ty)?;
            let script_sig = compile(&[Token::Data(sig), Token::Data(key.public_key().to_vec())]);
            Ok((script_sig, Witness::new()))
        }
        InputKind::P2wpkh(hash) => {
            let key = signing_key(index, signer, |k| k.pubkey_hash() == *hash)?;
            let script_code = Script::p2pkh(hash);
            let digest = segwit_v0_sighash(tx, index, &script_code, value, ty)?;
            let sig = key.sign(index, &digest, ty)?;
            Ok((Script::new(), Witness::from(vec![sig, key.public_key().to_vec()])))
        }
        InputKind::P2sh(redeem) => {
            check_element_size(index, redeem)?;
            let sign = |key: &KeyPair| -> Result<Vec<u8>, BtcError> {
                let digest = legacy_sighash(tx, index, redeem, ty)?;
                key.sign(index, &digest, ty)
            };
            let mut items = redeem_unlock_items(index, redeem, signer, sign)?;
            items.push(redeem.as_bytes().to_vec());
            let tokens: Vec<Token> = items.into_iter().map(Token::Data).collect();
            Ok((compile(&tokens), Witness::new()))
        }
        InputKind::P2shP2wpkh(redeem, hash) => {
            let key = signing_key(index, signer, |k| k.pubkey_hash() == *hash)?;
            let script_code = Script::p2pkh(hash);
            let digest = segwit_v0_sighash(tx, index, &script_code, value, ty)?;
            let sig = key.sign(index, &digest, ty)?;
            let script_sig = compile(&[Token::Data(redeem.as_bytes().to_vec())]);
            Ok((script_sig, Witness::from(vec![sig, key.public_key().to_vec()])))
        }
        InputKind::P2wsh(witness_script) => {
            check_element_size(index, witness_script)?;
            let sign = |key: &KeyPair| -> Result<Vec<u8>, BtcError> {
                let digest = segwit_v0_sighash(tx, index, witness_script, value, ty)?;
                key.sign(index, &digest, ty)
            };
            let mut items = redeem_unlock_items(index, witness_script, signer, sign)?;
            items.push(witness_script.as_bytes().to_vec());
            Ok((Script::new(), Witness::from(items)))
        }
    }
}

/// Stack items satisfying `script`, excluding the script itself.
fn redeem_unlock_items<F>(index: usize, script: &Script, signer: &InputSigner, sign: F) -> Result<Vec<Vec<u8>>, BtcError>
where
    F: Fn(&KeyPair) -> Result<Vec<u8>, BtcError>,
{
    match script.classify() {
        ScriptType::P2pk(pubkey) => {
            let key = signing_key(index, signer, |k| k.public_key().as_slice() == pubkey.as_slice())?;
            Ok(vec![sign(key)?])
        }
        ScriptType::P2pkh(hash) => {
            let key = signing_key(index, signer, |k| k.pubkey_hash() == hash)?;
            Ok(vec![sign(key)?, key.public_key().to_vec()])
        }
        ScriptType::HashPreimage(hash) => {
            let preimage = signer.preimage.as_ref().ok_or_else(|| BtcError::SigningFailure {
                index,
                reason: "hash-preimage script needs a preimage".into(),
            })?;
            if sha256(preimage) != hash {
                return Err(BtcError::SigningFailure {
                    index,
                    reason: "preimage does not hash to the script's commitment".into(),
                });
            }
            if preimage.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(BtcError::SigningFailure {
                    index,
                    reason: format!(
                        "preimage of {} bytes exceeds the {MAX_SCRIPT_ELEMENT_SIZE}-byte push limit",
                        preimage.len()
                    ),
                });
            }
            Ok(vec![preimage.clone()])
        }
        other => Err(BtcError::UnknownInputScript {
            index,
            reason: format!("no unlock template for redeem script {other:?}"),
        }),
    }
}

fn signing_key<'k>(
    index: usize,
    signer: &'k InputSigner,
    matches: impl Fn(&KeyPair) -> bool,
) -> Result<&'k KeyPair, BtcError> {
    let key = signer.key.as_ref().ok_or_else(|| BtcError::SigningFailure {
        index,
        reason: "no signing key supplied".into(),
    })?;
    if !matches(key) {
        return Err(BtcError::SigningFailure {
            index,
            reason: format!("key {} does not control this output", hex::encode(key.public_key())),
        });
    }
    Ok(key)
}

fn check_element_size(index: usize, script: &Script) -> Result<(), BtcError> {
    if script.len() > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(BtcError::UnknownInputScript {
            index,
            reason: format!(
                "script of {} bytes exceeds the {MAX_SCRIPT_ELEMENT_SIZE}-byte push limit",
                script.len()
            ),
        });
    }
    Ok(())
}
