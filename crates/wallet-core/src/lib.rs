//! Key derivation and the end-to-end transaction workflow.
//!
//! The free functions here are the service surface used by the CLI: decode a
//! transaction, disassemble a script, build and hash a redeem script, and
//! sign a spend from an address's UTXOs.

pub mod error;
pub mod hd_derivation;
pub mod mnemonic;
pub mod types;

use tracing::info;

use chain_btc::address::{p2sh_address, p2wsh_address};
use chain_btc::{
    build_hash_preimage_script, InputSigner, NetworkParameters, Script, SignedTransaction, SpendInput,
    SpendRequest, Transaction, TransactionBuilder, UtxoSource,
};

pub use error::WalletError;
pub use hd_derivation::{
    derive_key_pair, ChildNumber, DerivationPath, ExtendedPrivateKey, ExtendedPublicKey,
    DEFAULT_DERIVATION_PATH,
};
pub use mnemonic::{seed_from_mnemonic, validate_mnemonic};
pub use types::{DecodedInput, DecodedOutput, DecodedTransaction, TransactionRequest};

/// Decode a raw transaction for display.
pub fn decode_transaction_hex(tx_hex: &str, params: &NetworkParameters) -> Result<DecodedTransaction, WalletError> {
    let tx = Transaction::from_hex(tx_hex)?;
    Ok(DecodedTransaction::new(&tx, params))
}

/// Disassemble a hex-encoded script.
pub fn script_hex_to_asm(script_hex: &str) -> Result<String, WalletError> {
    let script = Script::from_hex(script_hex)?;
    Ok(script.to_asm()?)
}

/// `OP_SHA256 <sha256(secret)> OP_EQUAL`
pub fn create_redeem_script(secret: &str) -> Script {
    build_hash_preimage_script(secret)
}

/// P2SH address of a hex-encoded redeem script.
pub fn derive_p2sh_address(redeem_script_hex: &str, params: &NetworkParameters) -> Result<String, WalletError> {
    let script = Script::from_hex(redeem_script_hex)?;
    Ok(p2sh_address(&script, params)?)
}

/// P2WSH address of a hex-encoded witness script.
pub fn derive_p2wsh_address(witness_script_hex: &str, params: &NetworkParameters) -> Result<String, WalletError> {
    let script = Script::from_hex(witness_script_hex)?;
    Ok(p2wsh_address(&script, params)?)
}

/// Fetch the UTXOs of `request.source_address` and sign a payment from them.
pub fn create_signed_transaction(
    request: &TransactionRequest,
    source: &dyn UtxoSource,
    params: &NetworkParameters,
) -> Result<SignedTransaction, WalletError> {
    let utxos = source.fetch(&request.source_address, params)?;
    info!(
        address = %request.source_address,
        count = utxos.len(),
        "fetched utxos"
    );

    let signer = InputSigner {
        key: request.key.clone(),
        redeem_script: request.redeem_script.clone(),
        preimage: request.preimage.clone(),
        sighash_type: Default::default(),
    };

    let mut spend = SpendRequest::new(request.destination.clone(), request.amount, request.fee)
        .with_selection(request.selection);
    spend.change_address = request.change_address.clone();
    spend.utxos = utxos
        .into_iter()
        .map(|utxo| SpendInput::new(utxo, signer.clone()))
        .collect();

    Ok(TransactionBuilder::new(params).build(&spend)?)
}
