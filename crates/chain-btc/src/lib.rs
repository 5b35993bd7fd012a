//! Bitcoin transaction toolkit.
//!
//! Script compilation and disassembly, the legacy and segwit wire format,
//! signature hashing, base58check/bech32 addresses, and a builder that signs
//! spends of P2PKH, P2WPKH, P2SH and P2WSH outputs. UTXOs come from any
//! [`utxo::UtxoSource`], such as the Esplora client.

pub mod address;
pub mod builder;
pub mod encode;
pub mod error;
pub mod esplora;
pub mod key;
pub mod network;
pub mod opcodes;
pub mod script;
pub mod sighash;
pub mod transaction;
pub mod utxo;

pub use address::Address;
pub use builder::{
    build_signed_transaction, InputSelection, InputSigner, SignedTransaction, SpendInput, SpendRequest,
    TransactionBuilder,
};
pub use error::BtcError;
pub use key::KeyPair;
pub use network::{BtcNetwork, NetworkParameters};
pub use script::{build_hash_preimage_script, Script, ScriptType};
pub use transaction::{OutPoint, Transaction, TxIn, TxOut, Txid, Witness};
pub use utxo::{PreviousOutput, StaticUtxoSource, UnspentOutput, UtxoSource, UtxoStatus};
