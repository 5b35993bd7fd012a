use bip39::{Language, Mnemonic};
use zeroize::Zeroize;

use crypto_utils::Seed;

use crate::error::WalletError;

/// Validate a mnemonic phrase
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// BIP-39 seed for `phrase` and an optional `passphrase` (empty for none).
pub fn seed_from_mnemonic(phrase: &str, passphrase: &str) -> Result<Seed, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

    let mut bytes = mnemonic.to_seed(passphrase);
    let seed = Seed::new(bytes.to_vec());
    bytes.zeroize();
    seed.map_err(WalletError::from)
}
