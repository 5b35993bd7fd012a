use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid derivation: {0}")]
    InvalidDerivation(String),

    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Bitcoin: {0}")]
    Btc(chain_btc::BtcError),

    #[error("Crypto: {0}")]
    Crypto(crypto_utils::CryptoError),
}

impl From<crypto_utils::CryptoError> for WalletError {
    fn from(e: crypto_utils::CryptoError) -> Self {
        WalletError::Crypto(e)
    }
}

impl From<chain_btc::BtcError> for WalletError {
    fn from(e: chain_btc::BtcError) -> Self {
        WalletError::Btc(e)
    }
}
