use thiserror::Error;

/// Bitcoin toolkit errors.
///
/// Variants carry enough context (input index, offsets, expected vs actual
/// lengths) to diagnose a failure without re-running with tracing enabled.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("malformed script at offset {offset}: push of {declared} bytes but only {available} remain")]
    MalformedScript {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("truncated data reading {context}: needed {needed} bytes, {available} available")]
    TruncatedData {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("trailing data: {remaining} bytes after end of transaction")]
    TrailingData { remaining: usize },

    #[error("non-canonical varint encoding for value {value}")]
    NonCanonicalVarInt { value: u64 },

    #[error("segwit marker present but every witness is empty")]
    SuperfluousWitness,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("insufficient funds: have {available} sat, need {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("unknown script for input {index}: {reason}")]
    UnknownInputScript { index: usize, reason: String },

    #[error("redeem script for input {index} does not match the previous output script")]
    RedeemScriptMismatch { index: usize },

    #[error("signing failed for input {index}: {reason}")]
    SigningFailure { index: usize, reason: String },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("failed to fetch UTXOs: {0}")]
    UtxoFetchFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_malformed_script() {
        let err = BtcError::MalformedScript {
            offset: 3,
            declared: 20,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "malformed script at offset 3: push of 20 bytes but only 4 remain"
        );
    }

    #[test]
    fn display_truncated_data() {
        let err = BtcError::TruncatedData {
            context: "output value",
            needed: 8,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "truncated data reading output value: needed 8 bytes, 2 available"
        );
    }

    #[test]
    fn display_trailing_data() {
        let err = BtcError::TrailingData { remaining: 5 };
        assert_eq!(
            err.to_string(),
            "trailing data: 5 bytes after end of transaction"
        );
    }

    #[test]
    fn display_insufficient_funds() {
        let err = BtcError::InsufficientFunds {
            available: 1_000,
            required: 82_312,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: have 1000 sat, need 82312 sat"
        );
    }

    #[test]
    fn display_unknown_input_script() {
        let err = BtcError::UnknownInputScript {
            index: 2,
            reason: "vout 7 out of range".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown script for input 2: vout 7 out of range"
        );
    }

    #[test]
    fn display_signing_failure() {
        let err = BtcError::SigningFailure {
            index: 0,
            reason: "zero scalar".into(),
        };
        assert_eq!(err.to_string(), "signing failed for input 0: zero scalar");
    }

    #[test]
    fn display_utxo_fetch_failed() {
        let err = BtcError::UtxoFetchFailed("HTTP 503".into());
        assert_eq!(err.to_string(), "failed to fetch UTXOs: HTTP 503");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(BtcError::UnsupportedNetwork("litecoin".into()));
        assert!(err.to_string().contains("litecoin"));
    }

    #[test]
    fn debug_format_works() {
        let err = BtcError::SuperfluousWitness;
        let debug = format!("{:?}", err);
        assert!(debug.contains("SuperfluousWitness"));
    }
}
