use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length")]
    InvalidKeyLength,

    #[error("invalid seed length: {0} bytes (expected 16..=64)")]
    InvalidSeedLength(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_key_length() {
        let err = CryptoError::InvalidKeyLength;
        assert_eq!(err.to_string(), "invalid key length");
    }

    #[test]
    fn display_invalid_seed_length() {
        let err = CryptoError::InvalidSeedLength(8);
        assert_eq!(
            err.to_string(),
            "invalid seed length: 8 bytes (expected 16..=64)"
        );
    }

    #[test]
    fn display_invalid_input() {
        let err = CryptoError::InvalidInput("odd hex length".into());
        assert_eq!(err.to_string(), "invalid input: odd hex length");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(CryptoError::InvalidInput("test".into()));
        assert!(err.to_string().contains("test"));
    }
}
