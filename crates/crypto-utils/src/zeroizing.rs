use std::fmt;
use std::ops::Deref;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Shortest seed accepted by BIP-32 (128 bits).
pub const MIN_SEED_LEN: usize = 16;

/// Longest seed accepted by BIP-32 (512 bits).
pub const MAX_SEED_LEN: usize = 64;

/// HD wallet seed bytes, zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed(Vec<u8>);

impl Seed {
    /// Wraps raw seed bytes, rejecting lengths outside 16..=64.
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            let len = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CryptoError::InvalidSeedLength(len));
        }
        Ok(Self(bytes))
    }

    /// Parses a hex-encoded seed such as
    /// `305a2e5a1c156e566c67b0658340937ed233c357094711d705f6c66bdd0329e3`.
    pub fn from_hex(hex_seed: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_seed.trim())
            .map_err(|e| CryptoError::InvalidInput(format!("seed is not valid hex: {e}")))?;
        Self::new(bytes)
    }

    /// Returns the length of the seed in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed seed; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for Seed {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_SEED: &str = "305a2e5a1c156e566c67b0658340937ed233c357094711d705f6c66bdd0329e3";

    #[test]
    fn seed_from_hex() {
        let seed = Seed::from_hex(DEMO_SEED).unwrap();
        assert_eq!(seed.len(), 32);
        assert_eq!(seed[0], 0x30);
        assert!(!seed.is_empty());
    }

    #[test]
    fn seed_from_hex_trims_whitespace() {
        let seed = Seed::from_hex(&format!("  {DEMO_SEED}\n")).unwrap();
        assert_eq!(seed.len(), 32);
    }

    #[test]
    fn seed_rejects_bad_hex() {
        let err = Seed::from_hex("zz").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput(_)));
    }

    #[test]
    fn seed_rejects_short_and_long() {
        assert!(matches!(
            Seed::new(vec![1; 15]),
            Err(CryptoError::InvalidSeedLength(15))
        ));
        assert!(matches!(
            Seed::new(vec![1; 65]),
            Err(CryptoError::InvalidSeedLength(65))
        ));
        assert!(Seed::new(vec![1; 16]).is_ok());
        assert!(Seed::new(vec![1; 64]).is_ok());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let seed = Seed::from_hex(DEMO_SEED).unwrap();
        let debug = format!("{seed:?}");
        assert_eq!(debug, "Seed([REDACTED; 32])");
    }

    #[test]
    fn manual_zeroize_clears() {
        let mut seed = Seed::new(vec![0xAA; 32]).unwrap();
        seed.zeroize();
        assert!(seed.is_empty());
    }
}
