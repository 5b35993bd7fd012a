use std::fmt;

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use zeroize::Zeroize;

use crypto_utils::hash160;

use crate::error::BtcError;
use crate::sighash::SighashType;

/// A secp256k1 signing key with its compressed public key.
///
/// The secret scalar is wiped on drop and never printed.
#[derive(Clone)]
pub struct KeyPair {
    secret: [u8; 32],
    public_key: [u8; 33],
    derivation_path: String,
}

impl KeyPair {
    /// Build a key pair from a raw 32-byte scalar. Zero and values >= n are rejected.
    pub fn from_secret_bytes(secret: [u8; 32], derivation_path: impl Into<String>) -> Result<Self, BtcError> {
        let signing_key = SigningKey::from_bytes(&secret.into())
            .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secp256k1 key: {e}")))?;
        let public_key: [u8; 33] = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .try_into()
            .map_err(|_| BtcError::InvalidPublicKey("unexpected compressed key length".into()))?;

        Ok(Self {
            secret,
            public_key,
            derivation_path: derivation_path.into(),
        })
    }

    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    /// HASH160 of the compressed public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key)
    }

    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Sign a 32-byte sighash for input `input_index`.
    ///
    /// Returns the low-S DER signature followed by the sighash type byte,
    /// ready to go into a scriptSig or witness.
    pub fn sign(
        &self,
        input_index: usize,
        sighash: &[u8; 32],
        sighash_type: SighashType,
    ) -> Result<Vec<u8>, BtcError> {
        let signing_key = SigningKey::from_bytes(&self.secret.into()).map_err(|e| {
            BtcError::SigningFailure {
                index: input_index,
                reason: format!("invalid key material: {e}"),
            }
        })?;

        let sig: Signature = signing_key
            .sign_prehash(sighash)
            .map_err(|e| BtcError::SigningFailure {
                index: input_index,
                reason: format!("ECDSA signing failed: {e}"),
            })?;
        let sig = sig.normalize_s().unwrap_or(sig);

        let mut out = sig.to_der().as_bytes().to_vec();
        out.push(sighash_type.to_byte());
        Ok(out)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("derivation_path", &self.derivation_path)
            .finish_non_exhaustive()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{signature::hazmat::PrehashVerifier, VerifyingKey};

    fn secret_one() -> [u8; 32] {
        let mut s = [0u8; 32];
        s[31] = 1;
        s
    }

    #[test]
    fn generator_public_key() {
        let kp = KeyPair::from_secret_bytes(secret_one(), "m").unwrap();
        assert_eq!(
            hex::encode(kp.public_key()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(hex::encode(kp.pubkey_hash()), "751e76e8199196d454941c45d1b3a323f1433bd6");
    }

    #[test]
    fn rejects_zero_and_overflowing_scalars() {
        assert!(matches!(
            KeyPair::from_secret_bytes([0u8; 32], "m"),
            Err(BtcError::InvalidPrivateKey(_))
        ));
        assert!(KeyPair::from_secret_bytes([0xff; 32], "m").is_err());
    }

    #[test]
    fn signature_is_low_s_der_with_type_byte() {
        let kp = KeyPair::from_secret_bytes([0x11; 32], "m/0").unwrap();
        let digest = crypto_utils::sha256d(b"sighash");
        let sig = kp.sign(0, &digest, SighashType::All).unwrap();

        assert_eq!(*sig.last().unwrap(), 0x01);
        assert_eq!(sig[0], 0x30);

        let parsed = Signature::from_der(&sig[..sig.len() - 1]).unwrap();
        assert!(parsed.normalize_s().is_none(), "signature must be low-S");

        let vk = VerifyingKey::from_sec1_bytes(kp.public_key()).unwrap();
        vk.verify_prehash(&digest, &parsed).unwrap();
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = KeyPair::from_secret_bytes([0x22; 32], "m").unwrap();
        let digest = [0x42; 32];
        assert_eq!(
            kp.sign(0, &digest, SighashType::All).unwrap(),
            kp.sign(3, &digest, SighashType::All).unwrap()
        );
    }

    #[test]
    fn sighash_byte_follows_type() {
        let kp = KeyPair::from_secret_bytes([0x22; 32], "m").unwrap();
        let sig = kp.sign(0, &[7; 32], SighashType::SinglePlusAnyoneCanPay).unwrap();
        assert_eq!(*sig.last().unwrap(), 0x83);
    }

    #[test]
    fn matches_libsecp256k1_signature() {
        use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};

        let secret = [0x5a; 32];
        let digest = crypto_utils::sha256(b"rfc6979");
        let kp = KeyPair::from_secret_bytes(secret, "m").unwrap();
        let ours = kp.sign(0, &digest, SighashType::All).unwrap();

        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&secret).unwrap();
        let theirs = secp.sign_ecdsa(&Message::from_digest(digest), &sk);

        assert_eq!(&ours[..ours.len() - 1], theirs.serialize_der().as_ref());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = KeyPair::from_secret_bytes([0x33; 32], "m/44'/0'/0'/0/0").unwrap();
        let dbg = format!("{kp:?}");
        assert!(!dbg.contains(&hex::encode([0x33; 32])));
        assert!(dbg.contains("m/44'/0'/0'/0/0"));
    }
}
