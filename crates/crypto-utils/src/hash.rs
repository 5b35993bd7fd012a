use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::error::CryptoError;

type HmacSha512 = Hmac<Sha512>;

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, used for txids, sighashes and base58check checksums.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// HASH160: RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// First four bytes of `sha256d(data)`.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = sha256d(data);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// HMAC-SHA512 over the concatenation of `parts`.
pub fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 64], CryptoError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
    for part in parts {
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256d_empty() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn hash160_of_generator_pubkey() {
        let pubkey =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        assert_eq!(
            hex::encode(hash160(&pubkey)),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn checksum_is_prefix_of_sha256d() {
        let data = b"checksum me";
        assert_eq!(checksum(data), sha256d(data)[..4]);
    }

    // RFC 4231, test case 2.
    #[test]
    fn hmac_sha512_rfc4231_case_2() {
        let mac = hmac_sha512(b"Jefe", &[&b"what do ya want "[..], &b"for nothing?"[..]]).unwrap();
        assert_eq!(
            hex::encode(mac),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn hmac_parts_equal_concatenation() {
        let split = hmac_sha512(b"key", &[&b"ab"[..], &b"cd"[..]]).unwrap();
        let joined = hmac_sha512(b"key", &[&b"abcd"[..]]).unwrap();
        assert_eq!(split, joined);
    }
}
