use std::fmt;
use std::str::FromStr;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, FieldBytes, ProjectivePoint, PublicKey, Scalar};
use zeroize::Zeroize;

use chain_btc::{KeyPair, NetworkParameters};
use crypto_utils::{checksum, hash160, hmac_sha512, Seed};

use crate::error::WalletError;

/// First hardened child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Key used for the master HMAC.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Serialized extended key length before the checksum.
const EXTENDED_KEY_LEN: usize = 78;

/// Path used for signing when none is configured.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/0'/0'/0/0";

/// One step of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildNumber {
    index: u32,
    hardened: bool,
}

impl ChildNumber {
    pub fn normal(index: u32) -> Result<Self, WalletError> {
        Self::checked(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self, WalletError> {
        Self::checked(index, true)
    }

    fn checked(index: u32, hardened: bool) -> Result<Self, WalletError> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidPath(format!(
                "child index {index} does not fit in 31 bits"
            )));
        }
        Ok(Self { index, hardened })
    }

    /// From the 32-bit wire form, where bit 31 marks a hardened child.
    pub fn from_raw(raw: u32) -> Self {
        Self {
            index: raw & !HARDENED_OFFSET,
            hardened: raw & HARDENED_OFFSET != 0,
        }
    }

    pub fn to_raw(self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn is_hardened(self) -> bool {
        self.hardened
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl FromStr for ChildNumber {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix(['\'', 'h', 'H']) {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| WalletError::InvalidPath(format!("invalid path component {s:?}")))?;
        Self::checked(index, hardened)
    }
}

/// Ordered list of child steps from the master key, e.g. `m/44'/0'/0'/0/0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    pub fn master() -> Self {
        Self::default()
    }

    /// `m/44'/coin'/account'/change/index`
    pub fn bip44(coin_type: u32, account: u32, change: u32, index: u32) -> Result<Self, WalletError> {
        Ok(Self(vec![
            ChildNumber::hardened(44)?,
            ChildNumber::hardened(coin_type)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(change)?,
            ChildNumber::normal(index)?,
        ]))
    }

    pub fn child(&self, number: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(number);
        Self(steps)
    }

    pub fn as_slice(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::InvalidPath(format!("{s:?} must start with m")));
        }
        parts
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }
}

/// BIP-32 extended private key. Secret and chain code are wiped on drop.
#[derive(Clone)]
pub struct ExtendedPrivateKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: [u8; 32],
    secret: [u8; 32],
}

/// BIP-32 extended public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: [u8; 32],
    public_key: [u8; 33],
}

fn parse_scalar(bytes: &[u8]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
}

fn split_hmac(mut output: [u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    output.zeroize();
    (left, right)
}

fn compressed_public_key(secret: &[u8; 32]) -> Result<[u8; 33], WalletError> {
    let signing_key = SigningKey::from_bytes(secret.into())
        .map_err(|e| WalletError::InvalidDerivation(format!("invalid private key: {e}")))?;
    signing_key
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .try_into()
        .map_err(|_| WalletError::InvalidDerivation("invalid compressed public key".into()))
}

fn fingerprint_of(public_key: &[u8; 33]) -> [u8; 4] {
    let hash = hash160(public_key);
    [hash[0], hash[1], hash[2], hash[3]]
}

impl ExtendedPrivateKey {
    /// Master key: HMAC-SHA512 of the seed keyed with `"Bitcoin seed"`.
    pub fn new_master(seed: &Seed) -> Result<Self, WalletError> {
        let (mut secret, chain_code) = split_hmac(hmac_sha512(MASTER_HMAC_KEY, &[&**seed])?);

        let valid = parse_scalar(&secret).is_some_and(|k| !bool::from(k.is_zero()));
        if !valid {
            secret.zeroize();
            return Err(WalletError::InvalidDerivation(
                "master key is zero or not below the curve order".into(),
            ));
        }

        Ok(Self {
            depth: 0,
            parent_fingerprint: [0; 4],
            child_number: ChildNumber::from_raw(0),
            chain_code,
            secret,
        })
    }

    /// CKDpriv.
    ///
    /// Hardened children hash `0x00 || k || index`, normal children hash
    /// `serP(K) || index`. Fails when `IL >= n` or the child key is zero.
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| WalletError::InvalidDerivation("maximum depth reached".into()))?;
        let public_key = self.public_key()?;
        let index = child.to_raw().to_be_bytes();

        let output = if child.is_hardened() {
            hmac_sha512(&self.chain_code, &[&[0u8][..], &self.secret[..], &index[..]])?
        } else {
            hmac_sha512(&self.chain_code, &[&public_key[..], &index[..]])?
        };
        let (mut il, chain_code) = split_hmac(output);

        let tweak = parse_scalar(&il);
        il.zeroize();
        let tweak = tweak.ok_or_else(|| {
            WalletError::InvalidDerivation(format!("IL not below the curve order at child {child}"))
        })?;
        let parent = parse_scalar(&self.secret)
            .ok_or_else(|| WalletError::InvalidDerivation("parent key out of range".into()))?;

        let child_scalar = tweak + parent;
        if bool::from(child_scalar.is_zero()) {
            return Err(WalletError::InvalidDerivation(format!(
                "child key {child} is zero"
            )));
        }

        let mut secret = [0u8; 32];
        secret.copy_from_slice(&child_scalar.to_repr());

        Ok(Self {
            depth,
            parent_fingerprint: fingerprint_of(&public_key),
            child_number: child,
            chain_code,
            secret,
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        path.as_slice()
            .iter()
            .try_fold(self.clone(), |key, step| key.derive_child(*step))
    }

    pub fn public_key(&self) -> Result<[u8; 33], WalletError> {
        compressed_public_key(&self.secret)
    }

    pub fn to_extended_public_key(&self) -> Result<ExtendedPublicKey, WalletError> {
        Ok(ExtendedPublicKey {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            public_key: self.public_key()?,
        })
    }

    /// Signing key pair for this node, labelled with `path`.
    pub fn to_key_pair(&self, path: &DerivationPath) -> Result<KeyPair, WalletError> {
        Ok(KeyPair::from_secret_bytes(self.secret, path.to_string())?)
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn fingerprint(&self) -> Result<[u8; 4], WalletError> {
        Ok(fingerprint_of(&self.public_key()?))
    }

    /// `xprv`/`tprv` string using the network's private version bytes.
    pub fn to_base58(&self, params: &NetworkParameters) -> String {
        let mut key = [0u8; 33];
        key[1..].copy_from_slice(&self.secret);
        let encoded = encode_extended(
            params.xprv_version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &key,
        );
        key.zeroize();
        encoded
    }

    pub fn from_base58(encoded: &str, params: &NetworkParameters) -> Result<Self, WalletError> {
        let raw = decode_extended(encoded, params.xprv_version)?;
        if raw.key[0] != 0 {
            return Err(WalletError::InvalidExtendedKey(
                "private key data must start with 0x00".into(),
            ));
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&raw.key[1..]);
        if parse_scalar(&secret).is_none_or(|k| bool::from(k.is_zero())) {
            secret.zeroize();
            return Err(WalletError::InvalidExtendedKey("private key out of range".into()));
        }
        Ok(Self {
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
            chain_code: raw.chain_code,
            secret,
        })
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivateKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl Drop for ExtendedPrivateKey {
    fn drop(&mut self) {
        self.secret.zeroize();
        self.chain_code.zeroize();
    }
}

impl ExtendedPublicKey {
    /// CKDpub. Only normal children can be derived from a public key.
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        if child.is_hardened() {
            return Err(WalletError::InvalidDerivation(format!(
                "cannot derive hardened child {child} from a public key"
            )));
        }
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| WalletError::InvalidDerivation("maximum depth reached".into()))?;

        let index = child.to_raw().to_be_bytes();
        let (il, chain_code) =
            split_hmac(hmac_sha512(&self.chain_code, &[&self.public_key[..], &index[..]])?);
        let tweak = parse_scalar(&il).ok_or_else(|| {
            WalletError::InvalidDerivation(format!("IL not below the curve order at child {child}"))
        })?;

        let parent = PublicKey::from_sec1_bytes(&self.public_key)
            .map_err(|e| WalletError::InvalidDerivation(format!("invalid parent key: {e}")))?;
        let point = ProjectivePoint::GENERATOR * tweak + parent.to_projective();
        let child_key = PublicKey::from_affine(AffinePoint::from(point)).map_err(|_| {
            WalletError::InvalidDerivation(format!("child key {child} is the point at infinity"))
        })?;
        let public_key: [u8; 33] = child_key
            .to_encoded_point(true)
            .as_bytes()
            .try_into()
            .map_err(|_| WalletError::InvalidDerivation("invalid compressed public key".into()))?;

        Ok(Self {
            depth,
            parent_fingerprint: fingerprint_of(&self.public_key),
            child_number: child,
            chain_code,
            public_key,
        })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        path.as_slice()
            .iter()
            .try_fold(self.clone(), |key, step| key.derive_child(*step))
    }

    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.public_key)
    }

    /// `xpub`/`tpub` string using the network's public version bytes.
    pub fn to_base58(&self, params: &NetworkParameters) -> String {
        encode_extended(
            params.xpub_version,
            self.depth,
            self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
            &self.public_key,
        )
    }

    pub fn from_base58(encoded: &str, params: &NetworkParameters) -> Result<Self, WalletError> {
        let raw = decode_extended(encoded, params.xpub_version)?;
        PublicKey::from_sec1_bytes(&raw.key)
            .map_err(|e| WalletError::InvalidExtendedKey(format!("invalid public key: {e}")))?;
        Ok(Self {
            depth: raw.depth,
            parent_fingerprint: raw.parent_fingerprint,
            child_number: raw.child_number,
            chain_code: raw.chain_code,
            public_key: raw.key,
        })
    }
}

fn encode_extended(
    version: [u8; 4],
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: &[u8; 32],
    key: &[u8; 33],
) -> String {
    let mut payload = Vec::with_capacity(EXTENDED_KEY_LEN + 4);
    payload.extend_from_slice(&version);
    payload.push(depth);
    payload.extend_from_slice(&parent_fingerprint);
    payload.extend_from_slice(&child_number.to_raw().to_be_bytes());
    payload.extend_from_slice(chain_code);
    payload.extend_from_slice(key);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    let encoded = bs58::encode(&payload).into_string();
    payload.zeroize();
    encoded
}

struct RawExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: [u8; 32],
    key: [u8; 33],
}

impl Drop for RawExtendedKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.chain_code.zeroize();
    }
}

fn decode_extended(encoded: &str, version: [u8; 4]) -> Result<RawExtendedKey, WalletError> {
    let mut data = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| WalletError::InvalidExtendedKey(format!("invalid base58: {e}")))?;
    if data.len() != EXTENDED_KEY_LEN + 4 {
        let len = data.len();
        data.zeroize();
        return Err(WalletError::InvalidExtendedKey(format!(
            "expected {} bytes, got {len}",
            EXTENDED_KEY_LEN + 4
        )));
    }
    let (payload, check) = data.split_at(EXTENDED_KEY_LEN);
    if checksum(payload) != check {
        data.zeroize();
        return Err(WalletError::InvalidExtendedKey("checksum mismatch".into()));
    }
    if payload[..4] != version {
        let found = hex::encode(&payload[..4]);
        data.zeroize();
        return Err(WalletError::InvalidExtendedKey(format!(
            "version {found} does not match {}",
            hex::encode(version)
        )));
    }

    let mut raw = RawExtendedKey {
        depth: payload[4],
        parent_fingerprint: [0; 4],
        child_number: ChildNumber::from_raw(u32::from_be_bytes([
            payload[9], payload[10], payload[11], payload[12],
        ])),
        chain_code: [0; 32],
        key: [0; 33],
    };
    raw.parent_fingerprint.copy_from_slice(&payload[5..9]);
    raw.chain_code.copy_from_slice(&payload[13..45]);
    raw.key.copy_from_slice(&payload[45..78]);
    data.zeroize();
    Ok(raw)
}

/// Derive the signing key at `path` from a seed.
pub fn derive_key_pair(seed: &Seed, path: &DerivationPath) -> Result<KeyPair, WalletError> {
    let master = ExtendedPrivateKey::new_master(seed)?;
    let node = master.derive_path(path)?;
    tracing::debug!(%path, depth = node.depth(), "derived signing key");
    node.to_key_pair(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_btc::BtcNetwork;

    const VECTOR1_SEED: &str = "000102030405060708090a0b0c0d0e0f";
    const ABANDON_SEED: &str = "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc19a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4";

    fn mainnet() -> NetworkParameters {
        BtcNetwork::Mainnet.params()
    }

    fn master(seed_hex: &str) -> ExtendedPrivateKey {
        ExtendedPrivateKey::new_master(&Seed::from_hex(seed_hex).unwrap()).unwrap()
    }

    #[test]
    fn bip32_vector1_master() {
        let m = master(VECTOR1_SEED);
        assert_eq!(
            m.to_base58(&mainnet()),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            m.to_extended_public_key().unwrap().to_base58(&mainnet()),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn bip32_vector1_hardened_child() {
        let child = master(VECTOR1_SEED)
            .derive_child(ChildNumber::hardened(0).unwrap())
            .unwrap();
        assert_eq!(
            child.to_base58(&mainnet()),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
        assert_eq!(
            child.to_extended_public_key().unwrap().to_base58(&mainnet()),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
    }

    #[test]
    fn bip32_vector1_normal_child() {
        let path: DerivationPath = "m/0'/1".parse().unwrap();
        let node = master(VECTOR1_SEED).derive_path(&path).unwrap();
        assert_eq!(
            node.to_base58(&mainnet()),
            "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs"
        );
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn public_derivation_matches_private() {
        let parent = master(VECTOR1_SEED)
            .derive_child(ChildNumber::hardened(0).unwrap())
            .unwrap();
        let via_private = parent
            .derive_child(ChildNumber::normal(1).unwrap())
            .unwrap()
            .to_extended_public_key()
            .unwrap();
        let via_public = parent
            .to_extended_public_key()
            .unwrap()
            .derive_child(ChildNumber::normal(1).unwrap())
            .unwrap();
        assert_eq!(via_private, via_public);
        assert_eq!(
            via_public.to_base58(&mainnet()),
            "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ"
        );
    }

    #[test]
    fn public_key_cannot_derive_hardened() {
        let xpub = master(VECTOR1_SEED).to_extended_public_key().unwrap();
        assert!(matches!(
            xpub.derive_child(ChildNumber::hardened(0).unwrap()),
            Err(WalletError::InvalidDerivation(_))
        ));
    }

    #[test]
    fn bip44_key_for_abandon_mnemonic() {
        let seed = Seed::from_hex(ABANDON_SEED).unwrap();
        let path = DerivationPath::bip44(0, 0, 0, 0).unwrap();
        let kp = derive_key_pair(&seed, &path).unwrap();
        assert_eq!(
            hex::encode(kp.public_key()),
            "03aaeb52dd7494c361049de67cc680e83ebcbbbdbeb13637d92cd845f70308af5e"
        );
        assert_eq!(kp.derivation_path(), "m/44'/0'/0'/0/0");
    }

    #[test]
    fn testnet_coin_type_changes_key() {
        let seed = Seed::from_hex(ABANDON_SEED).unwrap();
        let kp = derive_key_pair(&seed, &"m/44'/1'/0'/0/0".parse().unwrap()).unwrap();
        assert_eq!(hex::encode(kp.pubkey_hash()), "3a2d4145a4f098523b3e8127f1da87cfc55b8e79");
    }

    #[test]
    fn matches_bip32_crate() {
        let seed = Seed::from_hex(ABANDON_SEED).unwrap();
        for path_str in ["m/0", "m/44'/0'/0'/0/0", "m/84'/1'/2'/1/7", "m/1/2/3/4'"] {
            let ours = ExtendedPrivateKey::new_master(&seed)
                .unwrap()
                .derive_path(&path_str.parse().unwrap())
                .unwrap();
            let theirs =
                bip32::XPrv::derive_from_path(&*seed, &path_str.parse::<bip32::DerivationPath>().unwrap())
                    .unwrap();
            assert_eq!(
                ours.to_base58(&mainnet()),
                theirs.to_string(bip32::Prefix::XPRV).as_str(),
                "path {path_str}"
            );
        }
    }

    #[test]
    fn extended_keys_parse_back() {
        let node = master(VECTOR1_SEED)
            .derive_path(&"m/0'/1".parse().unwrap())
            .unwrap();
        let testnet = BtcNetwork::Testnet.params();

        let tprv = node.to_base58(&testnet);
        assert!(tprv.starts_with("tprv"));
        let parsed = ExtendedPrivateKey::from_base58(&tprv, &testnet).unwrap();
        assert_eq!(parsed.to_base58(&testnet), tprv);

        let tpub = node.to_extended_public_key().unwrap().to_base58(&testnet);
        assert!(tpub.starts_with("tpub"));
        let parsed = ExtendedPublicKey::from_base58(&tpub, &testnet).unwrap();
        assert_eq!(parsed, node.to_extended_public_key().unwrap());
    }

    #[test]
    fn extended_key_wrong_network_is_rejected() {
        let xprv = master(VECTOR1_SEED).to_base58(&mainnet());
        assert!(matches!(
            ExtendedPrivateKey::from_base58(&xprv, &BtcNetwork::Testnet.params()),
            Err(WalletError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn path_parse_and_display() {
        let path: DerivationPath = "m/44'/0'/0'/0/0".parse().unwrap();
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/0");
        assert_eq!(path, DerivationPath::bip44(0, 0, 0, 0).unwrap());
        assert_eq!(path.len(), 5);

        let h: DerivationPath = "m/44h/0H/0'/0/0".parse().unwrap();
        assert_eq!(h, path);

        let m: DerivationPath = "m".parse().unwrap();
        assert!(m.is_empty());
        assert_eq!(m.to_string(), "m");

        assert_eq!(path.as_slice()[0].to_raw(), HARDENED_OFFSET + 44);
        assert_eq!(ChildNumber::from_raw(HARDENED_OFFSET + 44), path.as_slice()[0]);
    }

    #[test]
    fn path_errors() {
        for bad in ["", "44'/0'", "m/", "m/abc", "m/2147483648", "m/-1", "m//0"] {
            assert!(
                matches!(bad.parse::<DerivationPath>(), Err(WalletError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn default_path_is_parseable() {
        let path: DerivationPath = DEFAULT_DERIVATION_PATH.parse().unwrap();
        assert_eq!(path.to_string(), DEFAULT_DERIVATION_PATH);
    }

    #[test]
    fn debug_hides_secret() {
        let m = master(VECTOR1_SEED);
        let dbg = format!("{m:?}");
        assert!(!dbg.contains(&hex::encode(m.secret)));
    }
}
