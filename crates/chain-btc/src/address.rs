use bech32::segwit;

use crypto_utils::{checksum, hash160};

use crate::error::BtcError;
use crate::network::{BtcNetwork, NetworkParameters};
use crate::script::{Script, ScriptType};

/// Payload length of a base58check address: version(1) + hash(20) + checksum(4).
const BASE58_ADDRESS_LEN: usize = 25;

/// A decoded address: the output type plus the hash it commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    P2pkh([u8; 20]),
    P2sh([u8; 20]),
    P2wpkh([u8; 20]),
    P2wsh([u8; 32]),
}

impl Address {
    /// Address paid by a standard locking script, if it has one.
    pub fn from_script(script: &Script) -> Option<Self> {
        match script.classify() {
            ScriptType::P2pkh(hash) => Some(Address::P2pkh(hash)),
            ScriptType::P2sh(hash) => Some(Address::P2sh(hash)),
            ScriptType::P2wpkh(hash) => Some(Address::P2wpkh(hash)),
            ScriptType::P2wsh(hash) => Some(Address::P2wsh(hash)),
            _ => None,
        }
    }

    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> Script {
        match self {
            Address::P2pkh(hash) => Script::p2pkh(hash),
            Address::P2sh(hash) => Script::p2sh(hash),
            Address::P2wpkh(hash) => Script::p2wpkh(hash),
            Address::P2wsh(hash) => Script::p2wsh(hash),
        }
    }

    pub fn hash(&self) -> &[u8] {
        match self {
            Address::P2pkh(hash) | Address::P2sh(hash) | Address::P2wpkh(hash) => hash,
            Address::P2wsh(hash) => hash,
        }
    }

    /// Text form for `params`: base58check for P2PKH/P2SH, bech32 for segwit.
    pub fn encode(&self, params: &NetworkParameters) -> Result<String, BtcError> {
        params.validate()?;
        match self {
            Address::P2pkh(hash) => Ok(base58check(params.p2pkh_prefix, hash)),
            Address::P2sh(hash) => Ok(base58check(params.p2sh_prefix, hash)),
            Address::P2wpkh(hash) => bech32_v0(params, hash),
            Address::P2wsh(hash) => bech32_v0(params, hash),
        }
    }
}

fn base58check(version: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(BASE58_ADDRESS_LEN);
    payload.push(version);
    payload.extend_from_slice(hash);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    bs58::encode(payload).into_string()
}

fn bech32_v0(params: &NetworkParameters, program: &[u8]) -> Result<String, BtcError> {
    segwit::encode(params.hrp()?, segwit::VERSION_0, program)
        .map_err(|e| BtcError::InvalidAddress(format!("bech32 encoding failed: {e}")))
}

/// P2SH address: base58check of HASH160(script) under the network's P2SH
/// version byte.
pub fn p2sh_address(redeem_script: &Script, params: &NetworkParameters) -> Result<String, BtcError> {
    Address::P2sh(redeem_script.script_hash()).encode(params)
}

/// P2WSH address: bech32 (witness v0) of SHA256(script).
pub fn p2wsh_address(witness_script: &Script, params: &NetworkParameters) -> Result<String, BtcError> {
    Address::P2wsh(witness_script.witness_script_hash()).encode(params)
}

/// P2PKH address for a compressed public key.
pub fn p2pkh_address(pubkey: &[u8; 33], params: &NetworkParameters) -> Result<String, BtcError> {
    check_compressed(pubkey)?;
    Address::P2pkh(hash160(pubkey)).encode(params)
}

/// Native SegWit P2WPKH address for a compressed public key:
/// `bc1...` on mainnet, `tb1...` on testnet/signet.
pub fn p2wpkh_address(pubkey: &[u8; 33], params: &NetworkParameters) -> Result<String, BtcError> {
    check_compressed(pubkey)?;
    Address::P2wpkh(hash160(pubkey)).encode(params)
}

fn check_compressed(pubkey: &[u8; 33]) -> Result<(), BtcError> {
    if pubkey[0] != 0x02 && pubkey[0] != 0x03 {
        return Err(BtcError::InvalidPublicKey(
            "compressed key must start with 0x02 or 0x03".into(),
        ));
    }
    Ok(())
}

/// Decode an address for `params`, recovering the committed hash.
///
/// Fails on a bad checksum, a version byte or HRP belonging to another
/// network, or a witness program of the wrong length or version.
pub fn decode_address(address: &str, params: &NetworkParameters) -> Result<Address, BtcError> {
    params.validate()?;
    let separator = format!("{}1", params.bech32_hrp);
    if address.to_ascii_lowercase().starts_with(&separator) {
        decode_segwit(address, params)
    } else {
        decode_base58(address, params)
    }
}

fn decode_segwit(address: &str, params: &NetworkParameters) -> Result<Address, BtcError> {
    let (hrp, version, program) = segwit::decode(address)
        .map_err(|e| BtcError::InvalidAddress(format!("invalid bech32: {e}")))?;
    if hrp != params.hrp()? {
        return Err(BtcError::InvalidAddress(format!(
            "hrp {hrp} does not belong to {}",
            params.name
        )));
    }
    if version != segwit::VERSION_0 {
        return Err(BtcError::InvalidAddress(format!(
            "unsupported witness version {}",
            version.to_u8()
        )));
    }
    match program.len() {
        20 => Ok(Address::P2wpkh(to_array(&program))),
        32 => Ok(Address::P2wsh(to_array(&program))),
        n => Err(BtcError::InvalidAddress(format!(
            "witness v0 program must be 20 or 32 bytes, got {n}"
        ))),
    }
}

fn decode_base58(address: &str, params: &NetworkParameters) -> Result<Address, BtcError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| BtcError::InvalidAddress(format!("invalid base58: {e}")))?;

    if decoded.len() != BASE58_ADDRESS_LEN {
        return Err(BtcError::InvalidAddress(format!(
            "expected {BASE58_ADDRESS_LEN} bytes, got {}",
            decoded.len()
        )));
    }

    let (payload, check) = decoded.split_at(21);
    if checksum(payload) != check {
        return Err(BtcError::InvalidAddress("checksum mismatch".into()));
    }

    let hash = to_array(&payload[1..]);
    match payload[0] {
        v if v == params.p2pkh_prefix => Ok(Address::P2pkh(hash)),
        v if v == params.p2sh_prefix => Ok(Address::P2sh(hash)),
        v => Err(BtcError::InvalidAddress(format!(
            "version byte {v:#04x} does not belong to {}",
            params.name
        ))),
    }
}

fn to_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

/// Locking script for a textual address on `params`.
pub fn address_to_script_pubkey(address: &str, params: &NetworkParameters) -> Result<Script, BtcError> {
    Ok(decode_address(address, params)?.script_pubkey())
}

/// Validate an address string for the given network.
///
/// Returns `true` if the address is valid for `params`, `false` if it is a
/// well-formed address for another known network, and an error otherwise.
pub fn validate_address(address: &str, params: &NetworkParameters) -> Result<bool, BtcError> {
    match decode_address(address, params) {
        Ok(_) => Ok(true),
        Err(err) => {
            let elsewhere = [
                BtcNetwork::Mainnet,
                BtcNetwork::Testnet,
                BtcNetwork::Regtest,
            ]
            .into_iter()
            .any(|net| decode_address(address, &net.params()).is_ok());
            if elsewhere {
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}
