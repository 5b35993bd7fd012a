//! Transaction model and the consensus wire codec (legacy and segwit).

use std::fmt;
use std::str::FromStr;

use crypto_utils::sha256d;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encode::{write_var_bytes, write_varint, Reader};
use crate::error::BtcError;
use crate::script::Script;

/// Sequence number that disables relative locktime and RBF.
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Sequence number that signals replace-by-fee (BIP-125).
pub const SEQUENCE_ENABLE_RBF: u32 = 0xFFFF_FFFD;

/// Smallest possible input: outpoint(36) + empty script length(1) + sequence(4).
const MIN_TXIN_SIZE: usize = 41;

/// Smallest possible output: value(8) + empty script length(1).
const MIN_TXOUT_SIZE: usize = 9;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// Transaction id in internal (wire) byte order. Displays reversed, the way
/// explorers show it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Txid([u8; 32]);

impl Txid {
    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_byte_array(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = self.0;
        display.reverse();
        f.write_str(&hex::encode(display))
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl FromStr for Txid {
    type Err = BtcError;

    /// Parse a display-order (big-endian) hex txid.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| BtcError::InvalidHex(format!("txid: {e}")))?;
        let mut internal: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            BtcError::InvalidHex(format!("txid must be 32 bytes, got {}", b.len()))
        })?;
        internal.reverse();
        Ok(Self(internal))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Segwit witness stack for one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness(Vec<Vec<u8>>);

impl Witness {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, item: impl Into<Vec<u8>>) {
        self.0.push(item.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(Vec::as_slice)
    }

    pub fn to_hex_items(&self) -> Vec<String> {
        self.0.iter().map(hex::encode).collect()
    }
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self(items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
    pub witness: Witness,
}

impl TxIn {
    /// Unsigned input spending `previous_output`.
    pub fn new(previous_output: OutPoint, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig: Script::new(),
            sequence,
            witness: Witness::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub(crate) fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(buf, self.script_pubkey.as_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Decode a complete serialized transaction.
    ///
    /// Fails with `TruncatedData` when the buffer ends early and
    /// `TrailingData` when bytes remain after the locktime.
    pub fn decode(bytes: &[u8]) -> Result<Self, BtcError> {
        let mut reader = Reader::new(bytes);
        let version = reader.read_i32_le("version")?;

        let segwit = reader.peek() == Some(SEGWIT_MARKER) && reader.peek_at(1) == Some(SEGWIT_FLAG);
        if segwit {
            reader.take(2, "segwit marker")?;
        }

        let input_count = reader.read_count(MIN_TXIN_SIZE, "input count")?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let txid = Txid(reader.read_array("previous txid")?);
            let vout = reader.read_u32_le("previous output index")?;
            let script_sig = Script::from_raw(reader.read_var_bytes("scriptSig")?.to_vec());
            let sequence = reader.read_u32_le("sequence")?;
            inputs.push(TxIn {
                previous_output: OutPoint::new(txid, vout),
                script_sig,
                sequence,
                witness: Witness::new(),
            });
        }

        let output_count = reader.read_count(MIN_TXOUT_SIZE, "output count")?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = reader.read_u64_le("output value")?;
            let script_pubkey = Script::from_raw(reader.read_var_bytes("scriptPubKey")?.to_vec());
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        if segwit {
            for input in &mut inputs {
                let item_count = reader.read_count(1, "witness item count")?;
                let mut items = Vec::with_capacity(item_count);
                for _ in 0..item_count {
                    items.push(reader.read_var_bytes("witness item")?.to_vec());
                }
                input.witness = Witness(items);
            }
            if inputs.iter().all(|i| i.witness.is_empty()) {
                return Err(BtcError::SuperfluousWitness);
            }
        }

        let lock_time = reader.read_u32_le("locktime")?;
        reader.finish()?;

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn from_hex(hex_tx: &str) -> Result<Self, BtcError> {
        let bytes = hex::decode(hex_tx.trim())
            .map_err(|e| BtcError::InvalidHex(format!("transaction: {e}")))?;
        Self::decode(&bytes)
    }

    /// Serialize, using the segwit layout only if some input has a witness.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.base_size_hint());
        self.write(&mut buf, self.has_witness());
        buf
    }

    /// Legacy serialization, as hashed for the txid.
    pub fn encode_without_witness(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.base_size_hint());
        self.write(&mut buf, false);
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    fn write(&self, buf: &mut Vec<u8>, include_witness: bool) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        if include_witness {
            buf.push(SEGWIT_MARKER);
            buf.push(SEGWIT_FLAG);
        }

        write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_var_bytes(buf, input.script_sig.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(buf);
        }

        if include_witness {
            for input in &self.inputs {
                write_varint(buf, input.witness.len() as u64);
                for item in input.witness.iter() {
                    write_var_bytes(buf, item);
                }
            }
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    fn base_size_hint(&self) -> usize {
        10 + self.inputs.len() * 148 + self.outputs.len() * 34
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|i| !i.witness.is_empty())
    }

    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.encode_without_witness()))
    }

    /// Witness txid; equal to `txid` for transactions without witnesses.
    pub fn wtxid(&self) -> Txid {
        Txid(sha256d(&self.encode()))
    }

    /// BIP-141 weight: base size * 3 + total size.
    pub fn weight(&self) -> usize {
        self.encode_without_witness().len() * 3 + self.encode().len()
    }

    pub fn vsize(&self) -> usize {
        self.weight().div_ceil(4)
    }

    /// Sum of output values, or `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_TX_HEX: &str = "010000000104dde43b0e4724f1e3b45782a9bfbcc91ea764c7cb1c245fba1fefa175c3a5d0010000006a4730440220519f7867349790ee441e83e545afbd25b954a34e0733cd4da3b5f1e5588625050220166730d053c3672973bcb2bb1a977b747837023b647e3af2ac9c15728b0681da01210236ccb7ee3a9f154127f384a05870c4fd86a8727eab7316f1449a0b9e65bfd90dffffffff025d360100000000001976a91478364a559841329304188cd791ad9dabbb2a3fdb88ac605b0300000000001976a914064e0aa817486573f4c2de09f927697e1e6f233f88ac00000000";

    const SEGWIT_TX_HEX: &str = "02000000000101b30af604ff8d8ead9f4225638953e02dd507b382e2cfb4c3fc75b4a74c0b64400000000000fdffffff02b9bb01000000000017a91432971b01a505e62b860ed9c960f98b64252b294287269137070100000017a914715329031bfb1b6758222baf8f93ef35f931832e87024730440220320b421d1168a440e1b937e98fa5baa84e857846409605ac17c557df6132ac4202205555ede114d2c520f22907aa8abf197a69851c9deb7c3ed343ddde7192dfe65301210314e15958427ad49ba9c2a886cc8ce399adbf14a8c4721deaad78d45129be4f72384e2700";

    #[test]
    fn decode_legacy_sample() {
        let tx = Transaction::from_hex(LEGACY_TX_HEX).unwrap();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.lock_time, 0);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(
            tx.inputs[0].previous_output.txid.to_string(),
            "d0a5c375a1ef1fba5f241ccbc764a71ec9bcbfa98257b4e3f124470e3be4dd04"
        );
        assert_eq!(tx.inputs[0].previous_output.vout, 1);
        assert_eq!(tx.inputs[0].sequence, 4294967295);
        assert_eq!(tx.outputs[0].value, 79_453);
        assert_eq!(tx.outputs[1].value, 220_000);
        assert!(!tx.has_witness());
    }

    #[test]
    fn decode_segwit_sample() {
        let tx = Transaction::from_hex(SEGWIT_TX_HEX).unwrap();
        assert_eq!(tx.version, 2);
        assert!(tx.has_witness());
        assert_eq!(tx.inputs[0].sequence, SEQUENCE_ENABLE_RBF);
        assert_eq!(tx.inputs[0].witness.len(), 2);
        assert!(tx.inputs[0].script_sig.is_empty());
        assert_eq!(tx.outputs[0].value, 113_593);
        assert_eq!(tx.lock_time, 2_575_928);
        assert_eq!(
            tx.txid().to_string(),
            "2ceacea9eee801cd4f8d82f73d0b5ee9d3d679a296208cd240388e6a8b640cb8"
        );
        assert_eq!(
            tx.wtxid().to_string(),
            "ad64692343fad2dc0b019eac63f8ea06e8d2e6b47b766aa960d4f5c5ef15a0c8"
        );
    }

    #[test]
    fn legacy_txid() {
        let tx = Transaction::from_hex(LEGACY_TX_HEX).unwrap();
        assert_eq!(
            tx.txid().to_string(),
            "e778e8765fdbb60f62e267de4705789f526a5fe9bb0c0f5e56ab4f566c5240eb"
        );
        assert_eq!(tx.txid(), tx.wtxid());
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        for hex_tx in [LEGACY_TX_HEX, SEGWIT_TX_HEX] {
            let tx = Transaction::from_hex(hex_tx).unwrap();
            assert_eq!(tx.to_hex(), hex_tx);
            assert_eq!(Transaction::decode(&tx.encode()).unwrap(), tx);
        }
    }

    #[test]
    fn every_truncation_is_rejected() {
        let bytes = hex::decode(SEGWIT_TX_HEX).unwrap();
        for len in 0..bytes.len() {
            let result = Transaction::decode(&bytes[..len]);
            assert!(
                matches!(
                    result,
                    Err(BtcError::TruncatedData { .. }) | Err(BtcError::SuperfluousWitness)
                ),
                "prefix of {len} bytes gave {result:?}"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = hex::decode(LEGACY_TX_HEX).unwrap();
        bytes.extend_from_slice(&[0xde, 0xad]);
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(BtcError::TrailingData { remaining: 2 })
        ));
    }

    #[test]
    fn superfluous_witness_is_rejected() {
        let mut tx = Transaction::from_hex(SEGWIT_TX_HEX).unwrap();
        tx.inputs[0].witness = Witness::new();
        let mut bytes = Vec::new();
        tx.write(&mut bytes, true);
        assert!(matches!(
            Transaction::decode(&bytes),
            Err(BtcError::SuperfluousWitness)
        ));
    }

    #[test]
    fn witness_flag_only_when_needed() {
        let mut tx = Transaction::from_hex(SEGWIT_TX_HEX).unwrap();
        assert_eq!(&tx.encode()[4..6], &[0x00, 0x01]);
        tx.inputs[0].witness = Witness::new();
        assert_eq!(tx.encode(), tx.encode_without_witness());
    }

    #[test]
    fn weight_and_vsize() {
        let legacy = Transaction::from_hex(LEGACY_TX_HEX).unwrap();
        assert_eq!(legacy.weight(), 225 * 4);
        assert_eq!(legacy.vsize(), 225);

        let segwit = Transaction::from_hex(SEGWIT_TX_HEX).unwrap();
        assert!(segwit.vsize() < segwit.encode().len());
    }

    #[test]
    fn txid_parse_display_round_trip() {
        let display = "d0a5c375a1ef1fba5f241ccbc764a71ec9bcbfa98257b4e3f124470e3be4dd04";
        let txid: Txid = display.parse().unwrap();
        assert_eq!(txid.as_bytes()[0], 0x04);
        assert_eq!(txid.to_string(), display);
        assert!("abcd".parse::<Txid>().is_err());
    }

    #[test]
    fn txid_serializes_as_display_hex() {
        let txid: Txid = "d0a5c375a1ef1fba5f241ccbc764a71ec9bcbfa98257b4e3f124470e3be4dd04"
            .parse()
            .unwrap();
        let json = serde_json::to_string(&txid).unwrap();
        assert_eq!(
            json,
            "\"d0a5c375a1ef1fba5f241ccbc764a71ec9bcbfa98257b4e3f124470e3be4dd04\""
        );
        let back: Txid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, txid);
    }

    #[test]
    fn matches_reference_implementation() {
        for hex_tx in [LEGACY_TX_HEX, SEGWIT_TX_HEX] {
            let ours = Transaction::from_hex(hex_tx).unwrap();
            let theirs: bitcoin::Transaction =
                bitcoin::consensus::deserialize(&hex::decode(hex_tx).unwrap()).unwrap();
            assert_eq!(ours.txid().to_string(), theirs.compute_txid().to_string());
            assert_eq!(ours.wtxid().to_string(), theirs.compute_wtxid().to_string());
            assert_eq!(ours.weight() as u64, theirs.weight().to_wu());
        }
    }

    #[test]
    fn total_output_value_overflow() {
        let mut tx = Transaction::from_hex(LEGACY_TX_HEX).unwrap();
        assert_eq!(tx.total_output_value(), Some(299_453));
        tx.outputs[0].value = u64::MAX;
        assert_eq!(tx.total_output_value(), None);
    }
}
