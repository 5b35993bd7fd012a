//! Signature hashes: the legacy algorithm and BIP-143 (segwit v0).

use crypto_utils::sha256d;

use crate::encode::{write_var_bytes, write_varint};
use crate::error::BtcError;
use crate::script::Script;
use crate::transaction::Transaction;

const ANYONECANPAY: u32 = 0x80;

/// Digest returned by legacy SIGHASH_SINGLE when there is no matching output.
const SINGLE_WITHOUT_OUTPUT: [u8; 32] = {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
};

/// ECDSA sighash flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SighashType {
    #[default]
    All,
    None,
    Single,
    AllPlusAnyoneCanPay,
    NonePlusAnyoneCanPay,
    SinglePlusAnyoneCanPay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    All,
    None,
    Single,
}

impl SighashType {
    pub fn to_u32(self) -> u32 {
        match self {
            SighashType::All => 0x01,
            SighashType::None => 0x02,
            SighashType::Single => 0x03,
            SighashType::AllPlusAnyoneCanPay => 0x81,
            SighashType::NonePlusAnyoneCanPay => 0x82,
            SighashType::SinglePlusAnyoneCanPay => 0x83,
        }
    }

    /// Byte appended to a DER signature.
    pub fn to_byte(self) -> u8 {
        self.to_u32() as u8
    }

    /// Parse one of the six standard values.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x01 => Some(SighashType::All),
            0x02 => Some(SighashType::None),
            0x03 => Some(SighashType::Single),
            0x81 => Some(SighashType::AllPlusAnyoneCanPay),
            0x82 => Some(SighashType::NonePlusAnyoneCanPay),
            0x83 => Some(SighashType::SinglePlusAnyoneCanPay),
            _ => None,
        }
    }

    pub fn anyone_can_pay(self) -> bool {
        self.to_u32() & ANYONECANPAY != 0
    }

    fn base(self) -> Base {
        match self.to_u32() & 0x1f {
            0x02 => Base::None,
            0x03 => Base::Single,
            _ => Base::All,
        }
    }
}

fn check_index(tx: &Transaction, input_index: usize) -> Result<(), BtcError> {
    if input_index >= tx.inputs.len() {
        return Err(BtcError::SigningFailure {
            index: input_index,
            reason: format!("transaction has only {} inputs", tx.inputs.len()),
        });
    }
    Ok(())
}

/// Legacy (pre-segwit) signature hash.
///
/// `script_code` is the previous output script for P2PKH and the redeem
/// script for P2SH. Every other input's script is emptied.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash_type: SighashType,
) -> Result<[u8; 32], BtcError> {
    check_index(tx, input_index)?;
    let base = sighash_type.base();
    if base == Base::Single && input_index >= tx.outputs.len() {
        return Ok(SINGLE_WITHOUT_OUTPUT);
    }

    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(&tx.version.to_le_bytes());

    let signed: Vec<usize> = if sighash_type.anyone_can_pay() {
        vec![input_index]
    } else {
        (0..tx.inputs.len()).collect()
    };
    write_varint(&mut buf, signed.len() as u64);
    for i in signed {
        let input = &tx.inputs[i];
        buf.extend_from_slice(input.previous_output.txid.as_bytes());
        buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
        if i == input_index {
            write_var_bytes(&mut buf, script_code.as_bytes());
        } else {
            write_varint(&mut buf, 0);
        }
        let sequence = if i != input_index && base != Base::All {
            0
        } else {
            input.sequence
        };
        buf.extend_from_slice(&sequence.to_le_bytes());
    }

    match base {
        Base::All => {
            write_varint(&mut buf, tx.outputs.len() as u64);
            for output in &tx.outputs {
                output.write(&mut buf);
            }
        }
        Base::None => write_varint(&mut buf, 0),
        Base::Single => {
            write_varint(&mut buf, input_index as u64 + 1);
            for _ in 0..input_index {
                buf.extend_from_slice(&u64::MAX.to_le_bytes());
                write_varint(&mut buf, 0);
            }
            tx.outputs[input_index].write(&mut buf);
        }
    }

    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    Ok(sha256d(&buf))
}

/// BIP-143 signature hash for segwit v0 inputs.
///
/// `script_code` is the witness script for P2WSH and the P2PKH template of
/// the key hash for P2WPKH. `value` is the amount of the spent output.
pub fn segwit_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32], BtcError> {
    check_index(tx, input_index)?;
    let base = sighash_type.base();
    let anyone_can_pay = sighash_type.anyone_can_pay();

    let hash_prevouts = if anyone_can_pay {
        [0u8; 32]
    } else {
        let mut data = Vec::with_capacity(tx.inputs.len() * 36);
        for input in &tx.inputs {
            data.extend_from_slice(input.previous_output.txid.as_bytes());
            data.extend_from_slice(&input.previous_output.vout.to_le_bytes());
        }
        sha256d(&data)
    };

    let hash_sequence = if anyone_can_pay || base != Base::All {
        [0u8; 32]
    } else {
        let mut data = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            data.extend_from_slice(&input.sequence.to_le_bytes());
        }
        sha256d(&data)
    };

    let hash_outputs = match base {
        Base::All => {
            let mut data = Vec::new();
            for output in &tx.outputs {
                output.write(&mut data);
            }
            sha256d(&data)
        }
        Base::Single if input_index < tx.outputs.len() => {
            let mut data = Vec::new();
            tx.outputs[input_index].write(&mut data);
            sha256d(&data)
        }
        _ => [0u8; 32],
    };

    let input = &tx.inputs[input_index];
    let mut buf = Vec::with_capacity(156 + script_code.len());
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&hash_prevouts);
    buf.extend_from_slice(&hash_sequence);
    buf.extend_from_slice(input.previous_output.txid.as_bytes());
    buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
    write_var_bytes(&mut buf, script_code.as_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
    buf.extend_from_slice(&input.sequence.to_le_bytes());
    buf.extend_from_slice(&hash_outputs);
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    Ok(sha256d(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxIn, TxOut, Txid};
    use bitcoin::hashes::Hash;
    use bitcoin::sighash::{EcdsaSighashType, SighashCache};

    const LEGACY_TX_HEX: &str = "010000000104dde43b0e4724f1e3b45782a9bfbcc91ea764c7cb1c245fba1fefa175c3a5d0010000006a4730440220519f7867349790ee441e83e545afbd25b954a34e0733cd4da3b5f1e5588625050220166730d053c3672973bcb2bb1a977b747837023b647e3af2ac9c15728b0681da01210236ccb7ee3a9f154127f384a05870c4fd86a8727eab7316f1449a0b9e65bfd90dffffffff025d360100000000001976a91478364a559841329304188cd791ad9dabbb2a3fdb88ac605b0300000000001976a914064e0aa817486573f4c2de09f927697e1e6f233f88ac00000000";

    const ALL_TYPES: [SighashType; 6] = [
        SighashType::All,
        SighashType::None,
        SighashType::Single,
        SighashType::AllPlusAnyoneCanPay,
        SighashType::NonePlusAnyoneCanPay,
        SighashType::SinglePlusAnyoneCanPay,
    ];

    /// Three inputs, two outputs: exercises SINGLE with and without a
    /// matching output.
    fn multi_input_tx() -> Transaction {
        let mut tx = Transaction::from_hex(LEGACY_TX_HEX).unwrap();
        for (n, sequence) in [(0x11u8, 0xFFFF_FFFEu32), (0x22, 7)] {
            tx.inputs.push(TxIn::new(
                OutPoint::new(Txid::from_byte_array([n; 32]), u32::from(n)),
                sequence,
            ));
        }
        tx.lock_time = 500_123;
        tx
    }

    fn reference(tx: &Transaction) -> bitcoin::Transaction {
        bitcoin::consensus::deserialize(&tx.encode()).unwrap()
    }

    fn reference_type(ty: SighashType) -> EcdsaSighashType {
        EcdsaSighashType::from_consensus(ty.to_u32())
    }

    #[test]
    fn sighash_type_values() {
        for ty in ALL_TYPES {
            assert_eq!(SighashType::from_u32(ty.to_u32()), Some(ty));
        }
        assert_eq!(SighashType::All.to_byte(), 0x01);
        assert!(SighashType::SinglePlusAnyoneCanPay.anyone_can_pay());
        assert!(!SighashType::Single.anyone_can_pay());
        assert_eq!(SighashType::from_u32(0x04), None);
    }

    #[test]
    fn legacy_matches_reference() {
        let tx = multi_input_tx();
        let theirs = reference(&tx);
        let cache = SighashCache::new(&theirs);
        let script_code = Script::p2pkh(&[0x5a; 20]);
        let their_script = bitcoin::Script::from_bytes(script_code.as_bytes());

        for index in 0..tx.inputs.len() {
            for ty in ALL_TYPES {
                let ours = legacy_sighash(&tx, index, &script_code, ty).unwrap();
                let expected = cache
                    .legacy_signature_hash(index, their_script, ty.to_u32())
                    .unwrap()
                    .to_byte_array();
                assert_eq!(ours, expected, "input {index} type {ty:?}");
            }
        }
    }

    #[test]
    fn segwit_v0_matches_reference() {
        let tx = multi_input_tx();
        let theirs = reference(&tx);
        let mut cache = SighashCache::new(&theirs);
        let witness_script = crate::script::build_hash_preimage_script("Btrust Builders");
        let their_script = bitcoin::Script::from_bytes(witness_script.as_bytes());

        for index in 0..tx.inputs.len() {
            for ty in ALL_TYPES {
                let value = 10_000 + index as u64;
                let ours = segwit_v0_sighash(&tx, index, &witness_script, value, ty).unwrap();
                let expected = cache
                    .p2wsh_signature_hash(
                        index,
                        their_script,
                        bitcoin::Amount::from_sat(value),
                        reference_type(ty),
                    )
                    .unwrap()
                    .to_byte_array();
                assert_eq!(ours, expected, "input {index} type {ty:?}");
            }
        }
    }

    #[test]
    fn legacy_single_without_output_is_one() {
        let tx = multi_input_tx();
        let digest = legacy_sighash(&tx, 2, &Script::new(), SighashType::Single).unwrap();
        assert_eq!(digest, SINGLE_WITHOUT_OUTPUT);
    }

    #[test]
    fn out_of_range_input_fails() {
        let tx = multi_input_tx();
        assert!(matches!(
            legacy_sighash(&tx, 3, &Script::new(), SighashType::All),
            Err(BtcError::SigningFailure { index: 3, .. })
        ));
        assert!(matches!(
            segwit_v0_sighash(&tx, 9, &Script::new(), 0, SighashType::All),
            Err(BtcError::SigningFailure { index: 9, .. })
        ));
    }

    #[test]
    fn legacy_ignores_existing_script_sigs() {
        let mut tx = multi_input_tx();
        let code = Script::p2pkh(&[1; 20]);
        let before = legacy_sighash(&tx, 1, &code, SighashType::All).unwrap();
        tx.inputs[0].script_sig = Script::from_raw(vec![0x51]);
        let after = legacy_sighash(&tx, 1, &code, SighashType::All).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn segwit_commits_to_value() {
        let tx = multi_input_tx();
        let code = Script::p2pkh(&[1; 20]);
        let a = segwit_v0_sighash(&tx, 0, &code, 1_000, SighashType::All).unwrap();
        let b = segwit_v0_sighash(&tx, 0, &code, 1_001, SighashType::All).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn outputs_commitment_changes_digest() {
        let mut tx = multi_input_tx();
        let code = Script::p2pkh(&[1; 20]);
        let before = legacy_sighash(&tx, 0, &code, SighashType::All).unwrap();
        let none_before = legacy_sighash(&tx, 0, &code, SighashType::None).unwrap();
        tx.outputs.push(TxOut {
            value: 1,
            script_pubkey: Script::new(),
        });
        assert_ne!(before, legacy_sighash(&tx, 0, &code, SighashType::All).unwrap());
        assert_eq!(
            none_before,
            legacy_sighash(&tx, 0, &code, SighashType::None).unwrap()
        );
    }
}
