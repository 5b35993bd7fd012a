//! Bitcoin Script: compilation with minimal pushes, disassembly to ASM,
//! ASM parsing and standard template recognition.

use std::fmt;

use crypto_utils::{hash160, sha256};

use crate::error::BtcError;
use crate::opcodes::{self, *};

/// A serialized script.
///
/// `Script::from_bytes` validates push boundaries. `Script::from_raw` keeps
/// bytes as found on the wire (scriptSigs may legitimately be garbage), and
/// errors surface later when the script is walked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

/// One parsed element of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// A non-push opcode, including `OP_0` and the small-integer opcodes.
    Op(u8),
    /// Data pushed by a direct push or one of the `OP_PUSHDATA` opcodes.
    Push(&'a [u8]),
}

/// Input element for [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Op(u8),
    Data(Vec<u8>),
}

/// Standard script templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptType {
    /// `<pubkey> OP_CHECKSIG`
    P2pk(Vec<u8>),
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh([u8; 20]),
    /// `OP_HASH160 <20> OP_EQUAL`
    P2sh([u8; 20]),
    /// `OP_0 <20>`
    P2wpkh([u8; 20]),
    /// `OP_0 <32>`
    P2wsh([u8; 32]),
    /// `OP_SHA256 <32> OP_EQUAL`, satisfied by the preimage alone.
    HashPreimage([u8; 32]),
    /// `OP_RETURN ...`
    NullData,
    NonStandard,
}

/// Assemble tokens into a script, choosing the minimal push for every data
/// element.
pub fn compile(tokens: &[Token]) -> Script {
    let mut bytes = Vec::new();
    for token in tokens {
        match token {
            Token::Op(op) => bytes.push(*op),
            Token::Data(data) => push_data(&mut bytes, data),
        }
    }
    Script(bytes)
}

fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len == 0 {
        buf.push(OP_0);
        return;
    }
    if len == 1 {
        if let Some(op) = opcodes::minimal_opcode_for_byte(data[0]) {
            buf.push(op);
            return;
        }
    }
    if len <= MAX_DIRECT_PUSH {
        buf.push(len as u8);
    } else if len <= 0xFF {
        buf.push(OP_PUSHDATA1);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(OP_PUSHDATA2);
        buf.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        buf.push(OP_PUSHDATA4);
        buf.extend_from_slice(&(len as u32).to_le_bytes());
    }
    buf.extend_from_slice(data);
}

/// `OP_SHA256 <sha256(secret)> OP_EQUAL`.
///
/// Anyone who learns `secret` can spend an output locked to this script, so
/// it is only suitable for demonstrations.
pub fn build_hash_preimage_script(secret: &str) -> Script {
    Script::hash_preimage(&sha256(secret.as_bytes()))
}

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Validate `bytes` as a well-formed opcode/push sequence.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BtcError> {
        let script = Self(bytes);
        for instruction in script.instructions() {
            instruction?;
        }
        Ok(script)
    }

    /// Wrap bytes without validation.
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode and validate a hex script.
    pub fn from_hex(hex_script: &str) -> Result<Self, BtcError> {
        let bytes = hex::decode(hex_script.trim())
            .map_err(|e| BtcError::InvalidHex(format!("script: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Parse space-separated assembly: `OP_` mnemonics, `OP_UNKNOWN_<n>` and
    /// hex data. Data is re-encoded with minimal pushes.
    pub fn from_asm(asm: &str) -> Result<Self, BtcError> {
        let tokens = asm
            .split_whitespace()
            .map(parse_asm_token)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(compile(&tokens))
    }

    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Self {
        compile(&[
            Token::Op(OP_DUP),
            Token::Op(OP_HASH160),
            Token::Data(pubkey_hash.to_vec()),
            Token::Op(OP_EQUALVERIFY),
            Token::Op(OP_CHECKSIG),
        ])
    }

    pub fn p2sh(script_hash: &[u8; 20]) -> Self {
        compile(&[
            Token::Op(OP_HASH160),
            Token::Data(script_hash.to_vec()),
            Token::Op(OP_EQUAL),
        ])
    }

    pub fn p2wpkh(pubkey_hash: &[u8; 20]) -> Self {
        compile(&[Token::Op(OP_0), Token::Data(pubkey_hash.to_vec())])
    }

    pub fn p2wsh(script_hash: &[u8; 32]) -> Self {
        compile(&[Token::Op(OP_0), Token::Data(script_hash.to_vec())])
    }

    pub fn p2pk(pubkey: &[u8; 33]) -> Self {
        compile(&[Token::Data(pubkey.to_vec()), Token::Op(OP_CHECKSIG)])
    }

    pub fn hash_preimage(hash: &[u8; 32]) -> Self {
        compile(&[
            Token::Op(OP_SHA256),
            Token::Data(hash.to_vec()),
            Token::Op(OP_EQUAL),
        ])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// HASH160 of the script, as committed to by P2SH.
    pub fn script_hash(&self) -> [u8; 20] {
        hash160(&self.0)
    }

    /// SHA-256 of the script, as committed to by P2WSH.
    pub fn witness_script_hash(&self) -> [u8; 32] {
        sha256(&self.0)
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            data: &self.0,
            pos: 0,
            failed: false,
        }
    }

    /// Render as assembly. Single-byte pushes that have a small-integer
    /// opcode render as that opcode; other pushes render as lowercase hex.
    pub fn to_asm(&self) -> Result<String, BtcError> {
        let mut parts = Vec::new();
        for instruction in self.instructions() {
            parts.push(match instruction? {
                Instruction::Op(op) => op_mnemonic(op),
                Instruction::Push(data) => push_mnemonic(data),
            });
        }
        Ok(parts.join(" "))
    }

    /// `true` when every instruction is a push or a small-integer opcode.
    pub fn is_push_only(&self) -> bool {
        self.instructions().all(|i| match i {
            Ok(Instruction::Push(_)) => true,
            Ok(Instruction::Op(op)) => op <= opcodes::OP_16,
            Err(_) => false,
        })
    }

    pub fn classify(&self) -> ScriptType {
        let b = self.0.as_slice();
        match b {
            [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                ScriptType::P2pkh(to_array(hash))
            }
            [OP_HASH160, 0x14, hash @ .., OP_EQUAL] if hash.len() == 20 => {
                ScriptType::P2sh(to_array(hash))
            }
            [OP_0, 0x14, hash @ ..] if hash.len() == 20 => ScriptType::P2wpkh(to_array(hash)),
            [OP_0, 0x20, hash @ ..] if hash.len() == 32 => ScriptType::P2wsh(to_array(hash)),
            [OP_SHA256, 0x20, hash @ .., OP_EQUAL] if hash.len() == 32 => {
                ScriptType::HashPreimage(to_array(hash))
            }
            [0x21, key @ .., OP_CHECKSIG] if key.len() == 33 && matches!(key[0], 0x02 | 0x03) => {
                ScriptType::P2pk(key.to_vec())
            }
            [0x41, key @ .., OP_CHECKSIG] if key.len() == 65 && key[0] == 0x04 => {
                ScriptType::P2pk(key.to_vec())
            }
            [OP_RETURN, ..] => ScriptType::NullData,
            _ => ScriptType::NonStandard,
        }
    }
}

fn to_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

fn op_mnemonic(op: u8) -> String {
    match opcodes::name(op) {
        Some(name) => name.to_string(),
        None => format!("{}{op}", opcodes::UNKNOWN_PREFIX),
    }
}

fn push_mnemonic(data: &[u8]) -> String {
    match data {
        [] => "OP_0".to_string(),
        [byte] => match opcodes::minimal_opcode_for_byte(*byte) {
            Some(op) => op_mnemonic(op),
            None => hex::encode(data),
        },
        _ => hex::encode(data),
    }
}

fn parse_asm_token(token: &str) -> Result<Token, BtcError> {
    let has_op_prefix = token.len() > 3
        && token
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("OP_"));
    if has_op_prefix {
        let op = opcodes::from_name(token)
            .ok_or_else(|| BtcError::InvalidScript(format!("unknown opcode {token}")))?;
        if matches!(op, OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4) {
            return Err(BtcError::InvalidScript(format!(
                "{token} cannot appear without data in assembly"
            )));
        }
        return Ok(Token::Op(op));
    }
    let data = hex::decode(token)
        .map_err(|e| BtcError::InvalidScript(format!("bad data token {token:?}: {e}")))?;
    Ok(Token::Data(data))
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Iterator over the instructions of a script. Stops after the first error.
pub struct Instructions<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    fn fail(&mut self, offset: usize, declared: usize) -> Option<Result<Instruction<'a>, BtcError>> {
        self.failed = true;
        Some(Err(BtcError::MalformedScript {
            offset,
            declared,
            available: self.data.len() - self.pos,
        }))
    }

    fn read_len(&mut self, width: usize) -> Option<usize> {
        let bytes = self.data.get(self.pos..self.pos + width)?;
        self.pos += width;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Some(u32::from_le_bytes(buf) as usize)
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, BtcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let offset = self.pos;
        let op = self.data[offset];
        self.pos += 1;

        let len = match op {
            op if opcodes::is_direct_push(op) => op as usize,
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                let width = match op {
                    OP_PUSHDATA1 => 1,
                    OP_PUSHDATA2 => 2,
                    _ => 4,
                };
                match self.read_len(width) {
                    Some(len) => len,
                    None => return self.fail(offset, width),
                }
            }
            _ => return Some(Ok(Instruction::Op(op))),
        };

        if len > self.data.len() - self.pos {
            return self.fail(offset, len);
        }
        let data = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(Ok(Instruction::Push(data)))
    }
}
