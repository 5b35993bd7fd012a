//! # crypto-utils
//!
//! Hash primitives and zeroizing secret containers shared by the Bitcoin
//! toolkit crates.

pub mod error;
pub mod hash;
pub mod zeroizing;

pub use error::CryptoError;
pub use hash::{checksum, hash160, hmac_sha512, sha256, sha256d};
pub use zeroizing::Seed;
