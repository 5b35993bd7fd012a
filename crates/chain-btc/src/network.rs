use std::fmt;
use std::str::FromStr;

use bech32::Hrp;
use serde::{Deserialize, Serialize};

use crate::error::BtcError;

/// Default Esplora endpoint for Bitcoin mainnet.
pub const MAINNET_ESPLORA: &str = "https://blockstream.info/api";

/// Default Esplora endpoint for Bitcoin testnet.
pub const TESTNET_ESPLORA: &str = "https://blockstream.info/testnet/api";

/// Default Esplora endpoint for Bitcoin signet.
pub const SIGNET_ESPLORA: &str = "https://mempool.space/signet/api";

/// Default Esplora endpoint for a local regtest explorer.
pub const REGTEST_ESPLORA: &str = "http://127.0.0.1:3002";

/// Well-known Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl BtcNetwork {
    /// Address prefixes, bech32 HRP and extended-key versions for this network.
    pub fn params(self) -> NetworkParameters {
        match self {
            BtcNetwork::Mainnet => NetworkParameters {
                name: "mainnet".into(),
                p2pkh_prefix: 0x00,
                p2sh_prefix: 0x05,
                bech32_hrp: "bc".into(),
                xprv_version: [0x04, 0x88, 0xAD, 0xE4],
                xpub_version: [0x04, 0x88, 0xB2, 0x1E],
                esplora_url: MAINNET_ESPLORA.into(),
            },
            BtcNetwork::Testnet | BtcNetwork::Signet => NetworkParameters {
                name: self.to_string(),
                p2pkh_prefix: 0x6F,
                p2sh_prefix: 0xC4,
                bech32_hrp: "tb".into(),
                xprv_version: [0x04, 0x35, 0x83, 0x94],
                xpub_version: [0x04, 0x35, 0x87, 0xCF],
                esplora_url: self.default_esplora_url().into(),
            },
            BtcNetwork::Regtest => NetworkParameters {
                name: "regtest".into(),
                p2pkh_prefix: 0x6F,
                p2sh_prefix: 0xC4,
                bech32_hrp: "bcrt".into(),
                xprv_version: [0x04, 0x35, 0x83, 0x94],
                xpub_version: [0x04, 0x35, 0x87, 0xCF],
                esplora_url: REGTEST_ESPLORA.into(),
            },
        }
    }

    /// Return the default Esplora endpoint for this network.
    pub fn default_esplora_url(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_ESPLORA,
            BtcNetwork::Testnet => TESTNET_ESPLORA,
            BtcNetwork::Signet => SIGNET_ESPLORA,
            BtcNetwork::Regtest => REGTEST_ESPLORA,
        }
    }
}

impl fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
            BtcNetwork::Signet => write!(f, "signet"),
            BtcNetwork::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for BtcNetwork {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Ok(BtcNetwork::Mainnet),
            "testnet" | "test" | "testnet3" => Ok(BtcNetwork::Testnet),
            "signet" => Ok(BtcNetwork::Signet),
            "regtest" => Ok(BtcNetwork::Regtest),
            other => Err(BtcError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Network-specific encoding constants.
///
/// Passed explicitly to every address and key-serialization function; there
/// is no global network setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub name: String,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
    pub bech32_hrp: String,
    pub xprv_version: [u8; 4],
    pub xpub_version: [u8; 4],
    pub esplora_url: String,
}

impl NetworkParameters {
    /// Parsed bech32 human-readable part.
    pub fn hrp(&self) -> Result<Hrp, BtcError> {
        Hrp::parse(&self.bech32_hrp).map_err(|e| {
            BtcError::UnsupportedNetwork(format!(
                "{}: invalid bech32 hrp {:?}: {e}",
                self.name, self.bech32_hrp
            ))
        })
    }

    /// Check that the parameters can encode and unambiguously decode addresses.
    pub fn validate(&self) -> Result<(), BtcError> {
        self.hrp()?;
        if self.p2pkh_prefix == self.p2sh_prefix {
            return Err(BtcError::UnsupportedNetwork(format!(
                "{}: p2pkh and p2sh share version byte {:#04x}",
                self.name, self.p2pkh_prefix
            )));
        }
        Ok(())
    }
}

impl From<BtcNetwork> for NetworkParameters {
    fn from(network: BtcNetwork) -> Self {
        network.params()
    }
}
