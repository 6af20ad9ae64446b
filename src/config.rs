//! Per-chain configuration
//!
//! Chain-specific constants (address prefixes, default transaction version,
//! dust threshold, fork id) live in an immutable [`ChainParams`] value that is
//! passed into planning and signing. Nothing here is process-wide.

use crate::constants::DEFAULT_DUST_THRESHOLD;
use crate::error::{Result, SigningError};
use crate::types::Amount;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainId {
    Bitcoin,
    BitcoinTestnet,
    Litecoin,
    Dogecoin,
    BitcoinCash,
    /// A script-compatible chain described entirely by its JSON parameters
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    pub chain: ChainId,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
    /// Bech32 human-readable part; `None` for chains without segwit addresses
    #[serde(default)]
    pub hrp: Option<String>,
    pub default_version: i32,
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: Amount,
    /// Replay-protection fork id; when set every digest uses the BIP143 layout
    #[serde(default)]
    pub fork_id: Option<u32>,
}

fn default_dust_threshold() -> Amount {
    DEFAULT_DUST_THRESHOLD
}

impl ChainParams {
    pub fn bitcoin() -> Self {
        Self {
            chain: ChainId::Bitcoin,
            p2pkh_prefix: 0x00,
            p2sh_prefix: 0x05,
            hrp: Some("bc".to_string()),
            default_version: 1,
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            fork_id: None,
        }
    }

    pub fn bitcoin_testnet() -> Self {
        Self {
            chain: ChainId::BitcoinTestnet,
            p2pkh_prefix: 0x6f,
            p2sh_prefix: 0xc4,
            hrp: Some("tb".to_string()),
            ..Self::bitcoin()
        }
    }

    pub fn litecoin() -> Self {
        Self {
            chain: ChainId::Litecoin,
            p2pkh_prefix: 0x30,
            p2sh_prefix: 0x32,
            hrp: Some("ltc".to_string()),
            ..Self::bitcoin()
        }
    }

    pub fn dogecoin() -> Self {
        Self {
            chain: ChainId::Dogecoin,
            p2pkh_prefix: 0x1e,
            p2sh_prefix: 0x16,
            hrp: None,
            dust_threshold: 1_000_000,
            ..Self::bitcoin()
        }
    }

    pub fn bitcoin_cash() -> Self {
        Self {
            chain: ChainId::BitcoinCash,
            hrp: None,
            default_version: 2,
            fork_id: Some(0),
            ..Self::bitcoin()
        }
    }

    /// Built-in parameters for a chain. `Custom` has no built-in set.
    pub fn for_chain(chain: ChainId) -> Result<Self> {
        match chain {
            ChainId::Bitcoin => Ok(Self::bitcoin()),
            ChainId::BitcoinTestnet => Ok(Self::bitcoin_testnet()),
            ChainId::Litecoin => Ok(Self::litecoin()),
            ChainId::Dogecoin => Ok(Self::dogecoin()),
            ChainId::BitcoinCash => Ok(Self::bitcoin_cash()),
            ChainId::Custom => Err(SigningError::InvalidConfig(
                "custom chains must be loaded from JSON".to_string(),
            )),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: ChainParams = serde_json::from_str(json)
            .map_err(|e| SigningError::InvalidConfig(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading chain params from {}", path.display()))?;
        let params = Self::from_json(&json)
            .with_context(|| format!("parsing chain params from {}", path.display()))?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.p2pkh_prefix == self.p2sh_prefix {
            return Err(SigningError::InvalidConfig(
                "p2pkh and p2sh prefixes must differ".to_string(),
            ));
        }
        if self.dust_threshold < 0 {
            return Err(SigningError::InvalidConfig(
                "dust threshold must not be negative".to_string(),
            ));
        }
        if let Some(hrp) = &self.hrp {
            if hrp.is_empty() {
                return Err(SigningError::InvalidConfig("empty hrp".to_string()));
            }
        }
        Ok(())
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::bitcoin()
    }
}
