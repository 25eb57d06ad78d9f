use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::presets::DEFAULT_PRESET;
use crate::deployer::ChainConfig;
use crate::{dlog_debug, Error, Result};

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
const WEI_PER_GWEI: u128 = 1_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Address substituted for `$manager` in plans.
    pub manager: Option<String>,
    /// Directory of compiled contract artifacts (`<name>.json`).
    pub artifacts_dir: Option<String>,
    pub runs_dir: Option<String>,
    /// Preset name or plan file used when `--plan` is omitted.
    pub default_plan: Option<String>,
    #[serde(default)]
    pub chain: ChainSettings,
}

/// The `[chain]` table: parameters of the local chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChainSettings {
    pub deployer: Option<String>,
    /// Starting balance in whole ether.
    pub balance: Option<u64>,
    pub gas_per_byte: Option<u64>,
    pub gas_price_gwei: Option<u64>,
    pub block_time_ms: Option<u64>,
}

impl Config {
    pub fn dtrust_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".dtrust"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::dtrust_dir()?.join("deploy.toml"))
    }

    /// Snapshot of the local chain, so later runs continue its nonce.
    pub fn chain_state_path() -> Result<PathBuf> {
        Ok(Self::dtrust_dir()?.join("chain.json"))
    }

    pub fn runs_dir(&self) -> Result<PathBuf> {
        match &self.runs_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::dtrust_dir()?.join("runs")),
        }
    }

    pub fn artifacts_dir(&self) -> Option<PathBuf> {
        self.artifacts_dir.as_deref().map(expand_tilde)
    }

    pub fn effective_plan(&self) -> &str {
        self.default_plan.as_deref().unwrap_or(DEFAULT_PRESET)
    }

    /// The configured manager, or the deployer account when unset.
    pub fn manager_address(&self) -> Result<Address> {
        match &self.manager {
            Some(manager) => parse_address(manager),
            None => Ok(self.chain_config()?.deployer),
        }
    }

    pub fn chain_config(&self) -> Result<ChainConfig> {
        let mut chain = ChainConfig::default();
        let settings = &self.chain;
        if let Some(deployer) = &settings.deployer {
            chain.deployer = parse_address(deployer)?;
        }
        if let Some(balance) = settings.balance {
            chain.balance = ether_to_wei(balance)?;
        }
        if let Some(gas_per_byte) = settings.gas_per_byte {
            chain.gas_per_byte = u128::from(gas_per_byte);
        }
        if let Some(gwei) = settings.gas_price_gwei {
            chain.gas_price = scale(gwei, WEI_PER_GWEI, "gas_price_gwei")?;
        }
        if let Some(ms) = settings.block_time_ms {
            chain.block_time = Duration::from_millis(ms);
        }
        Ok(chain)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        dlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            dlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        dlog_debug!(
            "Config loaded: manager={:?}, artifacts_dir={:?}, default_plan={:?}",
            config.manager,
            config.artifacts_dir,
            config.default_plan
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        dlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

pub fn parse_address(value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| Error::InvalidAddress(value.to_string()))
}

/// Whole ether to wei.
pub fn ether_to_wei(ether: u64) -> Result<u128> {
    scale(ether, WEI_PER_ETHER, "balance")
}

fn scale(value: u64, unit: u128, key: &str) -> Result<u128> {
    u128::from(value)
        .checked_mul(unit)
        .ok_or_else(|| Error::Validation(format!("{} = {} is out of range", key, value)))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
