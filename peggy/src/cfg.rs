use std::{fs, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    capabilities::{Ledger, StakingTable},
    types::{AccountId, Coin, validate_denom},
};

/// Configuration for the `peggy-replay` tool: the module parameters and the state to start from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub peggy: PeggyConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

impl Config {
    /// Reads and merges one or more TOML files. A top-level key may only appear in one of them.
    pub fn from_files(paths: &[PathBuf]) -> Result<Config> {
        let mut merged = toml::Table::new();
        for path in paths {
            let contents = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
            let table: toml::Table =
                toml::from_str(&contents).with_context(|| format!("parsing {path:?}"))?;
            if let Some(key) = table.keys().find(|key| merged.contains_key(*key)) {
                return Err(anyhow!(
                    "configuration conflict: {path:?} contained a key {key:?} that was already included in an earlier file"
                ));
            }
            merged.extend(table);
        }
        let config: Config = Config::deserialize(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.peggy.validate()?;
        self.genesis.validate()
    }
}

/// Parameters of the bridge module. Every node on the ledger must use the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeggyConfig {
    /// The most transfers a single batch may carry.
    #[serde(default = "max_batch_size_default")]
    pub max_batch_size: usize,
    /// Whether bonded validators without a bound Ethereum address appear in valset snapshots.
    #[serde(default)]
    pub unbound_validators: UnboundValidatorPolicy,
    /// Check valset and batch confirmation signatures when they are submitted. When unset, relayers are expected to
    /// check them before submitting to Ethereum.
    #[serde(default)]
    pub verify_confirmation_signatures: bool,
    /// Refuse to build a batch while an unobserved batch for the same denomination exists.
    #[serde(default)]
    pub single_open_batch_per_denom: bool,
}

impl Default for PeggyConfig {
    fn default() -> Self {
        PeggyConfig {
            max_batch_size: max_batch_size_default(),
            unbound_validators: UnboundValidatorPolicy::default(),
            verify_confirmation_signatures: false,
            single_open_batch_per_denom: false,
        }
    }
}

impl PeggyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(anyhow!("max_batch_size must be greater than zero"));
        }
        Ok(())
    }
}

pub fn max_batch_size_default() -> usize {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnboundValidatorPolicy {
    /// Unbound validators are listed with no address. Their power still counts towards the snapshot total.
    #[default]
    IncludeEmpty,
    /// Unbound validators are left out of the snapshot entirely.
    Exclude,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisConfig {
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisValidator {
    pub account: AccountId,
    pub power: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisBalance {
    pub account: AccountId,
    pub denom: String,
    // TOML integers are signed 64-bit.
    pub amount: u64,
}

impl GenesisConfig {
    pub fn validate(&self) -> Result<()> {
        for (i, validator) in self.validators.iter().enumerate() {
            if validator.account.is_empty() {
                return Err(anyhow!("genesis validator {i} has an empty account"));
            }
        }
        for balance in &self.balances {
            validate_denom(&balance.denom)
                .with_context(|| format!("genesis balance of {}", balance.account))?;
        }
        Ok(())
    }

    pub fn staking(&self) -> StakingTable {
        StakingTable::new(
            self.validators
                .iter()
                .map(|v| (v.account.clone(), v.power)),
        )
    }

    pub fn ledger(&self) -> Result<Ledger> {
        let mut ledger = Ledger::new();
        for balance in &self.balances {
            ledger.credit(
                &balance.account,
                &Coin::new(balance.denom.clone(), balance.amount.into()),
            )?;
        }
        Ok(ledger)
    }
}
