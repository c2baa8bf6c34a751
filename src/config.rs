//! Engine configuration.
//!
//! Initial governance policy and the engine's own ledger identity, loadable
//! from a JSON file or built in code with `with_*` setters.

use crate::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default interval floor: one day.
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 86_400;

/// Default amount ceiling in base units.
pub const DEFAULT_MAX_AMOUNT: Amount = Amount::from_base_units(100_000_000_000);

/// Default minimum allowance a subscriber must have granted before any
/// subscription to them can be created: one minimum-grade charge.
pub const DEFAULT_ALLOWANCE_FLOOR: Amount = Amount::from_base_units(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity holding exclusive governance rights.
    pub administrator: AccountId,
    /// The engine's own identity on the asset ledger; subscribers grant
    /// their spending allowance to this account.
    pub engine_account: AccountId,
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_max_amount")]
    pub max_amount: Amount,
    #[serde(default = "default_allowance_floor")]
    pub allowance_floor: Amount,
}

fn default_min_interval() -> u64 {
    DEFAULT_MIN_INTERVAL_SECS
}

fn default_max_amount() -> Amount {
    DEFAULT_MAX_AMOUNT
}

fn default_allowance_floor() -> Amount {
    DEFAULT_ALLOWANCE_FLOOR
}

impl EngineConfig {
    pub fn new(administrator: AccountId, engine_account: AccountId) -> Self {
        Self {
            administrator,
            engine_account,
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            max_amount: DEFAULT_MAX_AMOUNT,
            allowance_floor: DEFAULT_ALLOWANCE_FLOOR,
        }
    }

    pub fn with_limits(mut self, max_amount: Amount, min_interval_secs: u64) -> Self {
        self.max_amount = max_amount;
        self.min_interval_secs = min_interval_secs;
        self
    }

    pub fn with_allowance_floor(mut self, floor: Amount) -> Self {
        self.allowance_floor = floor;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&json)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_omitted() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"administrator": "admin", "engine_account": "engine"}"#,
        )
        .unwrap();
        assert_eq!(config.administrator, AccountId::new("admin"));
        assert_eq!(config.min_interval_secs, DEFAULT_MIN_INTERVAL_SECS);
        assert_eq!(config.max_amount, DEFAULT_MAX_AMOUNT);
        assert_eq!(config.allowance_floor, DEFAULT_ALLOWANCE_FLOOR);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = EngineConfig::new(AccountId::new("admin"), AccountId::new("engine"))
            .with_limits(Amount::from_base_units(5_000), 3_600)
            .with_allowance_floor(Amount::from_base_units(200));
        assert_eq!(config.max_amount, Amount::from_base_units(5_000));
        assert_eq!(config.min_interval_secs, 3_600);
        assert_eq!(config.allowance_floor, Amount::from_base_units(200));
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"administrator": "admin", "engine_account": "engine", "min_interval_secs": 60}"#,
        )
        .unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.min_interval_secs, 60);
        assert_eq!(config.engine_account, AccountId::new("engine"));
    }
}
