use std::path::{Path, PathBuf};

use chain_dash::plan::{DUST_THRESHOLD, FEE_RESERVE};
use chain_dash::{Ladder, PlanParams, STAMP};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WalletError;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "DASHWALLET_DATA";

pub const CONFIG_FILE: &str = "config.json";

/// Resolve the data directory: explicit path, then `$DASHWALLET_DATA`,
/// then the platform data dir, then `./.dashwallet`.
pub fn data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        path.to_path_buf()
    } else if let Ok(s) = std::env::var(DATA_DIR_ENV) {
        PathBuf::from(s)
    } else if let Some(dir) = dirs::data_dir() {
        dir.join("dashwallet")
    } else {
        PathBuf::from(".").join(".dashwallet")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WalletConfig {
    pub stamp_size: u64,
    /// Balances at or below this are not denominated.
    pub min_value: u64,
    pub fee_reserve: u64,
    /// Stamps every denominated, payment or change output must carry.
    pub min_stamps: u64,
    pub change_account: String,
    /// Hand out already used addresses when an account runs out of fresh ones.
    pub allow_reuse: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            stamp_size: STAMP,
            min_value: DUST_THRESHOLD,
            fee_reserve: FEE_RESERVE,
            min_stamps: 1,
            change_account: "main".to_string(),
            allow_reuse: false,
        }
    }
}

impl WalletConfig {
    /// Load `config.json` from `dir`, falling back to defaults when absent.
    pub fn load(dir: &Path) -> Result<Self, WalletError> {
        let path = dir.join(CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(WalletError::Io { path, source }),
        };
        let config: Self =
            serde_json::from_str(&text).map_err(|source| WalletError::Json { path, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.stamp_size == 0 {
            return Err(WalletError::InvalidConfig("stampSize must be positive".into()));
        }
        if self.min_stamps == 0 {
            return Err(WalletError::InvalidConfig("minStamps must be at least 1".into()));
        }
        if self.change_account.is_empty() {
            return Err(WalletError::InvalidConfig("changeAccount is empty".into()));
        }
        Ok(())
    }

    pub fn plan_params(&self) -> PlanParams {
        PlanParams {
            ladder: Ladder::dash(),
            stamp_size: self.stamp_size,
            dust_threshold: self.min_value,
            fee_reserve: self.fee_reserve,
            min_stamps: self.min_stamps,
        }
    }
}
