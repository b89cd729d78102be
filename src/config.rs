//! Ledger configuration, loaded from an optional TOML file.

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::blockchain::crypto::Address;
use crate::blockchain::pow::MAX_DIFFICULTY;

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Value minted into the genesis block
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex characters required of a sealed block's hash
    pub difficulty: u32,

    /// Amount minted to the miner of each block
    pub mining_reward: f64,

    /// Attempt cap for the nonce search; unbounded when absent
    pub max_mining_attempts: Option<u64>,

    /// Worker threads for the nonce search; 1 mines on the calling thread
    pub mining_threads: usize,

    pub genesis: Option<GenesisAllocation>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            mining_reward: 100.0,
            max_mining_attempts: None,
            mining_threads: 1,
            genesis: None,
        }
    }
}

impl LedgerConfig {
    /// Rejects values the ledger cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mining_reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }

        if self.mining_threads == 0 {
            return Err(ConfigError::Invalid("mining_threads must be at least 1".to_string()));
        }

        if let Some(genesis) = &self.genesis {
            if genesis.address.is_empty() {
                return Err(ConfigError::Invalid("genesis.address must be set".to_string()));
            }
            if !genesis.amount.is_finite() || genesis.amount < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "genesis.amount must be a non-negative number, got {}",
                    genesis.amount
                )));
            }
        }

        Ok(())
    }

    /// Uses `allocation` as the genesis allocation unless one is configured
    ///
    /// Returns `true` when `allocation` was taken.
    pub fn default_genesis(&mut self, allocation: GenesisAllocation) -> bool {
        if self.genesis.is_some() {
            return false;
        }
        self.genesis = Some(allocation);
        true
    }
}

/// Loads and validates the configuration at `path`
///
/// A missing file is not an error: the defaults are used instead.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig, ConfigError> {
    let config = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => toml::from_str(&contents)?,
        Err(err) if err.kind() == ErrorKind::NotFound => LedgerConfig::default(),
        Err(err) => return Err(err.into()),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.mining_reward, 100.0);
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");
        fs::write(
            &path,
            r#"
difficulty = 2
mining_reward = 50.0
mining_threads = 4

[genesis]
address = "04abcd"
amount = 1000.0
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.difficulty, 2);
        assert_eq!(config.mining_reward, 50.0);
        assert_eq!(config.mining_threads, 4);
        assert_eq!(config.max_mining_attempts, None);
        assert_eq!(
            config.genesis,
            Some(GenesisAllocation {
                address: Address("04abcd".to_string()),
                amount: 1000.0,
            })
        );
    }

    #[test]
    fn test_default_genesis_keeps_configured_allocation() {
        let configured = GenesisAllocation {
            address: Address("04abcd".to_string()),
            amount: 500.0,
        };
        let fallback = GenesisAllocation {
            address: Address("04ef01".to_string()),
            amount: 1000.0,
        };

        let mut config = LedgerConfig {
            genesis: Some(configured.clone()),
            ..LedgerConfig::default()
        };
        assert!(!config.default_genesis(fallback.clone()));
        assert_eq!(config.genesis, Some(configured));

        let mut config = LedgerConfig::default();
        assert!(config.default_genesis(fallback.clone()));
        assert_eq!(config.genesis, Some(fallback));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");

        fs::write(&path, "difficulty = 65\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "mining_threads = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "mining_reward = -1.0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "difficulty = \"four\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
