//! Configuration for the ledger

use crate::consensus::{ConsensusSeal, MiningConfig};
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Consensus mechanism
    pub consensus: ConsensusSeal,

    /// Mining budget
    pub mining: MiningConfig,

    /// Seed for validator selection (entropy when unset)
    pub rng_seed: Option<u64>,

    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "ledger-core".to_string(),
            consensus: ConsensusSeal::proof_of_work(2),
            mining: MiningConfig::default(),
            rng_seed: None,
            log_json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    ///
    /// `LEDGER_DIFFICULTY` selects proof of work at that difficulty.
    pub fn from_env() -> crate::Result<Self> {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Apply `LEDGER_*` overrides read through `lookup`
    pub fn overlay_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        if let Some(difficulty) = lookup("LEDGER_DIFFICULTY") {
            self.consensus = ConsensusSeal::proof_of_work(parse_var("LEDGER_DIFFICULTY", &difficulty)?);
        }

        if let Some(max_attempts) = lookup("LEDGER_MAX_ATTEMPTS") {
            self.mining.max_attempts = Some(parse_var("LEDGER_MAX_ATTEMPTS", &max_attempts)?);
        }

        if let Some(seed) = lookup("LEDGER_RNG_SEED") {
            self.rng_seed = Some(parse_var("LEDGER_RNG_SEED", &seed)?);
        }

        if let Some(log_json) = lookup("LEDGER_LOG_JSON") {
            self.log_json = parse_var("LEDGER_LOG_JSON", &log_json)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject consensus parameters that can never seal a block
    pub fn validate(&self) -> crate::Result<()> {
        self.consensus.validate()
    }
}

fn parse_var<T>(key: &str, value: &str) -> crate::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid {}={:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "ledger-core");
        assert_eq!(config.consensus, ConsensusSeal::proof_of_work(2));
        assert_eq!(config.mining.max_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_proof_of_stake() {
        let config = Config::from_toml(
            r#"
            rng_seed = 42

            [consensus]
            kind = "proof_of_stake"
            validators = [
                { name = "Validator1", stake = 100 },
                { name = "Validator2", stake = 200 },
                { name = "Validator3", stake = 150 },
            ]

            [mining]
            max_attempts = 1000000
            "#,
        )
        .unwrap();

        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.service_name, "ledger-core");
        assert_eq!(config.mining.max_attempts, Some(1_000_000));
        assert_eq!(config.mining.cancel_check_interval, 1024);
        match config.consensus {
            ConsensusSeal::ProofOfStake { validators } => {
                assert_eq!(validators.len(), 3);
                assert_eq!(validators[1].stake, 200);
            }
            other => panic!("unexpected consensus {:?}", other),
        }
    }

    #[test]
    fn test_from_toml_rejects_empty_validators() {
        let err = Config::from_toml(
            r#"
            [consensus]
            kind = "proof_of_stake"
            validators = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = Config::from_toml("consensus = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[consensus]\nkind = \"proof_of_work\"\ndifficulty = 3").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.consensus, ConsensusSeal::proof_of_work(3));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/ledger.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_overlay_env() {
        let vars: HashMap<&str, &str> = [
            ("LEDGER_DIFFICULTY", "4"),
            ("LEDGER_MAX_ATTEMPTS", "500"),
            ("LEDGER_RNG_SEED", "9"),
            ("LEDGER_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .overlay_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.consensus, ConsensusSeal::proof_of_work(4));
        assert_eq!(config.mining.max_attempts, Some(500));
        assert_eq!(config.rng_seed, Some(9));
        assert!(config.log_json);
    }

    #[test]
    fn test_overlay_env_invalid() {
        let err = Config::default()
            .overlay_env(|key| (key == "LEDGER_DIFFICULTY").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::default()
            .overlay_env(|key| (key == "LEDGER_DIFFICULTY").then(|| "65".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
