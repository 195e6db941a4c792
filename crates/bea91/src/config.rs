//! Party configuration loaded from TOML files.
//!
//! ```toml
//! role = "second"
//! task_id = 7
//! mt_provider = "ot"
//! max_batch_size = 65536
//! seed = 42
//! ```
//!
//! All keys are optional.
use crate::mul_triple::boolean::DEFAULT_MAX_BATCH_SIZE;
use crate::party::Role;
use bea91_channel::PartyId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartyConfig {
    pub role: Role,
    pub task_id: u64,
    pub mt_provider: MtProviderKind,
    pub max_batch_size: usize,
    /// Seed of the party's rng. Sampled from the OS if absent.
    pub seed: Option<u64>,
}

/// Source of the multiplication triples.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MtProviderKind {
    #[default]
    Ot,
    /// Triples derived from a fixed seed. **Insecure**, only for testing.
    Insecure,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file")]
    Io(#[from] io::Error),
    #[error("Unable to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("Configured role {configured} does not match the channel's party {channel}")]
    RoleMismatch { configured: Role, channel: PartyId },
}

impl PartyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }
}

impl std::str::FromStr for PartyConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            role: Role::First,
            task_id: 0,
            mt_provider: MtProviderKind::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MtProviderKind, PartyConfig};
    use crate::party::Role;

    #[test]
    fn parse_config() {
        let config: PartyConfig = r#"
            role = "second"
            task_id = 7
            mt_provider = "insecure"
            seed = 42
        "#
        .parse()
        .unwrap();
        assert_eq!(
            PartyConfig {
                role: Role::Second,
                task_id: 7,
                mt_provider: MtProviderKind::Insecure,
                seed: Some(42),
                ..Default::default()
            },
            config
        );
    }

    #[test]
    fn empty_config_is_default() {
        let config: PartyConfig = "".parse().unwrap();
        assert_eq!(PartyConfig::default(), config);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<PartyConfig, _> = "rol = \"first\"".parse();
        assert!(matches!(res, Err(ConfigError::Parse(_))));
    }
}
