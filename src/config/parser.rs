use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a harvest TOML file, fills missing keys with defaults and validates
/// the result.
///
/// Fails with `ConfigError::Io` when the file cannot be read,
/// `ConfigError::Parse` on malformed TOML or unknown enum values, and
/// `ConfigError::Validation` when a value is out of range.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use flipharvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max id: {}", config.discovery.max_id);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 digest of the raw configuration text
///
/// Logged at startup so that separate runs over the same checkpoints can be
/// matched to the configuration they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(digest(&std::fs::read_to_string(path)?))
}

/// [`load_config`] plus the digest of the same file contents
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Ok((parse_config(&text)?, digest(&text)))
}

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
