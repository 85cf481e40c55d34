use crate::config::types::{Config, DiscoveryConfig, RemoteConfig, RetrievalConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_discovery_config(&config.discovery)?;
    validate_retrieval_config(&config.retrieval)?;
    validate_remote_config(&config.remote)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_workers(section: &str, workers: usize) -> Result<(), ConfigError> {
    if workers < 1 || workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "{}.workers must be between 1 and {}, got {}",
            section, MAX_WORKERS, workers
        )));
    }
    Ok(())
}

/// Validates discovery configuration
fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    validate_workers("discovery", config.workers)?;

    if config.buffer_limit < 1 {
        return Err(ConfigError::Validation(
            "discovery.buffer-limit must be >= 1".to_string(),
        ));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "discovery.max-consecutive-failures must be >= 1".to_string(),
        ));
    }

    if config.exclude_titles.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "discovery.exclude-titles cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates retrieval configuration
fn validate_retrieval_config(config: &RetrievalConfig) -> Result<(), ConfigError> {
    validate_workers("retrieval", config.workers)?;

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "retrieval.max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.page_extension.is_empty()
        || !config
            .page_extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ConfigError::Validation(format!(
            "retrieval.page-extension must be alphanumeric, got '{}'",
            config.page_extension
        )));
    }

    Ok(())
}

/// Validates remote host configuration
fn validate_remote_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    validate_url_template("display-url", &config.display_url, &["{id}"])?;
    validate_url_template("page-url", &config.page_url, &["{book}", "{page}"])?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "remote.request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "remote.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a template names all of its placeholders and yields a valid
/// URL once they are filled in
fn validate_url_template(
    key: &str,
    template: &str,
    placeholders: &[&str],
) -> Result<(), ConfigError> {
    for placeholder in placeholders {
        if !template.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "remote.{} must contain the {} placeholder",
                key, placeholder
            )));
        }
    }

    let sample = placeholders
        .iter()
        .fold(template.to_string(), |acc, p| acc.replace(p, "1"));
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote.{}: {}", key, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "remote.{} must use http or https, got '{}'",
            key,
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("results-path", &config.results_path),
        ("discovery-checkpoint-path", &config.discovery_checkpoint_path),
        ("retrieval-checkpoint-path", &config.retrieval_checkpoint_path),
        ("database-path", &config.database_path),
        ("downloads-dir", &config.downloads_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!(
                "storage.{} cannot be empty",
                key
            )));
        }
    }

    if config.discovery_checkpoint_path == config.retrieval_checkpoint_path {
        return Err(ConfigError::Validation(
            "discovery and retrieval checkpoints must use different files".to_string(),
        ));
    }

    Ok(())
}
