use crate::config::types::{Config, CrawlerConfig, MonitorConfig, PolicyConfig, RateLimitConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_monitor_config(&config.monitor)?;
    validate_policy_config(&config.policy)?;
    validate_seeds(config)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_workers < 1 || config.page_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "page-workers must be between 1 and 64, got {}",
            config.page_workers
        )));
    }

    if config.image_workers < 1 || config.image_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "image-workers must be between 1 and 64, got {}",
            config.image_workers
        )));
    }

    if config.claim_wait_ms == 0 {
        return Err(ConfigError::Validation(
            "claim-wait-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates rate limit configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.initial_delay_ms < config.min_delay_ms
        || config.initial_delay_ms > config.max_delay_ms
    {
        return Err(ConfigError::Validation(format!(
            "initial-delay-ms ({}) must lie within [{}, {}]",
            config.initial_delay_ms, config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max-retries must be >= 1".to_string(),
        ));
    }

    if config.retry_base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "retry-base-delay-ms must be > 0".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates monitor configuration
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "poll-interval-secs must be > 0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.min_image_fraction) {
        return Err(ConfigError::Validation(format!(
            "min-image-fraction must be within [0.0, 1.0], got {}",
            config.min_image_fraction
        )));
    }

    if config.hard_stall_threshold_secs < config.stall_threshold_secs {
        return Err(ConfigError::Validation(format!(
            "hard-stall-threshold-secs ({}) must be >= stall-threshold-secs ({})",
            config.hard_stall_threshold_secs, config.stall_threshold_secs
        )));
    }

    Ok(())
}

/// Validates the admission policy
fn validate_policy_config(config: &PolicyConfig) -> Result<(), ConfigError> {
    if config.allowed_domains.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-domains cannot be empty".to_string(),
        ));
    }

    for ext in &config.excluded_extensions {
        if !ext.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "excluded extension must start with '.', got '{}'",
                ext
            )));
        }
    }

    for prefix in &config.allowed_path_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "allowed path prefix must start with '/', got '{}'",
                prefix
            )));
        }
    }

    Ok(())
}

/// Validates that seed URLs parse and live on an allowed domain
fn validate_seeds(config: &Config) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed).map_err(|_| ConfigError::InvalidUrl(seed.clone()))?;

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(seed.clone()))?
            .to_lowercase();

        if !config.policy.allowed_domains.iter().any(|d| d == &host) {
            return Err(ConfigError::Validation(format!(
                "seed URL {} is not on an allowed domain",
                seed
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OutputConfig;

    fn base_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                max_depth: 4,
                page_workers: 6,
                image_workers: 4,
                claim_wait_ms: 1000,
            },
            rate_limit: RateLimitConfig {
                initial_delay_ms: 250,
                min_delay_ms: 250,
                max_delay_ms: 2000,
                max_retries: 3,
                retry_base_delay_ms: 1000,
                retry_delay_ceiling_ms: 15_000,
                request_timeout_secs: 30,
            },
            monitor: MonitorConfig::default(),
            policy: PolicyConfig {
                allowed_domains: vec!["docs.example.com".to_string()],
                excluded_extensions: vec![".pdf".to_string()],
                excluded_patterns: vec!["/legal".to_string()],
                allowed_path_prefixes: vec![],
            },
            output: OutputConfig {
                output_dir: "./mirror".to_string(),
                metadata_file: "page_metadata.json".to_string(),
            },
            seeds: vec!["https://docs.example.com/".to_string()],
            user_agents: vec!["TestAgent/1.0".to_string()],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_zero_page_workers_rejected() {
        let mut config = base_config();
        config.crawler.page_workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_delay_bounds_rejected() {
        let mut config = base_config();
        config.rate_limit.min_delay_ms = 5000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_initial_delay_outside_bounds_rejected() {
        let mut config = base_config();
        config.rate_limit.initial_delay_ms = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_image_fraction_rejected() {
        let mut config = base_config();
        config.monitor.min_image_fraction = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_domains_rejected() {
        let mut config = base_config();
        config.policy.allowed_domains.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_extension_without_dot_rejected() {
        let mut config = base_config();
        config.policy.excluded_extensions.push("pdf".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_seed_off_domain_rejected() {
        let mut config = base_config();
        config.seeds = vec!["https://elsewhere.com/".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unparseable_seed_rejected() {
        let mut config = base_config();
        config.seeds = vec!["not a url".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_no_seeds_rejected() {
        let mut config = base_config();
        config.seeds.clear();
        assert!(validate(&config).is_err());
    }
}
