use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig, PlannerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_planner_config(&config.planner, config)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    validate_stores(config)?;
    validate_categories(config)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_stores < 1 || config.max_concurrent_stores > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_stores must be between 1 and 64, got {}",
            config.max_concurrent_stores
        )));
    }

    if config.min_request_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_request_delay_ms must be >= 100ms, got {}ms",
            config.min_request_delay_ms
        )));
    }

    if config.retry_backoff_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_ms must be >= 100ms, got {}ms",
            config.retry_backoff_ms
        )));
    }

    if config.fetch_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_ms must be >= 1000ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates planner configuration
fn validate_planner_config(config: &PlannerConfig, full: &Config) -> Result<(), ConfigError> {
    if !(config.target_coverage > 0.0 && config.target_coverage <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "target_coverage must be in (0, 1], got {}",
            config.target_coverage
        )));
    }

    if config.sample_pages < 1 {
        return Err(ConfigError::Validation(
            "sample_pages must be >= 1".to_string(),
        ));
    }

    if let Some(sample_store) = &config.sample_store {
        if !full.stores.iter().any(|s| &s.id == sample_store) {
            return Err(ConfigError::Validation(format!(
                "sample_store '{}' is not in the store roster",
                sample_store
            )));
        }
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the store roster
fn validate_stores(config: &Config) -> Result<(), ConfigError> {
    for store in &config.stores {
        if store.id.as_str().is_empty() {
            return Err(ConfigError::Validation(
                "store id cannot be empty".to_string(),
            ));
        }
        if store.region.is_empty() {
            return Err(ConfigError::Validation(format!(
                "store '{}' has an empty region",
                store.id
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for store in &config.stores {
        if !seen.insert(&store.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate store id '{}' in roster",
                store.id
            )));
        }
    }

    Ok(())
}

/// Validates category universe entries
fn validate_categories(config: &Config) -> Result<(), ConfigError> {
    for entry in &config.categories {
        Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid category URL '{}': {}", entry.url, e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Store, StoreId};
    use crate::config::types::{CategoryEntry, SkipConfig};

    fn create_valid_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                max_concurrent_stores: 4,
                min_request_delay_ms: 1500,
                max_retries: 3,
                retry_backoff_ms: 2000,
                fetch_timeout_ms: 45_000,
                progress_interval: 25,
            },
            planner: PlannerConfig {
                target_coverage: 0.99,
                sample_pages: 3,
                sample_store: None,
            },
            fetch: FetchConfig {
                base_url: "https://shop.example.com/api".to_string(),
                user_agent: "Mozilla/5.0".to_string(),
            },
            output: OutputConfig {
                database_path: "./shelfmap.db".to_string(),
                report_path: "./report.md".to_string(),
            },
            stores: vec![Store {
                id: StoreId::new("4588"),
                region: "TX".to_string(),
            }],
            categories: vec![CategoryEntry {
                url: "https://shop.example.com/c/bathtubs/1203".to_string(),
            }],
            skip: SkipConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&create_valid_config()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = create_valid_config();
        config.crawler.max_concurrent_stores = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_tiny_delay_rejected() {
        let mut config = create_valid_config();
        config.crawler.min_request_delay_ms = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_coverage_out_of_range_rejected() {
        let mut config = create_valid_config();
        config.planner.target_coverage = 0.0;
        assert!(validate(&config).is_err());

        config.planner.target_coverage = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_sample_store_rejected() {
        let mut config = create_valid_config();
        config.planner.sample_store = Some(StoreId::new("9999"));
        assert!(validate(&config).is_err());

        config.planner.sample_store = Some(StoreId::new("4588"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = create_valid_config();
        config.fetch.base_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_duplicate_store_rejected() {
        let mut config = create_valid_config();
        config.stores.push(Store {
            id: StoreId::new("4588"),
            region: "OK".to_string(),
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_category_url_rejected() {
        let mut config = create_valid_config();
        config.categories.push(CategoryEntry {
            url: "::::".to_string(),
        });
        assert!(validate(&config).is_err());
    }
}
