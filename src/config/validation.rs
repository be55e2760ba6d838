use crate::config::types::{Config, ConnectorConfig, HarvestConfig, StoreConfig, TransportConfig};
use crate::dom::SelectorPath;
use crate::ConfigError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use url::Url;

/// Placeholder replaced by the page number in listing URLs
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Optional placeholder replaced by the per-page item limit in listing URLs
pub const LIMIT_PLACEHOLDER: &str = "{limit}";

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_transport_config(&config.transport)?;
    validate_store_config(&config.store)?;
    validate_connector_config(&config.connector)?;
    Ok(())
}

/// Validates page loop configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.limit < 1 {
        return Err(ConfigError::Validation(format!(
            "limit must be >= 1, got {}",
            config.limit
        )));
    }

    if config.page_max != 0 && config.page_max < config.page_min {
        return Err(ConfigError::Validation(format!(
            "page_max must be 0 or >= page_min ({}), got {}",
            config.page_min, config.page_max
        )));
    }

    Ok(())
}

/// Validates transport configuration
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the connector's URLs, selectors and headers
fn validate_connector_config(config: &ConnectorConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "connector name cannot be empty".to_string(),
        ));
    }

    validate_listing_url(&config.listing_url)?;

    parse_path(&config.item_link)?;
    if let Some(marker) = &config.next_page {
        parse_path(marker)?;
    }
    for (_, path) in config.fields.iter() {
        parse_path(path)?;
    }

    build_header_map(&config.headers)?;

    Ok(())
}

/// Checks that the template has a page placeholder and forms a valid URL
fn validate_listing_url(template: &str) -> Result<(), ConfigError> {
    if !template.contains(PAGE_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "listing_url '{}' must contain {}",
            template, PAGE_PLACEHOLDER
        )));
    }

    let sample = template
        .replace(PAGE_PLACEHOLDER, "1")
        .replace(LIMIT_PLACEHOLDER, "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url '{}': {}", template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "listing_url '{}' must use http or https",
            template
        )));
    }

    Ok(())
}

/// Parses a selector path, attaching the offending text to the error
pub(crate) fn parse_path(input: &str) -> Result<SelectorPath, ConfigError> {
    SelectorPath::parse(input).map_err(|source| ConfigError::InvalidSelector {
        selector: input.to_string(),
        source,
    })
}

/// Converts configured headers into a request header map
pub(crate) fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::Validation(format!("Invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }

    Ok(map)
}
