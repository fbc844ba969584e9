use crate::config::types::{Config, DownloadConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_download_config(&config.download)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site URL and extraction schema
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use HTTP or HTTPS, got '{}'",
            config.base_url
        )));
    }

    if config.chapter_link_class.split_whitespace().next().is_none() {
        return Err(ConfigError::Validation(
            "chapter-link-class must name at least one class".to_string(),
        ));
    }

    for (key, value) in [
        ("chapter-url-attr", &config.chapter_url_attr),
        ("image-url-attr", &config.image_url_attr),
    ] {
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "{} must be a single attribute name, got '{}'",
                key, value
            )));
        }
    }

    Ok(())
}

/// Validates retry and concurrency limits
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "attempts must be >= 1, got {}",
            config.attempts
        )));
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 256 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-downloads must be between 1 and 256, got {}",
            config.max_concurrent_downloads
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if !config.resolution.is_finite() || config.resolution <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "resolution must be a positive number, got {}",
            config.resolution
        )));
    }

    Ok(())
}
