//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests, including:
//! - Building HTTP clients with a proper user agent string
//! - Classifying single responses
//! - Retry logic for transient failures and rate limiting

use crate::config::{DownloadConfig, UserAgentConfig};
use crate::FetchError;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Result of a single GET request
#[derive(Debug)]
pub enum FetchOutcome {
    /// Response with a usable body
    Success {
        /// HTTP status code
        status: u16,
        /// Response body
        body: Vec<u8>,
    },

    /// HTTP 429
    RateLimited,

    /// HTTP 404
    NotFound,

    /// HTTP 5xx
    ServerError { status: u16 },

    /// Any other 4xx
    ClientError { status: u16 },

    /// Connection, timeout or body read failure
    Transport { error: String },
}

impl FetchOutcome {
    /// Returns true if the same request may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError { .. } | Self::Transport { .. }
        )
    }

    /// Short description used in log lines and error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Success { status, .. } => format!("HTTP {}", status),
            Self::RateLimited => "HTTP 429 Too Many Requests".to_string(),
            Self::NotFound => "HTTP 404".to_string(),
            Self::ServerError { status } | Self::ClientError { status } => {
                format!("HTTP {}", status)
            }
            Self::Transport { error } => error.clone(),
        }
    }
}

/// Retry policy shared by every request of a run
///
/// The retry loop runs attempts `0..=attempts`, so a request that keeps
/// failing transiently is tried `attempts + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling
    pub attempts: u32,
    /// Sleep before retrying a rate-limited request
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            attempts: config.attempts,
            backoff: Duration::from_millis(config.rate_limit_backoff),
        }
    }

    /// Total number of requests made before giving up
    pub fn total_tries(&self) -> u32 {
        self.attempts + 1
    }

    /// Returns true if `attempt` is the last one the loop will make
    pub fn is_final(&self, attempt: u32) -> bool {
        attempt >= self.attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use manga_binder::config::UserAgentConfig;
/// use manga_binder::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent(config))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats the User-Agent header: `Name/Version (+ContactURL)`
pub fn user_agent(config: &UserAgentConfig) -> String {
    match &config.contact_url {
        Some(contact) => format!("{}/{} (+{})", config.name, config.version, contact),
        None => format!("{}/{}", config.name, config.version),
    }
}

/// HTTP fetcher with bounded retry and rate-limit backoff
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sends one GET request and classifies the response
    pub async fn fetch_once(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return FetchOutcome::Transport { error };
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return FetchOutcome::NotFound;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchOutcome::RateLimited;
        }
        if status.is_server_error() {
            return FetchOutcome::ServerError {
                status: status.as_u16(),
            };
        }
        if status.is_client_error() {
            return FetchOutcome::ClientError {
                status: status.as_u16(),
            };
        }

        match response.bytes().await {
            Ok(body) => FetchOutcome::Success {
                status: status.as_u16(),
                body: body.to_vec(),
            },
            Err(e) => FetchOutcome::Transport {
                error: format!("Failed to read body: {}", e),
            },
        }
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx/3xx | Return body |
    /// | HTTP 404 | Immediate → `Permanent` |
    /// | Other HTTP 4xx | Immediate → `Permanent` |
    /// | HTTP 429 | Sleep backoff, retry |
    /// | HTTP 5xx | Retry |
    /// | Transport error | Retry |
    ///
    /// After `attempts + 1` tries the failure becomes `Exhausted`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut last = String::new();

        for attempt in 0..=self.policy.attempts {
            let outcome = self.fetch_once(url).await;
            match outcome {
                FetchOutcome::Success { body, .. } => return Ok(body),
                FetchOutcome::NotFound => {
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        status: 404,
                    })
                }
                FetchOutcome::ClientError { status } => {
                    return Err(FetchError::Permanent {
                        url: url.to_string(),
                        status,
                    })
                }
                transient => {
                    last = transient.describe();
                    tracing::warn!(
                        "{} - {} {}/{}",
                        last,
                        url,
                        attempt,
                        self.policy.attempts
                    );
                    if matches!(transient, FetchOutcome::RateLimited)
                        && !self.policy.is_final(attempt)
                    {
                        tracing::warn!("Too many requests {}. Sleep.", url);
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.policy.total_tries(),
            last,
        })
    }

    /// Returns the status code of a single GET, without retrying
    pub async fn ping(&self, url: &str) -> Result<u16, FetchError> {
        tracing::info!("Pinging {}", url);
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts: 1,
                last: e.to_string(),
            }),
        }
    }
}
