// ABOUTME: Shared HTTP client construction with timeouts and connection pooling
// ABOUTME: Provides the pooled default client and builders for cookie-aware and long-poll clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::defaults;
use bodycomp_core::{AppError, AppResult};
use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client with default configuration
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the shared HTTP client with default settings
///
/// Prefer this over creating new clients for plain JSON APIs.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(defaults::HTTP_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(defaults::HTTP_CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// Create a new HTTP client with custom timeout settings
#[must_use]
pub fn create_client_with_timeout(timeout: Duration) -> Client {
    create_custom_client(|builder| {
        builder
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(defaults::HTTP_CONNECT_TIMEOUT_SECS))
    })
}

/// Create a new HTTP client with custom configuration
///
/// Falls back to a default client if the builder fails.
pub fn create_custom_client<F>(config_fn: F) -> Client
where
    F: FnOnce(ClientBuilder) -> ClientBuilder,
{
    config_fn(ClientBuilder::new())
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Create a fresh client with its own cookie jar
///
/// SSO logins need cookies scoped to one attempt, so this never reuses the
/// shared client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised
pub fn session_client(user_agent: &str, timeout: Duration) -> AppResult<Client> {
    ClientBuilder::new()
        .cookie_store(true)
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(defaults::HTTP_CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))
}

/// Client for long polling: request timeout is the poll window plus slack
#[must_use]
pub fn long_poll_client(poll_timeout_secs: u64) -> Client {
    create_client_with_timeout(Duration::from_secs(
        poll_timeout_secs.saturating_add(defaults::HTTP_CONNECT_TIMEOUT_SECS),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_poll_client_accepts_huge_poll_window() {
        let _client = long_poll_client(u64::MAX);
    }

    #[test]
    fn test_session_client_builds() {
        assert!(session_client("bodycomp-test", Duration::from_secs(5)).is_ok());
    }
}
