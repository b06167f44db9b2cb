// ABOUTME: Garmin Connect submission backend with token reuse and SSO/MFA login recovery
// ABOUTME: Logs in per user, uploads a FIT weight file and asks for optional AI feedback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Garmin Connect Backend
//!
//! Each submission logs in from scratch:
//!
//! 1. Stored tokens under `<base>/tg_<user>` are tried first. An expired
//!    OAuth2 token is refreshed through the OAuth1 exchange and saved back.
//! 2. When tokens are unusable and no credentials were supplied, the result
//!    is [`ResultCode::TokenInvalid`] so the conversation can ask for them.
//! 3. With credentials, an SSO login runs, stopping with
//!    [`ResultCode::MfaRequired`] if Garmin challenges and no code was given.
//!
//! The measurement is then encoded as a FIT file and uploaded. Feedback runs
//! afterwards and can only add text to a success.

pub mod client;
pub mod error;
pub mod fit;
pub mod oauth;
pub mod sso;
pub mod tokenstore;

pub use client::ConnectClient;
pub use error::GarminError;

use crate::backend::{Credentials, SubmissionBackend, SubmissionOutcome, SubmissionRequest};
use crate::config::environment::BackendSettings;
use crate::constants::garmin::USER_AGENT;
use crate::feedback::FeedbackGenerator;
use crate::logging::AppLogger;
use crate::utils::http_client::session_client;
use async_trait::async_trait;
use bodycomp_core::{ResultCode, UserId};
use chrono::{Local, Utc};
use oauth::OAuthConsumer;
use reqwest::Client;
use sso::SsoSession;
use std::path::PathBuf;
use std::time::Duration;
use tokenstore::TokenStore;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Submission backend talking to Garmin Connect
pub struct GarminBackend {
    tokenstore_base: PathBuf,
    http_timeout: Duration,
    consumer: OnceCell<OAuthConsumer>,
    feedback: FeedbackGenerator,
}

impl GarminBackend {
    /// Backend storing tokens under `tokenstore_base`
    #[must_use]
    pub fn new(tokenstore_base: PathBuf, http_timeout: Duration, feedback: FeedbackGenerator) -> Self {
        Self {
            tokenstore_base,
            http_timeout,
            consumer: OnceCell::new(),
            feedback,
        }
    }

    /// Backend configured from [`BackendSettings`]
    #[must_use]
    pub fn from_settings(settings: &BackendSettings) -> Self {
        Self::new(
            settings.tokenstore_base.clone(),
            settings.http_timeout,
            FeedbackGenerator::from_settings(settings),
        )
    }

    /// Tokenstore of `user`
    #[must_use]
    pub fn tokenstore(&self, user: UserId) -> TokenStore {
        TokenStore::for_user(&self.tokenstore_base, user)
    }

    /// Consumer credentials, fetched once per process
    async fn consumer(&self, http: &Client) -> Result<&OAuthConsumer, GarminError> {
        self.consumer
            .get_or_try_init(|| oauth::fetch_consumer(http))
            .await
    }

    /// Resume a session from stored tokens
    async fn token_login(
        &self,
        http: &Client,
        store: &TokenStore,
    ) -> Result<ConnectClient, GarminError> {
        let (oauth1, mut oauth2) = store.load().await?;

        if oauth2.is_expired() {
            debug!(tokenstore = %store.dir().display(), "OAuth2 token expired, refreshing");
            let consumer = self.consumer(http).await?;
            oauth2 = oauth::exchange(http, consumer, &oauth1)
                .await
                .map_err(|e| GarminError::TokenUnavailable {
                    reason: format!("token refresh failed: {e}"),
                })?;
            store.save_oauth2(&oauth2).await?;
        }

        let client = ConnectClient::new(http.clone(), oauth2);
        client.verify_profile().await?;
        Ok(client)
    }

    /// Full SSO login, persisting the new tokens
    async fn credential_login(
        &self,
        http: &Client,
        store: &TokenStore,
        credentials: &Credentials,
        mfa_code: Option<&str>,
    ) -> Result<ConnectClient, GarminError> {
        let ticket = SsoSession::new(http).login(credentials, mfa_code).await?;
        let consumer = self.consumer(http).await?;
        let oauth1 = oauth::get_oauth1_token(http, consumer, &ticket).await?;
        let oauth2 = oauth::exchange(http, consumer, &oauth1).await?;
        store.save(&oauth1, &oauth2).await?;
        Ok(ConnectClient::new(http.clone(), oauth2))
    }

    /// Log in, preferring stored tokens
    async fn login(
        &self,
        http: &Client,
        request: &SubmissionRequest<'_>,
    ) -> Result<ConnectClient, GarminError> {
        let store = self.tokenstore(request.user);

        match self.token_login(http, &store).await {
            Ok(client) => {
                AppLogger::log_auth_event(request.user, "token_login", true);
                return Ok(client);
            }
            Err(e) => {
                debug!(user.id = %request.user, error = %e, "Stored tokens unusable");
                AppLogger::log_auth_event(request.user, "token_login", false);
            }
        }

        let Some(credentials) = request.credentials else {
            return Err(GarminError::TokenUnavailable {
                reason: "no usable tokens and no credentials supplied".into(),
            });
        };

        let result = self
            .credential_login(http, &store, credentials, request.mfa_code)
            .await;
        let event = if request.mfa_code.is_some() {
            "mfa_login"
        } else {
            "credential_login"
        };
        AppLogger::log_auth_event(request.user, event, result.is_ok());
        result
    }
}

#[async_trait]
impl SubmissionBackend for GarminBackend {
    async fn submit(&self, request: SubmissionRequest<'_>) -> SubmissionOutcome {
        let http = match session_client(USER_AGENT, self.http_timeout) {
            Ok(http) => http,
            Err(e) => return SubmissionOutcome::failure(e.to_string()),
        };

        let client = match self.login(&http, &request).await {
            Ok(client) => client,
            Err(e) => {
                let code = e.result_code();
                if code == ResultCode::SubmissionError {
                    warn!(user.id = %request.user, error = %e, "Garmin login failed");
                    return SubmissionOutcome::failure(e.to_string());
                }
                return SubmissionOutcome {
                    code,
                    success_text: None,
                    diagnostic: Some(e.to_string()),
                };
            }
        };

        let fit = fit::encode_measurement(request.measurement, Utc::now());
        if let Err(e) = client.upload_fit(fit).await {
            warn!(user.id = %request.user, error = %e, "Upload rejected");
            return SubmissionOutcome::failure(e.upload_diagnostic());
        }

        let feedback = self
            .feedback
            .generate(&client, Local::now().date_naive())
            .await;
        SubmissionOutcome::success(feedback)
    }
}
