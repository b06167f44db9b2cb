// ABOUTME: OAuth1 request signing and Garmin token types for the Connect mobile API
// ABOUTME: Turns an SSO ticket into OAuth1 tokens and exchanges those for OAuth2 bearer tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Garmin OAuth
//!
//! Garmin Connect's mobile API uses a two-layer scheme: an SSO ticket buys a
//! long-lived OAuth1 token (signed with HMAC-SHA1 using the mobile app's
//! consumer credentials), and the OAuth1 token buys short-lived OAuth2
//! bearer tokens. Token JSON matches the `garth` tokenstore layout so
//! existing token directories keep working.

use super::error::GarminError;
use crate::constants::garmin::{CONNECT_API_BASE, DOMAIN, OAUTH_CONSUMER_URL, SSO_BASE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LEN: usize = 32;

/// Consumer credentials of the Connect mobile app
#[derive(Clone, Deserialize)]
pub struct OAuthConsumer {
    /// Consumer key
    pub consumer_key: String,
    /// Consumer secret
    pub consumer_secret: String,
}

impl fmt::Debug for OAuthConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConsumer")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

/// Long-lived OAuth1 token (`oauth1_token.json`)
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuth1Token {
    /// Token
    pub oauth_token: String,
    /// Token secret
    pub oauth_token_secret: String,
    /// MFA token to present on exchange
    #[serde(default)]
    pub mfa_token: Option<String>,
    /// Expiry of the MFA token as sent by Garmin
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    /// Account domain
    #[serde(default)]
    pub domain: Option<String>,
}

impl fmt::Debug for OAuth1Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Token")
            .field("oauth_token", &"[REDACTED]")
            .field("oauth_token_secret", &"[REDACTED]")
            .field("mfa_token", &self.mfa_token.as_ref().map(|_| "[REDACTED]"))
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl OAuth1Token {
    /// Parse the form-encoded body of the `preauthorized` endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the token or its secret is missing
    pub fn from_form(body: &str) -> Result<Self, GarminError> {
        let mut token = None;
        let mut secret = None;
        let mut mfa_token = None;
        let mut mfa_expiration = None;
        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                "oauth_token" => token = Some(value.into_owned()),
                "oauth_token_secret" => secret = Some(value.into_owned()),
                "mfa_token" => mfa_token = Some(value.into_owned()),
                "mfa_expiration_timestamp" => mfa_expiration = Some(value.into_owned()),
                _ => {}
            }
        }

        match (token, secret) {
            (Some(oauth_token), Some(oauth_token_secret)) => Ok(Self {
                oauth_token,
                oauth_token_secret,
                mfa_token,
                mfa_expiration_timestamp: mfa_expiration,
                domain: Some(DOMAIN.to_owned()),
            }),
            _ => Err(GarminError::UnexpectedResponse(
                "OAuth1 response lacks token or secret".into(),
            )),
        }
    }
}

/// Short-lived OAuth2 bearer token (`oauth2_token.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Token {
    /// Granted scopes
    pub scope: String,
    /// Token id
    pub jti: String,
    /// Usually `Bearer`
    pub token_type: String,
    /// Bearer token
    pub access_token: String,
    /// Refresh token (unused; refresh goes through OAuth1)
    pub refresh_token: String,
    /// Lifetime in seconds at issue time
    pub expires_in: i64,
    /// Unix time the access token expires
    pub expires_at: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_expires_in: i64,
    /// Unix time the refresh token expires
    pub refresh_token_expires_at: i64,
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("token_type", &self.token_type)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl OAuth2Token {
    /// Fill absolute expiry times from the relative ones, as of `now`
    #[must_use]
    pub fn with_expirations(mut self, now: i64) -> Self {
        self.expires_at = now + self.expires_in;
        self.refresh_token_expires_at = now + self.refresh_token_expires_in;
        self
    }

    /// Whether the access token is past its expiry at `now`
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at < now
    }

    /// Whether the access token is past its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// `Authorization` header value
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// RFC 3986 percent-encoding as required by OAuth1
fn percent(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Scheme, host, optional port and path of `url`
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}{}", url.scheme(), url.path()),
        None => format!("{}://{host}{}", url.scheme(), url.path()),
    }
}

/// OAuth1 signature base string
#[must_use]
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent(k), percent(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent(&base_url(url)),
        percent(&normalized)
    )
}

/// HMAC-SHA1 signature of a base string, base64 encoded
#[must_use]
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let signing_key = format!("{}&{}", percent(consumer_secret), percent(token_secret));
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    STANDARD.encode(hmac::sign(&key, base_string.as_bytes()).as_ref())
}

/// Signs requests on behalf of a consumer and, optionally, a token
pub struct OAuth1Signer<'a> {
    consumer: &'a OAuthConsumer,
    token: Option<&'a OAuth1Token>,
}

impl<'a> OAuth1Signer<'a> {
    /// Signer without a token (ticket exchange)
    #[must_use]
    pub const fn new(consumer: &'a OAuthConsumer) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    /// Signer acting for `token`
    #[must_use]
    pub const fn with_token(consumer: &'a OAuthConsumer, token: &'a OAuth1Token) -> Self {
        Self {
            consumer,
            token: Some(token),
        }
    }

    /// `Authorization` header for a request with explicit nonce and timestamp
    ///
    /// Query parameters of `url` and form `body` parameters take part in the
    /// signature.
    #[must_use]
    pub fn authorization_with(
        &self,
        method: &str,
        url: &Url,
        body: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_owned(), self.consumer.consumer_key.clone()),
            ("oauth_nonce".to_owned(), nonce.to_owned()),
            ("oauth_signature_method".to_owned(), SIGNATURE_METHOD.to_owned()),
            ("oauth_timestamp".to_owned(), timestamp.to_string()),
            ("oauth_version".to_owned(), OAUTH_VERSION.to_owned()),
        ];
        if let Some(token) = self.token {
            oauth_params.push(("oauth_token".to_owned(), token.oauth_token.clone()));
        }

        let mut all_params = oauth_params.clone();
        all_params.extend(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
        all_params.extend(body.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));

        let base = signature_base_string(method, url, &all_params);
        let token_secret = self.token.map_or("", |t| t.oauth_token_secret.as_str());
        let signature = sign(&base, &self.consumer.consumer_secret, token_secret);
        oauth_params.push(("oauth_signature".to_owned(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent(k), percent(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }

    /// `Authorization` header with a fresh nonce and the current time
    #[must_use]
    pub fn authorization(&self, method: &str, url: &Url, body: &[(&str, &str)]) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        self.authorization_with(method, url, body, &nonce, Utc::now().timestamp())
    }
}

fn oauth_url(path: &str) -> Result<Url, GarminError> {
    Url::parse(&format!("{CONNECT_API_BASE}/oauth-service/oauth/{path}"))
        .map_err(|e| GarminError::UnexpectedResponse(format!("invalid OAuth URL: {e}")))
}

/// Fetch the public consumer credentials
///
/// # Errors
///
/// Returns an error on network failure or malformed JSON
pub async fn fetch_consumer(http: &Client) -> Result<OAuthConsumer, GarminError> {
    let response = http.get(OAUTH_CONSUMER_URL).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GarminError::http(status, &body));
    }
    Ok(response.json().await?)
}

/// Trade an SSO ticket for an OAuth1 token
///
/// # Errors
///
/// Returns an error on network failure, non-success status or a body
/// lacking the token
pub async fn get_oauth1_token(
    http: &Client,
    consumer: &OAuthConsumer,
    ticket: &str,
) -> Result<OAuth1Token, GarminError> {
    let mut url = oauth_url("preauthorized")?;
    url.query_pairs_mut()
        .append_pair("ticket", ticket)
        .append_pair("login-url", &format!("{SSO_BASE}/embed"))
        .append_pair("accepts-mfa-tokens", "true");

    let header = OAuth1Signer::new(consumer).authorization("GET", &url, &[]);
    let response = http
        .get(url.as_str())
        .header(AUTHORIZATION, header)
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(GarminError::http(status, &body));
    }
    OAuth1Token::from_form(&body)
}

/// Exchange an OAuth1 token for a fresh OAuth2 token
///
/// # Errors
///
/// Returns an error on network failure, non-success status or malformed JSON
pub async fn exchange(
    http: &Client,
    consumer: &OAuthConsumer,
    oauth1: &OAuth1Token,
) -> Result<OAuth2Token, GarminError> {
    let url = oauth_url("exchange/user/2.0")?;
    let body: Vec<(&str, &str)> = oauth1
        .mfa_token
        .as_deref()
        .map(|mfa| vec![("mfa_token", mfa)])
        .unwrap_or_default();

    let header = OAuth1Signer::with_token(consumer, oauth1).authorization("POST", &url, &body);
    let response = http
        .post(url.as_str())
        .header(AUTHORIZATION, header)
        .form(&body)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(GarminError::http(status, &text));
    }
    let token: OAuth2Token = response.json().await?;
    Ok(token.with_expirations(Utc::now().timestamp()))
}
