// ABOUTME: Garmin SSO credential login including the MFA verification step
// ABOUTME: Scrapes CSRF tokens, page titles and service tickets from the embedded sign-in widget
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Garmin SSO
//!
//! The embedded sign-in widget is driven like a browser would: load the
//! embed page for cookies, load the sign-in form for a CSRF token, post the
//! credentials, and, when the answer is an MFA page, post the one-time code.
//! A successful login ends on a page titled `Success` that links to a
//! service ticket, which is exchanged for OAuth tokens elsewhere.

use super::error::GarminError;
use crate::backend::Credentials;
use crate::constants::garmin::SSO_BASE;
use regex::Regex;
use reqwest::header::REFERER;
use reqwest::{Client, Response, StatusCode};
use std::sync::LazyLock;
use tracing::debug;

static CSRF_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"name="_csrf"\s+value="(.+?)""#).ok());

static TITLE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<title>(.+?)</title>").ok());

static TICKET_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"embed\?ticket=([^"]+)""#).ok());

const SUCCESS_TITLE: &str = "Success";

fn capture(pattern: &LazyLock<Option<Regex>>, html: &str) -> Option<String> {
    pattern
        .as_ref()?
        .captures(html)?
        .get(1)
        .map(|m| m.as_str().to_owned())
}

/// CSRF token of a sign-in or MFA form
#[must_use]
pub fn extract_csrf(html: &str) -> Option<String> {
    capture(&CSRF_PATTERN, html)
}

/// Page title
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    capture(&TITLE_PATTERN, html)
}

/// Service ticket linked from the success page
#[must_use]
pub fn extract_ticket(html: &str) -> Option<String> {
    capture(&TICKET_PATTERN, html)
}

fn embed_url() -> String {
    format!("{SSO_BASE}/embed")
}

fn embed_params() -> Vec<(&'static str, String)> {
    vec![
        ("id", "gauth-widget".to_owned()),
        ("embedWidget", "true".to_owned()),
        ("gauthHost", SSO_BASE.to_owned()),
    ]
}

fn signin_params() -> Vec<(&'static str, String)> {
    let embed = embed_url();
    vec![
        ("id", "gauth-widget".to_owned()),
        ("embedWidget", "true".to_owned()),
        ("gauthHost", embed.clone()),
        ("service", embed.clone()),
        ("source", embed.clone()),
        ("redirectAfterAccountLoginUrl", embed.clone()),
        ("redirectAfterAccountCreationUrl", embed),
    ]
}

/// Where a credential post landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInPage {
    /// Logged in; the page links to a service ticket
    Success(String),
    /// MFA challenge form
    MfaChallenge(String),
}

/// Classify the page returned by the credential post
///
/// # Errors
///
/// Returns [`GarminError::InvalidCredentials`] for any title other than a
/// success or MFA page
pub fn classify_signin(html: String) -> Result<SignInPage, GarminError> {
    match extract_title(&html) {
        Some(title) if title.contains("MFA") => Ok(SignInPage::MfaChallenge(html)),
        Some(title) if title == SUCCESS_TITLE => Ok(SignInPage::Success(html)),
        _ => Err(GarminError::InvalidCredentials),
    }
}

/// One SSO login attempt; cookies live in the session's HTTP client
pub struct SsoSession<'a> {
    http: &'a Client,
    referrer: Option<String>,
}

impl<'a> SsoSession<'a> {
    /// Start a session on a cookie-aware client
    #[must_use]
    pub const fn new(http: &'a Client) -> Self {
        Self {
            http,
            referrer: None,
        }
    }

    async fn read_page(&mut self, response: Response) -> Result<(StatusCode, String), GarminError> {
        let status = response.status();
        self.referrer = Some(response.url().to_string());
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn get(
        &mut self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<String, GarminError> {
        let mut request = self.http.get(url).query(params);
        if let Some(referrer) = &self.referrer {
            request = request.header(REFERER, referrer);
        }
        let response = request.send().await?;
        let (status, body) = self.read_page(response).await?;
        if !status.is_success() {
            return Err(GarminError::http(status, &body));
        }
        Ok(body)
    }

    async fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, String), GarminError> {
        let mut request = self.http.post(url).query(&signin_params()).form(form);
        if let Some(referrer) = &self.referrer {
            request = request.header(REFERER, referrer);
        }
        let response = request.send().await?;
        self.read_page(response).await
    }

    /// Log in and return the service ticket
    ///
    /// # Errors
    ///
    /// - [`GarminError::InvalidCredentials`] when SSO rejects the password
    /// - [`GarminError::MfaRequired`] when a code is needed but none was given
    /// - [`GarminError::InvalidMfaCode`] / [`GarminError::MfaRateLimited`] for
    ///   rejected codes
    /// - transport and HTTP errors otherwise
    pub async fn login(
        mut self,
        credentials: &Credentials,
        mfa_code: Option<&str>,
    ) -> Result<String, GarminError> {
        self.get(&embed_url(), &embed_params()).await?;

        let signin_url = format!("{SSO_BASE}/signin");
        let form_page = self.get(&signin_url, &signin_params()).await?;
        let csrf = extract_csrf(&form_page)
            .ok_or_else(|| GarminError::UnexpectedResponse("sign-in form has no CSRF token".into()))?;

        let (status, page) = self
            .post_form(
                &signin_url,
                &[
                    ("username", credentials.email()),
                    ("password", credentials.password()),
                    ("embed", "true"),
                    ("_csrf", csrf.as_str()),
                ],
            )
            .await?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GarminError::http(status, &page));
        }

        let success_page = match classify_signin(page)? {
            SignInPage::Success(html) => html,
            SignInPage::MfaChallenge(html) => {
                let code = mfa_code.ok_or(GarminError::MfaRequired)?;
                debug!("SSO asked for an MFA code");
                self.verify_mfa(&html, code).await?
            }
        };

        extract_ticket(&success_page)
            .ok_or_else(|| GarminError::UnexpectedResponse("no service ticket on success page".into()))
    }

    async fn verify_mfa(&mut self, challenge_page: &str, code: &str) -> Result<String, GarminError> {
        let csrf = extract_csrf(challenge_page)
            .ok_or_else(|| GarminError::UnexpectedResponse("MFA form has no CSRF token".into()))?;

        let (status, page) = self
            .post_form(
                &format!("{SSO_BASE}/verifyMFA/loginEnterMfaCode"),
                &[
                    ("mfa-verification-code", code.trim()),
                    ("embed", "true"),
                    ("_csrf", csrf.as_str()),
                    ("fromPage", "setupEnterMfaCode"),
                ],
            )
            .await?;

        classify_mfa_response(status, page)
    }
}

/// Classify the answer to an MFA code post
///
/// # Errors
///
/// - [`GarminError::MfaRateLimited`] on HTTP 429
/// - [`GarminError::InvalidMfaCode`] on HTTP 401/403 or a non-`Success` page
/// - [`GarminError::Http`] for any other non-2xx status
pub fn classify_mfa_response(status: StatusCode, page: String) -> Result<String, GarminError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(GarminError::MfaRateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GarminError::InvalidMfaCode),
        s if !s.is_success() => Err(GarminError::http(s, &page)),
        _ if extract_title(&page).as_deref() == Some(SUCCESS_TITLE) => Ok(page),
        _ => Err(GarminError::InvalidMfaCode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodycomp_core::ResultCode;

    const SIGNIN_FORM: &str = r#"<html><head><title>GARMIN Authentication Application</title></head>
<body><form method="post">
<input type="hidden" name="_csrf"    value="1A2B3C4D5E" />
</form></body></html>"#;

    const SUCCESS_PAGE: &str = r#"<html><head><title>Success</title></head>
<body><script>var response_url = "https:\/\/sso.garmin.com\/sso\/embed?ticket=ST-0123456-abcdefXYZ-cas";</script></body></html>"#;

    const MFA_PAGE: &str = r#"<html><head><title>GARMIN > MFA Challenge</title></head>
<body><input type="hidden" name="_csrf" value="mfa-token-9" /></body></html>"#;

    #[test]
    fn test_extract_csrf() {
        assert_eq!(extract_csrf(SIGNIN_FORM).as_deref(), Some("1A2B3C4D5E"));
        assert_eq!(extract_csrf(MFA_PAGE).as_deref(), Some("mfa-token-9"));
        assert!(extract_csrf("<html></html>").is_none());
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(SUCCESS_PAGE).as_deref(), Some("Success"));
        assert_eq!(
            extract_title(SIGNIN_FORM).as_deref(),
            Some("GARMIN Authentication Application")
        );
    }

    #[test]
    fn test_extract_ticket() {
        assert_eq!(
            extract_ticket(SUCCESS_PAGE).as_deref(),
            Some("ST-0123456-abcdefXYZ-cas")
        );
        assert!(extract_ticket(SIGNIN_FORM).is_none());
    }

    #[test]
    fn test_classify_signin() {
        assert!(matches!(
            classify_signin(SUCCESS_PAGE.to_owned()),
            Ok(SignInPage::Success(_))
        ));
        assert!(matches!(
            classify_signin(MFA_PAGE.to_owned()),
            Ok(SignInPage::MfaChallenge(_))
        ));
        assert!(matches!(
            classify_signin(SIGNIN_FORM.to_owned()),
            Err(GarminError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_mfa_rate_limit_is_reported_as_limit_exceeded() {
        let err = classify_mfa_response(StatusCode::TOO_MANY_REQUESTS, MFA_PAGE.to_owned())
            .unwrap_err();
        assert!(matches!(err, GarminError::MfaRateLimited));
        assert_eq!(err.result_code(), ResultCode::MfaLimitExceeded);
    }

    #[test]
    fn test_mfa_rejected_code_asks_again() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = classify_mfa_response(status, String::new()).unwrap_err();
            assert!(matches!(err, GarminError::InvalidMfaCode), "{status}");
            assert_eq!(err.result_code(), ResultCode::MfaRequired);
        }

        let err = classify_mfa_response(StatusCode::OK, MFA_PAGE.to_owned()).unwrap_err();
        assert!(matches!(err, GarminError::InvalidMfaCode));
        assert_eq!(err.result_code(), ResultCode::MfaRequired);
    }

    #[test]
    fn test_mfa_server_error_is_a_submission_error() {
        let err = classify_mfa_response(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_owned())
            .unwrap_err();
        assert!(matches!(err, GarminError::Http { .. }));
        assert_eq!(err.result_code(), ResultCode::SubmissionError);
        assert_eq!(err.to_string(), "HTTP error: 500 boom");
    }

    #[test]
    fn test_mfa_success_page_is_returned() {
        let page = classify_mfa_response(StatusCode::OK, SUCCESS_PAGE.to_owned()).unwrap();
        assert_eq!(
            extract_ticket(&page).as_deref(),
            Some("ST-0123456-abcdefXYZ-cas")
        );
    }

    #[test]
    fn test_signin_params_point_at_embed() {
        let params = signin_params();
        let service = params.iter().find(|(k, _)| *k == "service").map(|(_, v)| v);
        assert_eq!(service.map(String::as_str), Some("https://sso.garmin.com/sso/embed"));
    }
}
