// ABOUTME: Submission backend contract shared by the chat flow and the CLI
// ABOUTME: Defines credentials, submission requests and outcome values returned by backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Submission Backend
//!
//! A backend takes one validated [`Measurement`] and tries to store it
//! remotely, logging in first when needed. It never fails with an error:
//! every outcome, including network trouble, is folded into a
//! [`SubmissionOutcome`] whose [`ResultCode`] tells the caller what to ask
//! the user next.

use async_trait::async_trait;
use bodycomp_core::{Measurement, ResultCode, UserId};
use std::fmt;
use zeroize::Zeroizing;

/// Email and password typed by the user
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Create credentials, trimming surrounding whitespace
    #[must_use]
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_owned(),
            password: Zeroizing::new(password.trim().to_owned()),
        }
    }

    /// Account email
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Account password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One submission attempt
#[derive(Debug, Clone, Copy)]
pub struct SubmissionRequest<'a> {
    /// Chat user the measurement belongs to
    pub user: UserId,
    /// Validated measurement
    pub measurement: &'a Measurement,
    /// Credentials for a fresh login, when the user supplied them
    pub credentials: Option<&'a Credentials>,
    /// One-time code answering an MFA challenge
    pub mfa_code: Option<&'a str>,
}

impl<'a> SubmissionRequest<'a> {
    /// Token-only attempt
    #[must_use]
    pub const fn new(user: UserId, measurement: &'a Measurement) -> Self {
        Self {
            user,
            measurement,
            credentials: None,
            mfa_code: None,
        }
    }

    /// Attach credentials
    #[must_use]
    pub const fn with_credentials(self, credentials: Option<&'a Credentials>) -> Self {
        Self {
            credentials,
            ..self
        }
    }

    /// Attach a one-time code
    #[must_use]
    pub const fn with_mfa_code(self, code: &'a str) -> Self {
        Self {
            mfa_code: Some(code),
            ..self
        }
    }
}

/// What a backend reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Result code driving the conversation
    pub code: ResultCode,
    /// Extra text for a successful upload (AI feedback)
    pub success_text: Option<String>,
    /// Human-readable failure details
    pub diagnostic: Option<String>,
}

impl SubmissionOutcome {
    /// Outcome carrying only a code
    #[must_use]
    pub const fn from_code(code: ResultCode) -> Self {
        Self {
            code,
            success_text: None,
            diagnostic: None,
        }
    }

    /// Successful upload
    #[must_use]
    pub const fn success(feedback: Option<String>) -> Self {
        Self {
            code: ResultCode::Success,
            success_text: feedback,
            diagnostic: None,
        }
    }

    /// Terminal failure with details
    #[must_use]
    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            code: ResultCode::SubmissionError,
            success_text: None,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Anything able to store a measurement remotely
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Authenticate as needed and upload the measurement
    async fn submit(&self, request: SubmissionRequest<'_>) -> SubmissionOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new(" user@example.com ", " hunter2 ");
        assert_eq!(creds.email(), "user@example.com");
        assert_eq!(creds.password(), "hunter2");

        let printed = format!("{creds:?}");
        assert!(printed.contains("user@example.com"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_outcome_constructors() {
        let outcome = SubmissionOutcome::failure("boom");
        assert_eq!(outcome.code, ResultCode::SubmissionError);
        assert_eq!(outcome.diagnostic.as_deref(), Some("boom"));

        let outcome = SubmissionOutcome::from_code(ResultCode::MfaRequired);
        assert!(outcome.diagnostic.is_none());
        assert!(outcome.success_text.is_none());
    }
}
