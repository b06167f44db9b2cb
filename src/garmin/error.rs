// ABOUTME: Error taxonomy of the Garmin Connect login and upload flow
// ABOUTME: Every variant maps onto exactly one conversation result code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use bodycomp_core::ResultCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while logging in to or talking with Garmin Connect
#[derive(Debug, Error)]
pub enum GarminError {
    /// Stored tokens are missing, unreadable or rejected
    #[error("Token login failed: {reason}")]
    TokenUnavailable {
        /// Why the stored tokens could not be used
        reason: String,
    },

    /// SSO rejected the email and password
    #[error("Authentication failed: Invalid username or password")]
    InvalidCredentials,

    /// Login stopped at an MFA challenge and no code was supplied
    #[error("MFA code required")]
    MfaRequired,

    /// The supplied MFA code was not accepted
    #[error("Invalid MFA code")]
    InvalidMfaCode,

    /// Too many MFA codes were tried
    #[error("Too many MFA attempts")]
    MfaRateLimited,

    /// Remote endpoint answered with a non-success status
    #[error("HTTP error: {status} {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Network or TLS failure
    #[error("Connection issue: {0}")]
    Transport(#[from] reqwest::Error),

    /// SSO or OAuth response did not look as expected
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Tokenstore file could not be written
    #[error("Tokenstore error at {}: {source}", path.display())]
    Tokenstore {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Token JSON could not be produced or parsed
    #[error("Token serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GarminError {
    /// Build an HTTP error from a status and body, truncating long bodies
    #[must_use]
    pub fn http(status: reqwest::StatusCode, body: &str) -> Self {
        const MAX_BODY_CHARS: usize = 300;
        Self::Http {
            status: status.as_u16(),
            body: body.trim().chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    /// Diagnostic shown to the user when the FIT upload is rejected
    #[must_use]
    pub fn upload_diagnostic(&self) -> String {
        format!("add_body_composition failed: {self}")
    }

    /// Conversation result code for this failure
    #[must_use]
    pub const fn result_code(&self) -> ResultCode {
        match self {
            Self::TokenUnavailable { .. } => ResultCode::TokenInvalid,
            Self::MfaRequired | Self::InvalidMfaCode => ResultCode::MfaRequired,
            Self::MfaRateLimited => ResultCode::MfaLimitExceeded,
            Self::InvalidCredentials
            | Self::Http { .. }
            | Self::Transport(_)
            | Self::UnexpectedResponse(_)
            | Self::Tokenstore { .. }
            | Self::Serialization(_) => ResultCode::SubmissionError,
        }
    }
}
