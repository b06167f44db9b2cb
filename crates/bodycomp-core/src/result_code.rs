// ABOUTME: Outcome codes exchanged between the submission backend and the conversation
// ABOUTME: Numeric values double as process exit codes for the one-shot submit CLI
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Measurement stored remotely
    Success,
    /// Terminal failure for this attempt (network, remote error, bad password)
    SubmissionError,
    /// No usable token; email and password are needed
    TokenInvalid,
    /// Login is waiting for a one-time code
    MfaRequired,
    /// Remote service refuses further one-time codes for now
    MfaLimitExceeded,
}

impl ResultCode {
    /// Stable numeric value, used as the CLI exit status
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::SubmissionError => 1,
            Self::TokenInvalid => 2,
            Self::MfaRequired => 3,
            Self::MfaLimitExceeded => 4,
        }
    }

    /// Short machine-friendly name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SubmissionError => "submission_error",
            Self::TokenInvalid => "token_invalid",
            Self::MfaRequired => "mfa_required",
            Self::MfaLimitExceeded => "mfa_limit_exceeded",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(ResultCode::Success.exit_code(), 0);
        assert_eq!(ResultCode::SubmissionError.exit_code(), 1);
        assert_eq!(ResultCode::TokenInvalid.exit_code(), 2);
        assert_eq!(ResultCode::MfaRequired.exit_code(), 3);
        assert_eq!(ResultCode::MfaLimitExceeded.exit_code(), 4);
    }

    #[test]
    fn test_display_uses_snake_case_names() {
        assert_eq!(ResultCode::MfaLimitExceeded.to_string(), "mfa_limit_exceeded");
        assert_eq!(ResultCode::TokenInvalid.to_string(), "token_invalid");
    }
}
