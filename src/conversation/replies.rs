// ABOUTME: Reply texts sent back to the chat user
// ABOUTME: One function per conversational outcome so wording lives in a single place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use bodycomp_core::{ResultCode, ValidationError};

/// Link shown after a successful upload
pub const WEIGHT_PAGE: &str = "connect.garmin.com/modern/weight";

/// Fallback diagnostic when the backend gave none
pub const UNKNOWN_SUBMISSION_ERROR: &str = "Unknown error occurred during submission.";

/// Sender is not on the allow-list
#[must_use]
pub fn unauthorized() -> String {
    "\u{26d4} Sorry, you are not authorized to use this bot.".to_owned()
}

/// Message carried no text
#[must_use]
pub fn no_text() -> String {
    "No text found in message.".to_owned()
}

/// Measurement text failed validation
#[must_use]
pub fn validation_error(error: &ValidationError) -> String {
    format!("Input validation error: {error}")
}

/// Credentials reply did not have exactly two lines
#[must_use]
pub fn credentials_format() -> String {
    "Input error: Please send your email on the first line and password on the second line."
        .to_owned()
}

/// MFA reply did not have exactly one line
#[must_use]
pub fn mfa_code_format() -> String {
    "Input error: Please send only your one-time code, on a single line.".to_owned()
}

/// Upload stored, with an optional coaching tip
#[must_use]
pub fn success(feedback: Option<&str>) -> String {
    let mut message = format!(
        "\u{1f389} SUCCESS! Body composition data submitted to Garmin Connect.\n\
         Go check your stats now! \u{1f680}\n{WEIGHT_PAGE}"
    );
    if let Some(tip) = feedback.map(str::trim).filter(|tip| !tip.is_empty()) {
        message.push_str("\n\n\u{1f4ac} Tip: ");
        message.push_str(tip);
    }
    message
}

/// Token missing or invalid; ask for email and password
#[must_use]
pub fn login_required() -> String {
    "\u{1f6d1} Garmin Login Required\n\n\
     The login token is missing or invalid for your account. Please reply to this message with:\n\
     1. Your Garmin Email\n\
     2. Your Garmin Password"
        .to_owned()
}

/// Login is waiting for a one-time code
#[must_use]
pub fn mfa_required() -> String {
    "\u{1f511} Multi-Factor Authentication Required\n\n\
     Please check your MFA app and reply to this message with your one-time 6-digit code."
        .to_owned()
}

/// Too many one-time codes were tried
#[must_use]
pub fn mfa_limit_exceeded() -> String {
    "\u{274c} MFA Limit Exceeded\n\n\
     You've tried too many MFA codes. Please wait 30 minutes before trying again."
        .to_owned()
}

/// Terminal failure with the backend diagnostic
#[must_use]
pub fn submission_failed(code: ResultCode, diagnostic: Option<&str>) -> String {
    let detail = diagnostic
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(UNKNOWN_SUBMISSION_ERROR);
    format!(
        "\u{274c} Submission Failed (Code: {})\n\n{detail}",
        code.exit_code()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_and_without_tip() {
        let plain = success(None);
        assert!(plain.contains("SUCCESS!"));
        assert!(!plain.contains("Tip:"));

        let blank = success(Some("   "));
        assert!(!blank.contains("Tip:"));

        let tipped = success(Some("Great job!"));
        assert!(tipped.ends_with("Tip: Great job!"));
    }

    #[test]
    fn test_submission_failed_uses_generic_text() {
        let text = submission_failed(ResultCode::SubmissionError, None);
        assert!(text.contains("(Code: 1)"));
        assert!(text.contains(UNKNOWN_SUBMISSION_ERROR));

        let text = submission_failed(ResultCode::SubmissionError, Some("HTTP error: 500"));
        assert!(text.ends_with("HTTP error: 500"));
    }
}
