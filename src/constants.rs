// ABOUTME: Application constants organized by domain
// ABOUTME: Environment variable names, defaults and remote service endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module

/// Service names used in logs
pub mod service_names {
    /// Name of the relay bot service
    pub const BODYCOMP_RELAY: &str = "bodycomp-relay";
    /// Name of the one-shot submission CLI
    pub const BODYCOMP_SUBMIT: &str = "bodycomp-submit";
}

/// Environment variable names
pub mod env_vars {
    /// Telegram bot token
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    /// Comma-separated allow-list of chat user ids
    pub const ALLOWED_TELEGRAM_ID: &str = "ALLOWED_TELEGRAM_ID";
    /// `ID:PROFILE_KEY` pairs
    pub const USER_PROFILES: &str = "USER_PROFILES";
    /// Profile used for users without an explicit assignment
    pub const DEFAULT_PROFILE: &str = "DEFAULT_PROFILE";
    /// Google AI key for feedback generation
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    /// Accepted alias for the Google AI key
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    /// Model used for feedback generation
    pub const LLM_MODEL: &str = "LLM_MODEL";
    /// Upper bound for the whole feedback step
    pub const FEEDBACK_TIMEOUT_SECS: &str = "FEEDBACK_TIMEOUT_SECS";
    /// Base directory for per-user token stores
    pub const GARMINTOKENS_BASE: &str = "GARMINTOKENS_BASE";
    /// Long-poll timeout for Telegram `getUpdates`
    pub const TELEGRAM_POLL_TIMEOUT_SECS: &str = "TELEGRAM_POLL_TIMEOUT_SECS";
    /// Timeout for ordinary HTTP requests
    pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
}

/// Default configuration values
pub mod defaults {
    /// Profile applied to users without an assignment
    pub const DEFAULT_PROFILE: &str = "OMRON";
    /// Default tokenstore base directory (`~` is expanded)
    pub const GARMINTOKENS_BASE: &str = "~/.garth";
    /// Default LLM model for feedback
    pub const LLM_MODEL: &str = "gemini-2.5-flash-lite";
    /// Default feedback timeout in seconds
    pub const FEEDBACK_TIMEOUT_SECS: u64 = 15;
    /// Default Telegram long-poll timeout in seconds
    pub const TELEGRAM_POLL_TIMEOUT_SECS: u64 = 30;
    /// Default HTTP request timeout in seconds
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    /// Default HTTP connect timeout in seconds
    pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// Pause after a failed poll before trying again
    pub const POLL_RETRY_DELAY_SECS: u64 = 1;
}

/// Garmin Connect endpoints and protocol constants
pub mod garmin {
    /// Domain of the Garmin account
    pub const DOMAIN: &str = "garmin.com";
    /// SSO base URL
    pub const SSO_BASE: &str = "https://sso.garmin.com/sso";
    /// Connect API base URL
    pub const CONNECT_API_BASE: &str = "https://connectapi.garmin.com";
    /// Public document holding the mobile app's OAuth1 consumer credentials
    pub const OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";
    /// User agent expected by the Connect API
    pub const USER_AGENT: &str = "com.garmin.android.apps.connectmobile";
    /// Upload endpoint path
    pub const UPLOAD_PATH: &str = "/upload-service/upload";
    /// Body composition history endpoint path
    pub const WEIGHT_RANGE_PATH: &str = "/weight-service/weight/dateRange";
    /// Profile endpoint used to validate a token
    pub const SOCIAL_PROFILE_PATH: &str = "/userprofile-service/socialProfile";
    /// Per-user tokenstore directory prefix
    pub const TOKENSTORE_PREFIX: &str = "tg_";
    /// File name of the uploaded FIT document
    pub const UPLOAD_FILE_NAME: &str = "body_composition.fit";
}

/// Telegram Bot API constants
pub mod telegram {
    /// Bot API base URL
    pub const API_BASE: &str = "https://api.telegram.org";
    /// Maximum message length accepted by `sendMessage`
    pub const MAX_MESSAGE_CHARS: usize = 4096;
}

/// AI feedback constants
pub mod feedback {
    /// Days of history fetched for trend comparison
    pub const HISTORY_DAYS: i64 = 90;
    /// Maximum characters asked from the model
    pub const MAX_FEEDBACK_CHARS: usize = 260;
    /// Extra attempts after a transient LLM failure
    pub const MAX_RETRIES: u32 = 2;
    /// Backoff before the first retry, doubled for each further retry
    pub const INITIAL_BACKOFF_MS: u64 = 500;
}
