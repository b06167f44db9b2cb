// ABOUTME: Environment-based configuration for the relay bot
// ABOUTME: Parses allow-list, profile assignments, tokenstore base, LLM and timeout settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management

use crate::constants::{defaults, env_vars, garmin};
use anyhow::{bail, Context, Result};
use bodycomp_core::{ProfileKind, UserId, ValidationError};
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-user device profile assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAssignments {
    assignments: HashMap<UserId, String>,
    default_key: String,
}

impl Default for ProfileAssignments {
    fn default() -> Self {
        Self::new(HashMap::new(), defaults::DEFAULT_PROFILE)
    }
}

impl ProfileAssignments {
    /// Create assignments with an explicit default profile key
    #[must_use]
    pub fn new(assignments: HashMap<UserId, String>, default_key: &str) -> Self {
        Self {
            assignments,
            default_key: default_key.trim().to_ascii_uppercase(),
        }
    }

    /// Profile key configured for `user`, or the default key
    #[must_use]
    pub fn key_for(&self, user: UserId) -> &str {
        self.assignments
            .get(&user)
            .map_or(self.default_key.as_str(), String::as_str)
    }

    /// Resolve the profile of `user`
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownProfile`] when the configured key
    /// names no known profile
    pub fn resolve(&self, user: UserId) -> Result<ProfileKind, ValidationError> {
        ProfileKind::from_key(self.key_for(user))
    }

    /// Profile key used for users without an assignment
    #[must_use]
    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Number of explicit assignments
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether no explicit assignment exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Relay configuration loaded from the environment
#[derive(Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub telegram_bot_token: String,
    /// Chat users allowed to talk to the bot
    pub allowed_user_ids: HashSet<UserId>,
    /// Device profile per user
    pub profiles: ProfileAssignments,
    /// Google AI key; `None` disables feedback
    pub google_api_key: Option<String>,
    /// Model used for feedback
    pub llm_model: String,
    /// Upper bound for the whole feedback step
    pub feedback_timeout: Duration,
    /// Base directory holding `tg_<id>` tokenstores
    pub tokenstore_base: PathBuf,
    /// Long-poll timeout for `getUpdates`
    pub poll_timeout_secs: u64,
    /// Timeout for ordinary HTTP requests
    pub http_timeout: Duration,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_bot_token", &"[REDACTED]")
            .field("allowed_user_ids", &self.allowed_user_ids)
            .field("profiles", &self.profiles)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("llm_model", &self.llm_model)
            .field("feedback_timeout", &self.feedback_timeout)
            .field("tokenstore_base", &self.tokenstore_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let telegram_bot_token = env::var(env_vars::TELEGRAM_BOT_TOKEN)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .with_context(|| format!("Set {} env var", env_vars::TELEGRAM_BOT_TOKEN))?;

        let allowed_raw = env::var(env_vars::ALLOWED_TELEGRAM_ID)
            .ok()
            .filter(|ids| !ids.trim().is_empty())
            .with_context(|| format!("Set {} env var", env_vars::ALLOWED_TELEGRAM_ID))?;
        let allowed_user_ids = parse_allowed_ids(&allowed_raw)?;

        let assignments = match env::var(env_vars::USER_PROFILES) {
            Ok(raw) if !raw.trim().is_empty() => parse_user_profiles(&raw)?,
            _ => HashMap::new(),
        };
        let default_profile = env_var_or(env_vars::DEFAULT_PROFILE, defaults::DEFAULT_PROFILE);
        let profiles = ProfileAssignments::new(assignments, &default_profile);

        let config = Self {
            telegram_bot_token,
            allowed_user_ids,
            profiles,
            google_api_key: google_api_key(),
            llm_model: env_var_or(env_vars::LLM_MODEL, defaults::LLM_MODEL),
            feedback_timeout: Duration::from_secs(parse_u64_or(
                env_vars::FEEDBACK_TIMEOUT_SECS,
                defaults::FEEDBACK_TIMEOUT_SECS,
            )?),
            tokenstore_base: tokenstore_base_from_env(),
            poll_timeout_secs: parse_u64_or(
                env_vars::TELEGRAM_POLL_TIMEOUT_SECS,
                defaults::TELEGRAM_POLL_TIMEOUT_SECS,
            )?,
            http_timeout: Duration::from_secs(parse_u64_or(
                env_vars::HTTP_TIMEOUT_SECS,
                defaults::HTTP_TIMEOUT_SECS,
            )?),
        };

        if let Err(e) = ProfileKind::from_key(config.profiles.default_key()) {
            warn!("Default profile is not usable: {}", e);
        }

        Ok(config)
    }

    /// Whether `user` is on the allow-list
    #[must_use]
    pub fn is_allowed(&self, user: UserId) -> bool {
        self.allowed_user_ids.contains(&user)
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Bodycomp Relay Configuration:\n\
             - Authorized IDs: {}\n\
             - User Profiles: {}\n\
             - Default Profile: {}\n\
             - Tokenstore Base: {}\n\
             - AI Feedback: {}\n\
             - LLM Model: {}\n\
             - Poll Timeout: {}s",
            self.allowed_user_ids.len(),
            self.profiles.len(),
            self.profiles.default_key(),
            self.tokenstore_base.display(),
            if self.google_api_key.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
            self.llm_model,
            self.poll_timeout_secs
        )
    }
}

/// Settings of the Garmin backend and its feedback step
///
/// Shared by the bot, which derives them from [`BotConfig`], and the
/// submission CLI, which has no chat transport to configure.
#[derive(Clone)]
pub struct BackendSettings {
    /// Root directory of per-user tokenstores
    pub tokenstore_base: PathBuf,
    /// Google AI key; `None` disables AI feedback
    pub google_api_key: Option<String>,
    /// Gemini model for feedback
    pub llm_model: String,
    /// Upper bound on the whole feedback step
    pub feedback_timeout: Duration,
    /// Timeout for Garmin HTTP requests
    pub http_timeout: Duration,
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("tokenstore_base", &self.tokenstore_base)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("llm_model", &self.llm_model)
            .field("feedback_timeout", &self.feedback_timeout)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BackendSettings {
    /// Load backend settings alone, without the chat transport variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        Ok(Self {
            tokenstore_base: tokenstore_base_from_env(),
            google_api_key: google_api_key(),
            llm_model: env_var_or(env_vars::LLM_MODEL, defaults::LLM_MODEL),
            feedback_timeout: Duration::from_secs(parse_u64_or(
                env_vars::FEEDBACK_TIMEOUT_SECS,
                defaults::FEEDBACK_TIMEOUT_SECS,
            )?),
            http_timeout: Duration::from_secs(parse_u64_or(
                env_vars::HTTP_TIMEOUT_SECS,
                defaults::HTTP_TIMEOUT_SECS,
            )?),
        })
    }
}

impl From<&BotConfig> for BackendSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            tokenstore_base: config.tokenstore_base.clone(),
            google_api_key: config.google_api_key.clone(),
            llm_model: config.llm_model.clone(),
            feedback_timeout: config.feedback_timeout,
            http_timeout: config.http_timeout,
        }
    }
}

/// Google AI key, accepting `GEMINI_API_KEY` as a fallback
#[must_use]
pub fn google_api_key() -> Option<String> {
    [env_vars::GOOGLE_API_KEY, env_vars::GEMINI_API_KEY]
        .into_iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

/// Tokenstore base directory from `GARMINTOKENS_BASE`, with `~` expanded
#[must_use]
pub fn tokenstore_base_from_env() -> PathBuf {
    expand_home(&env_var_or(
        env_vars::GARMINTOKENS_BASE,
        defaults::GARMINTOKENS_BASE,
    ))
}

/// Tokenstore directory of one user: `<base>/tg_<id>`
#[must_use]
pub fn user_tokenstore(base: &Path, user: UserId) -> PathBuf {
    base.join(format!("{}{}", garmin::TOKENSTORE_PREFIX, user))
}

/// Parse the comma-separated allow-list
///
/// # Errors
///
/// Returns an error if an entry is not an integer or the list is empty
pub fn parse_allowed_ids(raw: &str) -> Result<HashSet<UserId>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UserId>().with_context(|| {
                format!(
                    "{} must contain a comma-separated list of integers",
                    env_vars::ALLOWED_TELEGRAM_ID
                )
            })
        })
        .collect::<Result<HashSet<_>>>()?;

    if ids.is_empty() {
        bail!("{} contains no user id", env_vars::ALLOWED_TELEGRAM_ID);
    }
    Ok(ids)
}

/// Parse `ID:PROFILE_KEY,ID2:PROFILE_KEY2`
///
/// Keys are upper-cased. Entries without `:` are skipped.
///
/// # Errors
///
/// Returns an error if an id does not parse as an integer
pub fn parse_user_profiles(raw: &str) -> Result<HashMap<UserId, String>> {
    raw.split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(id, key)| {
            let user = id.trim().parse::<UserId>().with_context(|| {
                format!(
                    "{} must be in the format 'ID:PROFILE_KEY,ID2:PROFILE_KEY2'",
                    env_vars::USER_PROFILES
                )
            })?;
            Ok((user, key.trim().to_ascii_uppercase()))
        })
        .collect()
}

/// Expand a leading `~` to the home directory
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn parse_u64_or(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value")),
        _ => Ok(default),
    }
}
