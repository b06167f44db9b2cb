// ABOUTME: Best-effort AI coaching feedback after a successful upload
// ABOUTME: Summarises recent body-composition trends and asks the LLM for a short message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Feedback
//!
//! After a reading has been uploaded the relay looks back over the last
//! [`HISTORY_DAYS`] of body-composition entries, compares the two most
//! recent complete readings and asks an LLM to turn the deltas into one
//! upbeat sentence. Nothing in here can fail a submission: every error,
//! timeout or empty answer ends as `None` plus a warning in the log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::environment::BackendSettings;
use crate::constants::feedback::{
    HISTORY_DAYS, INITIAL_BACKOFF_MS, MAX_FEEDBACK_CHARS, MAX_RETRIES,
};
use crate::llm::{ChatMessage, ChatRequest, ChatResponse, GeminiProvider, LlmProvider};
use crate::logging::AppLogger;
use bodycomp_core::measurement::round2;
use bodycomp_core::{AppError, AppResult};

/// Coach persona sent as the system instruction
pub const SYSTEM_PROMPT: &str = "Act as a friendly, motivating, and highly concise fitness coach. \
Your response MUST be under 260 characters. Do not use quotes, only the message text with some emojis.";

/// One day of the Connect weight history, as Garmin reports it
///
/// `weight` and `muscle_mass` are in grams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightEntry {
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub calendar_date: String,
    /// Weight in grams
    #[serde(default)]
    pub weight: Option<f64>,
    /// Body fat percent
    #[serde(default)]
    pub body_fat: Option<f64>,
    /// Muscle mass in grams
    #[serde(default)]
    pub muscle_mass: Option<f64>,
}

/// Source of recent body-composition history
#[async_trait]
pub trait BodyCompositionHistory: Send + Sync {
    /// Entries logged between `start` and `end`, inclusive
    async fn body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<WeightEntry>>;
}

/// A normalised history entry, in kilograms and percent
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    /// Calendar date as reported
    pub date: String,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Body fat percent
    pub body_fat_percent: Option<f64>,
    /// Muscle mass in kg
    pub muscle_mass_kg: Option<f64>,
}

/// Zero and missing both mean "not measured"
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

impl From<&WeightEntry> for TrendPoint {
    fn from(entry: &WeightEntry) -> Self {
        Self {
            date: entry.calendar_date.clone(),
            weight_kg: present(entry.weight).map(|grams| grams / 1000.0),
            body_fat_percent: entry.body_fat,
            muscle_mass_kg: present(entry.muscle_mass).map(|grams| grams / 1000.0),
        }
    }
}

/// Latest reading and the one it is compared against
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    /// Newest reading
    pub latest: TrendPoint,
    /// Previous complete reading, if any
    pub previous: Option<TrendPoint>,
}

impl TrendSummary {
    /// Pick the readings to compare
    ///
    /// Entries are ordered newest first. Only entries with a positive body
    /// fat value count as complete; when none exist the newest entry is used
    /// alone. Returns `None` for an empty history or a latest entry without
    /// a weight.
    #[must_use]
    pub fn from_entries(mut entries: Vec<WeightEntry>) -> Option<Self> {
        entries.sort_by(|a, b| b.calendar_date.cmp(&a.calendar_date));

        let complete: Vec<&WeightEntry> = entries
            .iter()
            .filter(|e| e.body_fat.is_some_and(|fat| fat > 0.0))
            .collect();

        let (latest, previous) = match complete.as_slice() {
            [] => (entries.first()?, None),
            [latest, rest @ ..] => (*latest, rest.first().copied()),
        };

        let latest = TrendPoint::from(latest);
        latest.weight_kg?;
        Some(Self {
            latest,
            previous: previous.map(TrendPoint::from),
        })
    }

    /// Human-readable deltas fed to the model
    #[must_use]
    pub fn metric_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        let latest = &self.latest;
        let previous = self.previous.as_ref();

        let latest_weight = latest.weight_kg.unwrap_or_default();
        match previous.and_then(|p| present(p.weight_kg)) {
            Some(before) => lines.push(format!(
                "Weight change: {:+.2} kg.",
                round2(latest_weight - before)
            )),
            None => lines.push(format!(
                "Current weight: {latest_weight:.2} kg. No recent weight comparison."
            )),
        }

        if let (Some(now), Some(before)) = (
            present(latest.body_fat_percent),
            previous.and_then(|p| present(p.body_fat_percent)),
        ) {
            lines.push(format!("Body Fat change: {:+.2}%.", round2(now - before)));
        }

        if let (Some(now), Some(before)) = (
            present(latest.muscle_mass_kg),
            previous.and_then(|p| present(p.muscle_mass_kg)),
        ) {
            lines.push(format!(
                "Muscle Mass change: {:+.2} kg.",
                round2(now - before)
            ));
        }

        lines
    }

    /// Prompt describing the new reading
    #[must_use]
    pub fn user_query(&self) -> String {
        format!(
            "The user logged new body composition data on {}. Metrics: {}. \
             Generate a short, motivating feedback message (under {MAX_FEEDBACK_CHARS} characters) \
             focusing on the most positive trend, such as fat loss or muscle gain. \
             If data is limited or neutral, focus on consistency.",
            self.latest.date,
            self.metric_lines().join("; ")
        )
    }

    /// Chat request for this summary
    #[must_use]
    pub fn chat_request(&self, model: &str) -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(self.user_query()),
        ])
        .with_model(model)
        .with_temperature(0.0)
    }
}

/// Produces optional feedback text for a successful upload
#[derive(Clone)]
pub struct FeedbackGenerator {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for FeedbackGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackGenerator")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FeedbackGenerator {
    /// Generator backed by `provider`
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            timeout,
        }
    }

    /// Generator that never produces feedback
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            provider: None,
            model: String::new(),
            timeout: Duration::ZERO,
        }
    }

    /// Gemini-backed generator when an API key is configured
    #[must_use]
    pub fn from_settings(settings: &BackendSettings) -> Self {
        settings.google_api_key.as_ref().map_or_else(Self::disabled, |key| {
            let provider = GeminiProvider::new(key.clone()).with_default_model(&settings.llm_model);
            Self::new(Arc::new(provider), &settings.llm_model, settings.feedback_timeout)
        })
    }

    /// Feedback for the history ending `today`, or `None`
    pub async fn generate(
        &self,
        history: &dyn BodyCompositionHistory,
        today: NaiveDate,
    ) -> Option<String> {
        let provider = self.provider.as_deref()?;

        match tokio::time::timeout(self.timeout, self.run(provider, history, today)).await {
            Ok(Ok(Some(text))) => Some(text),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                AppLogger::log_feedback_failure(&e.to_string());
                None
            }
            Err(_) => {
                AppLogger::log_feedback_failure(&format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ));
                None
            }
        }
    }

    async fn run(
        &self,
        provider: &dyn LlmProvider,
        history: &dyn BodyCompositionHistory,
        today: NaiveDate,
    ) -> AppResult<Option<String>> {
        let start = today - chrono::Duration::days(HISTORY_DAYS);
        let entries = history.body_composition(start, today).await?;
        debug!(entries = entries.len(), "Fetched body composition history");

        let Some(summary) = TrendSummary::from_entries(entries) else {
            debug!("No usable body composition history for feedback");
            return Ok(None);
        };

        let response = complete_with_retry(provider, &summary.chat_request(&self.model)).await?;
        let text = response.content.trim();
        if text.is_empty() {
            AppLogger::log_feedback_failure("empty model reply");
            return Ok(None);
        }
        Ok(Some(text.to_owned()))
    }
}

/// Ask the model, retrying rate limits and outages with exponential backoff
async fn complete_with_retry(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
) -> Result<ChatResponse, AppError> {
    let mut attempt = 0;
    loop {
        match provider.complete(request).await {
            Err(e) if e.code.is_transient() && attempt < MAX_RETRIES => {
                attempt += 1;
                let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "LLM call failed - retry {attempt}/{MAX_RETRIES} after {backoff_ms}ms backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, weight: f64, fat: f64, muscle: f64) -> WeightEntry {
        WeightEntry {
            calendar_date: date.to_owned(),
            weight: Some(weight),
            body_fat: Some(fat),
            muscle_mass: Some(muscle),
        }
    }

    #[test]
    fn test_weight_entry_deserializes_garmin_json() {
        let json = r#"{"calendarDate":"2025-03-01","weight":70500.0,"bodyFat":18.2,"muscleMass":28410.0,"bmi":24.1}"#;
        let parsed: WeightEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, entry("2025-03-01", 70_500.0, 18.2, 28_410.0));
    }

    #[test]
    fn test_picks_two_newest_complete_entries() {
        let summary = TrendSummary::from_entries(vec![
            entry("2025-02-01", 71_000.0, 19.0, 28_000.0),
            entry("2025-03-01", 70_500.0, 18.2, 28_410.0),
            entry("2025-03-02", 70_400.0, 0.0, 0.0),
            entry("2025-01-01", 72_000.0, 20.0, 27_800.0),
        ])
        .unwrap();

        assert_eq!(summary.latest.date, "2025-03-01");
        assert_eq!(summary.previous.map(|p| p.date).as_deref(), Some("2025-02-01"));
    }

    #[test]
    fn test_falls_back_to_newest_without_body_fat() {
        let summary = TrendSummary::from_entries(vec![
            WeightEntry {
                calendar_date: "2025-03-01".into(),
                weight: Some(70_000.0),
                ..WeightEntry::default()
            },
            WeightEntry {
                calendar_date: "2025-03-05".into(),
                weight: Some(69_500.0),
                ..WeightEntry::default()
            },
        ])
        .unwrap();

        assert_eq!(summary.latest.date, "2025-03-05");
        assert!(summary.previous.is_none());
        assert_eq!(
            summary.metric_lines(),
            vec!["Current weight: 69.50 kg. No recent weight comparison."]
        );
    }

    #[test]
    fn test_empty_or_weightless_history_gives_nothing() {
        assert!(TrendSummary::from_entries(Vec::new()).is_none());
        assert!(TrendSummary::from_entries(vec![WeightEntry {
            calendar_date: "2025-03-01".into(),
            weight: Some(0.0),
            body_fat: Some(18.0),
            muscle_mass: None,
        }])
        .is_none());
    }

    #[test]
    fn test_metric_lines_are_signed_deltas() {
        let summary = TrendSummary::from_entries(vec![
            entry("2025-03-01", 70_500.0, 18.2, 28_410.0),
            entry("2025-02-01", 71_000.0, 19.0, 28_000.0),
        ])
        .unwrap();

        assert_eq!(
            summary.metric_lines(),
            vec![
                "Weight change: -0.50 kg.",
                "Body Fat change: -0.80%.",
                "Muscle Mass change: +0.41 kg.",
            ]
        );
    }

    #[test]
    fn test_user_query_mentions_date_and_metrics() {
        let summary =
            TrendSummary::from_entries(vec![entry("2025-03-01", 70_500.0, 18.2, 28_410.0)])
                .unwrap();
        let query = summary.user_query();
        assert!(query.starts_with("The user logged new body composition data on 2025-03-01. "));
        assert!(query.contains("Metrics: Current weight: 70.50 kg. No recent weight comparison.."));
        assert!(query.contains("under 260 characters"));
    }

    #[test]
    fn test_chat_request_shape() {
        let summary =
            TrendSummary::from_entries(vec![entry("2025-03-01", 70_500.0, 18.2, 28_410.0)])
                .unwrap();
        let request = summary.chat_request("gemini-2.5-flash-lite");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.model.as_deref(), Some("gemini-2.5-flash-lite"));
    }
}
