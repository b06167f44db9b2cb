// ABOUTME: Integration tests for best-effort AI feedback generation
// ABOUTME: Uses mock history and LLM providers, with paused time for the timeout path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use async_trait::async_trait;
use bodycomp_relay::feedback::{
    BodyCompositionHistory, FeedbackGenerator, WeightEntry, SYSTEM_PROMPT,
};
use bodycomp_relay::llm::{ChatRequest, ChatResponse, LlmProvider, MessageRole};
use bodycomp_relay::{AppError, AppResult, ErrorCode};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test doubles
// ============================================================================

enum Reply {
    Text(&'static str),
    Fail,
    Reject,
    FailThenText(&'static str),
    Hang,
}

fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: text.to_owned(),
        model: "mock-model".to_owned(),
        usage: None,
        finish_reason: Some("STOP".to_owned()),
    }
}

struct MockProvider {
    reply: Reply,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn display_name(&self) -> &'static str {
        "Mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let attempt = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        match self.reply {
            Reply::Text(text) => Ok(text_response(text)),
            Reply::Fail => Err(AppError::new(ErrorCode::ExternalRateLimited, "quota")),
            Reply::Reject => Err(AppError::new(ErrorCode::ExternalAuthFailed, "bad key")),
            Reply::FailThenText(text) if attempt > 1 => Ok(text_response(text)),
            Reply::FailThenText(_) => Err(AppError::external_unavailable("Gemini", "503")),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::internal("unreachable"))
            }
        }
    }
}

struct MockHistory {
    entries: Option<Vec<WeightEntry>>,
    ranges: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl MockHistory {
    fn with(entries: Vec<WeightEntry>) -> Self {
        Self {
            entries: Some(entries),
            ranges: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            entries: None,
            ranges: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BodyCompositionHistory for MockHistory {
    async fn body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<WeightEntry>> {
        self.ranges.lock().unwrap().push((start, end));
        self.entries
            .clone()
            .ok_or_else(|| AppError::external_service("Garmin", "HTTP error: 500"))
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
}

fn two_readings() -> Vec<WeightEntry> {
    vec![
        WeightEntry {
            calendar_date: "2025-02-01".into(),
            weight: Some(71_000.0),
            body_fat: Some(19.0),
            muscle_mass: Some(28_000.0),
        },
        WeightEntry {
            calendar_date: "2025-03-01".into(),
            weight: Some(70_500.0),
            body_fat: Some(18.2),
            muscle_mass: Some(28_410.0),
        },
    ]
}

fn generator(provider: &Arc<MockProvider>) -> FeedbackGenerator {
    FeedbackGenerator::new(
        Arc::clone(provider) as Arc<dyn LlmProvider>,
        "gemini-2.5-flash-lite",
        Duration::from_secs(15),
    )
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_feedback_text_is_trimmed_and_returned() {
    let provider = MockProvider::new(Reply::Text("  Down 0.5 kg, keep going! 🎉 \n"));
    let history = MockHistory::with(two_readings());

    let text = generator(&provider).generate(&history, today()).await;

    assert_eq!(text.as_deref(), Some("Down 0.5 kg, keep going! 🎉"));
}

#[tokio::test]
async fn test_history_window_is_ninety_days() {
    let provider = MockProvider::new(Reply::Text("ok"));
    let history = MockHistory::with(two_readings());

    generator(&provider).generate(&history, today()).await;

    let ranges = history.ranges.lock().unwrap().clone();
    assert_eq!(
        ranges,
        vec![(NaiveDate::from_ymd_opt(2024, 12, 2).unwrap(), today())]
    );
}

#[tokio::test]
async fn test_prompt_carries_trends_and_coach_persona() {
    let provider = MockProvider::new(Reply::Text("ok"));
    let history = MockHistory::with(two_readings());

    generator(&provider).generate(&history, today()).await;

    let request = provider.requests.lock().unwrap()[0].clone();
    assert_eq!(request.model.as_deref(), Some("gemini-2.5-flash-lite"));
    assert_eq!(request.temperature, Some(0.0));
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
    let query = &request.messages[1].content;
    assert!(query.contains("on 2025-03-01"), "{query}");
    assert!(
        query.contains(
            "Metrics: Weight change: -0.50 kg.; Body Fat change: -0.80%.; Muscle Mass change: +0.41 kg.."
        ),
        "{query}"
    );
}

// ============================================================================
// Failures are absorbed
// ============================================================================

#[tokio::test]
async fn test_disabled_generator_never_fetches_history() {
    let history = MockHistory::with(two_readings());

    let text = FeedbackGenerator::disabled().generate(&history, today()).await;

    assert!(text.is_none());
    assert!(history.ranges.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_provider_is_retried_then_gives_up() {
    let provider = MockProvider::new(Reply::Fail);
    let history = MockHistory::with(two_readings());

    assert!(generator(&provider).generate(&history, today()).await.is_none());
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_rejected_key_is_not_retried() {
    let provider = MockProvider::new(Reply::Reject);
    let history = MockHistory::with(two_readings());

    assert!(generator(&provider).generate(&history, today()).await.is_none());
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_outage_recovers_on_retry() {
    let provider = MockProvider::new(Reply::FailThenText("Back on track 💪"));
    let history = MockHistory::with(two_readings());

    let text = generator(&provider).generate(&history, today()).await;

    assert_eq!(text.as_deref(), Some("Back on track 💪"));
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_blank_reply_yields_none() {
    let provider = MockProvider::new(Reply::Text("   "));
    let history = MockHistory::with(two_readings());

    assert!(generator(&provider).generate(&history, today()).await.is_none());
}

#[tokio::test]
async fn test_history_error_skips_the_model() {
    let provider = MockProvider::new(Reply::Text("ok"));
    let history = MockHistory::failing();

    assert!(generator(&provider).generate(&history, today()).await.is_none());
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_empty_history_skips_the_model() {
    let provider = MockProvider::new(Reply::Text("ok"));
    let history = MockHistory::with(Vec::new());

    assert!(generator(&provider).generate(&history, today()).await.is_none());
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_model_times_out() {
    let provider = MockProvider::new(Reply::Hang);
    let history = MockHistory::with(two_readings());

    let started = tokio::time::Instant::now();
    let text = generator(&provider).generate(&history, today()).await;

    assert!(text.is_none());
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert!(started.elapsed() < Duration::from_secs(3600));
}
