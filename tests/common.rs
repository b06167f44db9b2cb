// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Provides a scripted submission backend and conversation machine builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `bodycomp_relay`

use async_trait::async_trait;
use bodycomp_relay::backend::{SubmissionBackend, SubmissionOutcome, SubmissionRequest};
use bodycomp_relay::config::environment::ProfileAssignments;
use bodycomp_relay::conversation::ConversationMachine;
use bodycomp_relay::{Measurement, ResultCode, UserId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Allowed test user with the default (OMRON) profile
pub const ALICE: UserId = UserId(1001);
/// Allowed test user assigned the Mi Scale profile
pub const BOB: UserId = UserId(1002);
/// User outside the allow-list
pub const MALLORY: UserId = UserId(6666);

/// Valid OMRON reading
pub const OMRON_READING: &str = "70.5\n24.1\n18.2\n40.3\n5";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// What the backend saw on one call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub user: UserId,
    pub measurement: Measurement,
    pub email: Option<String>,
    pub password: Option<String>,
    pub mfa_code: Option<String>,
}

/// Backend answering from a script, recording every request
///
/// Once the script runs out every call succeeds without feedback.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<SubmissionOutcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new(outcomes: impl IntoIterator<Item = SubmissionOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn codes(codes: &[ResultCode]) -> Self {
        Self::new(codes.iter().copied().map(SubmissionOutcome::from_code))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls.lock().unwrap().last().cloned().expect("backend was never called")
    }
}

#[async_trait]
impl SubmissionBackend for ScriptedBackend {
    async fn submit(&self, request: SubmissionRequest<'_>) -> SubmissionOutcome {
        self.calls.lock().unwrap().push(RecordedCall {
            user: request.user,
            measurement: request.measurement.clone(),
            email: request.credentials.map(|c| c.email().to_owned()),
            password: request.credentials.map(|c| c.password().to_owned()),
            mfa_code: request.mfa_code.map(str::to_owned),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| SubmissionOutcome::success(None))
    }
}

/// Profile assignments used by most tests: BOB on Mi Scale, default OMRON
pub fn test_profiles() -> ProfileAssignments {
    let mut assignments = HashMap::new();
    assignments.insert(BOB, "MI_SCALE".to_owned());
    ProfileAssignments::new(assignments, "OMRON")
}

/// Machine allowing ALICE and BOB
pub fn machine_with(backend: ScriptedBackend) -> ConversationMachine<ScriptedBackend> {
    init_test_logging();
    let allowed: HashSet<UserId> = [ALICE, BOB].into_iter().collect();
    ConversationMachine::new(backend, allowed, test_profiles())
}
