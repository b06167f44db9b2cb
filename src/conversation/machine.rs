// ABOUTME: Per-user submission state machine driving login recovery over chat turns
// ABOUTME: Owns pending measurements and credentials, routes backend result codes to replies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::replies;
use crate::backend::{Credentials, SubmissionBackend, SubmissionOutcome, SubmissionRequest};
use crate::config::environment::ProfileAssignments;
use crate::logging::AppLogger;
use bodycomp_core::{prepare_lines, Measurement, ResultCode, UserId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// Conversation phase of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Next message is a new measurement
    Idle,
    /// Next message should be email and password
    AwaitingCredentials,
    /// Next message should be a one-time code
    AwaitingMfaCode,
}

impl Phase {
    /// Short machine-friendly name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingCredentials => "awaiting_credentials",
            Self::AwaitingMfaCode => "awaiting_mfa_code",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-idle phases; an idle user has no entry at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Credentials,
    MfaCode,
}

impl From<Waiting> for Phase {
    fn from(waiting: Waiting) -> Self {
        match waiting {
            Waiting::Credentials => Self::AwaitingCredentials,
            Waiting::MfaCode => Self::AwaitingMfaCode,
        }
    }
}

/// A measurement parked while the user completes login
#[derive(Debug)]
struct PendingSubmission {
    waiting: Waiting,
    measurement: Measurement,
    credentials: Option<Credentials>,
}

/// Per-user conversation store plus transition logic
///
/// Every inbound message produces exactly one reply. Users outside the
/// allow-list never touch the store.
pub struct ConversationMachine<B> {
    backend: B,
    allowed: HashSet<UserId>,
    profiles: ProfileAssignments,
    pending: HashMap<UserId, PendingSubmission>,
}

impl<B: SubmissionBackend> ConversationMachine<B> {
    /// Create a machine with no conversation in progress
    #[must_use]
    pub fn new(backend: B, allowed: HashSet<UserId>, profiles: ProfileAssignments) -> Self {
        Self {
            backend,
            allowed,
            profiles,
            pending: HashMap::new(),
        }
    }

    /// Backend used for submissions
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Current phase of `user`
    #[must_use]
    pub fn phase(&self, user: UserId) -> Phase {
        self.pending
            .get(&user)
            .map_or(Phase::Idle, |pending| pending.waiting.into())
    }

    /// Measurement waiting for login to complete, if any
    #[must_use]
    pub fn pending_measurement(&self, user: UserId) -> Option<&Measurement> {
        self.pending.get(&user).map(|pending| &pending.measurement)
    }

    /// Whether credentials are held for `user`
    #[must_use]
    pub fn holds_credentials(&self, user: UserId) -> bool {
        self.pending
            .get(&user)
            .is_some_and(|pending| pending.credentials.is_some())
    }

    /// Number of users with a flow in progress
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Process one inbound text message and return the reply
    pub async fn handle(&mut self, user: UserId, text: &str) -> String {
        if !self.allowed.contains(&user) {
            AppLogger::log_unauthorized(user);
            return replies::unauthorized();
        }

        let text = text.trim();
        if text.is_empty() {
            return replies::no_text();
        }

        match self.pending.remove(&user) {
            None => self.start_submission(user, text).await,
            Some(pending) => match pending.waiting {
                Waiting::Credentials => self.resume_with_credentials(user, pending, text).await,
                Waiting::MfaCode => self.resume_with_mfa_code(user, pending, text).await,
            },
        }
    }

    async fn start_submission(&mut self, user: UserId, text: &str) -> String {
        let lines = prepare_lines(text);
        let measurement = match self
            .profiles
            .resolve(user)
            .and_then(|profile| profile.parse(&lines))
        {
            Ok(measurement) => measurement,
            Err(e) => {
                debug!(user.id = %user, error = %e, "Measurement rejected");
                return replies::validation_error(&e);
            }
        };

        debug!(user.id = %user, measurement = %measurement, "Measurement accepted");
        let outcome = self
            .submit(SubmissionRequest::new(user, &measurement))
            .await;
        self.route(user, Phase::Idle, measurement, None, outcome)
    }

    async fn resume_with_credentials(
        &mut self,
        user: UserId,
        pending: PendingSubmission,
        text: &str,
    ) -> String {
        let lines = message_lines(text);
        let [email, password] = lines.as_slice() else {
            self.pending.insert(user, pending);
            return replies::credentials_format();
        };

        let credentials = Credentials::new(email, password);
        let PendingSubmission { measurement, .. } = pending;
        let outcome = self
            .submit(SubmissionRequest::new(user, &measurement).with_credentials(Some(&credentials)))
            .await;
        self.route(
            user,
            Phase::AwaitingCredentials,
            measurement,
            Some(credentials),
            outcome,
        )
    }

    async fn resume_with_mfa_code(
        &mut self,
        user: UserId,
        pending: PendingSubmission,
        text: &str,
    ) -> String {
        let lines = message_lines(text);
        let [code] = lines.as_slice() else {
            self.pending.insert(user, pending);
            return replies::mfa_code_format();
        };

        let PendingSubmission {
            measurement,
            credentials,
            ..
        } = pending;
        let outcome = self
            .submit(
                SubmissionRequest::new(user, &measurement)
                    .with_credentials(credentials.as_ref())
                    .with_mfa_code(code),
            )
            .await;
        // Credentials are spent once a code has been tried
        drop(credentials);
        self.route(user, Phase::AwaitingMfaCode, measurement, None, outcome)
    }

    async fn submit(&self, request: SubmissionRequest<'_>) -> SubmissionOutcome {
        let started = Instant::now();
        let outcome = self.backend.submit(request).await;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        AppLogger::log_submission_outcome(request.user, outcome.code, elapsed);
        outcome
    }

    /// Apply a backend outcome: update the store and build the reply
    fn route(
        &mut self,
        user: UserId,
        from: Phase,
        measurement: Measurement,
        credentials: Option<Credentials>,
        outcome: SubmissionOutcome,
    ) -> String {
        let (next, reply) = match outcome.code {
            ResultCode::Success => (None, replies::success(outcome.success_text.as_deref())),
            ResultCode::TokenInvalid => (Some(Waiting::Credentials), replies::login_required()),
            ResultCode::MfaRequired => (Some(Waiting::MfaCode), replies::mfa_required()),
            ResultCode::MfaLimitExceeded => (None, replies::mfa_limit_exceeded()),
            ResultCode::SubmissionError => (
                None,
                replies::submission_failed(outcome.code, outcome.diagnostic.as_deref()),
            ),
        };

        let to = next.map_or(Phase::Idle, Phase::from);
        if let Some(waiting) = next {
            // Re-requested credentials replace whatever was held
            let credentials = match waiting {
                Waiting::Credentials => None,
                Waiting::MfaCode => credentials,
            };
            self.pending.insert(
                user,
                PendingSubmission {
                    waiting,
                    measurement,
                    credentials,
                },
            );
        }

        if from != to {
            AppLogger::log_phase_transition(user, from.as_str(), to.as_str());
        }
        reply
    }
}

/// Trimmed, non-empty lines of a reply
fn message_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
