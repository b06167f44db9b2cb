// ABOUTME: Conversation layer turning chat messages into submission attempts
// ABOUTME: Hosts the per-user state machine and the reply texts it produces
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Conversation
//!
//! A user is `idle` until they send a measurement. If the backend cannot
//! upload it straight away the measurement is parked and the user is walked
//! through login, one message per step:
//!
//! ```text
//! idle --measurement--> backend
//!   token_invalid      -> awaiting_credentials (email + password)
//!   mfa_required       -> awaiting_mfa_code    (one-time code)
//!   success            -> idle
//!   submission_error   -> idle
//!   mfa_limit_exceeded -> idle
//! ```

/// Per-user state machine
pub mod machine;
/// Reply texts
pub mod replies;

pub use machine::{ConversationMachine, Phase};
