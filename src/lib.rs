// ABOUTME: Main library entry point for the body-composition relay
// ABOUTME: Wires chat transport, conversation state machine, Garmin backend and AI feedback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Bodycomp Relay
//!
//! A chat bot that relays body-composition readings typed by the user to
//! Garmin Connect.
//!
//! ## Features
//!
//! - **Device profiles**: OMRON (5 values) and Mi Scale (7 values) layouts
//! - **Login recovery**: token expiry, password re-entry and MFA codes are
//!   handled as conversational turns while the reading waits
//! - **Per-user tokenstore**: garth-compatible OAuth token files
//! - **AI feedback**: optional Gemini coaching tip after a successful upload
//!
//! ## Architecture
//!
//! - **Conversation**: per-user state machine, the only stateful piece
//! - **Backend**: submission contract and the Garmin Connect implementation
//! - **Feedback / LLM**: best-effort trend summary and tip generation
//! - **Telegram**: long-polling transport feeding the state machine
//! - **Config / Logging**: environment-driven setup
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bodycomp_relay::config::environment::BotConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BotConfig::from_env()?;
//!     println!("{}", config.summary());
//!     Ok(())
//! }
//! ```

/// Submission backend contract
pub mod backend;

/// Environment configuration
pub mod config;

/// Application constants
pub mod constants;

/// Per-user conversation state machine
pub mod conversation;

/// Best-effort AI feedback on body-composition trends
pub mod feedback;

/// Garmin Connect backend implementation
pub mod garmin;

/// LLM provider abstraction
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Telegram Bot API transport
pub mod telegram;

/// Utility functions and helpers
pub mod utils;

pub use bodycomp_core::{
    AppError, AppResult, ErrorCode, Measurement, ProfileKind, ResultCode, UserId, ValidationError,
};
