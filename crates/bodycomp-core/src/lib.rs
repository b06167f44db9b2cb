// ABOUTME: Core types for the body-composition relay
// ABOUTME: Foundation crate with error handling, measurement model, profiles and result codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Bodycomp Core
//!
//! Foundation crate shared by the relay bot and the submission CLI. It holds
//! everything that is pure data or pure computation, so it can be tested
//! without any network collaborator.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **measurement**: The normalized body-composition record
//! - **profiles**: Device profiles that turn raw text lines into measurements
//! - **result_code**: Outcome codes exchanged between backend and conversation
//! - **ids**: Chat user identifiers

/// Unified error handling system with standard error codes
pub mod errors;

/// Chat user identifiers
pub mod ids;

/// Normalized body-composition measurement record
pub mod measurement;

/// Device profiles and input validation
pub mod profiles;

/// Submission result codes
pub mod result_code;

pub use errors::{AppError, AppResult, ErrorCode};
pub use ids::UserId;
pub use measurement::Measurement;
pub use profiles::{prepare_lines, ProfileKind, ValidationError};
pub use result_code::ResultCode;
