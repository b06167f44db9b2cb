// ABOUTME: Configuration module for the relay bot and submit CLI
// ABOUTME: Loads chat, profile, Garmin tokenstore and AI feedback settings from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module
//!
//! - **Environment**: [`environment::BotConfig`] read from environment variables
//!   (a `.env` file is honoured when present)
//! - **Profiles**: [`environment::ProfileAssignments`] mapping chat users to
//!   device profiles

/// Environment configuration
pub mod environment;
