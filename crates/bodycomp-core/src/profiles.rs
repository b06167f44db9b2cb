// ABOUTME: Device profiles that validate raw text lines into measurements
// ABOUTME: Closed set of profiles (OMRON, MI_SCALE) sharing one parse capability
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Measurement Profiles
//!
//! A profile is the schema a particular scale prints: how many values the
//! user types, in which order, and which of them are derived. Profiles are a
//! closed enum ([`ProfileKind`]); each variant delegates to a type
//! implementing [`ProfileSchema`].
//!
//! Input lines are expected to be prepared with [`prepare_lines`] first.

use crate::measurement::{round2, Measurement};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation failures for user-typed measurements
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The profile key assigned to the user is not a known profile
    #[error("Unknown profile key: {key}")]
    UnknownProfile {
        /// Key as configured
        key: String,
    },
    /// Fewer lines than the profile requires
    #[error("{}", insufficient_lines_message(.profile, *.expected, *.found, .fields))]
    InsufficientLines {
        /// Profile key
        profile: &'static str,
        /// Number of values the profile needs
        expected: usize,
        /// Number of values received
        found: usize,
        /// Comma-separated field names, in input order
        fields: String,
    },
    /// A value failed numeric parsing
    #[error("Value for {field} is not a valid number: '{value}'")]
    InvalidNumber {
        /// Field being parsed
        field: &'static str,
        /// Raw input
        value: String,
    },
    /// Weight must be strictly greater than 1 kg
    #[error("{}", weight_out_of_range_message(.profile, *.weight))]
    WeightOutOfRange {
        /// Profile key
        profile: &'static str,
        /// Parsed weight
        weight: f64,
    },
}

// MI_SCALE users get their prompts in Spanish
const MI_SCALE_FIELD_LABELS: &str = "Peso\nIMC\nGrasa\nAgua\nGrasa visceral\nMasa ósea\nMúsculo";

fn insufficient_lines_message(profile: &str, expected: usize, found: usize, fields: &str) -> String {
    match profile {
        MiScaleProfile::KEY => format!(
            "Se esperan {expected} valores, uno por linea.\nEn este orden: \n\n{MI_SCALE_FIELD_LABELS}"
        ),
        _ => format!("Expected {expected} lines/values ({fields}), got {found}."),
    }
}

fn weight_out_of_range_message(profile: &str, weight: f64) -> String {
    match profile {
        MiScaleProfile::KEY => "El peso debe ser > 1 kg y positivo.".to_owned(),
        _ => format!("Weight must be > 1 kg and positive (got {weight})."),
    }
}

impl ValidationError {
    /// True when the input itself is malformed (as opposed to a configuration problem)
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        !matches!(self, Self::UnknownProfile { .. })
    }
}

/// Split a chat message into measurement lines
///
/// Everything from the first `#` on a line is a comment. Lines are trimmed
/// and empty lines are dropped.
#[must_use]
pub fn prepare_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Capability shared by every profile: turn prepared lines into a measurement
pub trait ProfileSchema {
    /// Configuration key of the profile
    const KEY: &'static str;
    /// Field names in the order the user types them
    const FIELDS: &'static [&'static str];

    /// Validate and convert prepared lines
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when lines are missing, a value is not
    /// numeric or the weight is out of range.
    fn parse(lines: &[&str]) -> Result<Measurement, ValidationError>;

    /// Fail unless at least `FIELDS.len()` lines are present
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InsufficientLines`].
    fn require_lines(lines: &[&str]) -> Result<(), ValidationError> {
        if lines.len() < Self::FIELDS.len() {
            return Err(ValidationError::InsufficientLines {
                profile: Self::KEY,
                expected: Self::FIELDS.len(),
                found: lines.len(),
                fields: Self::FIELDS.join(", "),
            });
        }
        Ok(())
    }
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            value: raw.to_owned(),
        })
}

fn parse_i32(field: &'static str, raw: &str) -> Result<i32, ValidationError> {
    raw.parse::<i32>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_owned(),
        })
}

fn parse_weight(profile: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let weight = round2(parse_f64("weight", raw)?);
    if weight <= 1.0 {
        return Err(ValidationError::WeightOutOfRange { profile, weight });
    }
    Ok(weight)
}

/// OMRON body-composition monitors: five values, muscle mass derived
pub struct OmronProfile;

impl ProfileSchema for OmronProfile {
    const KEY: &'static str = "OMRON";
    const FIELDS: &'static [&'static str] =
        &["weight", "bmi", "percent_fat", "percent_muscle", "visceral"];

    fn parse(lines: &[&str]) -> Result<Measurement, ValidationError> {
        Self::require_lines(lines)?;

        let weight = parse_weight(Self::KEY, lines[0])?;
        let bmi = parse_f64("bmi", lines[1])?;
        let percent_fat = parse_f64("percent_fat", lines[2])?;
        let percent_muscle = parse_f64("percent_muscle", lines[3])?;
        let visceral = parse_i32("visceral", lines[4])?;

        let mut measurement = Measurement::new(weight, round2(weight * (percent_muscle / 100.0)));
        measurement.bmi = Some(bmi);
        measurement.percent_fat = Some(percent_fat);
        measurement.percent_muscle = Some(percent_muscle);
        measurement.visceral_fat_rating = Some(visceral);
        Ok(measurement)
    }
}

/// Xiaomi Mi body-composition scales: seven values, muscle mass supplied in kg
pub struct MiScaleProfile;

impl ProfileSchema for MiScaleProfile {
    const KEY: &'static str = "MI_SCALE";
    const FIELDS: &'static [&'static str] = &[
        "weight",
        "bmi",
        "percent_fat",
        "percent_hydration",
        "visceral",
        "bone_mass",
        "muscle_mass",
    ];

    fn parse(lines: &[&str]) -> Result<Measurement, ValidationError> {
        Self::require_lines(lines)?;

        let weight = parse_weight(Self::KEY, lines[0])?;
        let bmi = parse_f64("bmi", lines[1])?;
        let percent_fat = parse_f64("percent_fat", lines[2])?;
        let percent_hydration = parse_f64("percent_hydration", lines[3])?;
        let visceral = parse_i32("visceral", lines[4])?;
        let bone_mass = round2(parse_f64("bone_mass", lines[5])?);
        let muscle_mass = round2(parse_f64("muscle_mass", lines[6])?);

        let mut measurement = Measurement::new(weight, muscle_mass);
        measurement.bmi = Some(bmi);
        measurement.percent_fat = Some(percent_fat);
        // display only; never uploaded for this profile's muscle figure
        measurement.percent_muscle = Some(muscle_mass / weight * 100.0);
        measurement.visceral_fat_rating = Some(visceral);
        measurement.percent_hydration = Some(percent_hydration);
        measurement.bone_mass_kg = Some(bone_mass);
        Ok(measurement)
    }
}

/// Known measuring-device profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileKind {
    /// Five-line OMRON layout
    Omron,
    /// Seven-line Mi Scale layout
    MiScale,
}

impl ProfileKind {
    /// Every known profile
    pub const ALL: [Self; 2] = [Self::Omron, Self::MiScale];

    /// Resolve a configuration key (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownProfile`] for keys that name no profile.
    pub fn from_key(key: &str) -> Result<Self, ValidationError> {
        let normalized = key.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| ValidationError::UnknownProfile {
                key: key.trim().to_owned(),
            })
    }

    /// Configuration key
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Omron => OmronProfile::KEY,
            Self::MiScale => MiScaleProfile::KEY,
        }
    }

    /// Validate prepared lines under this profile
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first problem found.
    pub fn parse(self, lines: &[&str]) -> Result<Measurement, ValidationError> {
        match self {
            Self::Omron => OmronProfile::parse(lines),
            Self::MiScale => MiScaleProfile::parse(lines),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
