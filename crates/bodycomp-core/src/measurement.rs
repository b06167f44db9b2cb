// ABOUTME: Normalized body-composition measurement record
// ABOUTME: Produced by device profiles, carried through authentication, encoded for upload
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Round to two decimal places, half away from zero
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One body-composition reading, normalized to metric units
///
/// `weight_kg` and `muscle_mass_kg` are always present; everything else
/// depends on what the measuring device reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Body weight in kilograms (always > 1)
    pub weight_kg: f64,
    /// Body mass index
    pub bmi: Option<f64>,
    /// Body fat percentage
    pub percent_fat: Option<f64>,
    /// Skeletal muscle percentage (derived for display on some profiles)
    pub percent_muscle: Option<f64>,
    /// Muscle mass in kilograms
    pub muscle_mass_kg: f64,
    /// Visceral fat rating (device scale, unitless)
    pub visceral_fat_rating: Option<i32>,
    /// Body water percentage
    pub percent_hydration: Option<f64>,
    /// Bone mass in kilograms
    pub bone_mass_kg: Option<f64>,
    /// Metabolic age in years
    pub metabolic_age: Option<u8>,
    /// Basal metabolic rate in kcal/day
    pub basal_met: Option<f64>,
}

impl Measurement {
    /// Create a measurement with only the mandatory fields set
    #[must_use]
    pub const fn new(weight_kg: f64, muscle_mass_kg: f64) -> Self {
        Self {
            weight_kg,
            bmi: None,
            percent_fat: None,
            percent_muscle: None,
            muscle_mass_kg,
            visceral_fat_rating: None,
            percent_hydration: None,
            bone_mass_kg: None,
            metabolic_age: None,
            basal_met: None,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weight {:.2} kg", self.weight_kg)?;
        if let Some(bmi) = self.bmi {
            write!(f, ", BMI {bmi:.1}")?;
        }
        if let Some(fat) = self.percent_fat {
            write!(f, ", fat {fat:.1}%")?;
        }
        write!(f, ", muscle {:.2} kg", self.muscle_mass_kg)?;
        if let Some(water) = self.percent_hydration {
            write!(f, ", water {water:.1}%")?;
        }
        if let Some(bone) = self.bone_mass_kg {
            write!(f, ", bone {bone:.2} kg")?;
        }
        if let Some(visceral) = self.visceral_fat_rating {
            write!(f, ", visceral {visceral}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert!((round2(28.4115) - 28.41).abs() < f64::EPSILON);
        assert!((round2(70.499) - 70.5).abs() < f64::EPSILON);
        assert!((round2(-1.005) - -1.0).abs() < 0.011);
    }

    #[test]
    fn test_display_skips_missing_fields() {
        let mut m = Measurement::new(70.5, 28.41);
        m.percent_fat = Some(18.2);
        assert_eq!(m.to_string(), "weight 70.50 kg, fat 18.2%, muscle 28.41 kg");
    }
}
