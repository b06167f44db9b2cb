// ABOUTME: Tests for device profile validation
// ABOUTME: Covers derived versus supplied muscle mass, weight bounds and line-count errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use bodycomp_core::measurement::round2;
use bodycomp_core::{prepare_lines, ProfileKind, ValidationError};

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// OMRON
// ============================================================================

#[test]
fn test_omron_reference_reading() {
    let lines = prepare_lines("70.5\n24.1\n18.2\n40.3\n5");
    let m = ProfileKind::Omron.parse(&lines).unwrap();

    assert!(approx_eq(m.weight_kg, 70.5));
    assert_eq!(m.bmi, Some(24.1));
    assert_eq!(m.percent_fat, Some(18.2));
    assert_eq!(m.percent_muscle, Some(40.3));
    assert_eq!(m.visceral_fat_rating, Some(5));
    assert!(approx_eq(m.muscle_mass_kg, 28.41));
    assert!(m.percent_hydration.is_none());
    assert!(m.bone_mass_kg.is_none());
}

#[test]
fn test_omron_muscle_mass_is_derived_for_every_reading() {
    let weights = [45.0, 58.25, 70.5, 83.33, 101.7, 150.0];
    let muscle_percents = [22.0, 30.5, 33.3, 40.3, 47.85];

    for weight in weights {
        for percent in muscle_percents {
            let text = format!("{weight}\n22.0\n20.0\n{percent}\n7");
            let lines = prepare_lines(&text);
            let m = ProfileKind::Omron.parse(&lines).unwrap();
            let expected = round2(weight * (percent / 100.0));
            assert!(
                approx_eq(m.muscle_mass_kg, expected),
                "weight={weight} percent={percent}: got {} expected {expected}",
                m.muscle_mass_kg
            );
        }
    }
}

#[test]
fn test_omron_requires_five_lines() {
    let lines = prepare_lines("70.5\n24.1\n18.2\n40.3");
    let err = ProfileKind::Omron.parse(&lines).unwrap_err();
    match err {
        ValidationError::InsufficientLines {
            profile,
            expected,
            found,
            ..
        } => {
            assert_eq!(profile, "OMRON");
            assert_eq!(expected, 5);
            assert_eq!(found, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_omron_ignores_extra_lines() {
    let lines = prepare_lines("70.5\n24.1\n18.2\n40.3\n5\nextra");
    assert!(ProfileKind::Omron.parse(&lines).is_ok());
}

#[test]
fn test_omron_rejects_non_numeric_field() {
    let lines = prepare_lines("70.5\nabc\n18.2\n40.3\n5");
    let err = ProfileKind::Omron.parse(&lines).unwrap_err();
    assert!(err.is_malformed_input());
    assert!(matches!(err, ValidationError::InvalidNumber { field: "bmi", .. }));
}

// ============================================================================
// MI_SCALE
// ============================================================================

#[test]
fn test_mi_scale_reference_reading() {
    let lines = prepare_lines("80.456\n25.3\n21.7\n55.1\n9\n3.123\n58.789");
    let m = ProfileKind::MiScale.parse(&lines).unwrap();

    assert!(approx_eq(m.weight_kg, 80.46));
    assert_eq!(m.percent_hydration, Some(55.1));
    assert_eq!(m.visceral_fat_rating, Some(9));
    assert_eq!(m.bone_mass_kg, Some(3.12));
    assert!(approx_eq(m.muscle_mass_kg, 58.79));
    let percent = m.percent_muscle.unwrap();
    assert!(approx_eq(percent, 58.79 / 80.46 * 100.0));
}

#[test]
fn test_mi_scale_muscle_mass_is_supplied_not_derived() {
    let supplied = [30.0, 41.555, 52.1, 60.004];
    for muscle in supplied {
        let text = format!("75.0\n24.0\n20.0\n55.0\n8\n3.0\n{muscle}");
        let lines = prepare_lines(&text);
        let m = ProfileKind::MiScale.parse(&lines).unwrap();
        assert!(approx_eq(m.muscle_mass_kg, round2(muscle)));
    }
}

#[test]
fn test_mi_scale_requires_seven_lines() {
    let lines = prepare_lines("70.5\n24.1\n18.2\n40.3\n5");
    let err = ProfileKind::MiScale.parse(&lines).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InsufficientLines {
            expected: 7,
            found: 5,
            ..
        }
    ));
    let message = err.to_string();
    assert!(message.starts_with("Se esperan 7 valores, uno por linea."), "{message}");
    assert!(message.ends_with("Masa ósea\nMúsculo"), "{message}");
}

#[test]
fn test_error_text_follows_the_profile_language() {
    let light = prepare_lines("0.8\n24.1\n18.2\n40.3\n5\n3.0\n30.0");

    let omron = ProfileKind::Omron.parse(&light).unwrap_err();
    assert_eq!(omron.to_string(), "Weight must be > 1 kg and positive (got 0.8).");

    let mi_scale = ProfileKind::MiScale.parse(&light).unwrap_err();
    assert_eq!(mi_scale.to_string(), "El peso debe ser > 1 kg y positivo.");

    let short = prepare_lines("70.5\n24.1");
    let omron = ProfileKind::Omron.parse(&short).unwrap_err();
    assert_eq!(
        omron.to_string(),
        "Expected 5 lines/values (weight, bmi, percent_fat, percent_muscle, visceral), got 2."
    );
}

// ============================================================================
// Shared rules
// ============================================================================

#[test]
fn test_weight_at_or_below_one_always_fails() {
    for weight in ["1", "1.0", "0.5", "0", "-70", "1.004"] {
        for kind in ProfileKind::ALL {
            let text = format!("{weight}\nx\ny\nz\nw\nv\nu");
            let lines = prepare_lines(&text);
            let err = kind.parse(&lines).unwrap_err();
            assert!(
                matches!(err, ValidationError::WeightOutOfRange { .. }),
                "{kind} accepted weight {weight}: {err:?}"
            );
        }
    }
}

#[test]
fn test_comment_lines_do_not_count_as_values() {
    let text = "# OMRON reading\n70.5 # kg\n24.1\n18.2\n40.3\n5";
    let lines = prepare_lines(text);
    assert_eq!(lines.len(), 5);
    assert!(ProfileKind::Omron.parse(&lines).is_ok());
}
