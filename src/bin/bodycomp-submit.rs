// ABOUTME: One-shot CLI submitting a single body-composition reading to Garmin Connect
// ABOUTME: Exits with the numeric result code so scripts can drive login recovery
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Bodycomp Submit Binary
//!
//! Exit status: 0 success, 1 submission error, 2 token invalid, 3 MFA
//! required, 4 MFA limit exceeded. Feedback text goes to stdout, everything
//! else to stderr.

use std::process::ExitCode;

use anyhow::Result;
use bodycomp_relay::{
    backend::{Credentials, SubmissionBackend, SubmissionRequest},
    config::environment::BackendSettings,
    constants::service_names,
    garmin::GarminBackend,
    logging::LoggingConfig,
    Measurement, ResultCode, UserId,
};
use clap::Parser;
use tracing::error;

#[derive(Parser)]
#[command(name = "bodycomp-submit")]
#[command(about = "Add body composition data to Garmin Connect")]
struct Args {
    /// Chat user id selecting the tokenstore
    #[arg(long)]
    user_id: i64,

    /// Garmin account email address
    #[arg(long)]
    email: Option<String>,

    /// Garmin account password
    #[arg(long)]
    password: Option<String>,

    /// Multi-factor authentication code
    #[arg(long)]
    mfa_code: Option<String>,

    /// Weight in kg
    #[arg(long)]
    weight: f64,

    /// Muscle mass in kg
    #[arg(long)]
    muscle_mass: f64,

    /// Body mass index
    #[arg(long)]
    bmi: Option<f64>,

    /// Body fat percentage
    #[arg(long)]
    percent_fat: Option<f64>,

    /// Visceral fat rating
    #[arg(long)]
    visceral_fat_rating: Option<i32>,

    /// Body water percentage
    #[arg(long)]
    percent_hydration: Option<f64>,

    /// Bone mass in kg
    #[arg(long)]
    bone_mass: Option<f64>,

    /// Metabolic age in years
    #[arg(long)]
    metabolic_age: Option<u8>,

    /// Basal metabolic rate in kcal/day
    #[arg(long)]
    basal_met: Option<f64>,
}

impl Args {
    fn measurement(&self) -> Measurement {
        Measurement {
            bmi: self.bmi,
            percent_fat: self.percent_fat,
            visceral_fat_rating: self.visceral_fat_rating,
            percent_hydration: self.percent_hydration,
            bone_mass_kg: self.bone_mass,
            metabolic_age: self.metabolic_age,
            basal_met: self.basal_met,
            ..Measurement::new(self.weight, self.muscle_mass)
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(Credentials::new(email, password))
            }
            _ => None,
        }
    }
}

async fn run(args: &Args) -> Result<ResultCode> {
    let settings = BackendSettings::from_env()?;
    let backend = GarminBackend::from_settings(&settings);

    let measurement = args.measurement();
    let credentials = args.credentials();
    let mut request =
        SubmissionRequest::new(UserId(args.user_id), &measurement).with_credentials(credentials.as_ref());
    if let Some(code) = args.mfa_code.as_deref() {
        request = request.with_mfa_code(code);
    }

    let outcome = backend.submit(request).await;
    if let Some(diagnostic) = &outcome.diagnostic {
        eprintln!("{diagnostic}");
    }
    if let Some(text) = &outcome.success_text {
        println!("{text}");
    }
    Ok(outcome.code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    if let Err(e) = LoggingConfig::from_env_for(service_names::BODYCOMP_SUBMIT).init() {
        eprintln!("Logging initialization failed: {e}");
    }

    match run(&args).await {
        Ok(code) => ExitCode::from(code.exit_code()),
        Err(e) => {
            error!("Submission could not start: {e:#}");
            ExitCode::from(ResultCode::SubmissionError.exit_code())
        }
    }
}
