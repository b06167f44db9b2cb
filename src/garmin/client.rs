// ABOUTME: Authenticated Garmin Connect API client for uploads and weight history
// ABOUTME: Sends FIT files to the upload service and reads the weight date-range endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::error::GarminError;
use super::oauth::OAuth2Token;
use crate::constants::garmin::{
    CONNECT_API_BASE, SOCIAL_PROFILE_PATH, UPLOAD_FILE_NAME, UPLOAD_PATH, WEIGHT_RANGE_PATH,
};
use crate::feedback::{BodyCompositionHistory, WeightEntry};
use async_trait::async_trait;
use bodycomp_core::{AppError, AppResult, ErrorCode};
use chrono::NaiveDate;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightRange {
    #[serde(default)]
    date_weight_list: Vec<WeightEntry>,
}

/// Connect API session holding a live bearer token
pub struct ConnectClient {
    http: Client,
    oauth2: OAuth2Token,
}

impl ConnectClient {
    /// Wrap an HTTP client and a bearer token
    #[must_use]
    pub const fn new(http: Client, oauth2: OAuth2Token) -> Self {
        Self { http, oauth2 }
    }

    async fn check(response: Response) -> Result<Response, GarminError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GarminError::http(status, &body))
    }

    /// Confirm the token is accepted by fetching the social profile
    ///
    /// # Errors
    ///
    /// Returns [`GarminError::TokenUnavailable`] when the token is rejected,
    /// other errors on transport or server failure
    pub async fn verify_profile(&self) -> Result<(), GarminError> {
        let response = self
            .http
            .get(format!("{CONNECT_API_BASE}{SOCIAL_PROFILE_PATH}"))
            .header(AUTHORIZATION, self.oauth2.bearer())
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GarminError::TokenUnavailable {
                reason: format!("profile request rejected with {}", response.status()),
            }),
            _ => Self::check(response).await.map(|_| ()),
        }
    }

    /// Upload one FIT file
    ///
    /// # Errors
    ///
    /// Returns [`GarminError::Http`] for any non-2xx answer
    pub async fn upload_fit(&self, fit: Vec<u8>) -> Result<(), GarminError> {
        let part = Part::bytes(fit)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{CONNECT_API_BASE}{UPLOAD_PATH}"))
            .header(AUTHORIZATION, self.oauth2.bearer())
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;
        debug!("FIT upload accepted");
        Ok(())
    }

    /// Weight history between two dates, inclusive
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status or malformed JSON
    pub async fn weight_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeightEntry>, GarminError> {
        let response = self
            .http
            .get(format!("{CONNECT_API_BASE}{WEIGHT_RANGE_PATH}"))
            .query(&[
                ("startDate", start.to_string()),
                ("endDate", end.to_string()),
            ])
            .header(AUTHORIZATION, self.oauth2.bearer())
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        let range: WeightRange = serde_json::from_str(&body)?;
        Ok(range.date_weight_list)
    }
}

#[async_trait]
impl BodyCompositionHistory for ConnectClient {
    async fn body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<WeightEntry>> {
        self.weight_range(start, end).await.map_err(|e| {
            AppError::new(
                ErrorCode::ExternalServiceError,
                format!("Error fetching body composition data: {e}"),
            )
        })
    }
}
