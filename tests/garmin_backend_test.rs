// ABOUTME: Integration tests for the Garmin backend paths that need no network
// ABOUTME: Covers tokenstore layout, token persistence and the token-invalid outcome
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use bodycomp_relay::backend::{SubmissionBackend, SubmissionRequest};
use bodycomp_relay::feedback::FeedbackGenerator;
use bodycomp_relay::garmin::oauth::{OAuth1Token, OAuth2Token};
use bodycomp_relay::garmin::GarminBackend;
use bodycomp_relay::{Measurement, ResultCode, UserId};
use std::time::Duration;
use tempfile::TempDir;

fn backend(dir: &TempDir) -> GarminBackend {
    GarminBackend::new(
        dir.path().to_path_buf(),
        Duration::from_secs(5),
        FeedbackGenerator::disabled(),
    )
}

#[tokio::test]
async fn test_missing_tokens_without_credentials_is_token_invalid() {
    let dir = TempDir::new().unwrap();
    let backend = backend(&dir);
    let measurement = Measurement::new(70.5, 28.41);

    let outcome = backend
        .submit(SubmissionRequest::new(UserId(42), &measurement))
        .await;

    assert_eq!(outcome.code, ResultCode::TokenInvalid);
    assert!(outcome.success_text.is_none());
    assert!(outcome.diagnostic.is_some());
}

#[tokio::test]
async fn test_corrupt_tokens_without_credentials_is_token_invalid() {
    let dir = TempDir::new().unwrap();
    let store_dir = dir.path().join("tg_42");
    tokio::fs::create_dir_all(&store_dir).await.unwrap();
    tokio::fs::write(store_dir.join("oauth1_token.json"), "not json")
        .await
        .unwrap();
    tokio::fs::write(store_dir.join("oauth2_token.json"), "{}")
        .await
        .unwrap();

    let backend = backend(&dir);
    let measurement = Measurement::new(70.5, 28.41);
    let outcome = backend
        .submit(SubmissionRequest::new(UserId(42), &measurement))
        .await;

    assert_eq!(outcome.code, ResultCode::TokenInvalid);
}

#[tokio::test]
async fn test_tokenstore_is_per_user_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let backend = backend(&dir);

    let store = backend.tokenstore(UserId(7));
    assert_eq!(store.dir(), dir.path().join("tg_7"));
    assert_ne!(backend.tokenstore(UserId(8)).dir(), store.dir());

    let oauth1 = OAuth1Token::from_form("oauth_token=tok&oauth_token_secret=sec").unwrap();
    let oauth2 = OAuth2Token {
        access_token: "access".into(),
        token_type: "Bearer".into(),
        expires_in: 3600,
        refresh_token_expires_in: 7200,
        ..OAuth2Token::default()
    }
    .with_expirations(1_700_000_000);
    store.save(&oauth1, &oauth2).await.unwrap();

    let (loaded1, loaded2) = store.load().await.unwrap();
    assert_eq!(loaded1.oauth_token, "tok");
    assert_eq!(loaded1.oauth_token_secret, "sec");
    assert_eq!(loaded2.access_token, "access");
    assert_eq!(loaded2.expires_at, 1_700_003_600);
    assert!(loaded2.is_expired_at(1_700_003_601));
    assert!(!loaded2.is_expired_at(1_700_000_001));
}
