// ABOUTME: Per-user Garmin tokenstore holding OAuth1 and OAuth2 token files
// ABOUTME: Reads and writes garth-compatible JSON under <base>/tg_<user_id>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::error::GarminError;
use super::oauth::{OAuth1Token, OAuth2Token};
use crate::config::environment::user_tokenstore;
use bodycomp_core::UserId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const OAUTH1_FILE: &str = "oauth1_token.json";
const OAUTH2_FILE: &str = "oauth2_token.json";

/// Token directory of one chat user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Store rooted at an explicit directory
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store of `user` under `base`
    #[must_use]
    pub fn for_user(base: &Path, user: UserId) -> Self {
        Self::new(user_tokenstore(base, user))
    }

    /// Directory holding the token files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load both tokens
    ///
    /// # Errors
    ///
    /// Returns [`GarminError::TokenUnavailable`] when either file is missing
    /// or unreadable
    pub async fn load(&self) -> Result<(OAuth1Token, OAuth2Token), GarminError> {
        let oauth1 = self.read_json(OAUTH1_FILE).await?;
        let oauth2 = self.read_json(OAUTH2_FILE).await?;
        Ok((oauth1, oauth2))
    }

    /// Persist both tokens, creating the directory when needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written
    pub async fn save(&self, oauth1: &OAuth1Token, oauth2: &OAuth2Token) -> Result<(), GarminError> {
        self.write_json(OAUTH1_FILE, oauth1).await?;
        self.write_json(OAUTH2_FILE, oauth2).await
    }

    /// Persist a refreshed OAuth2 token
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub async fn save_oauth2(&self, oauth2: &OAuth2Token) -> Result<(), GarminError> {
        self.write_json(OAUTH2_FILE, oauth2).await
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, GarminError> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path).await.map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                format!("{} not found", path.display())
            } else {
                format!("cannot read {}: {e}", path.display())
            };
            GarminError::TokenUnavailable { reason }
        })?;
        serde_json::from_str(&raw).map_err(|e| GarminError::TokenUnavailable {
            reason: format!("{} is not a valid token: {e}", path.display()),
        })
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), GarminError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| GarminError::Tokenstore {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .await
            .map_err(|source| GarminError::Tokenstore { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tokens() -> (OAuth1Token, OAuth2Token) {
        let oauth1 = OAuth1Token {
            oauth_token: "t1".into(),
            oauth_token_secret: "s1".into(),
            mfa_token: None,
            mfa_expiration_timestamp: None,
            domain: Some("garmin.com".into()),
        };
        let oauth2 = OAuth2Token {
            access_token: "a2".into(),
            expires_in: 3600,
            ..OAuth2Token::default()
        }
        .with_expirations(100);
        (oauth1, oauth2)
    }

    #[tokio::test]
    async fn test_missing_store_is_token_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::for_user(temp.path(), UserId(7));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, GarminError::TokenUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::for_user(temp.path(), UserId(7));
        let (oauth1, oauth2) = tokens();
        store.save(&oauth1, &oauth2).await.unwrap();

        assert!(temp.path().join("tg_7").join("oauth1_token.json").exists());
        let (loaded1, loaded2) = store.load().await.unwrap();
        assert_eq!(loaded1.oauth_token, "t1");
        assert_eq!(loaded2.access_token, "a2");
        assert_eq!(loaded2.expires_at, 3700);
    }

    #[tokio::test]
    async fn test_corrupt_token_file() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path());
        std::fs::write(temp.path().join(OAUTH1_FILE), "not json").unwrap();
        std::fs::write(temp.path().join(OAUTH2_FILE), "{}").unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, GarminError::TokenUnavailable { .. }));
    }
}
