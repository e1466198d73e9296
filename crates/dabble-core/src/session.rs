//! Session identifiers.
//!
//! A shared drawing lives at `/<session-id>`; the id is taken straight from
//! the path, so it is restricted to URL-safe characters.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted session id.
pub const MAX_SESSION_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("session id is empty")]
    Empty,
    #[error("session id is longer than {MAX_SESSION_ID_LEN} characters")]
    TooLong,
    #[error("session id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Identifier of a shared drawing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate an id.
    pub fn parse(s: &str) -> Result<Self, SessionIdError> {
        if s.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SessionIdError::InvalidChar(c));
        }
        if s.len() > MAX_SESSION_ID_LEN {
            return Err(SessionIdError::TooLong);
        }
        Ok(Self(s.to_string()))
    }

    /// Derive the id from a location path such as `/3f2a...`.
    ///
    /// An empty path (`""` or `"/"`) means the drawing is not shared and
    /// yields `Ok(None)`.
    pub fn from_path(path: &str) -> Result<Option<Self>, SessionIdError> {
        let id = path.trim_start_matches('/').trim_end_matches('/');
        if id.is_empty() {
            return Ok(None);
        }
        Self::parse(id).map(Some)
    }

    /// Path under which the drawing is shared.
    pub fn share_path(&self) -> String {
        format!("/{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
