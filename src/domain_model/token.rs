use crate::domain_model::UserId;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RefreshToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Credentials never show up in logs, only their length.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<redacted {}>)", self.0.len())
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(<redacted {}>)", self.0.len())
    }
}

/// A persisted Spotify connection as the store hands it back.
///
/// Rows are created by the OAuth webhook; this crate only reads, updates and
/// deletes them. Any field may be missing on a half-written row.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub user_id: UserId,
    pub access_token: Option<AccessToken>,
    pub refresh_token: Option<RefreshToken>,
    /// `None` when the stored value was absent or could not be parsed; such a
    /// record is treated as already expired.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at
            .map(|expires_at| now + buffer < expires_at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(token: AccessToken, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Usable only while `now + buffer` is strictly before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer < self.expires_at
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpiryParseError {
    #[error("epoch millis out of range: {0}")]
    OutOfRange(i64),
    #[error("unrecognized expiry format: {0:?}")]
    Unrecognized(String),
}

/// `expires_at` as it is found in the store. Older write paths stored epoch
/// milliseconds, newer ones an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawExpiry {
    EpochMillis(i64),
    Text(String),
}

impl RawExpiry {
    pub fn normalize(&self) -> Result<DateTime<Utc>, ExpiryParseError> {
        match self {
            RawExpiry::EpochMillis(ms) => from_millis(*ms),
            RawExpiry::Text(text) => {
                let text = text.trim();
                if let Ok(ms) = text.parse::<i64>() {
                    return from_millis(ms);
                }
                if let Ok(at) = DateTime::parse_from_rfc3339(text) {
                    return Ok(at.with_timezone(&Utc));
                }
                // Postgres-style "2024-05-01 10:00:00+00"
                if let Ok(at) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
                    return Ok(at.with_timezone(&Utc));
                }
                Err(ExpiryParseError::Unrecognized(text.to_owned()))
            }
        }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, ExpiryParseError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(ExpiryParseError::OutOfRange(ms))
}

/// Canonical form written back to the store.
pub fn format_expiry(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
