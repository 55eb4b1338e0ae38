use crate::domain_model::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Process-local map of the last known access token per user.
///
/// Not a source of truth: entries are rebuilt from the token store on a miss.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: DashMap<UserId, CacheEntry>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId) -> Option<CacheEntry> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn set(&self, user_id: UserId, token: AccessToken, expires_at: DateTime<Utc>) {
        self.entries.insert(user_id, CacheEntry::new(token, expires_at));
    }

    /// `None` clears every entry.
    pub fn clear(&self, user_id: Option<UserId>) {
        match user_id {
            Some(user_id) => {
                self.entries.remove(&user_id);
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
