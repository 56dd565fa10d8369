//! Participant id to display name resolution.
//!
//! Names are cached for the whole session through an injected
//! [`IdentityCache`]. Only successful profile reads are cached, so a missing
//! profile or a failed lookup is retried on the next reference.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::domain::{
    ids::UserId,
    profile::{PublicProfile, Role},
};

pub const UNKNOWN_USER: &str = "Unknown User";

const PROFILE_LOOKUP_FAILED: &str = "IDENTITY_PROFILE_LOOKUP_FAILED";
const STALE_NAME_DROPPED: &str = "IDENTITY_STALE_NAME_DROPPED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, uid: &UserId) -> Result<Option<PublicProfile>, ProfileSourceError>;

    async fn profiles_with_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<PublicProfile>, ProfileSourceError>;
}

pub trait IdentityCache: Send + Sync {
    fn get(&self, uid: &UserId) -> Option<String>;
    /// Counter bumped by every `clear`.
    fn generation(&self) -> u64;
    /// Stores `name` unless the cache was cleared after `generation` was read.
    fn insert(&self, generation: u64, uid: UserId, name: String) -> bool;
    fn clear(&self);
    fn len(&self) -> usize;
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<UserId, String>,
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityCache {
    state: RwLock<CacheState>,
}

impl IdentityCache for InMemoryIdentityCache {
    fn get(&self, uid: &UserId) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.entries.get(uid).cloned())
    }

    fn generation(&self) -> u64 {
        self.state.read().map(|state| state.generation).unwrap_or(0)
    }

    fn insert(&self, generation: u64, uid: UserId, name: String) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.generation != generation {
            return false;
        }
        state.entries.insert(uid, name);
        true
    }

    fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.generation += 1;
            state.entries.clear();
        }
    }

    fn len(&self) -> usize {
        self.state.read().map(|state| state.entries.len()).unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    profiles: Arc<dyn ProfileSource>,
    cache: Arc<dyn IdentityCache>,
}

impl IdentityResolver {
    pub fn new(profiles: Arc<dyn ProfileSource>, cache: Arc<dyn IdentityCache>) -> Self {
        Self { profiles, cache }
    }

    pub fn cache(&self) -> &Arc<dyn IdentityCache> {
        &self.cache
    }

    pub async fn resolve_name(&self, uid: &UserId) -> String {
        if let Some(name) = self.cache.get(uid) {
            return name;
        }

        let generation = self.cache.generation();
        match self.profiles.fetch_profile(uid).await {
            Ok(Some(profile)) => {
                let name = if profile.username.trim().is_empty() {
                    uid.to_string()
                } else {
                    profile.username
                };
                if !self.cache.insert(generation, uid.clone(), name.clone()) {
                    tracing::debug!(
                        code = STALE_NAME_DROPPED,
                        uid = %uid,
                        "cache cleared during lookup; name not stored"
                    );
                }
                name
            }
            Ok(None) => {
                tracing::debug!(uid = %uid, "no public profile; using placeholder name");
                UNKNOWN_USER.to_owned()
            }
            Err(error) => {
                tracing::warn!(
                    code = PROFILE_LOOKUP_FAILED,
                    uid = %uid,
                    error = ?error,
                    "profile lookup failed; using placeholder name"
                );
                UNKNOWN_USER.to_owned()
            }
        }
    }

    pub async fn resolve_optional(&self, uid: Option<&UserId>) -> String {
        match uid {
            Some(uid) => self.resolve_name(uid).await,
            None => UNKNOWN_USER.to_owned(),
        }
    }
}
