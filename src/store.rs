//! Record storage behind the HTTP handlers.
//!
//! Handlers only see [`RecordStore`]; the process ships an in-memory
//! implementation, and a database-backed one can be swapped in at startup.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::types::{Clown, ClownPatch, NewClown};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record with steam id {0} already exists")]
    DuplicateSteamId(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSteamId(_) => {
                AppError::BadRequest("Clown with this Steam ID already exists".to_string())
            }
            StoreError::Unavailable(_) => AppError::Internal(err.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, newest ban first. `search` filters case-insensitively on
    /// steam id, discord id, reason and cheat name.
    async fn list(&self, search: Option<&str>) -> StoreResult<Vec<Clown>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Clown>>;

    async fn create(&self, new: NewClown) -> StoreResult<Clown>;

    /// `None` when no record has this id.
    async fn update(&self, id: Uuid, patch: ClownPatch) -> StoreResult<Option<Clown>>;

    /// `false` when no record has this id.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Uuid, Clown>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(clown: &Clown, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(&clown.steam_id)
        || contains(&clown.discord_id)
        || contains(&clown.reason)
        || clown.cheat_name.as_deref().map(contains).unwrap_or(false)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, search: Option<&str>) -> StoreResult<Vec<Clown>> {
        let needle = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
        let records = self.records.read().await;
        let mut out: Vec<Clown> = records
            .values()
            .filter(|c| needle.as_deref().map(|n| matches_search(c, n)).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.ban_date.cmp(&a.ban_date));
        Ok(out)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Clown>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewClown) -> StoreResult<Clown> {
        let mut records = self.records.write().await;
        if records.values().any(|c| c.steam_id == new.steam_id) {
            return Err(StoreError::DuplicateSteamId(new.steam_id));
        }

        let now = Utc::now();
        let steam_profile_url = new
            .steam_profile_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| new.derived_profile_url());
        let clown = Clown {
            id: Uuid::new_v4(),
            steam_id: new.steam_id,
            steam_profile_url: Some(steam_profile_url),
            discord_id: new.discord_id,
            reason: new.reason,
            cheat_name: new.cheat_name,
            ban_date: new.ban_date.unwrap_or(now),
            proof_url: new.proof_url,
            created_at: now,
            updated_at: now,
        };
        records.insert(clown.id, clown.clone());
        Ok(clown)
    }

    async fn update(&self, id: Uuid, patch: ClownPatch) -> StoreResult<Option<Clown>> {
        let mut records = self.records.write().await;
        if let Some(steam_id) = &patch.steam_id {
            if records.values().any(|c| c.id != id && &c.steam_id == steam_id) {
                return Err(StoreError::DuplicateSteamId(steam_id.clone()));
            }
        }

        let Some(clown) = records.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = patch.steam_id {
            clown.steam_id = v;
        }
        if let Some(v) = patch.steam_profile_url {
            clown.steam_profile_url = Some(v);
        }
        if let Some(v) = patch.discord_id {
            clown.discord_id = v;
        }
        if let Some(v) = patch.reason {
            clown.reason = v;
        }
        if let Some(v) = patch.cheat_name {
            clown.cheat_name = Some(v);
        }
        if let Some(v) = patch.ban_date {
            clown.ban_date = v;
        }
        if let Some(v) = patch.proof_url {
            clown.proof_url = Some(v);
        }
        clown.updated_at = Utc::now();
        Ok(Some(clown.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
