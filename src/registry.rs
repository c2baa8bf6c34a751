//! Subscription registry: durable mapping from (merchant, subscriber) to a
//! lifecycle state.
//!
//! Pure storage — no policy lives here. All validation happens in the engine
//! before any mutation, and the engine's serialization gate isolates
//! concurrent invocations.

use crate::subscription::PairKey;
use crate::{AccountId, SubscriptionState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub type Result<T> = anyhow::Result<T>;

#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Lifecycle state for the pair; `Inactive` for pairs never written.
    async fn get(&self, merchant: &AccountId, subscriber: &AccountId)
        -> Result<SubscriptionState>;

    async fn set(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
        state: SubscriptionState,
    ) -> Result<()>;

    /// Deactivate the pair. The record itself remains, permitting
    /// re-creation.
    async fn clear(&self, merchant: &AccountId, subscriber: &AccountId) -> Result<()>;
}

/// In-memory registry for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<HashMap<PairKey, SubscriptionState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRegistry for MemoryRegistry {
    async fn get(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
    ) -> Result<SubscriptionState> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(&(merchant.clone(), subscriber.clone()))
            .cloned()
            .unwrap_or(SubscriptionState::Inactive))
    }

    async fn set(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
        state: SubscriptionState,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert((merchant.clone(), subscriber.clone()), state);
        Ok(())
    }

    async fn clear(&self, merchant: &AccountId, subscriber: &AccountId) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(
            (merchant.clone(), subscriber.clone()),
            SubscriptionState::Inactive,
        );
        Ok(())
    }
}

/// File-backed registry: one JSON document per pair, written under an
/// exclusive fs2 lock. Reads are served from an in-memory cache of known
/// states, falling back to disk for pairs this instance has not seen.
pub struct FileRegistry {
    base_path: PathBuf,
    cache: Mutex<HashMap<PairKey, SubscriptionState>>,
}

impl FileRegistry {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(base_path.join("subscriptions"))?;
        Ok(Self {
            base_path,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, merchant: &AccountId, subscriber: &AccountId) -> PathBuf {
        let name = format!(
            "{}__{}.json",
            sanitize_component(merchant.as_str()),
            sanitize_component(subscriber.as_str())
        );
        self.base_path.join("subscriptions").join(name)
    }

    fn write_record(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
        state: &SubscriptionState,
    ) -> Result<()> {
        use fs2::FileExt;
        use std::io::Write;

        let path = self.record_path(merchant, subscriber);
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        let json = serde_json::to_string_pretty(state)?;
        let result = (|| -> Result<()> {
            file.set_len(0)?;
            let mut file = &file;
            file.write_all(json.as_bytes())?;
            file.flush()?;
            Ok(())
        })();

        fs2::FileExt::unlock(&file)?;
        result?;

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert((merchant.clone(), subscriber.clone()), state.clone());
        Ok(())
    }
}

/// Keep record filenames filesystem-safe without caring about the identity
/// scheme the ledger uses.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl SubscriptionRegistry for FileRegistry {
    async fn get(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
    ) -> Result<SubscriptionState> {
        let key = (merchant.clone(), subscriber.clone());
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(state) = cache.get(&key) {
                return Ok(state.clone());
            }
        }

        let path = self.record_path(merchant, subscriber);
        if !path.exists() {
            return Ok(SubscriptionState::Inactive);
        }
        let json = std::fs::read_to_string(path)?;
        let state: SubscriptionState = serde_json::from_str(&json)?;

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, state.clone());
        Ok(state)
    }

    async fn set(
        &self,
        merchant: &AccountId,
        subscriber: &AccountId,
        state: SubscriptionState,
    ) -> Result<()> {
        self.write_record(merchant, subscriber, &state)
    }

    async fn clear(&self, merchant: &AccountId, subscriber: &AccountId) -> Result<()> {
        self.write_record(merchant, subscriber, &SubscriptionState::Inactive)
    }
}
