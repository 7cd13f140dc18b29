use crate::store::{KeyPage, SubscriptionStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use worker::kv::KvStore;
use worker::Env;

/// Name of the KV namespace binding holding subscriptions.
pub const SUBSCRIPTIONS_BINDING: &str = "SUBS";

/// Subscription store backed by a Workers KV namespace.
pub struct WorkerKvStore {
    kv: KvStore,
}

impl WorkerKvStore {
    pub fn new(kv: KvStore) -> Self {
        WorkerKvStore { kv }
    }

    /// Opens the `SUBS` binding from the worker environment.
    pub fn from_env(env: &Env) -> Result<Self> {
        let kv = env
            .kv(SUBSCRIPTIONS_BINDING)
            .map_err(|e| anyhow!("Missing KV binding {SUBSCRIPTIONS_BINDING}: {e}"))?;
        Ok(Self::new(kv))
    }
}

#[async_trait(?Send)]
impl SubscriptionStore for WorkerKvStore {
    async fn put(&self, id: &str, record: &str) -> Result<()> {
        self.kv
            .put(id, record)
            .map_err(|e| anyhow!("Failed to prepare KV put for {id}: {e}"))?
            .execute()
            .await
            .map_err(|e| anyhow!("Failed to put {id}: {e}"))
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        self.kv
            .get(id)
            .text()
            .await
            .map_err(|e| anyhow!("Failed to get {id}: {e}"))
    }

    async fn list(&self, cursor: Option<String>, limit: u64) -> Result<KeyPage> {
        let mut request = self.kv.list().limit(limit);
        if let Some(cursor) = cursor {
            request = request.cursor(cursor);
        }

        let response = request
            .execute()
            .await
            .map_err(|e| anyhow!("Failed to list subscriptions: {e}"))?;

        Ok(KeyPage::from_listing(
            response.keys.into_iter().map(|key| key.name).collect(),
            response.list_complete,
            response.cursor,
        ))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.kv
            .delete(id)
            .await
            .map_err(|e| anyhow!("Failed to delete {id}: {e}"))
    }
}
