use anyhow::Result;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Largest page Workers KV will return from a single `list` call.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// One page of a key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    /// Where the next page starts, `None` once the scan is exhausted.
    pub cursor: Option<String>,
}

impl KeyPage {
    /// Builds a page from a KV-style listing, where `list_complete` decides
    /// whether the cursor is worth following.
    pub fn from_listing(keys: Vec<String>, list_complete: bool, cursor: Option<String>) -> Self {
        let cursor = if list_complete {
            None
        } else {
            let cursor = cursor.filter(|cursor| !cursor.is_empty());
            if cursor.is_none() {
                log::warn!("Listing is incomplete but came without a cursor, stopping scan");
            }
            cursor
        };

        KeyPage { keys, cursor }
    }
}

/// Key-value storage for serialized push subscriptions.
///
/// Implementations must let a scan continue from its cursor even when keys
/// that were already returned have been deleted in the meantime.
#[async_trait(?Send)]
pub trait SubscriptionStore {
    /// Inserts or overwrites the record stored under `id`.
    async fn put(&self, id: &str, record: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<String>>;

    async fn list(&self, cursor: Option<String>, limit: u64) -> Result<KeyPage>;

    /// Removes `id`. Deleting a missing key is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait(?Send)]
impl<S: SubscriptionStore + ?Sized> SubscriptionStore for &S {
    async fn put(&self, id: &str, record: &str) -> Result<()> {
        (**self).put(id, record).await
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        (**self).get(id).await
    }

    async fn list(&self, cursor: Option<String>, limit: u64) -> Result<KeyPage> {
        (**self).list(cursor, limit).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }
}

/// In-process store with lexicographically ordered keys.
///
/// The cursor is the last key handed out, so the next page resumes strictly
/// after it regardless of what was deleted in between.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    /// All keys currently stored, in scan order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

#[async_trait(?Send)]
impl SubscriptionStore for MemoryStore {
    async fn put(&self, id: &str, record: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(id.to_string(), record.to_string());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(id).cloned())
    }

    async fn list(&self, cursor: Option<String>, limit: u64) -> Result<KeyPage> {
        let entries = self.entries.borrow();
        let start = match &cursor {
            Some(after) => Bound::Excluded(after.as_str()),
            None => Bound::Unbounded,
        };
        let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);

        let mut remaining = entries
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(key, _)| key.clone());
        let keys: Vec<String> = remaining.by_ref().take(limit).collect();

        // Only hand out a cursor when something is left after this page
        let cursor = match remaining.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };

        Ok(KeyPage { keys, cursor })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.borrow_mut().remove(id);
        Ok(())
    }
}
