//! Per-client session data.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::value::Value;

/// Data stored under one partition key.
pub type Partition = HashMap<String, Value>;

/// A single client's data store.
///
/// Data is partitioned by a caller-supplied key (typically derived from the
/// request path, see [`partition_key`](crate::partition_key)). All partitions
/// share one guard: reads take it shared, every write takes it exclusive.
///
/// Recency is owned by the registry. `last_access` is only written while the
/// registry's own guard is held, so it always agrees with the eviction order.
#[derive(Debug)]
pub struct Session {
    token: String,
    partitions: RwLock<HashMap<String, Partition>>,
    created_at: Instant,
    last_access: Mutex<Instant>,
}

impl Session {
    pub(crate) fn new(token: String, now: Instant) -> Self {
        Self {
            token,
            partitions: RwLock::new(HashMap::new()),
            created_at: now,
            last_access: Mutex::new(now),
        }
    }

    /// The token identifying this session.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the session was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the registry last handed this session out.
    pub fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    pub(crate) fn touch(&self, now: Instant) {
        *self.last_access.lock() = now;
    }

    /// Read a value from a partition.
    pub fn get(&self, partition: &str, key: &str) -> Option<Value> {
        self.partitions
            .read()
            .get(partition)
            .and_then(|data| data.get(key))
            .cloned()
    }

    /// Store a value in a partition, creating the partition if needed.
    pub fn set(&self, partition: &str, key: &str, value: impl Into<Value>) {
        self.partitions
            .write()
            .entry(partition.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Remove a value, dropping the partition once it is empty.
    pub fn remove(&self, partition: &str, key: &str) -> Option<Value> {
        let mut partitions = self.partitions.write();
        let data = partitions.get_mut(partition)?;
        let removed = data.remove(key);
        if data.is_empty() {
            partitions.remove(partition);
        }
        removed
    }

    /// Snapshot of one partition.
    pub fn partition(&self, partition: &str) -> Option<Partition> {
        self.partitions.read().get(partition).cloned()
    }

    /// Keys of all partitions holding data.
    pub fn partition_keys(&self) -> Vec<String> {
        self.partitions.read().keys().cloned().collect()
    }

    /// Whether no data has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.partitions.read().is_empty()
    }

    /// View of this session bound to one partition.
    pub fn scope<'a>(&'a self, partition: &'a str) -> Scope<'a> {
        Scope {
            session: self,
            partition,
        }
    }
}

/// A session bound to one partition key for the duration of a request.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    session: &'a Session,
    partition: &'a str,
}

impl Scope<'_> {
    /// The partition this scope reads and writes.
    pub fn partition(&self) -> &str {
        self.partition
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.session.get(self.partition, key)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.session.set(self.partition, key, value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.session.remove(self.partition, key)
    }
}
