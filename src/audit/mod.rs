//! Audit trail of loop invocations
//!
//! Every `continue_conversation` call leaves one record behind.

use crate::models::{InvocationRecord, Turn};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Audit trail storage, bounded; the oldest record is evicted first.
#[derive(Clone)]
pub struct AuditLog {
    records: Arc<RwLock<VecDeque<InvocationRecord>>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store an invocation record
    pub async fn record(&self, record: InvocationRecord) -> Uuid {
        let invocation_id = record.invocation_id;
        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        invocation_id
    }

    pub async fn get(&self, invocation_id: Uuid) -> Option<InvocationRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .rev()
            .find(|record| record.invocation_id == invocation_id)
            .cloned()
    }

    /// All retained records, in the order they were stored
    pub async fn list(&self) -> Vec<InvocationRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn latest(&self) -> Option<InvocationRecord> {
        self.records.read().await.back().cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the history submitted to the loop, streamed straight into the hasher
pub fn compute_history_hash(turns: &[Turn]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), turns).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvocationOutcome;
    use chrono::{Duration, Utc};

    fn record(offset_secs: i64) -> InvocationRecord {
        InvocationRecord {
            invocation_id: Uuid::new_v4(),
            history_hash: compute_history_hash(&[Turn::user("hi")]),
            history_len: 1,
            rounds: 1,
            tool_calls: vec![],
            outcome: InvocationOutcome::Answered,
            turns_generated: 1,
            created_at: Utc::now() + Duration::seconds(offset_secs),
            execution_time_ms: 3,
        }
    }

    #[test]
    fn test_history_hash_is_stable_and_content_sensitive() {
        let a = compute_history_hash(&[Turn::user("What's trending?")]);
        let b = compute_history_hash(&[Turn::user("What's trending?")]);
        let c = compute_history_hash(&[Turn::assistant("What's trending?")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_records_keep_insertion_order() {
        let log = AuditLog::new();
        let first_id = log.record(record(10)).await;
        let second_id = log.record(record(0)).await;

        let ids: Vec<Uuid> = log.list().await.iter().map(|r| r.invocation_id).collect();
        assert_eq!(ids, vec![first_id, second_id]);
        assert_eq!(log.latest().await.map(|r| r.invocation_id), Some(second_id));
        assert!(log.get(first_id).await.is_some());
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_latest_with_identical_timestamps() {
        let log = AuditLog::new();
        let a = record(0);
        let mut b = record(0);
        b.created_at = a.created_at;
        log.record(a).await;
        let b_id = log.record(b).await;

        assert_eq!(log.latest().await.map(|r| r.invocation_id), Some(b_id));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let log = AuditLog::with_capacity(3);
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(log.record(record(0)).await);
        }

        assert_eq!(log.len().await, 3);
        assert!(log.get(ids[0]).await.is_none());
        assert!(log.get(ids[1]).await.is_none());
        let kept: Vec<Uuid> = log.list().await.iter().map(|r| r.invocation_id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_latest() {
        let log = AuditLog::with_capacity(0);
        log.record(record(0)).await;
        let id = log.record(record(0)).await;

        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len().await, 1);
        assert_eq!(log.latest().await.map(|r| r.invocation_id), Some(id));
    }
}
