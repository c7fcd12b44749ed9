//! Append-only submission store.

use crate::config::TrustMode;
use crate::decision::EvaluationResult;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A submission accepted by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub email: String,
    pub message: String,
    pub user_agent: String,
    pub endpoint: String,
    pub mode: TrustMode,
    pub evaluation: EvaluationResult,
}

/// A stored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Sequence number, starting at 1
    pub id: u64,
    /// Seconds since the UNIX epoch
    pub received_at: u64,
    #[serde(flatten)]
    pub submission: NewSubmission,
}

/// Append-only record store. Appends may run concurrently.
pub trait SubmissionStore: Send + Sync {
    /// Append a submission and return its id.
    fn append(&self, submission: NewSubmission) -> u64;

    /// All records in insertion order.
    fn snapshot(&self) -> Vec<SubmissionRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store. Ids come from an atomic counter and records live in a
/// sharded map, so appends never contend on a single lock.
#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    next_id: AtomicU64,
    records: DashMap<u64, SubmissionRecord>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn append(&self, submission: NewSubmission) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let received_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.records.insert(
            id,
            SubmissionRecord {
                id,
                received_at,
                submission,
            },
        );
        id
    }

    fn snapshot(&self) -> Vec<SubmissionRecord> {
        let mut records: Vec<SubmissionRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        records
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::TagSet;
    use std::sync::Arc;

    fn submission(email: &str) -> NewSubmission {
        NewSubmission {
            email: email.to_string(),
            message: "hello".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            endpoint: "contact".to_string(),
            mode: TrustMode::Soft,
            evaluation: EvaluationResult::scored(Some(0.8), TagSet::new(), None),
        }
    }

    #[test]
    fn test_append_and_snapshot_order() {
        let store = InMemorySubmissionStore::new();
        assert!(store.is_empty());

        assert_eq!(store.append(submission("a@example.com")), 1);
        assert_eq!(store.append(submission("b@example.com")), 2);

        let records = store.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].submission.email, "a@example.com");
        assert_eq!(records[1].id, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let store = Arc::new(InMemorySubmissionStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append(submission(&format!("user{i}@example.com")))
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = store.snapshot();
        assert_eq!(records.len(), 16);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }
}
