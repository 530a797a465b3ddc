//! Audit sink backed by a bounded channel.
//!
//! Pipeline stages call [`AuditSink::record`], which mirrors the entry to
//! tracing and queues it without waiting. A single writer task drains the
//! queue into the repository, retrying failed inserts a few times before
//! dropping the entry.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    models::audit::{AuditLevel, AuditLogEntry},
    repo,
    services::AuditSink,
};

/// Insert attempts per entry before it is dropped
pub const AUDIT_WRITE_ATTEMPTS: u32 = 3;
const AUDIT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditLogEntry>,
}

impl ChannelAuditSink {
    /// Creates the sink and the receiving end consumed by [`run_audit_writer`]
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<AuditLogEntry>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Self { tx }, rx)
    }
}

fn trace_entry(entry: &AuditLogEntry) {
    let metadata = entry.metadata.to_string();
    match entry.level {
        AuditLevel::Info => tracing::info!(
            tenant_id = ?entry.tenant_id,
            metadata = %metadata,
            "{}",
            entry.message
        ),
        AuditLevel::Warn => tracing::warn!(
            tenant_id = ?entry.tenant_id,
            metadata = %metadata,
            "{}",
            entry.message
        ),
        AuditLevel::Error => tracing::error!(
            tenant_id = ?entry.tenant_id,
            metadata = %metadata,
            "{}",
            entry.message
        ),
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, entry: AuditLogEntry) {
        trace_entry(&entry);

        if let Err(e) = self.tx.try_send(entry) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "audit buffer is full",
                mpsc::error::TrySendError::Closed(_) => "audit writer stopped",
            };
            tracing::warn!(reason, "dropping audit log entry");
        }
    }
}

/// Persists one entry, returns `false` when every attempt failed
pub async fn write_with_retry(repo: &repo::ImplAppRepo, entry: &AuditLogEntry) -> bool {
    for attempt in 1..=AUDIT_WRITE_ATTEMPTS {
        match repo.insert_audit_log(entry).await {
            Ok(_) => return true,
            Err(e) => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    "failed to write audit log entry"
                );
                if attempt < AUDIT_WRITE_ATTEMPTS {
                    tokio::time::sleep(AUDIT_RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }

    tracing::error!(
        message = %entry.message,
        tenant_id = ?entry.tenant_id,
        "audit log entry dropped after retries"
    );
    false
}

/// Drains the channel until every sender is gone
pub async fn run_audit_writer(mut rx: mpsc::Receiver<AuditLogEntry>, repo: repo::ImplAppRepo) {
    while let Some(entry) = rx.recv().await {
        write_with_retry(&repo, &entry).await;
    }
    tracing::info!("audit writer stopped");
}

#[cfg(test)]
pub use memory::MemoryAuditSink;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MockAppRepo;
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    #[ntex::test]
    async fn test_write_with_retry_recovers_after_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_mock = calls.clone();

        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_insert_audit_log()
            .times(2)
            .returning(move |_| {
                if calls_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("database is locked")
                }
                Ok(7)
            });
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let entry = AuditLogEntry::info(Some(1), "Comment replied successfully", json!({}));
        assert!(write_with_retry(&mock_repo, &entry).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[ntex::test]
    async fn test_write_with_retry_gives_up() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_insert_audit_log()
            .times(AUDIT_WRITE_ATTEMPTS as usize)
            .returning(|_| anyhow::bail!("disk full"));
        let mock_repo: repo::ImplAppRepo = Box::new(mock_repo);

        let entry = AuditLogEntry::error(None, "Entry processing failed", json!({}));
        assert!(!write_with_retry(&mock_repo, &entry).await);
    }

    #[ntex::test]
    async fn test_record_drops_when_buffer_is_full() {
        let (sink, mut rx) = ChannelAuditSink::new(1);

        sink.record(AuditLogEntry::info(None, "first", json!({})));
        sink.record(AuditLogEntry::info(None, "second", json!({})));
        drop(sink);

        assert_eq!(rx.recv().await.map(|e| e.message).as_deref(), Some("first"));
        assert!(rx.recv().await.is_none());
    }

    #[ntex::test]
    async fn test_run_audit_writer_persists_queued_entries() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_insert_audit_log()
            .times(2)
            .returning(|_| Ok(1));

        let (sink, rx) = ChannelAuditSink::new(8);
        sink.record(AuditLogEntry::info(Some(1), "Webhook received", json!({})));
        sink.record(AuditLogEntry::warn(Some(1), "AI reply generation failed", json!({})));
        drop(sink);

        run_audit_writer(rx, Box::new(mock_repo)).await;
    }
}
