//! Bounded queue with one background writer. Enqueue never blocks the request.

use super::{AuditEntry, AuditStore};
use crate::trail::{Level, Trail};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum Message {
    Entry(AuditEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct AuditQueue {
    tx: mpsc::Sender<Message>,
    trail: Trail,
}

impl AuditQueue {
    /// Start the writer task. It stops once every queue handle is dropped.
    pub fn spawn(store: Arc<dyn AuditStore>, capacity: usize, trail: Trail) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let worker_trail = trail.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    Message::Entry(entry) => {
                        if let Err(e) = store.append(&entry).await {
                            worker_trail.log(
                                Level::Error,
                                format_args!("audit log write failed for {}: {}", entry.table_name, e),
                            );
                        }
                    }
                    Message::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        AuditQueue { tx, trail }
    }

    /// Returns false when the entry was dropped (queue full or closed).
    pub fn enqueue(&self, entry: AuditEntry) -> bool {
        match self.tx.try_send(Message::Entry(entry)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(Message::Entry(e))) => {
                self.trail
                    .log(Level::Warning, format_args!("audit queue full, dropping entry for {}", e.table_name));
                false
            }
            Err(_) => {
                self.trail.log(Level::Warning, format_args!("audit queue closed, dropping entry"));
                false
            }
        }
    }

    /// Wait until every entry enqueued before this call has been handed to the store.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Message::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}
