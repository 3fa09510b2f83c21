// Notification sender seam and the concrete senders shipped with the desk

pub mod operator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[cfg(test)]
use mockall::automock;

pub use operator::OperatorChannel;

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("recipient {recipient} rejected the message: {reason}")]
    Rejected { recipient: String, reason: String },
    #[error("outbox write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("outbox encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivers a message. Success only means the transport accepted it.
#[cfg_attr(test, automock)]
pub trait NotificationSender {
    fn send(&self, notification: &Notification) -> Result<(), SendError>;
}

impl<T: NotificationSender + ?Sized> NotificationSender for &T {
    fn send(&self, notification: &Notification) -> Result<(), SendError> {
        (**self).send(notification)
    }
}

/// Line format of the outbox file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Appends each message as one JSON line; a mail relay drains the file
#[derive(Debug, Clone)]
pub struct OutboxSender {
    path: PathBuf,
}

impl OutboxSender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read back every queued entry
    pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<OutboxEntry>, SendError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SendError::from))
            .collect()
    }
}

impl NotificationSender for OutboxSender {
    fn send(&self, notification: &Notification) -> Result<(), SendError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let entry = OutboxEntry {
            id: crate::telemetry::generate_correlation_id(),
            queued_at: Utc::now(),
            notification: notification.clone(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            outbox = %self.path.display(),
            "Notification queued"
        );
        Ok(())
    }
}

/// Keeps messages in memory. Used by `--dry-run` and by tests; addresses on
/// the reject list fail like a bouncing transport would.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: RefCell<Vec<Notification>>,
    rejected: RefCell<HashSet<String>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, recipient: &str) {
        self.rejected.borrow_mut().insert(recipient.to_string());
    }

    pub fn accept(&self, recipient: &str) {
        self.rejected.borrow_mut().remove(recipient);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent
            .borrow()
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

impl NotificationSender for MemoryOutbox {
    fn send(&self, notification: &Notification) -> Result<(), SendError> {
        if self.rejected.borrow().contains(&notification.recipient) {
            return Err(SendError::Rejected {
                recipient: notification.recipient.clone(),
                reason: "address is on the reject list".to_string(),
            });
        }
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}
