// Error taxonomy for desk event processing

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::notify::SendError;
use crate::receipt::PaymentSubmission;
use crate::store::StoreError;

/// Everything that can abort the processing of one host event.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("required columns missing from sheet '{sheet}': {}", .missing.join(", "))]
    MissingColumns { sheet: String, missing: Vec<String> },

    #[error("timed out after {waited:?} waiting for lock {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("notification to {recipient} failed: {source}")]
    Send {
        recipient: String,
        #[source]
        source: SendError,
    },

    #[error("validation failed: {0}")]
    Validation(ValidationFailure),

    #[error("lock file error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeskError {
    /// Short label used as the operator notice subject and in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DeskError::Config(_) | DeskError::MissingColumns { .. } => "configuration",
            DeskError::LockTimeout { .. } => "lock-timeout",
            DeskError::Store(_) => "store",
            DeskError::Send { .. } => "send",
            DeskError::Validation(_) => "validation",
            DeskError::Io(_) => "io",
        }
    }
}

/// Cross-record consistency failures raised by the payment receipt processor.
/// Each carries the submission as read so the office notice can quote it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error(
        "payment number {} on row {} is already used on row {other_row}",
        .submission.payment,
        .submission.row
    )]
    DuplicatePaymentNumber {
        submission: PaymentSubmission,
        other_row: usize,
    },

    #[error(
        "no request matches reception number '{}' for {} {} (payment row {})",
        .submission.reception,
        .submission.class,
        .submission.number,
        .submission.row
    )]
    NoMatchingRequest { submission: PaymentSubmission },

    #[error("payment row {} has no payment number", .submission.row)]
    MissingPaymentNumber { submission: PaymentSubmission },
}

impl ValidationFailure {
    pub fn submission(&self) -> &PaymentSubmission {
        match self {
            ValidationFailure::DuplicatePaymentNumber { submission, .. }
            | ValidationFailure::NoMatchingRequest { submission }
            | ValidationFailure::MissingPaymentNumber { submission } => submission,
        }
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
