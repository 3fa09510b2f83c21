// Transcript Desk - transcript request intake and approval notifications
// This exposes the core components for testing and integration

pub mod config;
pub mod desk;
pub mod error;
pub mod lock;
pub mod notify;
pub mod receipt;
pub mod resolver;
pub mod schema;
pub mod sequence;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod tracker;

// Re-export key types for easy access
pub use config::{DeskConfig, DEFAULT_CONFIG_FILE};
pub use desk::{Desk, DeskEvent, EventDetail, EventOutcome, ReceiptStatus, SubmissionOutcome};
pub use error::{DeskError, DeskResult, ValidationFailure};
pub use lock::ScriptLock;
pub use notify::{
    MemoryOutbox, Notification, NotificationSender, OperatorChannel, OutboxSender, SendError,
};
pub use receipt::{PaymentOutcome, PaymentReceiptProcessor, PaymentReport, PaymentSubmission};
pub use resolver::{Directory, RecipientKey, RecipientResolver, Role};
pub use schema::{ColumnMap, FieldSet, PaymentField, RequestField};
pub use sequence::{next_sequence, parse_sequence, Assignment, SequenceAssigner};
pub use store::{Sheet, StoreError, TabularStore, Workbook};
pub use telemetry::{create_event_span, generate_correlation_id, init_telemetry};
pub use tracker::{
    ApprovalRecord, ApprovalTracker, CellEdit, DispatchMarker, TrackerReport, Transition,
    TransitionOutcome,
};
