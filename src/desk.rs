// Desk - the event boundary the host calls into
//
// Every event resolves headers and the address directory once, runs one
// component, and never lets an error escape: failures are logged, reported to
// the operator channel and returned as part of the outcome.

use tracing::{debug, error, info, warn};

use crate::config::DeskConfig;
use crate::error::{DeskError, DeskResult};
use crate::lock::ScriptLock;
use crate::notify::{NotificationSender, OperatorChannel};
use crate::receipt::{PaymentOutcome, PaymentReceiptProcessor};
use crate::resolver::{looks_like_address, Directory, Role};
use crate::schema::{ensure_headers, ColumnMap, PaymentField, RequestField};
use crate::sequence::{Assignment, SequenceAssigner};
use crate::store::{cell, is_blank, TabularStore, Workbook};
use crate::telemetry::{create_event_span, generate_correlation_id};
use crate::tracker::{ApprovalRecord, ApprovalTracker, CellEdit, TrackerReport};

/// What the host reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskEvent {
    /// A form submission added `row` to the requests sheet
    RecordCreated { row: usize },
    /// A person edited one cell of the requests sheet
    RecordEdited {
        row: usize,
        column: usize,
        value: String,
        old_value: Option<String>,
    },
    /// A payment confirmation added `row` to the payments sheet
    PaymentSubmitted { row: usize },
}

impl DeskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeskEvent::RecordCreated { .. } => "record-created",
            DeskEvent::RecordEdited { .. } => "record-edited",
            DeskEvent::PaymentSubmitted { .. } => "payment-submitted",
        }
    }

    pub fn row(&self) -> usize {
        match self {
            DeskEvent::RecordCreated { row }
            | DeskEvent::RecordEdited { row, .. }
            | DeskEvent::PaymentSubmitted { row } => *row,
        }
    }
}

/// Whether the student got the submission receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    Sent { recipient: String },
    /// The row was already numbered; the receipt went out back then
    NotRepeated,
    SkippedNoContact,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Ignored,
    Numbered {
        row: usize,
        assignment: Assignment,
        receipt: ReceiptStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    Submission(SubmissionOutcome),
    /// `None` when the edit was not a trigger
    Edit(Option<TrackerReport>),
    Payment(PaymentOutcome),
    /// Processing aborted; the error was logged and reported
    Failed {
        kind: &'static str,
        message: String,
        reported_to: Option<String>,
    },
}

/// Result of `Desk::handle`. The event always counts as handled; a failure is
/// carried in `detail` instead of being raised to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub event: &'static str,
    pub row: usize,
    pub correlation_id: String,
    pub detail: EventDetail,
}

impl EventOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.detail, EventDetail::Failed { .. })
    }
}

pub struct Desk<N: NotificationSender> {
    config: DeskConfig,
    sender: N,
    assigner: SequenceAssigner,
}

impl<N: NotificationSender> Desk<N> {
    pub fn new(config: DeskConfig, sender: N) -> Self {
        let assigner = SequenceAssigner::new(ScriptLock::from_config(&config.lock));
        Self {
            config,
            sender,
            assigner,
        }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn sender(&self) -> &N {
        &self.sender
    }

    /// Config-file addresses overlaid with the workbook's settings sheet
    pub fn directory(&self, book: &Workbook) -> Directory {
        Directory::from_config(&self.config.directory)
            .overlay(Directory::from_settings_rows(&book.settings_rows()))
    }

    /// Process one event. Never fails; see `EventOutcome`.
    pub fn handle(&self, book: &mut Workbook, event: DeskEvent) -> EventOutcome {
        let correlation_id = generate_correlation_id();
        let name = event.name();
        let row = event.row();
        let span = create_event_span(name, row, &correlation_id);
        let _enter = span.enter();

        let directory = self.directory(book);
        let result = match event {
            DeskEvent::RecordCreated { row } => self
                .on_record_created(book, &directory, row)
                .map(EventDetail::Submission),
            DeskEvent::RecordEdited {
                row,
                column,
                value,
                old_value,
            } => {
                debug!(column, old_value = ?old_value, "Cell edited");
                self.on_record_edited(book, &directory, CellEdit { row, column, value })
                    .map(EventDetail::Edit)
            }
            DeskEvent::PaymentSubmitted { row } => self
                .on_payment_submitted(book, &directory, row)
                .map(EventDetail::Payment),
        };

        let detail = match result {
            Ok(detail) => {
                info!("Event handled");
                detail
            }
            Err(e) => self.report_failure(&directory, name, row, e),
        };

        EventOutcome {
            event: name,
            row,
            correlation_id,
            detail,
        }
    }

    /// Number the request rows that never went through `RecordCreated`
    /// (rows from before the form trigger existed, or from an aborted run).
    /// Rows are taken in sheet order, so new numbers continue from the current
    /// maximum; blank rows and rows that already carry a value are skipped.
    pub fn backfill(&self, book: &mut Workbook) -> DeskResult<Vec<EventOutcome>> {
        let columns = self.request_columns(book)?;
        let column = columns.required_column(RequestField::SequenceNumber)?;

        let mut pending = Vec::new();
        for row in 2..=book.requests.row_count() {
            let values = book.requests.read_row(row)?;
            if values.iter().all(|v| is_blank(v)) {
                continue;
            }
            if is_blank(cell(&values, column)) {
                pending.push(row);
            }
        }
        info!(rows = ?pending, "Backfilling unnumbered requests");

        Ok(pending
            .into_iter()
            .map(|row| self.handle(book, DeskEvent::RecordCreated { row }))
            .collect())
    }

    /// Number a new request and send the student a receipt
    pub fn on_record_created(
        &self,
        book: &mut Workbook,
        directory: &Directory,
        row: usize,
    ) -> DeskResult<SubmissionOutcome> {
        if row <= 1 {
            return Ok(SubmissionOutcome::Ignored);
        }
        let columns = self.request_columns(book)?;
        let column = columns.required_column(RequestField::SequenceNumber)?;
        let assignment = self.assigner.assign(&mut book.requests, column, row)?;

        let receipt = match assignment {
            Assignment::AlreadyAssigned(_) => ReceiptStatus::NotRepeated,
            Assignment::Assigned(_) => {
                let record = ApprovalRecord::read(&book.requests, &columns, row)?;
                self.send_receipt(directory, &record)
            }
        };

        Ok(SubmissionOutcome::Numbered {
            row,
            assignment,
            receipt,
        })
    }

    /// Run the tracker when the edit landed a value in a stage column
    pub fn on_record_edited(
        &self,
        book: &mut Workbook,
        directory: &Directory,
        edit: CellEdit,
    ) -> DeskResult<Option<TrackerReport>> {
        let columns = self.request_columns(book)?;
        if !edit.is_trigger(&columns) {
            debug!(row = edit.row, column = edit.column, "Edit is not a stage change; ignored");
            return Ok(None);
        }
        if edit.row > book.requests.row_count() {
            warn!(row = edit.row, "Edit on a row the sheet does not have; ignored");
            return Ok(None);
        }

        let tracker = ApprovalTracker::new(&self.sender, directory, &self.config.templates);
        tracker.evaluate(&mut book.requests, &columns, edit.row).map(Some)
    }

    pub fn on_payment_submitted(
        &self,
        book: &mut Workbook,
        directory: &Directory,
        row: usize,
    ) -> DeskResult<PaymentOutcome> {
        let request_columns = self.request_columns(book)?;
        ensure_headers::<PaymentField>(&mut book.payments, &self.config.payment_headers)?;
        let payment_columns = ColumnMap::resolve(&book.payments, &self.config.payment_headers)?;

        PaymentReceiptProcessor::new(&self.sender, directory, &self.config.templates, &self.assigner)
            .process(
                &mut book.payments,
                &payment_columns,
                &mut book.requests,
                &request_columns,
                row,
            )
    }

    /// Provision the columns the desk writes, then resolve the requests sheet
    fn request_columns(&self, book: &mut Workbook) -> DeskResult<ColumnMap<RequestField>> {
        ensure_headers::<RequestField>(&mut book.requests, &self.config.headers)?;
        ColumnMap::resolve(&book.requests, &self.config.headers)
    }

    fn send_receipt(&self, directory: &Directory, record: &ApprovalRecord) -> ReceiptStatus {
        if !looks_like_address(&record.contact) {
            warn!(
                row = record.row,
                contact = %record.contact,
                "No usable student address; submission receipt skipped"
            );
            return ReceiptStatus::SkippedNoContact;
        }

        let message = self
            .config
            .templates
            .submission_receipt
            .render(&record.contact, &record.context());
        match self.sender.send(&message) {
            Ok(()) => {
                info!(
                    row = record.row,
                    recipient = %record.contact,
                    reception = %record.reception_display(),
                    "Submission receipt sent"
                );
                ReceiptStatus::Sent {
                    recipient: record.contact.clone(),
                }
            }
            Err(source) => {
                let err = DeskError::Send {
                    recipient: record.contact.clone(),
                    source,
                };
                error!(row = record.row, error = %err, "Submission receipt failed");
                OperatorChannel::new(&self.sender, directory).report(
                    err.kind(),
                    &format!(
                        "行 {} ({}) の受付完了メールを送信できませんでした。\n\
                         受付番号 {} は記入済みです。\n{}",
                        record.row,
                        record.identity(),
                        record.reception_display(),
                        err
                    ),
                );
                ReceiptStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn report_failure(
        &self,
        directory: &Directory,
        event: &'static str,
        row: usize,
        err: DeskError,
    ) -> EventDetail {
        let operator = OperatorChannel::new(&self.sender, directory);
        let reported_to = match &err {
            DeskError::Validation(failure) => {
                warn!(row, error = %failure, "Submission failed validation");
                operator.report_to(
                    &[Role::Office, Role::Admin],
                    failure.notice_subject(),
                    &failure.notice_body(),
                )
            }
            other => {
                error!(row, kind = other.kind(), error = %other, "Event processing failed");
                operator.report(
                    other.kind(),
                    &format!("イベント: {event}\n行: {row}\nエラー: {other}"),
                )
            }
        };

        EventDetail::Failed {
            kind: err.kind(),
            message: err.to_string(),
            reported_to,
        }
    }
}
