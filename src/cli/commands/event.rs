use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;
use transcript_desk::{
    Desk, DeskError, DeskEvent, DeskResult, EventDetail, EventOutcome, MemoryOutbox,
    NotificationSender, OutboxSender, PaymentOutcome, ReceiptStatus, StoreError,
    SubmissionOutcome, TabularStore, TrackerReport, TransitionOutcome, Workbook,
};

use super::Workspace;

/// Which host event to replay
pub enum EventRequest {
    Submit { row: usize },
    Edit {
        row: usize,
        column: String,
        value: String,
    },
    Payment { row: usize },
}

/// Where notifications go
pub enum Delivery {
    Outbox(PathBuf),
    DryRun,
}

pub struct EventCommand<'a> {
    workspace: &'a Workspace,
    request: EventRequest,
    delivery: Delivery,
}

impl<'a> EventCommand<'a> {
    pub fn new(workspace: &'a Workspace, request: EventRequest, delivery: Delivery) -> Self {
        Self {
            workspace,
            request,
            delivery,
        }
    }

    pub fn execute(&self) -> Result<()> {
        match &self.delivery {
            Delivery::Outbox(path) => {
                let desk = Desk::new(self.workspace.config.clone(), OutboxSender::new(path));
                let outcome = self.run(&desk, true)?;
                print_outcome(&outcome);
                println!("📬 Notifications queued in {}", path.display());
            }
            Delivery::DryRun => {
                let desk = Desk::new(self.workspace.config.clone(), MemoryOutbox::new());
                let outcome = self.run(&desk, false)?;
                print_outcome(&outcome);
                print_dry_run(desk.sender());
            }
        }
        Ok(())
    }

    /// Load, process and save under the workbook lock. With `persist` off
    /// (dry runs) nothing is written back.
    fn run<N: NotificationSender>(&self, desk: &Desk<N>, persist: bool) -> Result<EventOutcome> {
        let path = &self.workspace.workbook_path;
        let outcome = self.workspace.workbook_lock().with_lock(|| {
            let mut book = Workbook::load(path)?;
            let event = self.to_event(&mut book)?;
            let outcome = desk.handle(&mut book, event);
            if persist {
                if let Err(e) = book.save(path) {
                    warn_unsaved_dispatches(&outcome, &e);
                    return Err(e.into());
                }
            }
            Ok(outcome)
        })?;
        Ok(outcome)
    }

    fn to_event(&self, book: &mut Workbook) -> DeskResult<DeskEvent> {
        Ok(match &self.request {
            EventRequest::Submit { row } => DeskEvent::RecordCreated { row: *row },
            EventRequest::Payment { row } => DeskEvent::PaymentSubmitted { row: *row },
            EventRequest::Edit { row, column, value } => {
                let sheet = &mut book.requests;
                let index = sheet
                    .find_column(column.trim())
                    .ok_or_else(|| DeskError::MissingColumns {
                        sheet: sheet.name().to_string(),
                        missing: vec![column.clone()],
                    })?;
                let old_value = sheet
                    .read_row(*row)?
                    .get(index - 1)
                    .cloned()
                    .filter(|v| !v.is_empty());
                sheet.write_cell(*row, index, value)?;
                DeskEvent::RecordEdited {
                    row: *row,
                    column: index,
                    value: value.clone(),
                    old_value,
                }
            }
        })
    }
}

pub(super) fn print_outcome(outcome: &EventOutcome) {
    println!("🧾 {} on row {} ({})", outcome.event, outcome.row, outcome.correlation_id);
    match &outcome.detail {
        EventDetail::Submission(SubmissionOutcome::Ignored)
        | EventDetail::Payment(PaymentOutcome::Ignored) => {
            println!("⏭️  Header row; nothing to do");
        }
        EventDetail::Submission(SubmissionOutcome::Numbered {
            assignment,
            receipt,
            ..
        }) => {
            if assignment.is_new() {
                println!("🔢 Assigned reception number {}", assignment.number());
            } else {
                println!("🔢 Already numbered ({})", assignment.number());
            }
            match receipt {
                ReceiptStatus::Sent { recipient } => println!("📨 Receipt sent to {recipient}"),
                ReceiptStatus::NotRepeated => println!("⏭️  Receipt not repeated"),
                ReceiptStatus::SkippedNoContact => {
                    println!("⚠️  No usable student address; receipt skipped")
                }
                ReceiptStatus::Failed { reason } => println!("❌ Receipt failed: {reason}"),
            }
        }
        EventDetail::Edit(None) => println!("⏭️  Not a stage change; nothing to do"),
        EventDetail::Edit(Some(report)) => print_tracker(report),
        EventDetail::Payment(PaymentOutcome::Recorded(report)) => {
            println!(
                "💴 Payment matched request row {} (confirmation id {})",
                report.request_row,
                report.confirmation.number()
            );
            if let Some(recipient) = &report.student_notified {
                println!("📨 Payment notice sent to {recipient}");
            }
            print_tracker(&report.tracker);
        }
        EventDetail::Failed {
            kind,
            message,
            reported_to,
        } => {
            println!("❌ {kind}: {message}");
            match reported_to {
                Some(to) => println!("📣 Reported to {to}"),
                None => println!("⚠️  No operator address; see the log"),
            }
        }
    }
}

fn print_tracker(report: &TrackerReport) {
    for (transition, outcome) in &report.outcomes {
        match outcome {
            TransitionOutcome::Dispatched { recipient } => {
                println!("✅ {transition}: notified {recipient}")
            }
            TransitionOutcome::SendFailed { recipient, reason } => {
                println!("❌ {transition}: sending to {recipient} failed ({reason})")
            }
            TransitionOutcome::SkippedMissingRecipient { gap } => {
                println!("⚠️  {transition}: skipped, no address for {gap}")
            }
            TransitionOutcome::AlreadyDispatched => println!("☑️  {transition}: already notified"),
            TransitionOutcome::GuardNotMet => println!("⏳ {transition}: waiting"),
        }
    }
}

/// Notifications already went out but their markers were not stored; the
/// next stage edit on the row will send them again.
pub(super) fn warn_unsaved_dispatches(outcome: &EventOutcome, err: &StoreError) {
    let transitions = |report: &TrackerReport| -> Vec<String> {
        report.dispatched().iter().map(ToString::to_string).collect()
    };
    let dispatched = match &outcome.detail {
        EventDetail::Submission(SubmissionOutcome::Numbered {
            receipt: ReceiptStatus::Sent { .. },
            ..
        }) => vec!["submission receipt".to_string()],
        EventDetail::Edit(Some(report)) => transitions(report),
        EventDetail::Payment(PaymentOutcome::Recorded(report)) => transitions(&report.tracker),
        _ => Vec::new(),
    };
    if !dispatched.is_empty() {
        warn!(
            row = outcome.row,
            correlation_id = %outcome.correlation_id,
            transitions = ?dispatched,
            error = %err,
            "Workbook save failed after notifications were sent; markers were not stored"
        );
        eprintln!(
            "⚠️  Sent {} but could not save the workbook; these may be sent again",
            dispatched.join(", ")
        );
    }
}

pub(super) fn print_dry_run(outbox: &MemoryOutbox) {
    let sent = outbox.sent();
    println!();
    println!("🔍 Dry run: {} notification(s) not sent", sent.len());
    println!("   Workbook left unchanged");
    for message in sent {
        println!("──────────────────────────────");
        println!("To: {}", message.recipient);
        println!("Subject: {}", message.subject);
        println!();
        println!("{}", message.body);
    }
}
