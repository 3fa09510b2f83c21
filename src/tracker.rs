// Approval state tracker - stage guards, dispatch markers and at-most-once notices
//
// Evaluation is level-triggered: whenever a stage cell receives a value, every
// transition is checked against the whole row as currently stored, and the
// dispatch marker decides whether it may still fire.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::{MessageTemplate, TemplateConfig};
use crate::error::DeskResult;
use crate::notify::{NotificationSender, OperatorChannel};
use crate::resolver::{looks_like_address, RecipientKey, RecipientResolver, Role};
use crate::schema::{ColumnMap, RequestField};
use crate::sequence::parse_sequence;
use crate::store::{is_blank, TabularStore};
use crate::template::MessageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// T1: the homeroom teacher confirmed; tell the guidance department
    TeacherConfirmed,
    /// T2: guidance confirmed and the office received payment; tell the homeroom teacher
    DepartmentAndOfficeConfirmed,
    /// T3: every stage done; tell the student
    Completed,
}

impl Transition {
    /// Evaluation order
    pub const ALL: [Transition; 3] = [
        Transition::TeacherConfirmed,
        Transition::DepartmentAndOfficeConfirmed,
        Transition::Completed,
    ];

    /// Stage fields that must all be non-empty
    pub fn guard(self) -> &'static [RequestField] {
        match self {
            Transition::TeacherConfirmed => &[RequestField::TeacherApproval],
            Transition::DepartmentAndOfficeConfirmed => &[
                RequestField::DepartmentApproval,
                RequestField::OfficeReceipt,
            ],
            Transition::Completed => &RequestField::STAGES,
        }
    }

    /// Field holding this transition's dispatch marker
    pub fn marker(self) -> RequestField {
        match self {
            Transition::TeacherConfirmed => RequestField::TeacherApprovalNotified,
            Transition::DepartmentAndOfficeConfirmed => RequestField::DepartmentAndOfficeNotified,
            Transition::Completed => RequestField::CompletionNotified,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Transition::TeacherConfirmed => "teacher-confirmed",
            Transition::DepartmentAndOfficeConfirmed => "department-and-office-confirmed",
            Transition::Completed => "completed",
        }
    }

    fn template(self, templates: &TemplateConfig) -> &MessageTemplate {
        match self {
            Transition::TeacherConfirmed => &templates.teacher_confirmed,
            Transition::DepartmentAndOfficeConfirmed => &templates.department_and_office_confirmed,
            Transition::Completed => &templates.completed,
        }
    }

    fn recipient(self, record: &ApprovalRecord) -> Recipient {
        match self {
            Transition::TeacherConfirmed => Recipient::Directory(RecipientKey::Role(Role::Guidance)),
            Transition::DepartmentAndOfficeConfirmed => {
                Recipient::Directory(RecipientKey::ClassTeacher(record.class.clone()))
            }
            Transition::Completed => Recipient::StudentContact,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

enum Recipient {
    Directory(RecipientKey),
    StudentContact,
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Directory(key) => write!(f, "{key}"),
            Recipient::StudentContact => write!(f, "student contact address"),
        }
    }
}

/// Persisted dispatch state of one transition on one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMarker {
    NotYet,
    /// `at` is absent for legacy hand-written flags
    Sent { at: Option<DateTime<Utc>> },
    /// The last attempt failed; the next qualifying edit tries again
    SendFailed { at: DateTime<Utc>, reason: String },
}

const SENT_PREFIX: &str = "sent ";
const FAILED_PREFIX: &str = "failed ";

impl DispatchMarker {
    /// Read a marker cell. Unrecognised non-empty text counts as sent so that
    /// flags written by hand never cause a second notification.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return DispatchMarker::NotYet;
        }
        if let Some(rest) = value.strip_prefix(FAILED_PREFIX) {
            if let Some((at, reason)) = rest.split_once(": ") {
                if let Ok(at) = DateTime::parse_from_rfc3339(at.trim()) {
                    return DispatchMarker::SendFailed {
                        at: at.with_timezone(&Utc),
                        reason: reason.trim().to_string(),
                    };
                }
            }
        }
        let at = value
            .strip_prefix(SENT_PREFIX)
            .and_then(|at| DateTime::parse_from_rfc3339(at.trim()).ok())
            .map(|at| at.with_timezone(&Utc));
        DispatchMarker::Sent { at }
    }

    /// Cell text; the inverse of `parse` for every marker this crate writes
    pub fn render(&self) -> String {
        match self {
            DispatchMarker::NotYet => String::new(),
            DispatchMarker::Sent { at: Some(at) } => format!("{SENT_PREFIX}{}", at.to_rfc3339()),
            DispatchMarker::Sent { at: None } => "sent".to_string(),
            DispatchMarker::SendFailed { at, reason } => format!(
                "{FAILED_PREFIX}{}: {}",
                at.to_rfc3339(),
                reason.replace(['\r', '\n'], " ")
            ),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchMarker::Sent { .. })
    }
}

/// The fields of one request row the tracker and its messages look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub row: usize,
    pub contact: String,
    pub class: String,
    pub number: String,
    pub name: String,
    pub reception: String,
    pub university: String,
    pub faculty: String,
    pub major: String,
    pub teacher_approval: String,
    pub department_approval: String,
    pub office_receipt: String,
    pub document_created: String,
    teacher_marker: DispatchMarker,
    department_marker: DispatchMarker,
    completion_marker: DispatchMarker,
}

impl ApprovalRecord {
    pub fn from_row(row: usize, values: &[String], columns: &ColumnMap<RequestField>) -> Self {
        let get = |field| columns.get(values, field).trim().to_string();
        let marker = |field| DispatchMarker::parse(columns.get(values, field));
        Self {
            row,
            contact: get(RequestField::StudentContact),
            class: get(RequestField::StudentClass),
            number: get(RequestField::StudentNumber),
            name: get(RequestField::StudentName),
            reception: get(RequestField::SequenceNumber),
            university: get(RequestField::University),
            faculty: get(RequestField::Faculty),
            major: get(RequestField::Major),
            teacher_approval: get(RequestField::TeacherApproval),
            department_approval: get(RequestField::DepartmentApproval),
            office_receipt: get(RequestField::OfficeReceipt),
            document_created: get(RequestField::DocumentCreated),
            teacher_marker: marker(RequestField::TeacherApprovalNotified),
            department_marker: marker(RequestField::DepartmentAndOfficeNotified),
            completion_marker: marker(RequestField::CompletionNotified),
        }
    }

    pub fn read(
        store: &dyn TabularStore,
        columns: &ColumnMap<RequestField>,
        row: usize,
    ) -> DeskResult<Self> {
        let values = store.read_row(row)?;
        Ok(Self::from_row(row, &values, columns))
    }

    pub fn stage(&self, field: RequestField) -> &str {
        match field {
            RequestField::TeacherApproval => &self.teacher_approval,
            RequestField::DepartmentApproval => &self.department_approval,
            RequestField::OfficeReceipt => &self.office_receipt,
            RequestField::DocumentCreated => &self.document_created,
            _ => "",
        }
    }

    pub fn guard_holds(&self, transition: Transition) -> bool {
        transition
            .guard()
            .iter()
            .all(|field| !is_blank(self.stage(*field)))
    }

    pub fn marker(&self, transition: Transition) -> &DispatchMarker {
        match transition {
            Transition::TeacherConfirmed => &self.teacher_marker,
            Transition::DepartmentAndOfficeConfirmed => &self.department_marker,
            Transition::Completed => &self.completion_marker,
        }
    }

    /// Reception number as shown to people: `12.0` reads as `12`
    pub fn reception_display(&self) -> String {
        parse_sequence(&self.reception)
            .map(|n| n.to_string())
            .unwrap_or_else(|| self.reception.clone())
    }

    pub fn identity(&self) -> String {
        format!("{} {}番 {}", self.class, self.number, self.name)
    }

    /// Placeholder values for every message about this record
    pub fn context(&self) -> MessageContext {
        MessageContext::new()
            .with("class", &self.class)
            .with("number", &self.number)
            .with("name", &self.name)
            .with("reception", self.reception_display())
            .with_optional("university", &self.university)
            .with_optional("faculty", &self.faculty)
            .with_optional("major", &self.major)
            .with("teacher_comment", &self.teacher_approval)
            .with("department_comment", &self.department_approval)
            .with("office_comment", &self.office_receipt)
    }
}

/// A cell edit as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: usize,
    pub column: usize,
    pub value: String,
}

impl CellEdit {
    /// Only a non-empty value landing in a stage column of a data row triggers evaluation
    pub fn is_trigger(&self, columns: &ColumnMap<RequestField>) -> bool {
        self.row > 1
            && !is_blank(&self.value)
            && columns
                .field_at(self.column)
                .is_some_and(RequestField::is_stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Dispatched { recipient: String },
    SendFailed { recipient: String, reason: String },
    /// No usable address; the operator was told and the marker stays unset
    SkippedMissingRecipient { gap: String },
    AlreadyDispatched,
    GuardNotMet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerReport {
    pub row: usize,
    pub outcomes: Vec<(Transition, TransitionOutcome)>,
}

impl TrackerReport {
    pub fn outcome(&self, transition: Transition) -> Option<&TransitionOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| *t == transition)
            .map(|(_, outcome)| outcome)
    }

    /// Transitions whose notification went out during this evaluation
    pub fn dispatched(&self) -> Vec<Transition> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TransitionOutcome::Dispatched { .. }))
            .map(|(t, _)| *t)
            .collect()
    }
}

/// Checks the three transitions of one record and sends what is due
pub struct ApprovalTracker<'a> {
    sender: &'a dyn NotificationSender,
    resolver: &'a dyn RecipientResolver,
    templates: &'a TemplateConfig,
}

impl<'a> ApprovalTracker<'a> {
    pub fn new(
        sender: &'a dyn NotificationSender,
        resolver: &'a dyn RecipientResolver,
        templates: &'a TemplateConfig,
    ) -> Self {
        Self {
            sender,
            resolver,
            templates,
        }
    }

    /// Evaluate T1, T2 and T3 in order against the row as stored now
    pub fn evaluate(
        &self,
        store: &mut dyn TabularStore,
        columns: &ColumnMap<RequestField>,
        row: usize,
    ) -> DeskResult<TrackerReport> {
        let record = ApprovalRecord::read(store, columns, row)?;
        let mut outcomes = Vec::with_capacity(Transition::ALL.len());

        for transition in Transition::ALL {
            let outcome = self.evaluate_one(store, columns, &record, transition)?;
            debug!(row, transition = %transition, outcome = ?outcome, "Transition evaluated");
            outcomes.push((transition, outcome));
        }

        Ok(TrackerReport { row, outcomes })
    }

    fn evaluate_one(
        &self,
        store: &mut dyn TabularStore,
        columns: &ColumnMap<RequestField>,
        record: &ApprovalRecord,
        transition: Transition,
    ) -> DeskResult<TransitionOutcome> {
        if !record.guard_holds(transition) {
            return Ok(TransitionOutcome::GuardNotMet);
        }
        if record.marker(transition).is_sent() {
            return Ok(TransitionOutcome::AlreadyDispatched);
        }

        let target = transition.recipient(record);
        let address = match &target {
            Recipient::Directory(key) => self.resolver.resolve(key),
            Recipient::StudentContact => Some(record.contact.clone()),
        }
        .map(|address| address.trim().to_string())
        .filter(|address| looks_like_address(address));

        let Some(address) = address else {
            let gap = target.to_string();
            warn!(
                row = record.row,
                transition = %transition,
                gap = %gap,
                "No usable address; transition skipped"
            );
            self.report_missing_recipient(record, transition, &gap);
            return Ok(TransitionOutcome::SkippedMissingRecipient { gap });
        };

        let message = transition
            .template(self.templates)
            .render(&address, &record.context());
        let marker_column = columns.required_column(transition.marker())?;

        match self.sender.send(&message) {
            Ok(()) => {
                let marker = DispatchMarker::Sent {
                    at: Some(Utc::now()),
                };
                store.write_cell(record.row, marker_column, &marker.render())?;
                info!(
                    row = record.row,
                    transition = %transition,
                    recipient = %address,
                    "Notification dispatched"
                );
                Ok(TransitionOutcome::Dispatched { recipient: address })
            }
            Err(e) => {
                let reason = e.to_string();
                let marker = DispatchMarker::SendFailed {
                    at: Utc::now(),
                    reason: reason.clone(),
                };
                store.write_cell(record.row, marker_column, &marker.render())?;
                error!(
                    row = record.row,
                    transition = %transition,
                    recipient = %address,
                    error = %e,
                    "Notification failed; marker set to retry on the next stage edit"
                );
                OperatorChannel::new(self.sender, self.resolver).report(
                    "send",
                    &format!(
                        "行 {} ({}) の {} 通知を {} に送信できませんでした。\n理由: {}\n\
                         次回の段階入力で再送されます。",
                        record.row,
                        record.identity(),
                        transition,
                        address,
                        reason
                    ),
                );
                Ok(TransitionOutcome::SendFailed {
                    recipient: address,
                    reason,
                })
            }
        }
    }

    fn report_missing_recipient(&self, record: &ApprovalRecord, transition: Transition, gap: &str) {
        let hint = match transition {
            Transition::TeacherConfirmed => format!(
                "設定シートに '{}' を追加してください。",
                crate::resolver::GUIDANCE_KEY
            ),
            Transition::DepartmentAndOfficeConfirmed => format!(
                "設定シートに '{}{}' を追加してください。",
                record.class,
                crate::resolver::TEACHER_KEY_SUFFIX
            ),
            Transition::Completed => "生徒のメールアドレスを確認してください。".to_string(),
        };
        OperatorChannel::new(self.sender, self.resolver).report(
            "configuration",
            &format!(
                "行 {} ({}) の {} 通知を送信できませんでした。\n\
                 宛先が見つかりません: {}\n{}",
                record.row,
                record.identity(),
                transition,
                gap,
                hint
            ),
        );
    }
}
