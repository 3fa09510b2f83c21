// Logical fields and their resolution to physical columns
//
// The core only ever talks about fields; header names live in the config and
// are turned into column positions once per event here.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::config::{HeaderConfig, PaymentHeaderConfig};
use crate::error::{DeskError, DeskResult};
use crate::store::{cell, StoreError, TabularStore};

/// A set of logical fields that can be located by header name.
pub trait FieldSet: Copy + Eq + Hash + Debug + 'static {
    type Headers;

    fn all() -> &'static [Self];

    /// Fields the processing cannot work without
    fn required() -> &'static [Self];

    /// Fields the system creates on the sheet when they are absent
    fn provisioned() -> &'static [Self];

    fn header(self, headers: &Self::Headers) -> &str;
}

/// Fields of the requests sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestField {
    Timestamp,
    StudentContact,
    StudentClass,
    StudentNumber,
    StudentName,
    University,
    Faculty,
    Major,
    SequenceNumber,
    TeacherApproval,
    DepartmentApproval,
    OfficeReceipt,
    DocumentCreated,
    TeacherApprovalNotified,
    DepartmentAndOfficeNotified,
    CompletionNotified,
}

impl RequestField {
    /// The four approval checkpoints, in workflow order
    pub const STAGES: [RequestField; 4] = [
        RequestField::TeacherApproval,
        RequestField::DepartmentApproval,
        RequestField::OfficeReceipt,
        RequestField::DocumentCreated,
    ];

    pub fn is_stage(self) -> bool {
        Self::STAGES.contains(&self)
    }
}

impl FieldSet for RequestField {
    type Headers = HeaderConfig;

    fn all() -> &'static [Self] {
        use RequestField::*;
        &[
            Timestamp,
            StudentContact,
            StudentClass,
            StudentNumber,
            StudentName,
            University,
            Faculty,
            Major,
            SequenceNumber,
            TeacherApproval,
            DepartmentApproval,
            OfficeReceipt,
            DocumentCreated,
            TeacherApprovalNotified,
            DepartmentAndOfficeNotified,
            CompletionNotified,
        ]
    }

    fn required() -> &'static [Self] {
        use RequestField::*;
        &[
            StudentContact,
            StudentClass,
            StudentNumber,
            StudentName,
            SequenceNumber,
            TeacherApproval,
            DepartmentApproval,
            OfficeReceipt,
            DocumentCreated,
            TeacherApprovalNotified,
            DepartmentAndOfficeNotified,
            CompletionNotified,
        ]
    }

    fn provisioned() -> &'static [Self] {
        use RequestField::*;
        &[
            TeacherApproval,
            DepartmentApproval,
            OfficeReceipt,
            DocumentCreated,
            SequenceNumber,
            TeacherApprovalNotified,
            DepartmentAndOfficeNotified,
            CompletionNotified,
        ]
    }

    fn header(self, headers: &HeaderConfig) -> &str {
        use RequestField::*;
        match self {
            Timestamp => &headers.timestamp,
            StudentContact => &headers.student_contact,
            StudentClass => &headers.student_class,
            StudentNumber => &headers.student_number,
            StudentName => &headers.student_name,
            University => &headers.university,
            Faculty => &headers.faculty,
            Major => &headers.major,
            SequenceNumber => &headers.sequence_number,
            TeacherApproval => &headers.teacher_approval,
            DepartmentApproval => &headers.department_approval,
            OfficeReceipt => &headers.office_receipt,
            DocumentCreated => &headers.document_created,
            TeacherApprovalNotified => &headers.teacher_approval_notified,
            DepartmentAndOfficeNotified => &headers.department_and_office_notified,
            CompletionNotified => &headers.completion_notified,
        }
    }
}

/// Fields of the payment-confirmation sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentField {
    StudentClass,
    StudentNumber,
    StudentName,
    ReceptionNumber,
    PaymentNumber,
    ConfirmationId,
}

impl FieldSet for PaymentField {
    type Headers = PaymentHeaderConfig;

    fn all() -> &'static [Self] {
        use PaymentField::*;
        &[
            StudentClass,
            StudentNumber,
            StudentName,
            ReceptionNumber,
            PaymentNumber,
            ConfirmationId,
        ]
    }

    fn required() -> &'static [Self] {
        Self::all()
    }

    fn provisioned() -> &'static [Self] {
        &[PaymentField::ConfirmationId]
    }

    fn header(self, headers: &PaymentHeaderConfig) -> &str {
        use PaymentField::*;
        match self {
            StudentClass => &headers.student_class,
            StudentNumber => &headers.student_number,
            StudentName => &headers.student_name,
            ReceptionNumber => &headers.reception_number,
            PaymentNumber => &headers.payment_number,
            ConfirmationId => &headers.confirmation_id,
        }
    }
}

/// Field -> 1-based column positions for one sheet, resolved once per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap<F: FieldSet> {
    columns: HashMap<F, usize>,
}

impl<F: FieldSet> ColumnMap<F> {
    /// Locate every field; fails when a required field has no column
    pub fn resolve(store: &dyn TabularStore, headers: &F::Headers) -> DeskResult<Self> {
        let mut columns = HashMap::new();
        for &field in F::all() {
            if let Some(column) = store.find_column(field.header(headers)) {
                columns.insert(field, column);
            }
        }

        let missing: Vec<String> = F::required()
            .iter()
            .filter(|field| !columns.contains_key(*field))
            .map(|field| field.header(headers).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DeskError::MissingColumns {
                sheet: store.name().to_string(),
                missing,
            });
        }

        Ok(Self { columns })
    }

    pub fn column(&self, field: F) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Column of a required field; resolve() guarantees it exists
    pub fn required_column(&self, field: F) -> DeskResult<usize> {
        self.column(field)
            .ok_or_else(|| DeskError::Config(format!("column for {field:?} was not resolved")))
    }

    /// Field stored at a column, if any
    pub fn field_at(&self, column: usize) -> Option<F> {
        self.columns
            .iter()
            .find(|(_, at)| **at == column)
            .map(|(&field, _)| field)
    }

    /// Value of a field in an already-read row; absent columns read as empty
    pub fn get<'r>(&self, row: &'r [String], field: F) -> &'r str {
        self.column(field).map(|column| cell(row, column)).unwrap_or("")
    }
}

/// Append every provisioned header the sheet lacks; returns the headers added
pub fn ensure_headers<F: FieldSet>(
    store: &mut dyn TabularStore,
    headers: &F::Headers,
) -> Result<Vec<String>, StoreError> {
    let missing: Vec<String> = F::provisioned()
        .iter()
        .map(|field| field.header(headers).to_string())
        .filter(|header| store.find_column(header).is_none())
        .collect();

    if !missing.is_empty() {
        store.append_headers(&missing)?;
        tracing::info!(
            sheet = %store.name(),
            added = ?missing,
            "Added missing headers"
        );
    }
    Ok(missing)
}
