// Payment receipt processing - cross-checks a payment confirmation against the
// request sheet, numbers it, and records the payment as the office receipt

use tracing::{error, info, warn};

use crate::config::TemplateConfig;
use crate::error::{DeskError, DeskResult, ValidationFailure};
use crate::notify::{NotificationSender, OperatorChannel};
use crate::resolver::{looks_like_address, RecipientResolver, Role};
use crate::schema::{ColumnMap, PaymentField, RequestField};
use crate::sequence::{parse_sequence, Assignment, SequenceAssigner};
use crate::store::{is_blank, TabularStore};
use crate::tracker::{ApprovalRecord, ApprovalTracker, TrackerReport};

/// One payment-confirmation row as the student entered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSubmission {
    pub sheet: String,
    pub row: usize,
    pub class: String,
    pub number: String,
    pub name: String,
    pub reception: String,
    pub payment: String,
}

impl PaymentSubmission {
    pub fn read(
        store: &dyn TabularStore,
        columns: &ColumnMap<PaymentField>,
        row: usize,
    ) -> DeskResult<Self> {
        let values = store.read_row(row)?;
        let get = |field| columns.get(&values, field).trim().to_string();
        Ok(Self {
            sheet: store.name().to_string(),
            row,
            class: get(PaymentField::StudentClass),
            number: get(PaymentField::StudentNumber),
            name: get(PaymentField::StudentName),
            reception: get(PaymentField::ReceptionNumber),
            payment: get(PaymentField::PaymentNumber),
        })
    }

    /// Request rows are matched on reception number, class and attendance number
    fn matches(&self, request: &ApprovalRecord) -> bool {
        let entered = parse_sequence(&self.reception);
        entered.is_some()
            && entered == parse_sequence(&request.reception)
            && self.class == request.class
            && self.number == request.number
    }
}

impl ValidationFailure {
    pub fn notice_subject(&self) -> &'static str {
        match self {
            ValidationFailure::DuplicatePaymentNumber { .. } => "【要確認】支払い番号重複エラー",
            ValidationFailure::NoMatchingRequest { .. } => "【要確認】受付番号・生徒情報不一致エラー",
            ValidationFailure::MissingPaymentNumber { .. } => "【要確認】支払い番号未入力",
        }
    }

    /// Office notice quoting the submission
    pub fn notice_body(&self) -> String {
        let s = self.submission();
        let lead = match self {
            ValidationFailure::DuplicatePaymentNumber { other_row, .. } => format!(
                "支払い確認フォームで入力された支払い番号が、既に行 {other_row} で使用されています。"
            ),
            ValidationFailure::NoMatchingRequest { .. } => {
                "入力された受付番号に対応する調査書作成願が見つからないか、\
                 クラス・出席番号が一致しませんでした。"
                    .to_string()
            }
            ValidationFailure::MissingPaymentNumber { .. } => {
                "支払い確認フォームに支払い番号が入力されていません。".to_string()
            }
        };
        format!(
            "{lead}\n\n\
             シート: {}\n\
             行番号: {}\n\
             クラス: {}\n\
             出席番号: {}\n\
             入力された受付番号: {}\n\
             支払い番号: {}\n\n\
             対応する行を確認してください。",
            s.sheet, s.row, s.class, s.number, s.reception, s.payment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Header row or out-of-sheet event
    Ignored,
    Recorded(PaymentReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReport {
    pub payment_row: usize,
    pub request_row: usize,
    pub confirmation: Assignment,
    /// Address of the student notice, when one went out
    pub student_notified: Option<String>,
    pub tracker: TrackerReport,
}

pub struct PaymentReceiptProcessor<'a> {
    sender: &'a dyn NotificationSender,
    resolver: &'a dyn RecipientResolver,
    templates: &'a TemplateConfig,
    assigner: &'a SequenceAssigner,
}

impl<'a> PaymentReceiptProcessor<'a> {
    pub fn new(
        sender: &'a dyn NotificationSender,
        resolver: &'a dyn RecipientResolver,
        templates: &'a TemplateConfig,
        assigner: &'a SequenceAssigner,
    ) -> Self {
        Self {
            sender,
            resolver,
            templates,
            assigner,
        }
    }

    /// Validate and record the payment on `row` of the payments sheet.
    /// Validation failures return before anything is written.
    pub fn process(
        &self,
        payments: &mut dyn TabularStore,
        payment_columns: &ColumnMap<PaymentField>,
        requests: &mut dyn TabularStore,
        request_columns: &ColumnMap<RequestField>,
        row: usize,
    ) -> DeskResult<PaymentOutcome> {
        if row <= 1 {
            return Ok(PaymentOutcome::Ignored);
        }
        let submission = PaymentSubmission::read(payments, payment_columns, row)?;

        if is_blank(&submission.payment) {
            return Err(DeskError::Validation(ValidationFailure::MissingPaymentNumber {
                submission,
            }));
        }
        if let Some(other_row) = find_duplicate(payments, payment_columns, &submission)? {
            return Err(DeskError::Validation(ValidationFailure::DuplicatePaymentNumber {
                submission,
                other_row,
            }));
        }
        let Some(request) = find_request(requests, request_columns, &submission)? else {
            return Err(DeskError::Validation(ValidationFailure::NoMatchingRequest {
                submission,
            }));
        };

        let id_column = payment_columns.required_column(PaymentField::ConfirmationId)?;
        let confirmation = self.assigner.assign(payments, id_column, row)?;
        info!(
            payment_row = row,
            request_row = request.row,
            confirmation_id = confirmation.number(),
            "Payment matched to request"
        );

        let student_notified = if confirmation.is_new() {
            self.notify_student(&submission, &request)
        } else {
            info!(payment_row = row, "Payment already processed; student notice not repeated");
            None
        };

        let office_column = request_columns.required_column(RequestField::OfficeReceipt)?;
        requests.write_cell(request.row, office_column, &submission.payment)?;

        let tracker = ApprovalTracker::new(self.sender, self.resolver, self.templates).evaluate(
            requests,
            request_columns,
            request.row,
        )?;

        Ok(PaymentOutcome::Recorded(PaymentReport {
            payment_row: row,
            request_row: request.row,
            confirmation,
            student_notified,
            tracker,
        }))
    }

    fn notify_student(
        &self,
        submission: &PaymentSubmission,
        request: &ApprovalRecord,
    ) -> Option<String> {
        let operator = OperatorChannel::new(self.sender, self.resolver);

        if !looks_like_address(&request.contact) {
            warn!(
                request_row = request.row,
                contact = %request.contact,
                "Request has no usable student address; payment notice not sent"
            );
            operator.report_to(
                &[Role::Office, Role::Admin],
                "【情報】生徒メールアドレス不備",
                &format!(
                    "受付番号 {} の支払い確認は完了しましたが、調査書作成願シートの行 {} に\
                     生徒のメールアドレスがありませんでした。\n\
                     生徒への確認メールは送信されていません。\n\n\
                     支払い確認シート: {} 行 {}",
                    request.reception_display(),
                    request.row,
                    submission.sheet,
                    submission.row
                ),
            );
            return None;
        }

        let context = request.context().with("payment", &submission.payment);
        let message = self.templates.payment_received.render(&request.contact, &context);
        match self.sender.send(&message) {
            Ok(()) => {
                info!(recipient = %request.contact, payment_row = submission.row, "Payment notice sent");
                Some(request.contact.clone())
            }
            Err(source) => {
                let err = DeskError::Send {
                    recipient: request.contact.clone(),
                    source,
                };
                error!(payment_row = submission.row, error = %err, "Payment notice failed");
                operator.report(err.kind(), &err.to_string());
                None
            }
        }
    }
}

/// Another payments row carrying the same payment number
fn find_duplicate(
    payments: &dyn TabularStore,
    columns: &ColumnMap<PaymentField>,
    submission: &PaymentSubmission,
) -> DeskResult<Option<usize>> {
    let column = columns.required_column(PaymentField::PaymentNumber)?;
    Ok(payments
        .read_column(column)?
        .iter()
        .enumerate()
        .map(|(idx, value)| (idx + 2, value.trim()))
        .find(|(other_row, value)| *other_row != submission.row && *value == submission.payment)
        .map(|(other_row, _)| other_row))
}

fn find_request(
    requests: &dyn TabularStore,
    columns: &ColumnMap<RequestField>,
    submission: &PaymentSubmission,
) -> DeskResult<Option<ApprovalRecord>> {
    for row in 2..=requests.row_count() {
        let values = requests.read_row(row)?;
        if values.iter().all(|v| is_blank(v)) {
            continue;
        }
        let record = ApprovalRecord::from_row(row, &values, columns);
        if submission.matches(&record) {
            return Ok(Some(record));
        }
    }
    Ok(None)
}
