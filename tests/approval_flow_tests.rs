// End-to-end approval flow through the desk boundary
// Each test builds an in-memory workbook and collects mail in a MemoryOutbox

use tempfile::TempDir;
use transcript_desk::{
    Desk, DeskConfig, DeskEvent, DispatchMarker, EventDetail, MemoryOutbox, Sheet, TabularStore,
    Transition, TransitionOutcome, Workbook,
};

const FORM_HEADERS: [&str; 8] = [
    "タイムスタンプ",
    "メールアドレスの入力",
    "クラス",
    "出席番号",
    "名前",
    "大学名",
    "学部1",
    "学科1",
];

struct Harness {
    _dir: TempDir,
    desk: Desk<MemoryOutbox>,
    book: Workbook,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = DeskConfig::default();
        config.lock.path = dir.path().join("sequence.lock");
        config.lock.timeout_seconds = 2;
        config.lock.poll_interval_ms = 5;

        let mut book = Workbook::empty(&config.workbook);
        book.requests = Sheet::with_headers(&config.workbook.requests_sheet, &FORM_HEADERS);
        book.settings = Sheet::with_headers(&config.workbook.settings_sheet, &["設定項目", "値"]);
        for (key, value) in [
            ("進路部メール", "guidance@example.com"),
            ("事務室メール", "office@example.com"),
            ("管理者メール", "admin@example.com"),
            ("A組担任メール", "teacher-a@example.com"),
        ] {
            book.settings.push_row(&[key, value]);
        }

        Self {
            _dir: dir,
            desk: Desk::new(config, MemoryOutbox::new()),
            book,
        }
    }

    fn outbox(&self) -> &MemoryOutbox {
        self.desk.sender()
    }

    fn submit(&mut self, class: &str, number: &str, name: &str) -> usize {
        let contact = format!("{name}@example.com");
        let row = self.book.requests.push_row(&[
            "2026/04/01 09:00:00",
            contact.as_str(),
            class,
            number,
            name,
            "東京大学",
            "理学部",
            "",
        ]);
        let outcome = self.desk.handle(&mut self.book, DeskEvent::RecordCreated { row });
        assert!(!outcome.is_failure(), "submission failed: {outcome:?}");
        row
    }

    fn edit(&mut self, row: usize, header: &str, value: &str) -> EventDetail {
        let column = self.book.requests.find_column(header).unwrap();
        self.book.requests.write_cell(row, column, value).unwrap();
        self.desk
            .handle(
                &mut self.book,
                DeskEvent::RecordEdited {
                    row,
                    column,
                    value: value.to_string(),
                    old_value: None,
                },
            )
            .detail
    }

    fn value(&self, row: usize, header: &str) -> String {
        self.book.requests.value(row, header).unwrap_or("").to_string()
    }
}

fn dispatched(detail: &EventDetail) -> Vec<Transition> {
    match detail {
        EventDetail::Edit(Some(report)) => report.dispatched(),
        _ => Vec::new(),
    }
}

#[test]
fn first_record_is_numbered_one_and_the_receipt_quotes_it() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");

    assert_eq!(h.value(row, "受付番号"), "1");
    let receipts = h.outbox().sent_to("sato@example.com");
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].body.contains("受付番号: 1"));
    assert!(receipts[0].body.contains("学科: (未入力)"));
}

#[test]
fn records_are_numbered_in_processing_order() {
    let mut h = Harness::new();
    let rows: Vec<usize> = ["a", "b", "c", "d"]
        .iter()
        .enumerate()
        .map(|(i, name)| h.submit("A組", &(i + 1).to_string(), name))
        .collect();

    let numbers: Vec<String> = rows.iter().map(|row| h.value(*row, "受付番号")).collect();
    assert_eq!(numbers, vec!["1", "2", "3", "4"]);
}

#[test]
fn teacher_approval_alone_notifies_guidance_once() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");
    h.outbox().clear();

    let detail = h.edit(row, "担任の確認", "OK");
    assert_eq!(dispatched(&detail), vec![Transition::TeacherConfirmed]);
    assert_eq!(h.outbox().sent_to("guidance@example.com").len(), 1);

    // Repeated edits of the same stage do not resend
    let detail = h.edit(row, "担任の確認", "OK (再確認)");
    assert!(dispatched(&detail).is_empty());
    assert_eq!(h.outbox().sent().len(), 1);
}

#[test]
fn t2_fires_on_the_edit_that_completes_its_guard() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");
    h.outbox().clear();

    let first = h.edit(row, "進路部の確認", "確認済");
    assert!(dispatched(&first).is_empty());

    let second = h.edit(row, "事務室での受領", "P-001");
    assert_eq!(dispatched(&second), vec![Transition::DepartmentAndOfficeConfirmed]);
    let to_teacher = h.outbox().sent_to("teacher-a@example.com");
    assert_eq!(to_teacher.len(), 1);
    assert!(to_teacher[0].body.contains("事務室受領内容: P-001"));
}

#[test]
fn unknown_class_skips_t2_and_names_the_class_to_the_admin() {
    let mut h = Harness::new();
    let row = h.submit("Q組", "9", "tanaka");
    h.outbox().clear();

    h.edit(row, "進路部の確認", "確認済");
    let detail = h.edit(row, "事務室での受領", "P-002");
    let EventDetail::Edit(Some(report)) = detail else {
        panic!("edit did not run the tracker");
    };
    assert!(matches!(
        report.outcome(Transition::DepartmentAndOfficeConfirmed),
        Some(TransitionOutcome::SkippedMissingRecipient { gap }) if gap.contains("Q組")
    ));
    assert_eq!(h.value(row, "進路部・事務室通知"), "");
    let notices = h.outbox().sent_to("admin@example.com");
    assert_eq!(notices.len(), 1);
    assert!(notices[0].body.contains("Q組"));
}

#[test]
fn skipped_transition_fires_after_the_address_is_added() {
    let mut h = Harness::new();
    let row = h.submit("Q組", "9", "tanaka");
    h.edit(row, "進路部の確認", "確認済");
    h.edit(row, "事務室での受領", "P-002");
    h.outbox().clear();

    h.book.settings.push_row(&["Q組担任メール", "teacher-q@example.com"]);
    let detail = h.edit(row, "担任の確認", "OK");
    assert_eq!(
        dispatched(&detail),
        vec![
            Transition::TeacherConfirmed,
            Transition::DepartmentAndOfficeConfirmed
        ]
    );
    assert_eq!(h.outbox().sent_to("teacher-q@example.com").len(), 1);
}

#[test]
fn completion_reaches_the_student_exactly_once() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");
    h.edit(row, "担任の確認", "OK");
    h.edit(row, "進路部の確認", "確認済");
    h.edit(row, "事務室での受領", "P-003");
    h.outbox().clear();

    let detail = h.edit(row, "調査書作成", "作成済");
    assert_eq!(dispatched(&detail), vec![Transition::Completed]);
    h.edit(row, "調査書作成", "作成済 (再)");

    let to_student = h.outbox().sent_to("sato@example.com");
    assert_eq!(to_student.len(), 1);
    assert!(DispatchMarker::parse(&h.value(row, "完了通知")).is_sent());
}

#[test]
fn clearing_a_stage_is_not_a_trigger() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");
    h.outbox().clear();

    assert_eq!(h.edit(row, "担任の確認", ""), EventDetail::Edit(None));
    assert!(h.outbox().sent().is_empty());
}

#[test]
fn failed_send_is_recorded_and_retried_on_the_next_stage_edit() {
    let mut h = Harness::new();
    let row = h.submit("A組", "1", "sato");
    h.outbox().reject("guidance@example.com");

    h.edit(row, "担任の確認", "OK");
    assert!(h.value(row, "担任確認通知").starts_with("failed "));

    h.outbox().accept("guidance@example.com");
    let detail = h.edit(row, "進路部の確認", "確認済");
    assert_eq!(dispatched(&detail), vec![Transition::TeacherConfirmed]);
    assert!(h.value(row, "担任確認通知").starts_with("sent "));
}

#[test]
fn lock_timeout_is_reported_and_the_event_still_handled() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use transcript_desk::ScriptLock;

    let mut h = Harness::new();
    let lock_path = h.desk.config().lock.path.clone();
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let holder = thread::spawn(move || {
        ScriptLock::new(lock_path, Duration::from_secs(1), Duration::from_millis(5)).with_lock(|| {
            held_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok(())
        })
    });
    held_rx.recv().unwrap();

    let mut config = h.desk.config().clone();
    config.lock.timeout_seconds = 0;
    let desk = Desk::new(config, MemoryOutbox::new());
    let row = h.book.requests.push_row(&["t", "x@example.com", "A組", "1", "x"]);
    let outcome = desk.handle(&mut h.book, DeskEvent::RecordCreated { row });

    release_tx.send(()).unwrap();
    holder.join().unwrap().unwrap();

    match outcome.detail {
        EventDetail::Failed {
            kind, reported_to, ..
        } => {
            assert_eq!(kind, "lock-timeout");
            assert_eq!(reported_to.as_deref(), Some("admin@example.com"));
        }
        other => panic!("unexpected detail: {other:?}"),
    }
    assert_eq!(h.value(row, "受付番号"), "");
}
