// CLI integration tests: each test runs the binary inside its own temp directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;
use transcript_desk::{DeskConfig, OutboxSender, Workbook};

fn desk_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("transcript-desk").unwrap();
    cmd.current_dir(dir.path()).env("RUST_LOG", "warn");
    cmd
}

fn workbook_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join(DeskConfig::default().workbook.path)
}

/// Run `setup`, then add the settings and one request row
fn prepared(dir: &TempDir) -> Workbook {
    desk_cmd(dir).arg("setup").assert().success();

    let path = workbook_path(dir);
    let mut book = Workbook::load(&path).unwrap();
    for (key, value) in [
        ("進路部メール", "guidance@example.com"),
        ("管理者メール", "admin@example.com"),
        ("A組担任メール", "teacher-a@example.com"),
    ] {
        book.settings.push_row(&[key, value]);
    }
    book.requests.push_record(&[
        ("タイムスタンプ", "2026/04/01 09:00:00"),
        ("メールアドレスの入力", "student@example.com"),
        ("クラス", "A組"),
        ("出席番号", "12"),
        ("名前", "佐藤"),
        ("大学名", "東北大学"),
    ]);
    book.save(&path).unwrap();
    book
}

fn outbox_recipients(path: &Path) -> Vec<String> {
    OutboxSender::read_entries(path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.notification.recipient)
        .collect()
}

#[test]
fn test_help_lists_the_event_commands() {
    let dir = TempDir::new().unwrap();
    desk_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("edit"))
        .stdout(predicate::str::contains("payment"))
        .stdout(predicate::str::contains("check-config"));
}

#[test]
fn test_init_config_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    desk_cmd(&dir)
        .args(["init-config", "--path", "desk.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));

    let written = DeskConfig::load(Some(&dir.path().join("desk.toml"))).unwrap();
    assert_eq!(written, DeskConfig::default());

    desk_cmd(&dir)
        .args(["init-config", "--path", "desk.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    desk_cmd(&dir)
        .args(["init-config", "--path", "desk.toml", "--force"])
        .assert()
        .success();
}

#[test]
fn test_setup_provisions_every_column_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    desk_cmd(&dir)
        .arg("setup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created a new workbook"))
        .stdout(predicate::str::contains("Workbook ready"));

    let book = Workbook::load(workbook_path(&dir)).unwrap();
    for header in ["受付番号", "担任確認通知", "進路部・事務室通知", "完了通知"] {
        assert!(book.requests.value(1, header).is_some(), "missing {header}");
    }
    assert!(book.payments.value(1, "支払い確認ID").is_some());

    desk_cmd(&dir)
        .arg("setup")
        .assert()
        .success()
        .stdout(predicate::str::contains("already has every column"));
}

#[test]
fn test_check_config_warns_about_missing_addresses() {
    let dir = TempDir::new().unwrap();
    desk_cmd(&dir)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workbook not found"))
        .stdout(predicate::str::contains("warning(s)"));

    prepared(&dir);
    desk_cmd(&dir)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("guidance@example.com"))
        .stdout(predicate::str::contains("A組 homeroom teacher: teacher-a@example.com"));
}

#[test]
fn test_submit_numbers_the_row_and_queues_the_receipt() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);

    desk_cmd(&dir)
        .args(["submit", "--row", "2", "--outbox", "mail.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assigned reception number 1"))
        .stdout(predicate::str::contains("Receipt sent to student@example.com"));

    let book = Workbook::load(workbook_path(&dir)).unwrap();
    assert_eq!(book.requests.value(2, "受付番号"), Some("1"));
    assert_eq!(
        outbox_recipients(&dir.path().join("mail.jsonl")),
        vec!["student@example.com"]
    );

    // Replaying the same submission keeps the number and sends nothing new
    desk_cmd(&dir)
        .args(["submit", "--row", "2", "--outbox", "mail.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already numbered (1)"));
    assert_eq!(outbox_recipients(&dir.path().join("mail.jsonl")).len(), 1);
}

#[test]
fn test_dry_run_prints_the_message_and_leaves_the_workbook_alone() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);
    desk_cmd(&dir).args(["submit", "--row", "2"]).assert().success();

    desk_cmd(&dir)
        .args(["--dry-run", "edit", "--row", "2", "--column", "担任の確認", "--value", "OK"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notified guidance@example.com"))
        .stdout(predicate::str::contains("Dry run: 1 notification(s) not sent"))
        .stdout(predicate::str::contains("To: guidance@example.com"));

    let book = Workbook::load(workbook_path(&dir)).unwrap();
    assert_eq!(book.requests.value(2, "担任の確認"), Some(""));
    assert_eq!(book.requests.value(2, "担任確認通知"), Some(""));

    // The real edit afterwards still delivers
    desk_cmd(&dir)
        .args(["edit", "--row", "2", "--column", "担任の確認", "--value", "OK", "--outbox", "mail.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notified guidance@example.com"));
    assert_eq!(
        outbox_recipients(&dir.path().join("mail.jsonl")),
        vec!["guidance@example.com"]
    );
    let book = Workbook::load(workbook_path(&dir)).unwrap();
    assert!(book
        .requests
        .value(2, "担任確認通知")
        .is_some_and(|marker| marker.starts_with("sent ")));
}

#[test]
fn test_dry_run_submission_assigns_no_number() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);

    desk_cmd(&dir)
        .args(["--dry-run", "submit", "--row", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assigned reception number 1"))
        .stdout(predicate::str::contains("Workbook left unchanged"));

    let book = Workbook::load(workbook_path(&dir)).unwrap();
    assert_eq!(book.requests.value(2, "受付番号").unwrap_or(""), "");
}

#[test]
fn test_failed_save_after_sending_warns_about_resends() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);
    desk_cmd(&dir).args(["submit", "--row", "2"]).assert().success();

    // Occupy the temp file the save writes through
    std::fs::create_dir_all(workbook_path(&dir).with_extension("json.tmp")).unwrap();

    desk_cmd(&dir)
        .args(["edit", "--row", "2", "--column", "担任の確認", "--value", "OK", "--outbox", "mail.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not save the workbook"))
        .stderr(predicate::str::contains("teacher-confirmed"));
    assert_eq!(outbox_recipients(&dir.path().join("mail.jsonl")).len(), 1);
}

#[test]
fn test_backfill_continues_from_the_highest_number_in_row_order() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);
    let path = workbook_path(&dir);
    let mut book = Workbook::load(&path).unwrap();
    book.requests.push_record(&[
        ("メールアドレスの入力", "early@example.com"),
        ("クラス", "A組"),
        ("出席番号", "3"),
        ("名前", "伊藤"),
        ("受付番号", "4"),
    ]);
    book.requests.push_record(&[
        ("メールアドレスの入力", "late@example.com"),
        ("クラス", "A組"),
        ("出席番号", "5"),
        ("名前", "江藤"),
    ]);
    book.save(&path).unwrap();

    desk_cmd(&dir)
        .args(["backfill", "--outbox", "mail.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assigned reception number 5"))
        .stdout(predicate::str::contains("Assigned reception number 6"))
        .stdout(predicate::str::contains("Processed 2 row(s), 0 failed"));

    let book = Workbook::load(&path).unwrap();
    assert_eq!(book.requests.value(2, "受付番号"), Some("5"));
    assert_eq!(book.requests.value(3, "受付番号"), Some("4"));
    assert_eq!(book.requests.value(4, "受付番号"), Some("6"));
    assert_eq!(
        outbox_recipients(&dir.path().join("mail.jsonl")),
        vec!["student@example.com", "late@example.com"]
    );

    desk_cmd(&dir)
        .arg("backfill")
        .assert()
        .success()
        .stdout(predicate::str::contains("Every request already has a reception number"));
}

#[test]
fn test_edit_of_an_unknown_column_fails() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);

    desk_cmd(&dir)
        .args(["edit", "--row", "2", "--column", "存在しない列", "--value", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("存在しない列"));
}

#[test]
fn test_unmatched_payment_is_reported_not_recorded() {
    let dir = TempDir::new().unwrap();
    prepared(&dir);
    desk_cmd(&dir).args(["submit", "--row", "2"]).assert().success();

    let path = workbook_path(&dir);
    let mut book = Workbook::load(&path).unwrap();
    book.payments.push_record(&[
        ("クラス", "B組"),
        ("出席番号", "12"),
        ("名前", "佐藤"),
        ("受付番号", "1"),
        ("支払い番号", "PAY-7"),
    ]);
    book.save(&path).unwrap();

    desk_cmd(&dir)
        .args(["--dry-run", "payment", "--row", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("validation"))
        .stdout(predicate::str::contains("Reported to admin@example.com"));

    let book = Workbook::load(&path).unwrap();
    assert_ne!(book.requests.value(2, "事務室での受領"), Some("PAY-7"));
}
