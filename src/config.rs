use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "transcript-desk.toml";

/// Main configuration structure for the transcript desk
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Workbook file and sheet names
    pub workbook: WorkbookConfig,
    /// Sequence lock settings
    pub lock: LockConfig,
    /// Header names on the requests sheet
    pub headers: HeaderConfig,
    /// Header names on the payments sheet
    pub payment_headers: PaymentHeaderConfig,
    /// Recipient addresses (the settings sheet may override them)
    pub directory: DirectoryConfig,
    /// Message templates
    pub templates: TemplateConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkbookConfig {
    /// JSON file holding all sheets
    pub path: PathBuf,
    pub requests_sheet: String,
    pub payments_sheet: String,
    pub settings_sheet: String,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".transcript-desk/workbook.json"),
            requests_sheet: "【進路】調査書作成願".to_string(),
            payments_sheet: "支払い確認".to_string(),
            settings_sheet: "設定".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock file guarding sequence assignment
    pub path: PathBuf,
    /// How long to wait for the lock before giving up
    pub timeout_seconds: u64,
    /// Sleep between acquisition attempts
    pub poll_interval_ms: u64,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".transcript-desk/sequence.lock"),
            timeout_seconds: 15,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub timestamp: String,
    pub student_contact: String,
    pub student_class: String,
    pub student_number: String,
    pub student_name: String,
    pub university: String,
    pub faculty: String,
    pub major: String,
    pub sequence_number: String,
    pub teacher_approval: String,
    pub department_approval: String,
    pub office_receipt: String,
    pub document_created: String,
    pub teacher_approval_notified: String,
    pub department_and_office_notified: String,
    pub completion_notified: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            timestamp: "タイムスタンプ".to_string(),
            student_contact: "メールアドレスの入力".to_string(),
            student_class: "クラス".to_string(),
            student_number: "出席番号".to_string(),
            student_name: "名前".to_string(),
            university: "大学名".to_string(),
            faculty: "学部1".to_string(),
            major: "学科1".to_string(),
            sequence_number: "受付番号".to_string(),
            teacher_approval: "担任の確認".to_string(),
            department_approval: "進路部の確認".to_string(),
            office_receipt: "事務室での受領".to_string(),
            document_created: "調査書作成".to_string(),
            teacher_approval_notified: "担任確認通知".to_string(),
            department_and_office_notified: "進路部・事務室通知".to_string(),
            completion_notified: "完了通知".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentHeaderConfig {
    pub student_class: String,
    pub student_number: String,
    pub student_name: String,
    pub reception_number: String,
    pub payment_number: String,
    pub confirmation_id: String,
}

impl Default for PaymentHeaderConfig {
    fn default() -> Self {
        Self {
            student_class: "クラス".to_string(),
            student_number: "出席番号".to_string(),
            student_name: "名前".to_string(),
            reception_number: "受付番号".to_string(),
            payment_number: "支払い番号".to_string(),
            confirmation_id: "支払い確認ID".to_string(),
        }
    }
}

/// Addresses known before the settings sheet is read
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub guidance: Option<String>,
    pub office: Option<String>,
    pub admin: Option<String>,
    /// Homeroom teachers; a list so class names keep their case
    pub teachers: Vec<TeacherEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeacherEntry {
    pub class: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    fn new(subject: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Sent to the student once a reception number is assigned
    pub submission_receipt: MessageTemplate,
    /// T1, to the guidance department
    pub teacher_confirmed: MessageTemplate,
    /// T2, to the homeroom teacher
    pub department_and_office_confirmed: MessageTemplate,
    /// T3, to the student
    pub completed: MessageTemplate,
    /// Sent to the student after a valid payment confirmation
    pub payment_received: MessageTemplate,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            submission_receipt: MessageTemplate::new(
                "【進路】調査書作成願 受付完了のお知らせ",
                "{name} さん ({class} {number}番)\n\n\
                 フォームへのご提出ありがとうございました。\n\
                 以下の内容で受付を完了しました。\n\n\
                 受付番号: {reception}\n\n\
                 --- 入力内容の控え (1件目) ---\n\
                 大学名: {university}\n\
                 学部: {faculty}\n\
                 学科: {major}\n\
                 ---------------------------\n\n\
                 今後の手続きについては、別途連絡をお待ちください。",
            ),
            teacher_confirmed: MessageTemplate::new(
                "【要確認】担任確認完了:{class}_{number}_{name} (受付番号: {reception})",
                "担任の確認が完了しました。\n\n\
                 クラス: {class}\n\
                 出席番号: {number}\n\
                 氏名: {name}\n\
                 受付番号: {reception}\n\n\
                 担任確認内容: {teacher_comment}\n\n\
                 スプレッドシートをご確認ください。",
            ),
            department_and_office_confirmed: MessageTemplate::new(
                "【進路部・事務室 受領連絡】{class} {number}番 {name} (受付番号: {reception})",
                "{class}担任様\n\n\
                 {number}番 {name} さん (受付番号 {reception}) の調査書作成願について、\
                 進路部および事務室での確認・受領が完了しました。\n\n\
                 進路部確認内容: {department_comment}\n\
                 事務室受領内容: {office_comment}\n\n\
                 次のステップ（調査書作成）に進んでください。",
            ),
            completed: MessageTemplate::new(
                "【進路】調査書 準備完了のお知らせ",
                "{name} さん ({class} {number}番)\n\n\
                 受付番号 {reception} の調査書が作成されました。\n\n\
                 担任の先生から受け取ってください。",
            ),
            payment_received: MessageTemplate::new(
                "【支払い確認】調査書作成願の支払いを確認しました",
                "{name} さん ({class} {number}番)\n\n\
                 調査書作成願 (受付番号: {reception}) の支払い確認フォームの送信を受け付けました。\n\n\
                 支払い番号: {payment}\n\n\
                 内容を確認し、調査書作成を進めます。\n\
                 調査書が作成できましたら、改めてメールでご連絡します。\n\
                 しばらくお待ちください。",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl DeskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or transcript-desk.toml when present)
    /// 3. Environment variables (TRANSCRIPT_DESK_<SECTION>__<KEY>)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("TRANSCRIPT_DESK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: DeskConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
