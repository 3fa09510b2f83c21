use anyhow::Result;
use transcript_desk::schema::ensure_headers;
use transcript_desk::{DeskResult, FieldSet, PaymentField, RequestField, TabularStore, Workbook};

use super::Workspace;

const SETTINGS_HEADERS: [&str; 2] = ["設定項目", "値"];

pub struct SetupCommand<'a> {
    workspace: &'a Workspace,
}

#[derive(Debug, Default)]
struct SetupSummary {
    created: bool,
    request_headers: Vec<String>,
    payment_headers: Vec<String>,
    settings_headers: bool,
}

impl<'a> SetupCommand<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    pub fn execute(&self) -> Result<()> {
        println!("🛠️  Preparing workbook {}", self.workspace.workbook_path.display());
        println!();

        let summary = self
            .workspace
            .workbook_lock()
            .with_lock(|| self.provision())?;

        if summary.created {
            println!("📒 Created a new workbook");
        }
        report_headers(&self.workspace.config.workbook.requests_sheet, &summary.request_headers);
        report_headers(&self.workspace.config.workbook.payments_sheet, &summary.payment_headers);
        if summary.settings_headers {
            println!(
                "⚙️  Added key/value headers to '{}'",
                self.workspace.config.workbook.settings_sheet
            );
        }
        println!();
        println!("✅ Workbook ready");
        super::show_quick_start();
        Ok(())
    }

    fn provision(&self) -> DeskResult<SetupSummary> {
        let config = &self.workspace.config;
        let path = &self.workspace.workbook_path;
        let mut summary = SetupSummary {
            created: !path.exists(),
            ..SetupSummary::default()
        };

        let mut book = Workbook::load_or_empty(path, &config.workbook)?;
        // A fresh sheet gets the form's own columns too, in form order
        if book.requests.headers().is_empty() {
            book.requests
                .append_headers(&field_headers::<RequestField>(&config.headers))?;
        }
        if book.payments.headers().is_empty() {
            book.payments
                .append_headers(&field_headers::<PaymentField>(&config.payment_headers))?;
        }
        summary.request_headers = ensure_headers::<RequestField>(&mut book.requests, &config.headers)?;
        summary.payment_headers =
            ensure_headers::<PaymentField>(&mut book.payments, &config.payment_headers)?;
        if book.settings.headers().is_empty() {
            let headers: Vec<String> = SETTINGS_HEADERS.iter().map(|h| h.to_string()).collect();
            book.settings.append_headers(&headers)?;
            summary.settings_headers = true;
        }
        book.save(path)?;
        Ok(summary)
    }
}

fn field_headers<F: FieldSet>(headers: &F::Headers) -> Vec<String> {
    F::all()
        .iter()
        .map(|field| field.header(headers).to_string())
        .collect()
}

fn report_headers(sheet: &str, added: &[String]) {
    if added.is_empty() {
        println!("✅ '{sheet}' already has every column");
    } else {
        println!("➕ '{sheet}': added {}", added.join(", "));
    }
}
