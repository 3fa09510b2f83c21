use anyhow::Result;
use transcript_desk::{Directory, Workbook};

use super::Workspace;

pub struct CheckConfigCommand<'a> {
    workspace: &'a Workspace,
}

impl<'a> CheckConfigCommand<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    pub fn execute(&self) -> Result<()> {
        let config = &self.workspace.config;
        println!("🔍 transcript-desk configuration");
        println!("================================");
        println!();
        println!("📒 Workbook: {}", self.workspace.workbook_path.display());
        println!("   Requests sheet: {}", config.workbook.requests_sheet);
        println!("   Payments sheet: {}", config.workbook.payments_sheet);
        println!("   Settings sheet: {}", config.workbook.settings_sheet);
        println!(
            "🔒 Sequence lock: {} (wait up to {}s)",
            config.lock.path.display(),
            config.lock.timeout_seconds
        );
        println!();

        let mut directory = Directory::from_config(&config.directory);
        if self.workspace.workbook_path.exists() {
            let book = Workbook::load(&self.workspace.workbook_path)?;
            directory = directory.overlay(Directory::from_settings_rows(&book.settings_rows()));
        } else {
            println!("⚠️  Workbook not found; showing addresses from the config file only");
            println!();
        }

        println!("📇 Addresses:");
        print_address("Guidance department", directory.guidance.as_deref());
        print_address("Office", directory.office.as_deref());
        print_address("Administrator", directory.admin.as_deref());
        if directory.teachers.is_empty() {
            println!("   Homeroom teachers: (none)");
        }
        for (class, address) in &directory.teachers {
            println!("   {class} homeroom teacher: {address}");
        }
        println!();

        let warnings = directory.warnings();
        if warnings.is_empty() {
            println!("✅ No configuration warnings");
        } else {
            println!("⚠️  {} warning(s):", warnings.len());
            for warning in warnings {
                println!("   • {warning}");
            }
        }
        Ok(())
    }
}

fn print_address(label: &str, address: Option<&str>) {
    println!("   {label}: {}", address.unwrap_or("(not set)"));
}
