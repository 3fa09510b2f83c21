use anyhow::{anyhow, Result};
use std::path::PathBuf;
use transcript_desk::DeskConfig;

pub struct InitConfigCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl InitConfigCommand {
    pub fn new(path: PathBuf, force: bool) -> Self {
        Self { path, force }
    }

    pub fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            return Err(anyhow!(
                "{} already exists. Use --force to overwrite it.",
                self.path.display()
            ));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        DeskConfig::default().save_to_file(&self.path)?;
        println!("✅ Wrote default configuration to {}", self.path.display());
        println!();
        println!("🚀 Next steps:");
        println!("   • Fill in the [directory] addresses, or the settings sheet");
        println!("   • transcript-desk setup");
        println!("   • transcript-desk check-config");
        Ok(())
    }
}
