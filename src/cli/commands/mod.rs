use std::ffi::OsString;
use std::path::{Path, PathBuf};
use transcript_desk::{DeskConfig, ScriptLock};

pub mod backfill;
pub mod check_config;
pub mod event;
pub mod init_config;
pub mod setup;

/// Configuration plus the workbook file a command works on
pub struct Workspace {
    pub config: DeskConfig,
    pub workbook_path: PathBuf,
}

impl Workspace {
    pub fn new(config: DeskConfig, workbook: Option<PathBuf>) -> Self {
        let workbook_path = workbook.unwrap_or_else(|| config.workbook.path.clone());
        Self {
            config,
            workbook_path,
        }
    }

    /// Lock held across load, process and save of the workbook file.
    /// Separate from the sequence lock, which is taken inside processing.
    pub fn workbook_lock(&self) -> ScriptLock {
        ScriptLock::from_config(&self.config.lock).sibling(lock_path_for(&self.workbook_path))
    }
}

fn lock_path_for(workbook: &Path) -> PathBuf {
    let mut path = OsString::from(workbook.as_os_str());
    path.push(".lock");
    PathBuf::from(path)
}

pub fn show_quick_start() {
    println!("💡 Typical flow:");
    println!("  🧾 transcript-desk submit --row 2");
    println!("  ✏️  transcript-desk edit --row 2 --column 担任の確認 --value OK");
    println!("  💴 transcript-desk payment --row 2");
    println!("  🔢 transcript-desk backfill   (rows added before the form trigger)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workbook_lock_sits_next_to_the_workbook() {
        let workspace = Workspace::new(DeskConfig::default(), Some(PathBuf::from("data/book.json")));
        assert_eq!(
            workspace.workbook_lock().path(),
            Path::new("data/book.json.lock")
        );
    }
}
