use anyhow::Result;
use transcript_desk::{Desk, EventOutcome, MemoryOutbox, NotificationSender, OutboxSender, Workbook};

use super::event::{print_dry_run, print_outcome, warn_unsaved_dispatches, Delivery};
use super::Workspace;

/// Numbers every request row that has no reception number yet
pub struct BackfillCommand<'a> {
    workspace: &'a Workspace,
    delivery: Delivery,
}

impl<'a> BackfillCommand<'a> {
    pub fn new(workspace: &'a Workspace, delivery: Delivery) -> Self {
        Self {
            workspace,
            delivery,
        }
    }

    pub fn execute(&self) -> Result<()> {
        println!("🔢 Numbering requests without a reception number");
        println!();

        match &self.delivery {
            Delivery::Outbox(path) => {
                let desk = Desk::new(self.workspace.config.clone(), OutboxSender::new(path));
                let outcomes = self.run(&desk, true)?;
                summarize(&outcomes);
                println!("📬 Notifications queued in {}", path.display());
            }
            Delivery::DryRun => {
                let desk = Desk::new(self.workspace.config.clone(), MemoryOutbox::new());
                let outcomes = self.run(&desk, false)?;
                summarize(&outcomes);
                print_dry_run(desk.sender());
            }
        }
        Ok(())
    }

    fn run<N: NotificationSender>(&self, desk: &Desk<N>, persist: bool) -> Result<Vec<EventOutcome>> {
        let path = &self.workspace.workbook_path;
        let outcomes = self.workspace.workbook_lock().with_lock(|| {
            let mut book = Workbook::load(path)?;
            let outcomes = desk.backfill(&mut book)?;
            if persist {
                if let Err(e) = book.save(path) {
                    for outcome in &outcomes {
                        warn_unsaved_dispatches(outcome, &e);
                    }
                    return Err(e.into());
                }
            }
            Ok(outcomes)
        })?;
        Ok(outcomes)
    }
}

fn summarize(outcomes: &[EventOutcome]) {
    if outcomes.is_empty() {
        println!("✅ Every request already has a reception number");
        return;
    }
    for outcome in outcomes {
        print_outcome(outcome);
    }
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    println!();
    println!("📊 Processed {} row(s), {failed} failed", outcomes.len());
}
