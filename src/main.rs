use anyhow::Result;
use clap::Parser;
use transcript_desk::{init_telemetry, DeskConfig};

mod cli;

use cli::commands::backfill::BackfillCommand;
use cli::commands::check_config::CheckConfigCommand;
use cli::commands::event::{Delivery, EventCommand, EventRequest};
use cli::commands::init_config::InitConfigCommand;
use cli::commands::setup::SetupCommand;
use cli::commands::Workspace;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    DeskConfig::load_env_file()?;
    let config = DeskConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    let workspace = Workspace::new(config, cli.workbook);
    let delivery = if cli.dry_run {
        Delivery::DryRun
    } else {
        Delivery::Outbox(cli.outbox)
    };

    match cli.command {
        Commands::Setup => SetupCommand::new(&workspace).execute(),
        Commands::Submit { row } => {
            EventCommand::new(&workspace, EventRequest::Submit { row }, delivery).execute()
        }
        Commands::Edit { row, column, value } => EventCommand::new(
            &workspace,
            EventRequest::Edit { row, column, value },
            delivery,
        )
        .execute(),
        Commands::Payment { row } => {
            EventCommand::new(&workspace, EventRequest::Payment { row }, delivery).execute()
        }
        Commands::Backfill => BackfillCommand::new(&workspace, delivery).execute(),
        Commands::CheckConfig => CheckConfigCommand::new(&workspace).execute(),
        Commands::InitConfig { path, force } => InitConfigCommand::new(path, force).execute(),
    }
}
