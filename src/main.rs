use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use notixel_tools::config::{ClientConfig, SessionFile};
use notixel_tools::io::excel_read;
use notixel_tools::remote::{HttpRemote, JobsRemote, SchemaRemote};
use notixel_tools::sync::{SyncOrchestrator, SyncPlan};
use notixel_tools::{Result, ToolError};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    let config = cli.client_config()?;
    match cli.command {
        Command::Fields(args) => execute_fields(args),
        Command::Plan(args) => execute_plan(args, &config).await,
        Command::Sync(args) => execute_sync(args, &config).await,
        Command::Jobs { command } => execute_jobs(command, &config).await,
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn execute_fields(args: FieldsArgs) -> Result<()> {
    if !args.workbook.exists() {
        return Err(ToolError::MissingInput(args.workbook));
    }
    let sheets = excel_read::worksheet_names(&args.workbook)?;
    if args.worksheet.is_none() && sheets.len() > 1 {
        return print_json(&sheets);
    }
    let worksheet = excel_read::resolve_worksheet(&args.workbook, args.worksheet.as_deref())?;
    let fields = excel_read::read_source_fields(&args.workbook, &worksheet)?;
    let names: Vec<&str> = fields.iter().map(|field| field.name()).collect();
    print_json(&names)
}

async fn execute_plan(args: SessionArgs, config: &ClientConfig) -> Result<()> {
    let remote = HttpRemote::new(config)?;
    let mut file = SessionFile::load(&args.session)?;
    let session = file.build_session(Some(&remote)).await?;
    print_json(&session.view())
}

async fn execute_sync(args: SessionArgs, config: &ClientConfig) -> Result<()> {
    let remote = HttpRemote::new(config)?;
    let mut file = SessionFile::load(&args.session)?;
    if !remote.target_connected(file.user_id).await? {
        return Err(ToolError::InvalidConfig(
            "no Notion workspace is connected for this user".into(),
        ));
    }
    let session = file.build_session(Some(&remote)).await?;
    for notice in session.notices() {
        info!(%notice, "session notice");
    }

    let interval = args.interval_minutes.unwrap_or(file.recurring.interval_minutes);
    let plan = SyncPlan::from_session(&session, file.endpoints(), interval);
    let mut orchestrator = SyncOrchestrator::new(&remote);
    let outcome = orchestrator.run(&plan).await;
    println!("{}", outcome.message);
    let complete = outcome.is_complete();
    match outcome.error {
        Some(error) if !complete => Err(error),
        _ => Ok(()),
    }
}

async fn execute_jobs(command: JobsCommand, config: &ClientConfig) -> Result<()> {
    let remote = HttpRemote::new(config)?;
    match command {
        JobsCommand::List { user_id } => print_json(&remote.list_jobs(user_id).await?),
        JobsCommand::Trigger { job_id } => {
            let message = remote.trigger_job(job_id).await?;
            println!("Manual synchronization started for job {job_id}. {message}");
            Ok(())
        }
        JobsCommand::Delete { job_id } => {
            remote.delete_job(job_id).await?;
            println!("Sync job {job_id} deleted.");
            Ok(())
        }
        JobsCommand::DisableMapping { mapping_id, job_id } => {
            println!("{}", remote.disable_job_mapping(mapping_id, job_id).await?);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Map spreadsheet columns to database properties and drive the sync service."
)]
struct Cli {
    /// Base URL of the sync service. Overrides NOTIXEL_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds. Overrides NOTIXEL_HTTP_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// List a workbook's worksheets, or the header fields of one worksheet.
    Fields(FieldsArgs),
    /// Build a session and print its mapping rows without syncing.
    Plan(SessionArgs),
    /// Build a session and run one synchronization.
    Sync(SessionArgs),
    /// Manage registered recurring jobs.
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
}

#[derive(clap::Args)]
struct FieldsArgs {
    /// Workbook path.
    #[arg(long)]
    workbook: PathBuf,

    /// Worksheet to read. Optional when the workbook has a single sheet.
    #[arg(long)]
    worksheet: Option<String>,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Session description in JSON.
    #[arg(long)]
    session: PathBuf,

    /// Recurring interval, overriding the session file.
    #[arg(long)]
    interval_minutes: Option<u32>,
}

#[derive(Subcommand)]
enum JobsCommand {
    /// List a user's recurring jobs with their mappings.
    List {
        #[arg(long)]
        user_id: i64,
    },
    /// Run a recurring job now.
    Trigger { job_id: i64 },
    /// Delete a recurring job.
    Delete { job_id: i64 },
    /// Take one mapping out of a recurring job.
    DisableMapping { mapping_id: i64, job_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_environment_defaults() {
        let cli = Cli::parse_from([
            "notixel-tools",
            "--api-url",
            "https://sync.example.com",
            "--timeout-secs",
            "30",
            "jobs",
            "delete",
            "4",
        ]);
        let config = cli.client_config().expect("config built");
        assert_eq!(config.api_base_url, "https://sync.example.com");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(matches!(
            cli.command,
            Command::Jobs {
                command: JobsCommand::Delete { job_id: 4 }
            }
        ));
    }
}
