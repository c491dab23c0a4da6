use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use ov_reports::app::inbox_use_case::{InboxSettings, InboxUseCase};
use ov_reports::config::Config;
use ov_reports::db::{HoursDb, LoadOutcome};
use ov_reports::infra::google_clients;
use ov_reports::logging;
use ov_reports::portal;
use ov_reports::report::{self, classify_file, ReportSheet};
use ov_reports::types::{InboxRunSummary, ReportKind};

#[derive(Parser)]
#[command(name = "ov_reports")]
#[command(about = "OnVolunteers report requests, inbox processing and hours data lake")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML configuration file (defaults to ./ov_reports.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the portal and request reports
    RequestReports {
        /// Request the configured activities without prompting
        #[arg(long)]
        scripted: bool,
    },
    /// Archive, upload and snapshot emailed reports
    ProcessInbox {
        /// Leave processed emails unread
        #[arg(long)]
        keep_unread: bool,
    },
    /// Tell whether a workbook is a volunteer or parking report
    Identify { file: PathBuf },
    /// Print hour statistics for a workbook
    Analyze { file: PathBuf },
    /// Create the hours tables
    DbSetup,
    /// Load the newest snapshots into the hours tables
    LoadDb,
    /// Run SQL against the hours database
    Query { sql: String },
    /// Scripted requests, inbox processing, then a database load
    Run {
        /// Leave processed emails unread
        #[arg(long)]
        keep_unread: bool,
    },
}

async fn request_reports(config: &Config, scripted: bool) -> anyhow::Result<()> {
    let (username, password) = config.portal_credentials()?;
    if scripted {
        let requested = portal::run_scripted(&config.portal, username, password).await?;
        println!("✅ Requested {} report(s); they will arrive by email.", requested);
    } else {
        portal::menu::run_interactive(&config.portal, username, password).await?;
    }
    Ok(())
}

async fn process_inbox(config: &Config, keep_unread: bool) -> anyhow::Result<InboxRunSummary> {
    let (gmail, drive) = google_clients(&config.google)
        .await
        .context("Google authentication failed")?;

    let mut settings = InboxSettings::new(
        config.paths.reports_dir.clone(),
        config.paths.data_lake_dir(),
        config.google.target_folder.clone(),
    );
    settings.hours_threshold = config.classify.hours_threshold;
    settings.mark_read = !keep_unread;

    let use_case = InboxUseCase::new(Arc::new(gmail), Arc::new(drive), settings);
    let summary = use_case.run(Local::now()).await?;
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &InboxRunSummary) {
    println!("\n📊 Inbox Results:");
    println!("   Emails found: {}", summary.emails_found);
    println!("   Attachments processed: {}", summary.attachments_processed);
    println!("   Uploaded: {}", summary.uploaded);
    println!("   Unknown: {}", summary.unknown);
    println!("   Snapshots written: {}", summary.snapshots_written);
    println!("   Marked read: {}", summary.marked_read);
    println!("   Errors: {}", summary.errors.len());
    if !summary.errors.is_empty() {
        warn!("{} errors encountered during inbox run", summary.errors.len());
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {}", error);
        }
    }
}

fn identify_message(file: &Path, kind: ReportKind) -> String {
    match kind {
        ReportKind::Unknown => format!("Could not determine the report type for '{}'.", file.display()),
        kind => format!("The report '{}' is a '{}-hours' report.", file.display(), kind),
    }
}

fn identify(config: &Config, file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        bail!("Error: File not found at '{}'", file.display());
    }
    let kind = classify_file(file, config.classify.hours_threshold);
    println!("{}", identify_message(file, kind));
    Ok(())
}

fn analyze(file: &Path) -> anyhow::Result<()> {
    let sheet = ReportSheet::open(file)
        .with_context(|| format!("Could not read report '{}'", file.display()))?;
    info!("Analyzing report: {}", file.display());
    let summary = report::analyze(&sheet);
    report::analyze::log_summary(&summary);
    Ok(())
}

fn db_setup(config: &Config) -> anyhow::Result<HoursDb> {
    let db = HoursDb::open(&config.paths.db_file)?;
    db.setup()?;
    println!("Database setup complete.");
    Ok(db)
}

fn load_db(config: &Config, db: &mut HoursDb) -> anyhow::Result<()> {
    let lake_dir = config.paths.data_lake_dir();
    for kind in ReportKind::KNOWN {
        match db.load_latest(&lake_dir, kind)? {
            LoadOutcome::Loaded { table, rows, report_id } => {
                println!("✅ Loaded {} rows into {} (report {})", rows, table, report_id)
            }
            LoadOutcome::NoSnapshot => println!("No {} hours parquet files found.", kind),
        }
    }
    Ok(())
}

fn query(config: &Config, sql: &str) -> anyhow::Result<()> {
    let db = HoursDb::open(&config.paths.db_file)?;
    let result = db.query(sql)?;
    println!("{}", result.render());
    Ok(())
}

/// Start/finish line bracketing every run in the log.
fn run_marker(event: &str, at: DateTime<Local>) -> String {
    format!("ov_reports {} {}", event, at.to_rfc3339())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let _guard = logging::init_logging(&config.paths.log_dir);
    info!("{}", run_marker("STARTED", Local::now()));

    let outcome = match cli.command {
        Commands::RequestReports { scripted } => request_reports(&config, scripted).await,
        Commands::ProcessInbox { keep_unread } => {
            process_inbox(&config, keep_unread).await.map(|_| ())
        }
        Commands::Identify { file } => identify(&config, &file),
        Commands::Analyze { file } => analyze(&file),
        Commands::DbSetup => db_setup(&config).map(|_| ()),
        Commands::LoadDb => db_setup(&config).and_then(|mut db| load_db(&config, &mut db)),
        Commands::Query { sql } => query(&config, &sql),
        Commands::Run { keep_unread } => {
            println!("🚀 Running full workflow...");
            println!("\n📨 Step 1: Requesting reports...");
            if let Err(e) = request_reports(&config, true).await {
                error!("Report requests failed: {:#}", e);
                println!("❌ Report requests failed: {:#}", e);
            }
            println!("\n📥 Step 2: Processing inbox...");
            match process_inbox(&config, keep_unread).await {
                Ok(_) => {
                    println!("\n🗄️  Step 3: Loading database...");
                    db_setup(&config).and_then(|mut db| load_db(&config, &mut db))
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    info!("{}", run_marker("FINISHED", Local::now()));
    outcome
}
