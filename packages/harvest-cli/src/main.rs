//! Command-line stand-in for the harvest dashboard.
//!
//! `validate` renders the itemized validation report for a payload file,
//! `import` runs one through the importer with live progress, and `run`
//! (feature "openai") harvests configured sites with a language model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ingestion::{
    validate_import_json, Finding, ImportOptions, ImportProgress, ImportResult, ImportTarget,
    Importer,
};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Validate and import harvest payloads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload file and print the findings
    Validate { file: PathBuf },

    /// Import a payload file for a site, with live progress
    Import {
        file: PathBuf,

        /// Site the documents belong to
        #[arg(long)]
        site: Uuid,

        /// Fail on any error instead of tolerating a partial import
        #[arg(long)]
        strict: bool,
    },

    /// Harvest sites with the configured language model
    #[cfg(feature = "openai")]
    Run {
        /// Harvest one site (all configured sites when omitted)
        #[arg(long)]
        site: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ingestion=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Import { file, site, strict } => cmd_import(&file, site, strict).await,
        #[cfg(feature = "openai")]
        Commands::Run { site } => cmd_run(site).await,
    }
}

fn read_payload(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

#[cfg(feature = "postgres")]
async fn connect_store() -> Result<ingestion::PostgresStore> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    ingestion::PostgresStore::new(&url)
        .await
        .context("Failed to connect to database")
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_validate(file: &Path) -> Result<()> {
    let text = read_payload(file)?;
    let report = validate_import_json(&text);

    for finding in report.errors.iter().chain(&report.warnings) {
        print_finding(finding);
    }

    let summary = &report.summary;
    println!();
    println!(
        "{} of {} document(s) valid, {} of {} log(s) valid",
        summary.valid_documents, summary.total_documents, summary.valid_logs, summary.total_logs
    );

    if report.is_valid {
        println!("Payload is valid.");
        Ok(())
    } else {
        anyhow::bail!("{} error(s) found", report.errors.len())
    }
}

async fn cmd_import(file: &Path, site: Uuid, strict: bool) -> Result<()> {
    let text = read_payload(file)?;

    #[cfg(feature = "postgres")]
    let store = connect_store().await?;
    #[cfg(not(feature = "postgres"))]
    let store = {
        println!("No postgres feature enabled: dry run against an in-memory store.");
        ingestion::MemoryStore::new()
    };

    let options = ImportOptions::default().with_strict_success(strict);
    let importer = Importer::with_options(store, options);
    importer.set_observer(Arc::new(|snapshot: &ImportProgress| {
        println!(
            "[{:>3}%] {:<11} {}",
            snapshot.percent,
            snapshot.phase.as_str(),
            snapshot.message
        );
    }));

    let target = ImportTarget::from_payload(site, &text);
    if importer.was_already_imported(&target.batch_id).await {
        println!(
            "This payload was already imported (batch {}).",
            &target.batch_id[..12]
        );
        return Ok(());
    }

    let result = importer.import_json(&text, &target).await;
    print_result(&result);

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("import failed")
    }
}

#[cfg(all(feature = "openai", not(feature = "postgres")))]
async fn cmd_run(_site: Option<Uuid>) -> Result<()> {
    anyhow::bail!("`run` needs the postgres feature: sites live in the database")
}

#[cfg(all(feature = "openai", feature = "postgres"))]
async fn cmd_run(site: Option<Uuid>) -> Result<()> {
    use ingestion::{HarvestOutcome, Harvester, OpenAI, SiteStore};

    let store = connect_store().await?;
    let llm = OpenAI::from_env().context("Failed to configure the language model")?;
    let harvester = Harvester::new(store, llm);

    let sites = match site {
        Some(id) => {
            let site = harvester
                .importer()
                .store()
                .get_site(id)
                .await?
                .with_context(|| format!("No site with id {id}"))?;
            vec![site]
        }
        None => harvester.importer().store().list_sites().await?,
    };

    if sites.is_empty() {
        println!("No sites configured.");
        return Ok(());
    }

    println!("Harvesting {} site(s)...", sites.len());
    let harvests = harvester.harvest_sites(&sites).await;

    let mut failed = 0;
    for harvest in &harvests {
        match &harvest.outcome {
            HarvestOutcome::Imported(result) => {
                println!("{}: {}", harvest.site_name, result.summary());
                if !result.success {
                    failed += 1;
                }
            }
            HarvestOutcome::AlreadyImported { batch_id } => {
                println!(
                    "{}: already imported (batch {})",
                    harvest.site_name,
                    &batch_id[..12]
                );
            }
            HarvestOutcome::Failed { error } => {
                println!("{}: failed: {}", harvest.site_name, error);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} site(s) failed");
    }
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

fn print_finding(finding: &Finding) {
    println!("{:>7}  {}", finding.severity.to_string(), finding);
    if !finding.recommendation.is_empty() {
        println!("         ({})", finding.recommendation);
    }
}

fn print_result(result: &ImportResult) {
    println!();
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    for error in &result.errors {
        println!("error: {error}");
    }
    println!("{}", result.summary());
}
