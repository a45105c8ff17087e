use chrono::Datelike;
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use lupa_esg::config::Command;
use lupa_esg::core::xml_outline;
use lupa_esg::domain::ports::DocumentStore;
use lupa_esg::utils::logger::{self, LogFormat};
use lupa_esg::utils::validation::Validate;
use lupa_esg::{CatalogSource, CliConfig, CvmClient, EsgEngine, EsgError, Settings, SqliteStore, Workspace};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = CliConfig::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load settings: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        settings.log_format()
    };
    logger::init_logger(&settings.logging.level, cli.verbose, format);

    tracing::info!(
        "Starting {} ({})",
        settings.project.name,
        settings.project.environment
    );
    tracing::debug!("Settings: {:?}", settings);

    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = execute(cli.command, &settings).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            settings.project.name,
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn build_engine(settings: &Settings) -> Result<EsgEngine<SqliteStore>, EsgError> {
    let store = SqliteStore::connect(&settings.storage.database_url).await?;
    let client = CvmClient::new(&settings.source.base_url, settings.request_timeout())?;
    let workspace = Workspace::new(settings.temp_dir());
    Ok(EsgEngine::new(store, client, workspace, settings.processing.clone()))
}

async fn execute(command: Command, settings: &Settings) -> Result<(), EsgError> {
    let current_year = chrono::Local::now().year();

    match command {
        Command::Run { year, limit } => {
            let engine = build_engine(settings).await?;
            let source = CatalogSource::Remote {
                year: year.unwrap_or(current_year),
            };
            let report = engine.run(source, limit).await?;
            println!("✅ Pipeline finished");
            println!(
                "   companies: {} ({} new), documents: {} new / {} updated",
                report.ingest.companies,
                report.ingest.companies_inserted,
                report.ingest.documents_inserted,
                report.ingest.documents_updated
            );
            println!(
                "   processed: {}/{} ({} PDFs), cleanup: {} files removed",
                report.process.processed,
                report.process.selected,
                report.process.pdfs_extracted,
                report.cleanup.files_removed
            );
            engine.store().close().await;
        }
        Command::Ingest { year, file } => {
            let engine = build_engine(settings).await?;
            let source = match file {
                Some(path) => CatalogSource::LocalFile(path),
                None => CatalogSource::Remote {
                    year: year.unwrap_or(current_year),
                },
            };
            let summary = engine.ingest(source).await?;
            println!(
                "✅ Ingest finished: {} companies ({} failed), {} documents new, {} updated, {} unchanged",
                summary.companies,
                summary.failed,
                summary.documents_inserted,
                summary.documents_updated,
                summary.documents_unchanged
            );
            engine.store().close().await;
        }
        Command::Process { limit, retry_errors } => {
            let engine = build_engine(settings).await?;
            let report = engine.process(limit, retry_errors).await?;
            println!(
                "✅ Processed {}/{} documents ({} failed, {} PDFs extracted)",
                report.processed, report.selected, report.failed, report.pdfs_extracted
            );
            engine.store().close().await;
        }
        Command::Cleanup { days } => {
            let workspace = Workspace::new(settings.temp_dir());
            let days = days.unwrap_or(settings.processing.cleanup_after_days);
            let report = workspace.cleanup(Duration::from_secs(days.saturating_mul(24 * 60 * 60)))?;
            println!(
                "✅ Cleanup removed {} files and {} directories",
                report.files_removed, report.dirs_removed
            );
        }
        Command::Status => {
            let store = SqliteStore::connect(&settings.storage.database_url).await?;
            let counts = store.status_counts().await?;
            if counts.is_empty() {
                println!("No documents registered yet");
            }
            for (status, total) in counts {
                println!("{:<14} {}", status, total);
            }
            store.close().await;
        }
        Command::InspectXml { xml, output } => inspect_xml(&xml, output.as_deref())?,
    }

    Ok(())
}

fn inspect_xml(xml: &Path, output: Option<&Path>) -> Result<(), EsgError> {
    match output {
        Some(path) => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            xml_outline::outline_file(xml, &mut file)?;
            file.flush()?;
            println!("✅ Outline written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            xml_outline::outline_file(xml, &mut stdout.lock())?;
        }
    }
    Ok(())
}
