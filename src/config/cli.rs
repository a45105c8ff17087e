use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "lupa-esg")]
#[command(about = "Collects ESG disclosures of Brazilian listed companies from CVM FRE filings")]
pub struct CliConfig {
    /// Path to a TOML settings file (defaults to ./lupa-esg.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Ingest the catalog, process pending documents, then clean up old files
    Run {
        /// Catalog year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Documents to process in this run (defaults to processing.batch_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Download (or read) the FRE catalog and register companies and documents
    Ingest {
        #[arg(long)]
        year: Option<i32>,

        /// Use a local catalog ZIP instead of downloading it
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Download pending FRE packages and extract their ESG data
    Process {
        #[arg(long)]
        limit: Option<usize>,

        /// Also pick up documents that previously ended in error
        #[arg(long)]
        retry_errors: bool,
    },

    /// Remove temporary files older than the given number of days
    Cleanup {
        #[arg(long)]
        days: Option<u64>,
    },

    /// Show how many documents are in each processing status
    Status,

    /// Write the element/attribute outline of an FRE XML file
    InspectXml {
        xml: PathBuf,

        /// Output file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
