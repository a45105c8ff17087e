use crate::adapters::http::CvmClient;
use crate::adapters::workspace::Workspace;
use crate::config::settings::ProcessingSettings;
use crate::core::ingest::{CatalogSource, IngestPipeline};
use crate::core::processor::DocumentProcessor;
use crate::domain::model::{CleanupReport, IngestSummary, PendingQuery, ProcessReport, ProcessingStatus};
use crate::domain::ports::{DocumentStore, Pipeline};
use crate::utils::error::Result;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub ingest: IngestSummary,
    pub process: ProcessReport,
    pub cleanup: CleanupReport,
}

pub struct EsgEngine<S: DocumentStore + Clone> {
    store: S,
    client: CvmClient,
    workspace: Workspace,
    settings: ProcessingSettings,
}

impl<S: DocumentStore + Clone> EsgEngine<S> {
    pub fn new(store: S, client: CvmClient, workspace: Workspace, settings: ProcessingSettings) -> Self {
        Self {
            store,
            client,
            workspace,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(&self, source: CatalogSource) -> Result<IngestSummary> {
        tracing::info!("Starting ingest from {:?}", source);
        let pipeline = IngestPipeline::new(
            self.store.clone(),
            self.client.clone(),
            self.workspace.clone(),
            source,
        );

        tracing::info!("Extracting catalog...");
        let catalog = pipeline.extract().await?;
        tracing::info!("Extracted {} catalog records", catalog.records.len());

        let latest = pipeline.transform(catalog).await?;

        tracing::info!("Loading {} companies...", latest.records.len());
        pipeline.load(latest).await
    }

    pub async fn process(&self, limit: Option<usize>, retry_errors: bool) -> Result<ProcessReport> {
        let mut statuses = vec![ProcessingStatus::Pending];
        if retry_errors {
            statuses.push(ProcessingStatus::Error);
        }
        let query = PendingQuery {
            limit: limit.unwrap_or(self.settings.batch_size),
            statuses,
            max_retries: self.settings.max_retries,
        };

        DocumentProcessor::new(self.store.clone(), self.client.clone(), self.workspace.clone())
            .process_pending(&query)
            .await
    }

    pub fn cleanup(&self, days: Option<u64>) -> Result<CleanupReport> {
        let days = days.unwrap_or(self.settings.cleanup_after_days);
        tracing::info!("Removing temporary files older than {} days", days);
        self.workspace
            .cleanup(Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY)))
    }

    /// Ingest, process and clean up. A failed ingest stops the run; a failed
    /// cleanup is only logged.
    pub async fn run(&self, source: CatalogSource, limit: Option<usize>) -> Result<RunReport> {
        tracing::info!("Starting data pipeline");

        let ingest = self.ingest(source).await.map_err(|e| {
            tracing::error!("Ingest failed, skipping document processing: {}", e);
            e
        })?;
        let process = self.process(limit, false).await?;
        let cleanup = self.cleanup(None).unwrap_or_else(|e| {
            tracing::warn!("Temporary file cleanup failed: {}", e);
            CleanupReport::default()
        });

        tracing::info!("Data pipeline finished");
        Ok(RunReport {
            ingest,
            process,
            cleanup,
        })
    }
}
