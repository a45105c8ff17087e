use crate::adapters::http::CvmClient;
use crate::adapters::workspace::Workspace;
use crate::core::catalog::{latest_per_company, read_catalog};
use crate::domain::model::{Catalog, FilingRecord, IngestSummary, UpsertOutcome};
use crate::domain::ports::{DocumentStore, Pipeline};
use crate::utils::error::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// `fre_cia_aberta_<year>.zip` from the CVM portal
    Remote { year: i32 },
    LocalFile(PathBuf),
}

/// Catalog → latest filing per company → companies and documents in the store.
pub struct IngestPipeline<S: DocumentStore> {
    store: S,
    client: CvmClient,
    workspace: Workspace,
    source: CatalogSource,
}

impl<S: DocumentStore> IngestPipeline<S> {
    pub fn new(store: S, client: CvmClient, workspace: Workspace, source: CatalogSource) -> Self {
        Self {
            store,
            client,
            workspace,
            source,
        }
    }

    async fn load_one(&self, filing: &FilingRecord, summary: &mut IngestSummary) -> Result<()> {
        match self.store.upsert_company(filing).await? {
            UpsertOutcome::Inserted => {
                tracing::info!("Company inserted: {}", filing.company_name);
                summary.companies_inserted += 1;
            }
            _ => {
                tracing::debug!("Company updated: {}", filing.company_name);
                summary.companies_updated += 1;
            }
        }

        match self.store.upsert_document(filing).await? {
            UpsertOutcome::Inserted => summary.documents_inserted += 1,
            UpsertOutcome::Updated => {
                tracing::info!(
                    "Newer FRE for {} ({}): document {} v{}",
                    filing.company_name,
                    filing.reference_year(),
                    filing.document_id,
                    filing.version
                );
                summary.documents_updated += 1;
            }
            UpsertOutcome::Unchanged => summary.documents_unchanged += 1,
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: DocumentStore> Pipeline for IngestPipeline<S> {
    async fn extract(&self) -> Result<Catalog> {
        let zip_path = match &self.source {
            CatalogSource::Remote { year } => {
                let dir = self.workspace.ensure_root()?;
                tracing::info!("Downloading FRE catalog for {}", year);
                self.client.download_catalog(*year, dir).await?
            }
            CatalogSource::LocalFile(path) => path.clone(),
        };

        read_catalog(&zip_path)
    }

    async fn transform(&self, catalog: Catalog) -> Result<Catalog> {
        let records = latest_per_company(catalog.records);
        tracing::info!("{} companies with a current FRE", records.len());
        Ok(Catalog { records, ..catalog })
    }

    async fn load(&self, catalog: Catalog) -> Result<IngestSummary> {
        let filings = catalog.records;
        let total = filings.len();
        let mut summary = IngestSummary {
            catalog_rows: catalog.parsed_rows,
            skipped_rows: catalog.skipped_rows,
            companies: total,
            ..IngestSummary::default()
        };

        for (index, filing) in filings.iter().enumerate() {
            if let Err(e) = self.load_one(filing, &mut summary).await {
                tracing::error!("Failed to register {}: {}", filing.company_name, e);
                summary.failed += 1;
            }

            let done = index + 1;
            if done % 10 == 0 {
                tracing::info!("Progress: {}/{} companies", done, total);
            }
        }

        tracing::info!(
            "Ingest finished: {}/{} companies registered",
            total - summary.failed,
            total
        );
        Ok(summary)
    }
}
