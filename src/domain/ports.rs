use crate::domain::model::{
    Catalog, Company, FilingRecord, FreDocument, IngestSummary, PendingQuery, ProcessingStatus,
    StatusUpdate, UpsertOutcome,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Persistence of companies and their FRE documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert_company(&self, filing: &FilingRecord) -> Result<UpsertOutcome>;

    /// Keeps one document per company and reference year; a newer filing
    /// replaces the stored one and sends it back to `pending`.
    async fn upsert_document(&self, filing: &FilingRecord) -> Result<UpsertOutcome>;

    async fn pending_documents(&self, query: &PendingQuery) -> Result<Vec<FreDocument>>;

    async fn update_document_status(&self, id: i64, update: StatusUpdate) -> Result<()>;

    async fn document(&self, id: i64) -> Result<Option<FreDocument>>;

    async fn company(&self, cvm_code: u32) -> Result<Option<Company>>;

    async fn status_counts(&self) -> Result<Vec<(ProcessingStatus, i64)>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Catalog>;
    async fn transform(&self, catalog: Catalog) -> Result<Catalog>;
    async fn load(&self, catalog: Catalog) -> Result<IngestSummary>;
}
