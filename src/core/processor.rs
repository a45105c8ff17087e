use crate::adapters::http::CvmClient;
use crate::adapters::workspace::Workspace;
use crate::core::esg_extractor::EsgExtractor;
use crate::core::fre_archive::{extract_fre_xml, fre_xml_pattern};
use crate::domain::model::{
    DocumentFiles, FreDocument, PendingQuery, ProcessReport, ProcessingStatus, StatusUpdate,
};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{EsgError, Result};
use chrono::Utc;

/// Drives pending FRE documents through download → XML → ESG extraction.
pub struct DocumentProcessor<S: DocumentStore> {
    store: S,
    client: CvmClient,
    workspace: Workspace,
}

/// Where a failed document stopped.
enum Failure {
    Extraction(EsgError),
    Pipeline(EsgError),
}

impl<S: DocumentStore> DocumentProcessor<S> {
    pub fn new(store: S, client: CvmClient, workspace: Workspace) -> Self {
        Self {
            store,
            client,
            workspace,
        }
    }

    pub async fn process_pending(&self, query: &PendingQuery) -> Result<ProcessReport> {
        let documents = self.store.pending_documents(query).await?;
        tracing::info!("Processing {} pending documents", documents.len());

        let mut report = ProcessReport {
            selected: documents.len(),
            ..ProcessReport::default()
        };

        for document in &documents {
            if self.process_document(document).await? {
                report.processed += 1;
                let pdfs = self.workspace.count_pdfs(document.cvm_code);
                tracing::info!("Company {}: {} PDFs extracted", document.cvm_code, pdfs);
                report.pdfs_extracted += pdfs;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            "Pending documents done: {} processed, {} failed",
            report.processed,
            report.failed
        );
        Ok(report)
    }

    /// `Ok(false)` when the document ended in `error`; `Err` only when the
    /// store itself cannot be updated.
    async fn process_document(&self, document: &FreDocument) -> Result<bool> {
        if document.cvm_code == 0 || document.url.trim().is_empty() {
            let message = format!(
                "incomplete document data: cvm_code={}, url={:?}",
                document.cvm_code, document.url
            );
            tracing::error!("Document {}: {}", document.id, message);
            // never reaches downloading, so the attempt is counted here
            self.store
                .update_document_status(document.id, StatusUpdate::failed(message).counting_attempt())
                .await?;
            return Ok(false);
        }

        match self.run_stages(document).await {
            Ok(()) => Ok(true),
            Err(failure) => {
                let message = match failure {
                    Failure::Extraction(e) => format!("ESG extraction failed: {}", e),
                    Failure::Pipeline(e) => format!("document processing failed: {}", e),
                };
                tracing::error!("Document {}: {}", document.id, message);
                self.store
                    .update_document_status(document.id, StatusUpdate::failed(message))
                    .await?;
                Ok(false)
            }
        }
    }

    async fn run_stages(&self, document: &FreDocument) -> std::result::Result<(), Failure> {
        let id = document.id;

        self.set_status(id, StatusUpdate::to(ProcessingStatus::Downloading).counting_attempt())
            .await?;

        let company_dir = self
            .workspace
            .company_dir(document.cvm_code)
            .map_err(Failure::Pipeline)?;
        let zip_path = company_dir.join(format!("{}.zip", id));
        self.client
            .download(&document.url, &zip_path)
            .await
            .map_err(Failure::Pipeline)?;

        let mut files = DocumentFiles {
            zip_path: Some(zip_path.display().to_string()),
            xml_path: None,
        };
        self.set_status(id, StatusUpdate::to(ProcessingStatus::Downloaded).with_files(files.clone()))
            .await?;
        self.set_status(id, StatusUpdate::to(ProcessingStatus::Processing))
            .await?;

        let pattern = fre_xml_pattern(document.cvm_code, document.reference_date, document.version);
        let xml_path = extract_fre_xml(&zip_path, &company_dir, &pattern).map_err(Failure::Pipeline)?;

        files.xml_path = Some(xml_path.display().to_string());
        self.set_status(id, StatusUpdate::to(ProcessingStatus::XmlExtracted).with_files(files))
            .await?;

        let pdf_dir = self
            .workspace
            .pdf_dir(document.cvm_code)
            .map_err(Failure::Extraction)?;
        let esg_data = EsgExtractor::from_file(&xml_path, pdf_dir)
            .and_then(|extractor| extractor.extract())
            .map_err(Failure::Extraction)?;

        self.set_status(
            id,
            StatusUpdate {
                esg_data: Some(esg_data),
                processed_at: Some(Utc::now()),
                ..StatusUpdate::to(ProcessingStatus::Processed)
            },
        )
        .await
    }

    async fn set_status(&self, id: i64, update: StatusUpdate) -> std::result::Result<(), Failure> {
        self.store
            .update_document_status(id, update)
            .await
            .map_err(Failure::Pipeline)
    }
}
