use crate::domain::esg::EsgData;
use crate::utils::error::EsgError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of the yearly `fre_cia_aberta_<year>.csv` catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    #[serde(rename = "CNPJ_CIA")]
    pub cnpj: String,
    #[serde(rename = "DT_REFER")]
    pub reference_date: NaiveDate,
    #[serde(rename = "VERSAO")]
    pub version: u32,
    #[serde(rename = "DENOM_CIA")]
    pub company_name: String,
    #[serde(rename = "CD_CVM")]
    pub cvm_code: u32,
    #[serde(rename = "CATEG_DOC", default)]
    pub category: Option<String>,
    #[serde(rename = "ID_DOC")]
    pub document_id: u64,
    #[serde(rename = "DT_RECEB")]
    pub received_date: NaiveDate,
    #[serde(rename = "LINK_DOC")]
    pub link: String,
    #[serde(rename = "SITUACAO", default)]
    pub situation: Option<String>,
}

impl FilingRecord {
    pub fn reference_year(&self) -> i32 {
        self.reference_date.year()
    }

    pub fn document_kind(&self) -> &str {
        self.category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("FRE")
    }
}

/// Filings read from the FRE catalog. `records` shrinks to the latest filing
/// per company during ingest; the row counts keep what the CSV held.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub records: Vec<FilingRecord>,
    pub parsed_rows: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub cvm_code: u32,
    pub cnpj: String,
    pub name: String,
    pub sector: String,
    pub subsector: String,
    pub segment: String,
    pub situation: String,
    pub source: String,
    pub active: bool,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Downloading,
    Downloaded,
    Processing,
    XmlExtracted,
    Processed,
    Error,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 7] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Downloading,
        ProcessingStatus::Downloaded,
        ProcessingStatus::Processing,
        ProcessingStatus::XmlExtracted,
        ProcessingStatus::Processed,
        ProcessingStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Downloading => "downloading",
            ProcessingStatus::Downloaded => "downloaded",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::XmlExtracted => "xml_extracted",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = EsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessingStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| EsgError::ValidationError {
                message: format!("unknown processing status: {}", s),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFiles {
    pub zip_path: Option<String>,
    pub xml_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreDocument {
    pub id: i64,
    pub cvm_code: u32,
    pub reference_year: i32,
    pub reference_date: NaiveDate,
    pub received_date: NaiveDate,
    pub version: u32,
    pub cvm_document_id: u64,
    pub kind: String,
    pub url: String,
    pub status: ProcessingStatus,
    pub inserted_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub files: DocumentFiles,
    pub esg_data: Option<EsgData>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ProcessingStatus,
    pub error: Option<String>,
    pub files: Option<DocumentFiles>,
    pub esg_data: Option<EsgData>,
    pub processed_at: Option<DateTime<Utc>>,
    pub count_attempt: bool,
}

impl StatusUpdate {
    pub fn to(status: ProcessingStatus) -> Self {
        Self {
            status,
            error: None,
            files: None,
            esg_data: None,
            processed_at: None,
            count_attempt: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::to(ProcessingStatus::Error)
        }
    }

    pub fn with_files(mut self, files: DocumentFiles) -> Self {
        self.files = Some(files);
        self
    }

    pub fn counting_attempt(mut self) -> Self {
        self.count_attempt = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuery {
    pub limit: usize,
    pub statuses: Vec<ProcessingStatus>,
    pub max_retries: u32,
}

impl Default for PendingQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            statuses: vec![ProcessingStatus::Pending],
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub catalog_rows: usize,
    pub skipped_rows: usize,
    pub companies: usize,
    pub companies_inserted: usize,
    pub companies_updated: usize,
    pub documents_inserted: usize,
    pub documents_updated: usize,
    pub documents_unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub selected: usize,
    pub processed: usize,
    pub failed: usize,
    pub pdfs_extracted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in ProcessingStatus::ALL {
            assert_eq!(status.as_str().parse::<ProcessingStatus>().unwrap(), status);
        }
        assert!("unknown".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_document_kind_defaults_to_fre() {
        let mut record = FilingRecord {
            cnpj: "33.000.167/0001-01".to_string(),
            reference_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            version: 2,
            company_name: "PETROBRAS".to_string(),
            cvm_code: 9512,
            category: None,
            document_id: 1,
            received_date: NaiveDate::from_ymd_opt(2025, 5, 30).unwrap(),
            link: "https://example.com/doc".to_string(),
            situation: None,
        };
        assert_eq!(record.document_kind(), "FRE");
        assert_eq!(record.reference_year(), 2024);

        record.category = Some("  ".to_string());
        assert_eq!(record.document_kind(), "FRE");
        record.category = Some("FRE_RETIFICADO".to_string());
        assert_eq!(record.document_kind(), "FRE_RETIFICADO");
    }

    #[test]
    fn test_failed_update_carries_error() {
        let update = StatusUpdate::failed("boom");
        assert_eq!(update.status, ProcessingStatus::Error);
        assert_eq!(update.error.as_deref(), Some("boom"));
        assert!(!update.count_attempt);
    }
}
