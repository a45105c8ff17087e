use crate::domain::esg::EsgData;
use crate::domain::model::{
    Company, DocumentFiles, FilingRecord, FreDocument, PendingQuery, ProcessingStatus,
    StatusUpdate, UpsertOutcome,
};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{EsgError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: [&str; 6] = [
    r#"CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cvm_code INTEGER NOT NULL UNIQUE,
        cnpj TEXT NOT NULL,
        name TEXT NOT NULL,
        sector TEXT NOT NULL DEFAULT '',
        subsector TEXT NOT NULL DEFAULT '',
        segment TEXT NOT NULL DEFAULT '',
        situation TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT 'CVM',
        active INTEGER NOT NULL DEFAULT 1,
        first_seen_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (cvm_code, cnpj)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cvm_code INTEGER NOT NULL,
        reference_year INTEGER NOT NULL,
        reference_date TEXT NOT NULL,
        received_date TEXT NOT NULL,
        version INTEGER NOT NULL,
        cvm_document_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        url TEXT NOT NULL,
        status TEXT NOT NULL,
        inserted_at TEXT NOT NULL,
        modified_at TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        zip_path TEXT,
        xml_path TEXT,
        esg_data TEXT,
        processed_at TEXT,
        UNIQUE (cvm_code, reference_year)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents (status)",
    "CREATE INDEX IF NOT EXISTS idx_documents_inserted_at ON documents (inserted_at)",
    "CREATE INDEX IF NOT EXISTS idx_documents_status_inserted_at ON documents (status, inserted_at)",
    "CREATE INDEX IF NOT EXISTS idx_companies_cnpj ON companies (cnpj)",
];

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and applies the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // every pooled connection to :memory: would be a separate database
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = database_file(database_url).and_then(|p| p.parent()) {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Database schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then(|| Path::new(path))
}

fn company_from_row(row: &SqliteRow) -> Result<Company> {
    Ok(Company {
        cvm_code: row.try_get::<i64, _>("cvm_code")? as u32,
        cnpj: row.try_get("cnpj")?,
        name: row.try_get("name")?,
        sector: row.try_get("sector")?,
        subsector: row.try_get("subsector")?,
        segment: row.try_get("segment")?,
        situation: row.try_get("situation")?,
        source: row.try_get("source")?,
        active: row.try_get("active")?,
        first_seen_at: row.try_get("first_seen_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<FreDocument> {
    let status: String = row.try_get("status")?;
    let esg_data = row
        .try_get::<Option<String>, _>("esg_data")?
        .map(|json| serde_json::from_str::<EsgData>(&json))
        .transpose()?;

    Ok(FreDocument {
        id: row.try_get("id")?,
        cvm_code: row.try_get::<i64, _>("cvm_code")? as u32,
        reference_year: row.try_get::<i64, _>("reference_year")? as i32,
        reference_date: row.try_get::<NaiveDate, _>("reference_date")?,
        received_date: row.try_get::<NaiveDate, _>("received_date")?,
        version: row.try_get::<i64, _>("version")? as u32,
        cvm_document_id: row.try_get::<i64, _>("cvm_document_id")? as u64,
        kind: row.try_get("kind")?,
        url: row.try_get("url")?,
        status: status.parse()?,
        inserted_at: row.try_get::<DateTime<Utc>, _>("inserted_at")?,
        modified_at: row.try_get::<DateTime<Utc>, _>("modified_at")?,
        attempts: row.try_get::<i64, _>("attempts")? as u32,
        last_error: row.try_get("last_error")?,
        files: DocumentFiles {
            zip_path: row.try_get("zip_path")?,
            xml_path: row.try_get("xml_path")?,
        },
        esg_data,
        processed_at: row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_company(&self, filing: &FilingRecord) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let situation = filing.situation.clone().unwrap_or_default();
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM companies WHERE cvm_code = ?")
            .bind(filing.cvm_code as i64)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE companies SET cnpj = ?, name = ?, situation = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&filing.cnpj)
                .bind(&filing.company_name)
                .bind(&situation)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Updated
            }
            None => {
                sqlx::query(
                    "INSERT INTO companies (cvm_code, cnpj, name, situation, source, active, first_seen_at, updated_at)
                     VALUES (?, ?, ?, ?, 'CVM', 1, ?, ?)",
                )
                .bind(filing.cvm_code as i64)
                .bind(&filing.cnpj)
                .bind(&filing.company_name)
                .bind(&situation)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        tracing::debug!("Company {:?}: {}", outcome, filing.company_name);
        Ok(outcome)
    }

    async fn upsert_document(&self, filing: &FilingRecord) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT id, cvm_document_id, version, received_date FROM documents
             WHERE cvm_code = ? AND reference_year = ?",
        )
        .bind(filing.cvm_code as i64)
        .bind(filing.reference_year())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO documents (cvm_code, reference_year, reference_date, received_date, version,
                        cvm_document_id, kind, url, status, inserted_at, modified_at, attempts)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
                )
                .bind(filing.cvm_code as i64)
                .bind(filing.reference_year())
                .bind(filing.reference_date)
                .bind(filing.received_date)
                .bind(filing.version as i64)
                .bind(filing.document_id as i64)
                .bind(filing.document_kind())
                .bind(&filing.link)
                .bind(ProcessingStatus::Pending.as_str())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted
            }
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                let stored_doc_id = row.try_get::<i64, _>("cvm_document_id")? as u64;
                let stored_version = row.try_get::<i64, _>("version")? as u32;
                let stored_received: NaiveDate = row.try_get("received_date")?;

                if stored_doc_id == filing.document_id
                    && stored_version == filing.version
                    && stored_received == filing.received_date
                {
                    UpsertOutcome::Unchanged
                } else {
                    sqlx::query(
                        "UPDATE documents SET reference_date = ?, received_date = ?, version = ?,
                            cvm_document_id = ?, kind = ?, url = ?, status = ?, inserted_at = ?,
                            modified_at = ?, attempts = 0, last_error = NULL, zip_path = NULL,
                            xml_path = NULL, esg_data = NULL, processed_at = NULL
                         WHERE id = ?",
                    )
                    .bind(filing.reference_date)
                    .bind(filing.received_date)
                    .bind(filing.version as i64)
                    .bind(filing.document_id as i64)
                    .bind(filing.document_kind())
                    .bind(&filing.link)
                    .bind(ProcessingStatus::Pending.as_str())
                    .bind(now)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                    UpsertOutcome::Updated
                }
            }
        };

        tx.commit().await?;
        tracing::debug!("Document {:?}: {}", outcome, filing.document_id);
        Ok(outcome)
    }

    async fn pending_documents(&self, query: &PendingQuery) -> Result<Vec<FreDocument>> {
        if query.statuses.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; query.statuses.len()].join(", ");
        let sql = format!(
            "SELECT * FROM documents WHERE status IN ({}) AND attempts < ?
             ORDER BY inserted_at ASC, id ASC LIMIT ?",
            placeholders
        );

        let mut statement = sqlx::query(&sql);
        for status in &query.statuses {
            statement = statement.bind(status.as_str());
        }
        let rows = statement
            .bind(query.max_retries as i64)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn update_document_status(&self, id: i64, update: StatusUpdate) -> Result<()> {
        let esg_json = update
            .esg_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let (zip_path, xml_path) = match update.files {
            Some(files) => (files.zip_path, files.xml_path),
            None => (None, None),
        };

        let result = sqlx::query(
            "UPDATE documents SET status = ?, modified_at = ?, attempts = attempts + ?,
                last_error = COALESCE(?, last_error),
                zip_path = COALESCE(?, zip_path),
                xml_path = COALESCE(?, xml_path),
                esg_data = COALESCE(?, esg_data),
                processed_at = COALESCE(?, processed_at)
             WHERE id = ?",
        )
        .bind(update.status.as_str())
        .bind(Utc::now())
        .bind(if update.count_attempt { 1i64 } else { 0i64 })
        .bind(update.error.as_deref())
        .bind(zip_path)
        .bind(xml_path)
        .bind(esg_json)
        .bind(update.processed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EsgError::NotFoundError {
                entity: "document".to_string(),
                key: id.to_string(),
            });
        }

        match &update.error {
            Some(error) => tracing::info!("Document {} status -> {} (error: {})", id, update.status, error),
            None => tracing::info!("Document {} status -> {}", id, update.status),
        }
        Ok(())
    }

    async fn document(&self, id: i64) -> Result<Option<FreDocument>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn company(&self, cvm_code: u32) -> Result<Option<Company>> {
        let row = sqlx::query("SELECT * FROM companies WHERE cvm_code = ?")
            .bind(cvm_code as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(company_from_row).transpose()
    }

    async fn status_counts(&self) -> Result<Vec<(ProcessingStatus, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM documents GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok((status.parse()?, row.try_get::<i64, _>("total")?))
            })
            .collect()
    }
}
