use crate::domain::model::{Catalog, FilingRecord};
use crate::utils::encoding::decode_cvm_text;
use crate::utils::error::{EsgError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Picks the main catalog CSV among the ZIP entries: `fre_cia_aberta_<year>.csv`,
/// else the first `.csv`.
pub fn catalog_csv_entry<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let main_csv = Regex::new(r"(?i)(^|/)fre_cia_aberta_\d{4}\.csv$").ok()?;
    let mut first_csv = None;

    for name in names {
        if !name.to_ascii_lowercase().ends_with(".csv") {
            continue;
        }
        if main_csv.is_match(name) {
            return Some(name.to_string());
        }
        if first_csv.is_none() {
            first_csv = Some(name.to_string());
        }
    }

    first_csv
}

pub fn parse_catalog_csv(bytes: &[u8]) -> Result<Catalog> {
    let text = decode_cvm_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut catalog = Catalog::default();
    for (line, row) in reader.deserialize::<FilingRecord>().enumerate() {
        match row {
            Ok(record) => catalog.records.push(record),
            Err(e) => {
                // header is line 1
                tracing::warn!("Skipping catalog row {}: {}", line + 2, e);
                catalog.skipped_rows += 1;
            }
        }
    }

    catalog.parsed_rows = catalog.records.len();
    tracing::info!(
        "Catalog loaded: {} records ({} skipped)",
        catalog.records.len(),
        catalog.skipped_rows
    );
    Ok(catalog)
}

pub fn read_catalog(zip_path: &Path) -> Result<Catalog> {
    tracing::info!("Reading catalog from {}", zip_path.display());

    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let entry_name = catalog_csv_entry(archive.file_names())
        .ok_or_else(|| EsgError::processing(format!("no CSV file found in {}", zip_path.display())))?;
    tracing::info!("Catalog CSV found: {}", entry_name);

    let mut bytes = Vec::new();
    archive.by_name(&entry_name)?.read_to_end(&mut bytes)?;
    parse_catalog_csv(&bytes)
}

/// Most recent filing per CNPJ by `(DT_RECEB, VERSAO)`, ordered by CNPJ.
pub fn latest_per_company(records: Vec<FilingRecord>) -> Vec<FilingRecord> {
    let mut latest: BTreeMap<String, FilingRecord> = BTreeMap::new();

    for record in records {
        let newer = latest.get(&record.cnpj).map_or(true, |current| {
            (record.received_date, record.version) > (current.received_date, current.version)
        });
        if newer {
            latest.insert(record.cnpj.clone(), record);
        }
    }

    latest.into_values().collect()
}
