use crate::utils::error::{EsgError, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// File-name stem CVM uses for the FRE XML inside a filing package,
/// e.g. `014206FRE31-12-2024v6`.
pub fn fre_xml_pattern(cvm_code: u32, reference_date: NaiveDate, version: u32) -> String {
    format!(
        "{:06}FRE{}v{}",
        cvm_code,
        reference_date.format("%d-%m-%Y"),
        version
    )
}

/// The package also ships a `FormularioCadastral` XML carrying the same stem.
fn is_fre_xml(name: &str, pattern: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".xml")
        && !name.contains("FormularioCadastral")
        && name.contains(pattern)
}

/// Extracts the FRE XML matching `pattern` from the package ZIP into `dest_dir`.
pub fn extract_fre_xml(zip_path: &Path, dest_dir: &Path, pattern: &str) -> Result<PathBuf> {
    tracing::info!("Looking for {} in {}", pattern, zip_path.display());

    let file = fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let entry_name = archive
        .file_names()
        .find(|name| is_fre_xml(name, pattern))
        .map(str::to_string)
        .ok_or_else(|| EsgError::processing(format!("FRE XML not found for pattern {}", pattern)))?;

    let mut entry = archive.by_name(&entry_name)?;
    let relative = entry.enclosed_name().ok_or_else(|| {
        EsgError::processing(format!("unsafe path in FRE package: {}", entry_name))
    })?;

    let target = dest_dir.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = fs::File::create(&target)?;
    std::io::copy(&mut entry, &mut out)?;

    tracing::info!("FRE XML extracted: {}", target.display());
    Ok(target)
}
