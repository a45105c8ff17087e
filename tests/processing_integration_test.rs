use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::WINDOWS_1252;
use httpmock::prelude::*;
use lupa_esg::config::settings::ProcessingSettings;
use lupa_esg::domain::model::{CleanupReport, FreDocument, PendingQuery, ProcessingStatus};
use lupa_esg::domain::ports::DocumentStore;
use lupa_esg::{CatalogSource, CvmClient, EsgEngine, SqliteStore, Workspace};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const HR_GENDER: &str = "XmlFormularioReferenciaDadosFREFormularioRecursosHumanosDescricaoRHEmissorGenero";
const BODY_GENDER: &str =
    "XmlFormularioReferenciaDadosFREFormularioAssembleiaGeralEAdmDescricaoCaracteristicasOrgaosAdmECFGenero";

fn fre_xml() -> Vec<u8> {
    let asg = STANDARD.encode(b"%PDF-1.4 relatorio asg");
    let riscos = STANDARD.encode(b"%PDF-1.4 gestao de riscos");
    let xml = format!(
        r#"<?xml version="1.0" encoding="windows-1252"?>
<XmlFormularioReferencia>
  <DadosFRE>
    <InfoASG><ImagemObjetoArquivoPdf>{asg}</ImagemObjetoArquivoPdf></InfoASG>
    <DescricaoGerenciamentoRiscos><ImagemObjetoArquivoPdf>{riscos}</ImagemObjetoArquivoPdf></DescricaoGerenciamentoRiscos>
    <{BODY_GENDER}>
      <OrgaoAdministracao>Diretoria Estatutária</OrgaoAdministracao>
      <Masculino>5</Masculino><Feminino>2</Feminino>
    </{BODY_GENDER}>
    <{HR_GENDER}>
      <Masculino>1200</Masculino><Feminino>800</Feminino><NaoBinario>3</NaoBinario>
    </{HR_GENDER}>
  </DadosFRE>
</XmlFormularioReferencia>"#
    );
    let (encoded, _, _) = WINDOWS_1252.encode(&xml);
    encoded.into_owned()
}

/// Filing package as published by CVM: registration form first, then the FRE.
fn filing_package(cvm_code: u32, version: u32, fre: &[u8]) -> Vec<u8> {
    let stem = format!("{:06}FRE31-12-2024v{}", cvm_code, version);
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.start_file(format!("{}FormularioCadastral.xml", stem), options)
        .unwrap();
    zip.write_all(b"<FormularioCadastral/>").unwrap();
    zip.start_file(format!("{}.xml", stem), options).unwrap();
    zip.write_all(fre).unwrap();
    zip.finish().unwrap().into_inner()
}

fn catalog_zip(rows: &[String]) -> Vec<u8> {
    let mut csv = vec!["CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;CATEG_DOC;ID_DOC;DT_RECEB;LINK_DOC".to_string()];
    csv.extend(rows.iter().cloned());
    let joined = csv.join("\n");
    let (encoded, _, _) = WINDOWS_1252.encode(&joined);

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("fre_cia_aberta_2025.csv", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&encoded).unwrap();
    zip.finish().unwrap().into_inner()
}

fn catalog_row(cvm_code: u32, version: u32, document_id: u64, link: &str) -> String {
    format!(
        "{:02}.000.000/0001-{:02};2024-12-31;{};COMPANHIA {} S.A.;{};FRE;{};2025-05-30;{}",
        cvm_code % 100,
        cvm_code % 97,
        version,
        cvm_code,
        cvm_code,
        document_id,
        link
    )
}

struct Harness {
    temp: TempDir,
    engine: EsgEngine<SqliteStore>,
}

impl Harness {
    async fn new(base_url: &str, settings: ProcessingSettings) -> Self {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let client = CvmClient::new(base_url, Duration::from_secs(10)).unwrap();
        let workspace = Workspace::new(temp.path().join("work"));
        Self {
            engine: EsgEngine::new(store, client, workspace, settings),
            temp,
        }
    }

    fn work_dir(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    fn write_catalog(&self, rows: &[String]) -> PathBuf {
        let path = self.temp.path().join("catalog.zip");
        std::fs::write(&path, catalog_zip(rows)).unwrap();
        path
    }

    async fn ingest(&self, rows: &[String]) {
        let path = self.write_catalog(rows);
        self.engine
            .ingest(CatalogSource::LocalFile(path))
            .await
            .unwrap();
    }

    async fn document_for(&self, cvm_code: u32) -> FreDocument {
        let query = PendingQuery {
            limit: 100,
            statuses: ProcessingStatus::ALL.to_vec(),
            max_retries: 100,
        };
        self.engine
            .store()
            .pending_documents(&query)
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.cvm_code == cvm_code)
            .unwrap()
    }
}

fn pdf_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_process_extracts_esg_data_from_package() {
    let server = MockServer::start_async().await;
    let package_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/112");
            then.status(200)
                .header("Content-Type", "application/zip")
                .body(filing_package(1023, 2, &fre_xml()));
        })
        .await;

    let harness = Harness::new(&server.base_url(), ProcessingSettings::default()).await;
    harness
        .ingest(&[catalog_row(1023, 2, 112, &server.url("/doc/112"))])
        .await;

    let report = harness.engine.process(None, false).await.unwrap();
    package_mock.assert_async().await;

    assert_eq!(report.selected, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.pdfs_extracted, 2);

    let document = harness.document_for(1023).await;
    assert_eq!(document.status, ProcessingStatus::Processed);
    assert_eq!(document.attempts, 1);
    assert_eq!(document.last_error, None);
    assert!(document.processed_at.is_some());

    let company_dir = harness.work_dir().join("001023_files");
    let zip_path = company_dir.join(format!("{}.zip", document.id));
    let xml_path = company_dir.join("001023FRE31-12-2024v2.xml");
    assert_eq!(document.files.zip_path, Some(zip_path.display().to_string()));
    assert_eq!(document.files.xml_path, Some(xml_path.display().to_string()));
    assert!(xml_path.exists());
    assert!(!company_dir.join("001023FRE31-12-2024v2FormularioCadastral.xml").exists());
    assert_eq!(pdf_count(&company_dir.join("pdfs")), 2);

    let esg = document.esg_data.unwrap();
    let sections: Vec<&str> = esg.documents.keys().map(String::as_str).collect();
    assert_eq!(sections, vec!["gestao_riscos", "info_asg"]);

    let bodies = &esg.quantitative.governing_bodies;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].body, "Diretoria Estatutária");
    assert_eq!(bodies[0].gender.unwrap().female, 2);

    let workforce = esg.quantitative.human_resources.gender.unwrap();
    assert_eq!(workforce.male, 1200);
    assert_eq!(workforce.non_binary, 3);
    assert!(esg.quantitative.human_resources.race.is_none());
}

#[tokio::test]
async fn test_failed_documents_record_error_and_rest_continue() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/1");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/2");
            then.status(200)
                .body(filing_package(20, 1, b"<XmlFormularioReferencia><DadosFRE>"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/3");
            // package for another version: no matching FRE XML
            then.status(200).body(filing_package(30, 9, &fre_xml()));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/4");
            then.status(200).body(filing_package(40, 1, &fre_xml()));
        })
        .await;

    let settings = ProcessingSettings {
        batch_size: 10,
        ..ProcessingSettings::default()
    };
    let harness = Harness::new(&server.base_url(), settings).await;
    harness
        .ingest(&[
            catalog_row(10, 1, 1, &server.url("/doc/1")),
            catalog_row(20, 1, 2, &server.url("/doc/2")),
            catalog_row(30, 1, 3, &server.url("/doc/3")),
            catalog_row(40, 1, 4, &server.url("/doc/4")),
        ])
        .await;

    let report = harness.engine.process(None, false).await.unwrap();
    assert_eq!(report.selected, 4);
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 3);

    let missing = harness.document_for(10).await;
    assert_eq!(missing.status, ProcessingStatus::Error);
    assert_eq!(missing.attempts, 1);
    assert!(missing
        .last_error
        .unwrap()
        .starts_with("document processing failed:"));

    let malformed = harness.document_for(20).await;
    assert_eq!(malformed.status, ProcessingStatus::Error);
    assert!(malformed.files.xml_path.is_some());
    assert!(malformed
        .last_error
        .unwrap()
        .starts_with("ESG extraction failed:"));

    let wrong_version = harness.document_for(30).await;
    assert_eq!(wrong_version.status, ProcessingStatus::Error);
    assert!(wrong_version.files.zip_path.is_some());
    assert!(wrong_version.files.xml_path.is_none());
    let message = wrong_version.last_error.unwrap();
    assert!(message.starts_with("document processing failed:"));
    assert!(message.contains("000030FRE31-12-2024v1"));

    let ok = harness.document_for(40).await;
    assert_eq!(ok.status, ProcessingStatus::Processed);
}

#[tokio::test]
async fn test_retry_errors_selects_failed_documents_until_max_retries() {
    let server = MockServer::start_async().await;
    let broken = server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/5");
            then.status(500);
        })
        .await;

    let settings = ProcessingSettings {
        max_retries: 2,
        ..ProcessingSettings::default()
    };
    let harness = Harness::new(&server.base_url(), settings).await;
    harness
        .ingest(&[catalog_row(50, 1, 5, &server.url("/doc/5"))])
        .await;

    let first = harness.engine.process(None, false).await.unwrap();
    assert_eq!(first.failed, 1);

    // error documents are left alone unless retries are requested
    let skipped = harness.engine.process(None, false).await.unwrap();
    assert_eq!(skipped.selected, 0);

    let retried = harness.engine.process(None, true).await.unwrap();
    assert_eq!(retried.selected, 1);
    assert_eq!(harness.document_for(50).await.attempts, 2);

    let exhausted = harness.engine.process(None, true).await.unwrap();
    assert_eq!(exhausted.selected, 0);
    broken.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_process_respects_limit() {
    let server = MockServer::start_async().await;
    for code in [61u32, 62, 63] {
        let path = format!("/doc/{}", code);
        server
            .mock_async(|when, then| {
                when.method(GET).path(path.as_str());
                then.status(200).body(filing_package(code, 1, &fre_xml()));
            })
            .await;
    }

    let harness = Harness::new(&server.base_url(), ProcessingSettings::default()).await;
    let rows: Vec<String> = [61u32, 62, 63]
        .iter()
        .map(|code| catalog_row(*code, 1, *code as u64, &server.url(format!("/doc/{}", code))))
        .collect();
    harness.ingest(&rows).await;

    let report = harness.engine.process(Some(2), false).await.unwrap();
    assert_eq!(report.selected, 2);
    assert_eq!(report.processed, 2);

    let counts = harness.engine.store().status_counts().await.unwrap();
    assert!(counts.contains(&(ProcessingStatus::Processed, 2)));
    assert!(counts.contains(&(ProcessingStatus::Pending, 1)));
}

#[tokio::test]
async fn test_run_ingests_processes_and_cleans_up() {
    let server = MockServer::start_async().await;
    let package_url = server.url("/doc/70");
    let catalog = catalog_zip(&[catalog_row(70, 1, 70, &package_url)]);
    let catalog_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/fre_cia_aberta_2025.zip");
            then.status(200).body(catalog);
        })
        .await;
    let package_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/doc/70");
            then.status(200).body(filing_package(70, 1, &fre_xml()));
        })
        .await;

    let harness = Harness::new(&server.base_url(), ProcessingSettings::default()).await;
    let report = harness
        .engine
        .run(CatalogSource::Remote { year: 2025 }, None)
        .await
        .unwrap();

    catalog_mock.assert_async().await;
    package_mock.assert_async().await;
    assert_eq!(report.ingest.documents_inserted, 1);
    assert_eq!(report.process.processed, 1);
    assert_eq!(report.process.pdfs_extracted, 2);
    // everything was just written, nothing is old enough to go
    assert_eq!(report.cleanup.files_removed, 0);
    assert!(harness.work_dir().join("000070_files").exists());
}

#[tokio::test]
async fn test_document_without_link_stops_after_max_retries() {
    let harness = Harness::new("http://127.0.0.1:9/", ProcessingSettings::default()).await;
    harness.ingest(&[catalog_row(5, 1, 55, "")]).await;

    let first = harness.engine.process(None, true).await.unwrap();
    assert_eq!(first.selected, 1);
    assert_eq!(first.failed, 1);

    let document = harness.document_for(5).await;
    assert_eq!(document.status, ProcessingStatus::Error);
    assert_eq!(document.attempts, 1);
    assert!(document
        .last_error
        .unwrap()
        .starts_with("incomplete document data:"));

    for _ in 1..3 {
        let retried = harness.engine.process(None, true).await.unwrap();
        assert_eq!(retried.selected, 1);
    }
    assert_eq!(harness.document_for(5).await.attempts, 3);

    let exhausted = harness.engine.process(None, true).await.unwrap();
    assert_eq!(exhausted.selected, 0);
}

#[tokio::test]
async fn test_run_survives_failed_cleanup() {
    let harness = Harness::new("http://127.0.0.1:9/", ProcessingSettings::default()).await;
    // a plain file where the temp dir should be: nothing below it can be created or swept
    std::fs::write(harness.work_dir(), b"not a directory").unwrap();
    let catalog = harness.write_catalog(&[catalog_row(80, 1, 80, "http://127.0.0.1:9/doc/80")]);

    let report = harness
        .engine
        .run(CatalogSource::LocalFile(catalog), None)
        .await
        .unwrap();

    assert_eq!(report.ingest.documents_inserted, 1);
    assert_eq!(report.process.selected, 1);
    assert_eq!(report.process.failed, 1);
    assert_eq!(report.cleanup, CleanupReport::default());
    assert!(harness.work_dir().is_file());
}
