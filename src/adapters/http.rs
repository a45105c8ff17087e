use crate::utils::error::Result;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Client for the CVM open-data portal and the FRE package links it publishes.
#[derive(Debug, Clone)]
pub struct CvmClient {
    client: Client,
    base_url: Url,
}

impl CvmClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lupa-esg/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&normalized)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn catalog_file_name(year: i32) -> String {
        format!("fre_cia_aberta_{}.zip", year)
    }

    pub fn catalog_url(&self, year: i32) -> Result<Url> {
        Ok(self.base_url.join(&Self::catalog_file_name(year))?)
    }

    /// Streams `url` into `dest`, returning the number of bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        tracing::info!("Downloading {}", url);

        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        let mut written: u64 = 0;
        let mut next_report: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if written >= next_report {
                match total {
                    Some(total) if total > 0 => tracing::debug!(
                        "{}: {}/{} bytes ({:.0}%)",
                        dest.display(),
                        written,
                        total,
                        written as f64 * 100.0 / total as f64
                    ),
                    _ => tracing::debug!("{}: {} bytes", dest.display(), written),
                }
                next_report = written + 5 * 1024 * 1024;
            }
        }
        file.flush().await?;

        tracing::info!("Download finished: {} ({} bytes)", dest.display(), written);
        Ok(written)
    }

    /// Downloads the yearly FRE catalog into `dir`.
    pub async fn download_catalog(&self, year: i32, dir: &Path) -> Result<PathBuf> {
        let url = self.catalog_url(year)?;
        let dest = dir.join(Self::catalog_file_name(year));
        self.download(url.as_str(), &dest).await?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EsgError;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_url_normalizes_trailing_slash() {
        let client = CvmClient::new(
            "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/FRE/DADOS",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.catalog_url(2024).unwrap().as_str(),
            "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/FRE/DADOS/fre_cia_aberta_2024.zip"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(CvmClient::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/dados/fre_cia_aberta_2024.zip");
                then.status(200).body("zip-bytes");
            })
            .await;

        let dir = TempDir::new().unwrap();
        let client = CvmClient::new(&server.url("/dados"), Duration::from_secs(5)).unwrap();
        let path = client.download_catalog(2024, dir.path()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(path, dir.path().join("fre_cia_aberta_2024.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"zip-bytes");
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.zip");
                then.status(404);
            })
            .await;

        let dir = TempDir::new().unwrap();
        let client = CvmClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let err = client
            .download(&server.url("/missing.zip"), &dir.path().join("missing.zip"))
            .await
            .unwrap_err();

        assert!(matches!(err, EsgError::ApiError(_)));
        assert!(!dir.path().join("missing.zip").exists());
    }
}
