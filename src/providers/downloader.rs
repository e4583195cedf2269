//! File Downloader Module
//!
//! Fetches the network layout over HTTPS and loads JSON documents from disk.
//! Redirects are followed; when a CA bundle is supplied the server is
//! verified against it in addition to the system roots.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{DOWNLOAD_TIMEOUT_SECS, USER_AGENT as USER_AGENT_CONST};

/// Build the HTTP client, trusting `ca_cert` when given
fn build_client(ca_cert: Option<&Path>) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS));

    if let Some(path) = ca_cert {
        let pem = std::fs::read(path)?;
        let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            AppError::with_source(
                ErrorCode::ConfigInvalidValue,
                format!("Invalid CA certificate: {}", path.display()),
                e,
            )
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder.build()?)
}

/// Download `url` into `destination`.
///
/// The body is streamed to disk. A non-success status is an error. A body or
/// write failure removes the partially written file.
pub async fn download_file(url: &str, destination: &Path, ca_cert: Option<&Path>) -> AppResult<()> {
    let client = build_client(ca_cert)?;

    info!("⬇️ Downloading {}", url);
    let mut response = client.get(url).send().await.map_err(|e| {
        error!("❌ Download request failed: {}", e);
        AppError::from(e)
    })?;

    if !response.status().is_success() {
        return Err(AppError::new(
            ErrorCode::DownloadBadStatus,
            format!("{} answered {}", url, response.status()),
        ));
    }

    let mut file = tokio::fs::File::create(destination).await?;
    let body = async {
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<_, AppError>(written)
    };
    let written = match body.await {
        Ok(written) => written,
        Err(e) => {
            error!("❌ Download of {} interrupted: {}", url, e);
            drop(file);
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e);
        }
    };

    debug!("Wrote {} bytes to {}", written, destination.display());
    info!("✅ Downloaded {} ({} bytes)", url, written);
    Ok(())
}

/// Load and parse a JSON file
pub fn parse_json_file(source: &Path) -> AppResult<serde_json::Value> {
    if !source.exists() {
        return Err(AppError::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", source.display()),
        ));
    }

    let content = std::fs::read_to_string(source)?;
    let parsed = serde_json::from_str(&content).map_err(|e| {
        AppError::with_source(
            ErrorCode::JsonInvalid,
            format!("Malformed JSON in {}", source.display()),
            e,
        )
    })?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_file_missing() {
        let err = parse_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
    }

    #[test]
    fn test_parse_json_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"stations\": [").unwrap();
        let err = parse_json_file(file.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::JsonInvalid);
    }

    #[test]
    fn test_parse_json_file_ok() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"stations\": [], \"lines\": []}").unwrap();
        let parsed = parse_json_file(file.path()).unwrap();
        assert!(parsed.is_object());
        assert!(parsed.get("stations").is_some());
    }

    #[test]
    fn test_build_client_rejects_missing_ca_file() {
        let err = build_client(Some(Path::new("/no/such/cacert.pem"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
    }
}
