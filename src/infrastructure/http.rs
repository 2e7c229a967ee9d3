//! Shared HTTP plumbing and the package downloader

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::infrastructure::traits::Downloader;
use crate::infrastructure::{ApiError, InfraError, InfraResult};

pub const HTTP_TIMEOUT_SECS: u64 = 300;

pub fn user_agent() -> String {
    format!("berkflow/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a blocking client; `verify_ssl = false` accepts any certificate.
pub fn build_client(verify_ssl: bool) -> InfraResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(user_agent())
        .danger_accept_invalid_certs(!verify_ssl)
        .build()
        .map_err(|e| InfraError::Setup {
            message: format!("HTTP client: {e}"),
        })
}

/// Turn non-2xx responses into `ApiError`s: 404 and 409 get their own variants.
pub fn check_status(method: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    Err(match status.as_u16() {
        404 => ApiError::NotFound(url),
        409 => ApiError::Conflict(body),
        code => ApiError::Status {
            method: method.to_string(),
            url,
            status: code,
            body,
        },
    })
}

/// GET `url` and stream the body into `dest`.
pub fn fetch_to_file(client: &Client, url: &str, dest: &Path) -> Result<(), ApiError> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| ApiError::transport(format!("GET {url}"), e))?;
    let mut response = check_status("GET", response)?;
    let mut file =
        File::create(dest).map_err(|e| ApiError::io(format!("create {}", dest.display()), e))?;
    response
        .copy_to(&mut file)
        .map_err(|e| ApiError::transport(format!("GET {url}"), e))?;
    Ok(())
}

/// Plain HTTP(S) downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(verify_ssl: bool) -> InfraResult<Self> {
        Ok(Self {
            client: build_client(verify_ssl)?,
        })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        fetch_to_file(&self.client, url, dest)
    }
}
