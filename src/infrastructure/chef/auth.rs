//! Chef request signing (authentication protocol version 1.3)
//!
//! The canonical request is signed with the client's RSA key
//! (PKCS#1 v1.5 over SHA-256). The base64 signature is split across
//! `X-Ops-Authorization-N` headers of at most 60 characters each.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use crate::infrastructure::ApiError;

pub const SIGN_VERSION: &str = "1.3";
pub const SERVER_API_VERSION: &str = "0";
const AUTHORIZATION_CHUNK: usize = 60;

/// Collapse repeated slashes and drop a trailing slash.
pub fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Signs Chef Server requests on behalf of one client.
pub struct RequestSigner {
    client_name: String,
    key: SigningKey<Sha256>,
}

impl RequestSigner {
    /// Load a PEM key (PKCS#1 `RSA PRIVATE KEY` or PKCS#8 `PRIVATE KEY`).
    pub fn from_pem(client_name: impl Into<String>, pem: &str) -> Result<Self, ApiError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ApiError::Signing(format!("invalid client key: {e}")))?;
        Ok(Self {
            client_name: client_name.into(),
            key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn from_pem_file(client_name: impl Into<String>, path: &Path) -> Result<Self, ApiError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| ApiError::io(format!("read client key {}", path.display()), e))?;
        Self::from_pem(client_name, &pem)
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// The string that gets signed.
    pub fn canonical_request(&self, method: &str, path: &str, body: &[u8], timestamp: &str) -> String {
        [
            format!("Method:{}", method.to_uppercase()),
            format!("Path:{}", canonical_path(path)),
            format!("X-Ops-Content-Hash:{}", content_hash(body)),
            format!("X-Ops-Sign:version={SIGN_VERSION}"),
            format!("X-Ops-Timestamp:{timestamp}"),
            format!("X-Ops-UserId:{}", self.client_name),
            format!("X-Ops-Server-API-Version:{SERVER_API_VERSION}"),
        ]
        .join("\n")
    }

    /// Authentication headers for one request.
    pub fn headers(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, ApiError> {
        let timestamp = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let canonical = self.canonical_request(method, path, body, &timestamp);
        let signature = self
            .key
            .try_sign(canonical.as_bytes())
            .map_err(|e| ApiError::Signing(e.to_string()))?;
        let encoded = STANDARD.encode(signature.to_bytes());

        let mut headers = vec![
            (
                "X-Ops-Sign".to_string(),
                format!("algorithm=sha256;version={SIGN_VERSION}"),
            ),
            ("X-Ops-Userid".to_string(), self.client_name.clone()),
            ("X-Ops-Timestamp".to_string(), timestamp),
            ("X-Ops-Content-Hash".to_string(), content_hash(body)),
            (
                "X-Ops-Server-API-Version".to_string(),
                SERVER_API_VERSION.to_string(),
            ),
        ];
        for (i, chunk) in encoded.as_bytes().chunks(AUTHORIZATION_CHUNK).enumerate() {
            headers.push((
                format!("X-Ops-Authorization-{}", i + 1),
                String::from_utf8_lossy(chunk).into_owned(),
            ));
        }
        Ok(headers)
    }
}
