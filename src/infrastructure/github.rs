//! GitHub releases API client

use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::infrastructure::http::{build_client, check_status};
use crate::infrastructure::traits::{Release, ReleaseHost};
use crate::infrastructure::{ApiError, InfraResult};

const API_VERSION: &str = "2022-11-28";

#[derive(Deserialize)]
struct ReleaseDoc {
    id: u64,
    tag_name: String,
    upload_url: String,
}

impl From<ReleaseDoc> for Release {
    fn from(doc: ReleaseDoc) -> Self {
        Self {
            id: doc.id,
            tag_name: doc.tag_name,
            upload_url: doc.upload_url,
        }
    }
}

/// Strip the RFC 6570 `{?name,label}` suffix GitHub appends to upload URLs.
pub fn upload_endpoint(template: &str) -> &str {
    template.split('{').next().unwrap_or(template)
}

pub struct GithubClient {
    api_url: String,
    token: String,
    http: Client,
}

impl GithubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, verify_ssl: bool) -> InfraResult<Self> {
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: build_client(verify_ssl)?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn releases_url(&self, repository: &str) -> String {
        format!("{}/repos/{}/releases", self.api_url, repository)
    }
}

impl ReleaseHost for GithubClient {
    fn create_release(&self, repository: &str, tag: &str) -> Result<Release, ApiError> {
        let url = self.releases_url(repository);
        debug!("POST {}", url);
        let response = self
            .authorized(self.http.post(&url))
            .json(&json!({ "tag_name": tag }))
            .send()
            .map_err(|e| ApiError::transport(format!("POST {url}"), e))?;

        // GitHub answers 422 when the tag already has a release
        if response.status().as_u16() == 422 {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Conflict(body));
        }
        let doc: ReleaseDoc = check_status("POST", response)?
            .json()
            .map_err(|e| ApiError::InvalidResponse {
                context: url,
                message: e.to_string(),
            })?;
        Ok(doc.into())
    }

    fn releases(&self, repository: &str) -> Result<Vec<Release>, ApiError> {
        let url = format!("{}?per_page=100", self.releases_url(repository));
        debug!("GET {}", url);
        let response = self
            .authorized(self.http.get(&url))
            .send()
            .map_err(|e| ApiError::transport(format!("GET {url}"), e))?;
        let docs: Vec<ReleaseDoc> = check_status("GET", response)?
            .json()
            .map_err(|e| ApiError::InvalidResponse {
                context: url,
                message: e.to_string(),
            })?;
        Ok(docs.into_iter().map(Release::from).collect())
    }

    fn upload_asset(
        &self,
        release: &Release,
        file: &Path,
        name: &str,
        content_type: &str,
    ) -> Result<(), ApiError> {
        let url = upload_endpoint(&release.upload_url);
        let content = std::fs::read(file)
            .map_err(|e| ApiError::io(format!("read {}", file.display()), e))?;
        debug!("POST {} ({} bytes)", url, content.len());

        let response = self
            .authorized(self.http.post(url))
            .query(&[("name", name)])
            .header("Content-Type", content_type)
            .body(content)
            .send()
            .map_err(|e| ApiError::transport(format!("POST {url}"), e))?;
        check_status("POST", response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "https://uploads.github.com/repos/acme/app/releases/1/assets{?name,label}",
        "https://uploads.github.com/repos/acme/app/releases/1/assets"
    )]
    #[case(
        "https://uploads.github.com/repos/acme/app/releases/1/assets",
        "https://uploads.github.com/repos/acme/app/releases/1/assets"
    )]
    fn given_upload_url_when_upload_endpoint_then_strips_template(
        #[case] template: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(upload_endpoint(template), expected);
    }

    #[test]
    fn given_release_json_when_deserialized_then_maps_to_release() {
        let doc: ReleaseDoc = serde_json::from_value(json!({
            "id": 7,
            "tag_name": "v1.2.3",
            "upload_url": "https://uploads.github.com/repos/acme/app/releases/7/assets{?name,label}",
            "draft": false
        }))
        .unwrap();
        let release = Release::from(doc);
        assert_eq!(release.id, 7);
        assert_eq!(release.tag_name, "v1.2.3");
    }
}
