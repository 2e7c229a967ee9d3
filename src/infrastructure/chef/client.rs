//! Signed REST client for the Chef Server API

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use super::auth::RequestSigner;
use crate::config::Settings;
use crate::domain::{Cookbook, Environment, Node, RemoteCookbook};
use crate::infrastructure::http::{build_client, check_status, fetch_to_file};
use crate::infrastructure::traits::ChefServer;
use crate::infrastructure::{ApiError, InfraError, InfraResult};

const CHEF_VERSION: &str = "12.0.0";
const SEARCH_PAGE_SIZE: usize = 1000;

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    rows: Vec<Value>,
}

#[derive(Deserialize)]
struct CookbookListing {
    #[serde(default)]
    versions: Vec<CookbookVersionRef>,
}

#[derive(Deserialize)]
struct CookbookVersionRef {
    version: String,
}

#[derive(Deserialize)]
struct CookbookFileRef {
    name: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct SandboxChecksum {
    url: Option<String>,
    #[serde(default)]
    needs_upload: bool,
}

#[derive(Deserialize)]
struct Sandbox {
    uri: String,
    #[serde(default)]
    checksums: BTreeMap<String, SandboxChecksum>,
}

/// Signed client for one Chef Server organization.
pub struct ChefClient {
    base: Url,
    signer: RequestSigner,
    http: Client,
}

impl ChefClient {
    pub fn new(base: Url, signer: RequestSigner, http: Client) -> Self {
        Self { base, signer, http }
    }

    /// Build a client from the `chef` and `ssl` settings.
    pub fn from_settings(settings: &Settings) -> InfraResult<Self> {
        settings.validate_chef()?;
        let base = Url::parse(&settings.chef.chef_server_url).map_err(|e| InfraError::Setup {
            message: format!("chef_server_url '{}': {e}", settings.chef.chef_server_url),
        })?;
        let signer =
            RequestSigner::from_pem_file(&settings.chef.node_name, &settings.chef.client_key)
                .map_err(|e| InfraError::Setup {
                    message: e.to_string(),
                })?;
        Ok(Self::new(base, signer, build_client(settings.ssl.verify)?))
    }

    /// Resolve an API path (relative to the organization URL).
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        url
    }

    fn send(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
        content_type: &str,
        extra: &[(&str, String)],
    ) -> Result<Response, ApiError> {
        let auth = self
            .signer
            .headers(method.as_str(), url.path(), &body, Utc::now())?;
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header("Accept", "application/json")
            .header("X-Chef-Version", CHEF_VERSION);
        for (name, value) in auth {
            request = request.header(name, value);
        }
        for (name, value) in extra {
            request = request.header(*name, value);
        }
        if !body.is_empty() {
            request = request.header("Content-Type", content_type).body(body);
        }

        let response = request
            .send()
            .map_err(|e| ApiError::transport(format!("{method} {url}"), e))?;
        check_status(method.as_str(), response)
    }

    fn send_json(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response, ApiError> {
        let bytes = match body {
            Some(value) => serde_json::to_vec(value).map_err(|e| ApiError::InvalidResponse {
                context: url.to_string(),
                message: format!("encode request: {e}"),
            })?,
            None => Vec::new(),
        };
        self.send(method, url, bytes, "application/json", &[])
    }

    fn parse<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ApiError> {
        response.json().map_err(|e| ApiError::InvalidResponse {
            context: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET returning `None` on 404.
    fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        match self.send_json(Method::GET, url.clone(), None) {
            Ok(response) => Self::parse(&url, response).map(Some),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn upload_checksum(&self, url: &str, file: &Path, checksum: &str) -> Result<(), ApiError> {
        let url = Url::parse(url).map_err(|e| ApiError::InvalidResponse {
            context: "sandbox".into(),
            message: format!("checksum url '{url}': {e}"),
        })?;
        let content = std::fs::read(file)
            .map_err(|e| ApiError::io(format!("read {}", file.display()), e))?;
        let md5 = hex::decode(checksum).map_err(|e| ApiError::InvalidResponse {
            context: url.to_string(),
            message: format!("checksum '{checksum}': {e}"),
        })?;
        self.send(
            Method::PUT,
            url,
            content,
            "application/x-binary",
            &[("Content-MD5", STANDARD.encode(md5))],
        )?;
        Ok(())
    }
}

impl ChefServer for ChefClient {
    fn find_environment(&self, name: &str) -> Result<Option<Environment>, ApiError> {
        self.get_optional(self.endpoint(&format!("environments/{name}")))
    }

    fn save_environment(&self, environment: &Environment) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("environments/{}", environment.name));
        let body = serde_json::to_value(environment).map_err(|e| ApiError::InvalidResponse {
            context: url.to_string(),
            message: format!("encode environment: {e}"),
        })?;
        self.send_json(Method::PUT, url, Some(&body))?;
        Ok(())
    }

    fn search_nodes(&self, query: &str) -> Result<Vec<Node>, ApiError> {
        let mut nodes = Vec::new();
        let mut start = 0;

        loop {
            let mut url = self.endpoint("search/node");
            url.query_pairs_mut()
                .append_pair("q", query)
                .append_pair("start", &start.to_string())
                .append_pair("rows", &SEARCH_PAGE_SIZE.to_string());
            let response = self.send_json(Method::GET, url.clone(), None)?;
            let page: SearchPage = Self::parse(&url, response)?;

            let fetched = page.rows.len();
            for row in page.rows {
                let name = row
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let automatic = row.get("automatic").cloned().unwrap_or(Value::Null);
                nodes.push(Node::from_attributes(name, &automatic));
            }

            start += fetched;
            if fetched == 0 || start >= page.total {
                break;
            }
        }

        debug!("search_nodes: {} -> {} nodes", query, nodes.len());
        Ok(nodes)
    }

    fn cookbook_versions(&self, name: &str) -> Result<Vec<String>, ApiError> {
        let mut url = self.endpoint(&format!("cookbooks/{name}"));
        url.query_pairs_mut().append_pair("num_versions", "all");
        let listing: Option<BTreeMap<String, CookbookListing>> = self.get_optional(url)?;
        Ok(listing
            .and_then(|mut l| l.remove(name))
            .map(|l| l.versions.into_iter().map(|v| v.version).collect())
            .unwrap_or_default())
    }

    fn find_cookbook(&self, name: &str, version: &str) -> Result<Option<RemoteCookbook>, ApiError> {
        let url = self.endpoint(&format!("cookbooks/{name}/{version}"));
        let Some(doc) = self.get_optional::<Value>(url.clone())? else {
            return Ok(None);
        };

        let root_files: Vec<CookbookFileRef> = doc
            .get("root_files")
            .cloned()
            .map(serde_json::from_value::<Vec<CookbookFileRef>>)
            .transpose()
            .map_err(|e| ApiError::InvalidResponse {
                context: url.to_string(),
                message: format!("root_files: {e}"),
            })?
            .unwrap_or_default();

        Ok(Some(RemoteCookbook {
            name: name.to_string(),
            version: doc
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(version)
                .to_string(),
            root_files: root_files
                .into_iter()
                .filter_map(|f| f.url.map(|u| (f.name, u)))
                .collect(),
        }))
    }

    fn download_file(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        fetch_to_file(&self.http, url, dest)
    }

    fn upload_cookbook(&self, cookbook: &Cookbook, force: bool) -> Result<(), ApiError> {
        let checksums: Map<String, Value> = cookbook
            .checksums()
            .into_iter()
            .map(|c| (c.to_string(), Value::Null))
            .collect();

        let url = self.endpoint("sandboxes");
        let response = self.send_json(
            Method::POST,
            url.clone(),
            Some(&json!({ "checksums": checksums })),
        )?;
        let sandbox: Sandbox = Self::parse(&url, response)?;

        for (checksum, entry) in &sandbox.checksums {
            if !entry.needs_upload {
                continue;
            }
            let (Some(target), Some(file)) = (
                entry.url.as_deref(),
                cookbook.files.iter().find(|f| &f.checksum == checksum),
            ) else {
                continue;
            };
            debug!("upload_cookbook: uploading {}", file.path);
            self.upload_checksum(target, &file.full_path, checksum)?;
        }

        let commit = Url::parse(&sandbox.uri).map_err(|e| ApiError::InvalidResponse {
            context: url.to_string(),
            message: format!("sandbox uri '{}': {e}", sandbox.uri),
        })?;
        self.send_json(Method::PUT, commit, Some(&json!({ "is_completed": true })))?;

        let mut url = self.endpoint(&format!(
            "cookbooks/{}/{}",
            cookbook.name(),
            cookbook.version()
        ));
        if force {
            url.query_pairs_mut().append_pair("force", "true");
        }
        self.send_json(Method::PUT, url, Some(&cookbook.manifest()))?;
        Ok(())
    }
}
