//! # ct-remote-gist
//! candi-tab/crates/ct-plugins/ct-remote-gist/src/lib.rs
//! GitHub gist implementation of `RemoteDocumentClient`.
//! Features: bearer auth, first-file document, truncated content via raw_url.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ct_core::traits::{DocumentUpdate, RemoteDocument, RemoteDocumentClient};
use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("candi-tab/", env!("CARGO_PKG_VERSION"));

pub struct GistClient {
    http: Client,
    api_base: String,
    token: RwLock<Option<SecretString>>,
}

impl GistClient {
    pub fn new(
        api_base: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("building gist http client")?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: RwLock::new(token.filter(|t| !t.expose_secret().is_empty())),
        })
    }

    fn gist_url(&self, gist_id: &str) -> String {
        format!("{}/gists/{}", self.api_base, gist_id)
    }

    /// Attaches auth headers, or `None` without a credential.
    fn authorize(&self, request: RequestBuilder) -> Option<RequestBuilder> {
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        token.as_ref().map(|token| {
            request
                .header(header::AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
                .header(header::ACCEPT, GITHUB_JSON)
        })
    }
}

async fn ensure_success(response: Response, action: &str) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("gist {action} failed with status {status}: {body}"))
}

#[async_trait]
impl RemoteDocumentClient for GistClient {
    fn is_enabled(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_access_token(&self, token: Option<SecretString>) {
        let token = token.filter(|t| !t.expose_secret().is_empty());
        info!(enabled = token.is_some(), "gist credential updated");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn fetch(&self, document_id: &str) -> anyhow::Result<Option<RemoteDocument>> {
        let Some(request) = self.authorize(self.http.get(self.gist_url(document_id))) else {
            return Ok(None);
        };

        let response = ensure_success(request.send().await?, "fetch").await?;
        let gist: GistResponse = response.json().await.context("decoding gist")?;
        let (file_name, file) = gist
            .files
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("gist {document_id} has no files"))?;

        let content = match (file.truncated, file.raw_url, file.content) {
            (true, Some(raw_url), _) => {
                debug!(%file_name, "gist file truncated, fetching raw content");
                let request = self
                    .authorize(self.http.get(raw_url))
                    .ok_or_else(|| anyhow!("gist credential removed during fetch"))?;
                ensure_success(request.send().await?, "raw fetch")
                    .await?
                    .text()
                    .await?
            }
            (_, _, Some(content)) => content,
            _ => return Err(anyhow!("gist file {file_name} carries no content")),
        };

        Ok(Some(RemoteDocument {
            content,
            description: gist.description,
            file_name: file.filename.unwrap_or(file_name),
        }))
    }

    async fn update(&self, document_id: &str, update: &DocumentUpdate) -> anyhow::Result<bool> {
        let body = GistWrite::from_update(update, None);
        let Some(request) = self.authorize(self.http.patch(self.gist_url(document_id))) else {
            return Ok(false);
        };

        ensure_success(request.json(&body).send().await?, "update").await?;
        debug!(gist_id = document_id, bytes = update.content.len(), "gist updated");
        Ok(true)
    }

    async fn create(&self, document: &DocumentUpdate) -> anyhow::Result<Option<String>> {
        let body = GistWrite::from_update(document, Some(false));
        let url = format!("{}/gists", self.api_base);
        let Some(request) = self.authorize(self.http.post(url)) else {
            return Ok(None);
        };

        let response = ensure_success(request.json(&body).send().await?, "create").await?;
        let created: CreatedGist = response.json().await.context("decoding created gist")?;
        info!(gist_id = %created.id, "gist created");
        Ok(Some(created.id))
    }
}

// ── Wire format ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    description: Option<String>,
    // ordered by file name; the first file carries the document
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedGist {
    id: String,
}

#[derive(Debug, Serialize)]
struct GistWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public: Option<bool>,
    files: BTreeMap<&'a str, FileContent<'a>>,
}

#[derive(Debug, Serialize)]
struct FileContent<'a> {
    content: &'a str,
}

impl<'a> GistWrite<'a> {
    fn from_update(update: &'a DocumentUpdate, public: Option<bool>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(
            update.file_name.as_str(),
            FileContent {
                content: update.content.as_str(),
            },
        );
        Self {
            description: update.description.as_deref(),
            public,
            files,
        }
    }
}
