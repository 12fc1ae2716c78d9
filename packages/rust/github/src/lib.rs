//! GitHub issue access and CSV attachment download.
//!
//! Datasets are submitted as issue attachments. The issue body is fetched
//! from the REST API, its CSV links extracted, and each file downloaded to a
//! local directory before decoding.

mod links;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, header};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use csv2md_shared::{Csv2MdError, Result};

pub use links::{extract_csv_links, has_csv_link};

/// Maximum number of redirects to follow. Attachment URLs redirect to storage.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for API calls and downloads.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string; the GitHub API rejects requests without one.
const USER_AGENT: &str = concat!("csv2md/", env!("CARGO_PKG_VERSION"));

/// The issue fields the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    /// `null` in the API when the issue has no description.
    #[serde(default)]
    pub body: Option<String>,
}

impl Issue {
    /// CSV links found in the issue body.
    pub fn csv_links(&self) -> Vec<Url> {
        self.body.as_deref().map(extract_csv_links).unwrap_or_default()
    }
}

/// File name a download of `url` is saved under: its last path segment.
pub fn attachment_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin REST client over one API base URL.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Build a client for `api_url` (e.g. `https://api.github.com`).
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Csv2MdError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Fetch issue `number` of `repo` (`owner/name`).
    #[instrument(skip(self))]
    pub async fn fetch_issue(&self, repo: &str, number: u64) -> Result<Issue> {
        if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(Csv2MdError::validation(format!(
                "repository must be 'owner/name', got '{repo}'"
            )));
        }

        let url = format!("{}/repos/{repo}/issues/{number}", self.api_url);
        let mut request = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Csv2MdError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Csv2MdError::Network(format!("{url}: HTTP {status}")));
        }

        let issue: Issue = response
            .json()
            .await
            .map_err(|e| Csv2MdError::Network(format!("{url}: invalid issue payload: {e}")))?;

        info!(number = issue.number, title = %issue.title, "fetched issue");
        Ok(issue)
    }

    /// Download `url` into `dir`, named after the last path segment.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn download_file(&self, url: &Url, dir: &Path) -> Result<PathBuf> {
        let file_name = attachment_name(url).ok_or_else(|| {
            Csv2MdError::validation(format!("URL has no file name: {url}"))
        })?;
        let target = dir.join(file_name);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Csv2MdError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Csv2MdError::Network(format!("{url}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Csv2MdError::Network(format!("{url}: failed to read body: {e}")))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Csv2MdError::io(dir, e))?;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| Csv2MdError::io(&target, e))?;

        debug!(path = %target.display(), bytes = bytes.len(), "downloaded file");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("csv2md-github-{}", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn fetch_issue_with_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/data/issues/7"))
            .and(header_is("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 7,
                "title": "Add rain data",
                "body": "[rain.csv](https://example.com/rain.csv)",
                "state": "open"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), Some("secret".into())).unwrap();
        let issue = client.fetch_issue("acme/data", 7).await.unwrap();

        assert_eq!(issue.number, 7);
        assert_eq!(issue.title, "Add rain data");
        assert_eq!(issue.csv_links().len(), 1);
    }

    #[tokio::test]
    async fn fetch_issue_null_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/data/issues/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 1,
                "title": "Empty",
                "body": null
            })))
            .mount(&server)
            .await;

        let client = GithubClient::new(&format!("{}/", server.uri()), None).unwrap();
        let issue = client.fetch_issue("acme/data", 1).await.unwrap();
        assert!(issue.body.is_none());
        assert!(issue.csv_links().is_empty());
    }

    #[tokio::test]
    async fn fetch_issue_not_found_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), None).unwrap();
        let err = client.fetch_issue("acme/data", 99).await.unwrap_err();
        assert!(matches!(err, Csv2MdError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_issue_rejects_bad_repo() {
        let client = GithubClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.fetch_issue("just-a-name", 1).await.unwrap_err();
        assert!(matches!(err, Csv2MdError::Validation { .. }));
    }

    #[test]
    fn attachment_name_is_last_segment() {
        let url = Url::parse("https://github.com/user-attachments/files/12/data.csv").unwrap();
        assert_eq!(attachment_name(&url), Some("data.csv"));

        let dir_url = Url::parse("https://example.com/files/").unwrap();
        assert_eq!(attachment_name(&dir_url), None);
    }

    #[tokio::test]
    async fn download_file_writes_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/rain.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"name;A\n".to_vec()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let client = GithubClient::new(&server.uri(), None).unwrap();
        let url = Url::parse(&format!("{}/files/rain.csv", server.uri())).unwrap();

        let written = client.download_file(&url, &dir).await.unwrap();
        assert_eq!(written, dir.join("rain.csv"));
        assert_eq!(std::fs::read(&written).unwrap(), b"name;A\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn download_failure_writes_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let client = GithubClient::new(&server.uri(), None).unwrap();
        let url = Url::parse(&format!("{}/files/wind.csv", server.uri())).unwrap();

        let err = client.download_file(&url, &dir).await.unwrap_err();
        assert!(matches!(err, Csv2MdError::Network(_)));
        assert!(!dir.join("wind.csv").exists());
    }
}
