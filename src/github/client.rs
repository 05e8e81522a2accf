// ABOUTME: Authenticated GitHub REST client (public or Enterprise API).
// ABOUTME: Serves the event feed and the JSON helpers the pipeline reports through.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH, LINK};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::events::{EventSource, FetchedPage, Page, SourceError, parse_next_link};
use crate::types::Event;

use super::error::{GithubError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Commit author as reported by the commits API.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(serde::Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(serde::Deserialize)]
struct CommitDetail {
    author: Author,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GithubClient {
    /// `api_url` is the repository root, e.g. `https://ghe.example.com/api/v3/repos/org/repo`.
    pub fn new(api_url: impl Into<String>, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|e| GithubError::InvalidToken(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("quickcd/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.request(Method::GET, url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &impl Serialize) -> Result<T> {
        self.send_json(Method::POST, url, body).await
    }

    pub async fn patch_json<T: DeserializeOwned>(&self, url: &str, body: &impl Serialize) -> Result<T> {
        self.send_json(Method::PATCH, url, body).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let resp = self.request(method, url).json(body).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Authors of the commits behind a pull request's `commits_url`.
    pub async fn pull_request_authors(&self, commits_url: &str) -> Result<Vec<Author>> {
        let commits: Vec<CommitEntry> = self.get_json(commits_url).await?;
        Ok(commits.into_iter().map(|c| c.commit.author).collect())
    }
}

#[async_trait]
impl EventSource for GithubClient {
    fn events_url(&self) -> String {
        format!("{}/events", self.api_url)
    }

    async fn fetch_page(&self, url: &str, etag: Option<&str>) -> std::result::Result<FetchedPage, SourceError> {
        let mut request = self.request(Method::GET, url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let resp = request.send().await?;

        if resp.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchedPage::NotModified);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let next = header(LINK).as_deref().and_then(parse_next_link);

        let bytes = resp.bytes().await?;
        let events: Vec<Event> = serde_json::from_slice(&bytes)?;

        Ok(FetchedPage::Page(Page { events, etag, next }))
    }
}
