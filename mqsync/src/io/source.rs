//! Remote source adapter for the GitHub repository contents API.
//!
//! The [`RemoteSource`] trait is the seam the sync cycle depends on; tests use
//! an in-memory scripted source instead of talking HTTP.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{Listing, RepositoryLocation};
use crate::io::config::SyncConfig;

/// Read-only view of a version-controlled source tree.
pub trait RemoteSource {
    /// Look up `path` at `reference`: a single file object or a directory listing.
    fn list(&self, path: &str, reference: &str) -> Result<Listing>;

    /// Fetch the raw bytes of the file at `path` and `reference`.
    fn fetch(&self, path: &str, reference: &str) -> Result<Vec<u8>>;
}

/// Non-success HTTP response, with whatever body the server returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatusError {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {} returned HTTP {}", self.url, self.status)
    }
}

impl std::error::Error for HttpStatusError {}

/// Response body attached to `err`, if it came from an HTTP status failure.
pub fn response_body(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<HttpStatusError>()
        .map(|status| status.body.as_str())
}

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

/// Blocking client for `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Clone)]
pub struct GithubSource {
    agent: ureq::Agent,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
}

impl fmt::Debug for GithubSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSource")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GithubSource {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        location: &RepositoryLocation,
        timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("mqsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            owner: location.owner.clone(),
            repo: location.repo.clone(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.settings.api_base.clone(),
            config.token.clone(),
            &config.location,
            config.settings.http_timeout(),
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/contents",
            self.api_base,
            encode_segment(&self.owner),
            encode_segment(&self.repo)
        );
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            url.push('/');
            url.push_str(&encode_segment(segment));
        }
        url
    }

    fn get(&self, path: &str, reference: &str, accept: &str) -> Result<ureq::Response> {
        let url = self.contents_url(path);
        let mut request = self
            .agent
            .get(&url)
            .set("Accept", accept)
            .set("X-GitHub-Api-Version", API_VERSION);
        if !reference.is_empty() {
            request = request.query("ref", reference);
        }
        if !self.token.is_empty() {
            request = request.set("Authorization", &format!("Bearer {}", self.token));
        }

        debug!(%url, reference, "requesting contents");
        match request.call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(HttpStatusError { url, status, body }.into())
            }
            Err(err) => Err(anyhow::Error::new(err).context(format!("GET {url}"))),
        }
    }
}

impl RemoteSource for GithubSource {
    #[instrument(skip(self))]
    fn list(&self, path: &str, reference: &str) -> Result<Listing> {
        let response = self.get(path, reference, ACCEPT_JSON)?;
        response
            .into_json::<Listing>()
            .with_context(|| format!("parse contents listing for {path:?}"))
    }

    #[instrument(skip(self))]
    fn fetch(&self, path: &str, reference: &str) -> Result<Vec<u8>> {
        let response = self.get(path, reference, ACCEPT_RAW)?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("read contents of {path:?}"))?;
        debug!(bytes = bytes.len(), "fetched file");
        Ok(bytes)
    }
}

/// Percent-encode one path segment (RFC 3986 unreserved characters pass through).
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
