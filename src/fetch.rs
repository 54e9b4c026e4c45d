//! HTTP collaborators: fetching a page for extraction and downloading a URL
//! to a path. Both are fire-and-report operations; retry policy lives nowhere
//! in this crate.

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;

const USER_AGENT: &str = concat!("pagevault/", env!("CARGO_PKG_VERSION"));
const MAX_PAGE_BYTES: usize = 4 * 1024 * 1024;

pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("build http client")
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    /// URL after redirects; extraction resolves relative links against this.
    pub final_url: String,
}

pub async fn fetch_page(client: &reqwest::Client, url: &url::Url) -> anyhow::Result<FetchedPage> {
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }

    let resp = client
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("GET {url}: status {status}");
    }

    let final_url = resp.url().to_string();
    let body = read_limited(resp, MAX_PAGE_BYTES).await?;
    Ok(FetchedPage {
        html: String::from_utf8_lossy(&body).into_owned(),
        final_url,
    })
}

async fn read_limited(mut resp: reqwest::Response, limit: usize) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("read response chunk")? {
        if out.len() + chunk.len() > limit {
            let remaining = limit.saturating_sub(out.len());
            out.extend_from_slice(&chunk[..remaining]);
            break;
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// "Download a URL to a given path." Success or failure is all a caller gets;
/// the trait seam exists so tests can observe or fake downloads.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow::anyhow!("download path has no parent: {}", dest.display()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create download dir: {}", parent.display()))?;

        let mut resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: status {status}");
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("create download file: {}", dest.display()))?;
        while let Some(chunk) = resp.chunk().await.context("read download chunk")? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("write download file: {}", dest.display()))?;
        }
        file.flush()
            .await
            .with_context(|| format!("flush download file: {}", dest.display()))?;
        Ok(())
    }
}

/// File name a downloaded URL is stored under: the last path segment, or a
/// kind-based default when the URL has none.
pub fn file_name_for_url(url: &str, fallback: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return fallback.to_string();
    };
    let name = parsed
        .path()
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default();

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}
