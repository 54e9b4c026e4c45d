//! Capture orchestrator: one end-to-end run of fetching a page, extracting
//! text and assets, staging downloads, and shipping the result to the ingest
//! service. Every step is best-effort; nothing propagates past `run`, and the
//! resolved directory name is reported whenever a capture could be staged.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use url::Url;

use crate::config::VaultConfig;
use crate::errors::ErrorKind;
use crate::extract;
use crate::fetch::{self, Downloader, FetchedPage, HttpDownloader};
use crate::formats::{AssetKind, AssetRef, ExtractedPage, SaveTextRequest, SaveUrlRequest};
use crate::naming::{self, DirectoryName};

/// Pipeline positions, in execution order. Terminal on `Done` or on a logged
/// failure; there is no cancellation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    FetchPage,
    ExtractText,
    ExtractAssets,
    WaitForTriggeredDownloads,
    SendText,
    DownloadMainPage,
    DownloadAssets,
    ReportUrl,
    Done,
}

#[derive(Debug, Default)]
pub struct CaptureOutcome {
    /// `None` means nothing could be staged and the server must not attempt
    /// a file move.
    pub directory_name: Option<String>,
    pub text_sent: bool,
    pub assets_attempted: usize,
    pub assets_failed: usize,
}

pub struct Capturer {
    config: VaultConfig,
    http: reqwest::Client,
    downloader: Arc<dyn Downloader>,
}

impl Capturer {
    pub fn new(config: VaultConfig) -> anyhow::Result<Self> {
        let http = fetch::http_client()?;
        let downloader = Arc::new(HttpDownloader::new(http.clone()));
        Ok(Self {
            config,
            http,
            downloader,
        })
    }

    /// Seam for tests: observe or fake the per-asset downloads.
    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    /// Run one capture. Never fails; partial captures are still reported.
    pub async fn run(&self, url: &str) -> CaptureOutcome {
        let mut outcome = CaptureOutcome::default();

        tracing::debug!(step = ?Step::FetchPage, url);
        let page = match self.fetch(url).await {
            Ok(page) => page,
            Err(err) => {
                // No page, nothing to stage. Still log that the capture
                // happened so the URL is not lost.
                tracing::warn!(url, %err, "page fetch failed; reporting url without files");
                self.report_url(url, None).await;
                return outcome;
            }
        };

        tracing::debug!(step = ?Step::ExtractText, url = %page.final_url);
        tracing::debug!(step = ?Step::ExtractAssets, url = %page.final_url);
        let ExtractedPage { text, mut assets } =
            extract::extract_page(&page.html, &page.final_url, self.config.text_cap_bytes);

        let title = text.as_ref().map(|t| t.title.as_str()).unwrap_or_default();
        let directory_name = naming::resolve(&page.final_url, title, Utc::now());
        outcome.directory_name = Some(directory_name.as_str().to_string());

        let triggered_any = self.trigger_pdf_downloads(&directory_name, &mut assets).await;
        if triggered_any {
            tracing::debug!(step = ?Step::WaitForTriggeredDownloads);
            tokio::time::sleep(Duration::from_secs(self.config.trigger_wait_secs)).await;
        }

        tracing::debug!(step = ?Step::SendText);
        match &text {
            Some(text) => {
                outcome.text_sent = self.send_text(text, &directory_name).await;
            }
            None => tracing::debug!("no text extracted; skipping save-text"),
        }

        tracing::debug!(step = ?Step::DownloadMainPage);
        if let Err(err) = self.stage_main_page(&directory_name, &page).await {
            tracing::warn!(%err, "staging main page failed");
        }

        tracing::debug!(step = ?Step::DownloadAssets);
        let (attempted, failed) = self.download_assets(&directory_name, &assets).await;
        outcome.assets_attempted = attempted;
        outcome.assets_failed = failed;

        tracing::debug!(step = ?Step::ReportUrl);
        self.report_url(&page.final_url, Some(&directory_name)).await;

        tracing::debug!(step = ?Step::Done, directory = %directory_name);
        outcome
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, ErrorKind> {
        let parsed = Url::parse(url)
            .map_err(|err| ErrorKind::TransientExtraction(format!("parse url {url}: {err}")))?;
        fetch::fetch_page(&self.http, &parsed)
            .await
            .map_err(|err| ErrorKind::TransientExtraction(format!("{err:#}")))
    }

    /// Fire the default action of every enumerated PDF affordance: download
    /// it into the staging directory. Marks each fired asset.
    async fn trigger_pdf_downloads(
        &self,
        directory_name: &DirectoryName,
        assets: &mut [AssetRef],
    ) -> bool {
        let staging_dir = self.config.staging_dir(directory_name.as_str());
        let mut triggered_any = false;

        for asset in assets.iter_mut().filter(|a| a.kind == AssetKind::Pdf) {
            let file_name = fetch::file_name_for_url(&asset.url, "paper.pdf");
            let dest = staging_dir.join(&file_name);
            asset.was_triggered = true;
            triggered_any = true;
            if let Err(err) = self.downloader.download(&asset.url, &dest).await {
                let err = ErrorKind::AssetFetch {
                    url: asset.url.clone(),
                    reason: format!("{err:#}"),
                };
                tracing::warn!(%err, "triggered pdf download failed");
            }
        }
        triggered_any
    }

    async fn send_text(&self, text: &crate::formats::PageText, name: &DirectoryName) -> bool {
        let body = SaveTextRequest {
            title: Some(text.title.clone()),
            content: text.content.clone(),
            url: text.url.clone(),
            directory_name: name.as_str().to_string(),
        };
        match self.post("save-text", &body).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "save-text failed; capture continues");
                false
            }
        }
    }

    async fn stage_main_page(
        &self,
        directory_name: &DirectoryName,
        page: &FetchedPage,
    ) -> anyhow::Result<()> {
        let staging_dir = self.config.staging_dir(directory_name.as_str());
        tokio::fs::create_dir_all(&staging_dir)
            .await
            .with_context(|| format!("create staging dir: {}", staging_dir.display()))?;
        let path = staging_dir.join("page.html");
        tokio::fs::write(&path, &page.html)
            .await
            .with_context(|| format!("write page: {}", path.display()))?;
        Ok(())
    }

    /// Attempt every non-PDF asset independently; a failure skips that asset
    /// only. Returns (attempted, failed).
    async fn download_assets(
        &self,
        directory_name: &DirectoryName,
        assets: &[AssetRef],
    ) -> (usize, usize) {
        let staging_dir = self.config.staging_dir(directory_name.as_str());
        let mut attempted = 0_usize;
        let mut failed = 0_usize;

        for asset in assets.iter().filter(|a| a.kind != AssetKind::Pdf) {
            attempted += 1;
            let subdir = asset.kind.staging_subdir().unwrap_or_default();
            let file_name = fetch::file_name_for_url(&asset.url, "asset");
            let dest = staging_dir.join(subdir).join(&file_name);
            if let Err(err) = self.downloader.download(&asset.url, &dest).await {
                failed += 1;
                let err = ErrorKind::AssetFetch {
                    url: asset.url.clone(),
                    reason: format!("{err:#}"),
                };
                tracing::warn!(%err, "asset download failed");
            }
        }
        (attempted, failed)
    }

    async fn report_url(&self, url: &str, directory_name: Option<&DirectoryName>) {
        let body = SaveUrlRequest {
            url: url.to_string(),
            directory_name: directory_name.map(|d| d.as_str().to_string()),
        };
        if let Err(err) = self.post("save-url", &body).await {
            tracing::error!(%err, "save-url failed; capture is not recorded server-side");
        }
    }

    async fn post<T: serde::Serialize>(&self, endpoint: &str, body: &T) -> anyhow::Result<()> {
        let url = format!(
            "{}/{endpoint}",
            self.config.server_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .post(&url)
            .header("X-API-Key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("POST {url}: status {status}: {detail}");
        }
        Ok(())
    }
}
