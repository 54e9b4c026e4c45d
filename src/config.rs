use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Process-wide configuration, built once at startup and passed by reference.
/// Nothing in the crate reads configuration from ambient state.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Shared secret expected in the `X-API-Key` header.
    pub api_key: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the ingest service, used by the capture client.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Where captures land before the organizer moves them.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Permanent archive root.
    #[serde(default = "default_vault_root")]
    pub vault_root: PathBuf,

    /// Name of the shared papers subdirectory under the vault root.
    #[serde(default = "default_papers_dir")]
    pub papers_dir: String,

    /// Name of the append-only index file under the vault root.
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Append-only URL log, relative to the vault root.
    #[serde(default = "default_url_log")]
    pub url_log: String,

    /// Ceiling on extracted text size, in bytes.
    #[serde(default = "default_text_cap_bytes")]
    pub text_cap_bytes: usize,

    /// Fixed pause after triggering PDF downloads, in seconds.
    #[serde(default = "default_trigger_wait_secs")]
    pub trigger_wait_secs: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("staging")
}

fn default_vault_root() -> PathBuf {
    PathBuf::from("vault")
}

fn default_papers_dir() -> String {
    "papers".to_string()
}

fn default_index_file() -> String {
    "index.md".to_string()
}

fn default_url_log() -> String {
    "urls.md".to_string()
}

fn default_text_cap_bytes() -> usize {
    512 * 1024
}

fn default_trigger_wait_secs() -> u64 {
    3
}

impl VaultConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let config: VaultConfig =
            toml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))?;
        if config.api_key.trim().is_empty() {
            anyhow::bail!("config api_key must not be empty: {}", path.display());
        }
        Ok(config)
    }

    /// In-memory configuration rooted under `base`, for tests and ad-hoc runs.
    pub fn with_roots(api_key: &str, base: &Path) -> Self {
        Self {
            api_key: api_key.to_string(),
            listen_addr: default_listen_addr(),
            server_url: default_server_url(),
            staging_root: base.join("staging"),
            vault_root: base.join("vault"),
            papers_dir: default_papers_dir(),
            index_file: default_index_file(),
            url_log: default_url_log(),
            text_cap_bytes: default_text_cap_bytes(),
            trigger_wait_secs: default_trigger_wait_secs(),
        }
    }

    pub fn papers_path(&self) -> PathBuf {
        self.vault_root.join(&self.papers_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.vault_root.join(&self.index_file)
    }

    pub fn url_log_path(&self) -> PathBuf {
        self.vault_root.join(&self.url_log)
    }

    pub fn staging_dir(&self, directory_name: &str) -> PathBuf {
        self.staging_root.join(directory_name)
    }
}
