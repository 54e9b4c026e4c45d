use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Stylesheet,
    Script,
    Pdf,
}

impl AssetKind {
    /// Subdirectory of the staging directory this kind of asset lands in.
    /// Triggered PDF downloads land next to the page itself.
    pub fn staging_subdir(self) -> Option<&'static str> {
        match self {
            AssetKind::Pdf => None,
            AssetKind::Image | AssetKind::Stylesheet | AssetKind::Script => Some("assets"),
        }
    }
}

/// One downloadable resource found on a captured page. Duplicates are
/// tolerated; downloads are attempted independently downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub url: String,
    pub was_triggered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Result of running both extraction passes against a page. Either pass may
/// fail on its own; the other's output survives.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub text: Option<PageText>,
    pub assets: Vec<AssetRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveUrlRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTextRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub url: String,
    pub directory_name: String,
}

/// One appended line of the vault index. Entries are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub date: String,
    pub article_tag: String,
    pub source_url: String,
    pub directory_link: String,
}

impl IndexRecord {
    pub fn to_markdown_line(&self) -> String {
        format!(
            "- {} [{}]({}) <{}>\n",
            self.date, self.article_tag, self.directory_link, self.source_url
        )
    }
}
