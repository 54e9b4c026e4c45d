//! Error taxonomy for the capture pipeline.
//!
//! Each step of the pipeline reports one of these kinds, and the policy for
//! every kind is stated here rather than implied by where an error happens to
//! be caught. Absorbed kinds are logged and the pipeline continues, possibly
//! with empty or partial data; propagated kinds surface to the caller.

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// A required request field is missing. Rejected before any side effect.
    #[error("invalid request: {0}")]
    ClientInput(String),

    /// Shared-secret header missing or wrong. Rejected before any side effect.
    #[error("authentication failed")]
    Auth,

    /// The page went away mid-capture (navigation, fetch failure after a
    /// triggered download). The pipeline degrades to partial data.
    #[error("page context lost: {0}")]
    TransientExtraction(String),

    /// One asset download failed. Logged and skipped; other assets proceed.
    #[error("asset fetch failed: {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    /// The staging directory for a capture is missing or the vault move
    /// itself failed. The caller must see this.
    #[error("organize failed: {0}")]
    Organize(String),

    /// An append to the URL log or the index file failed.
    #[error("persistence failed: {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorKind {
    /// Whether the pipeline absorbs this kind (log and continue) instead of
    /// failing the surrounding operation.
    ///
    /// Persistence is the one split case: the URL log append is the
    /// operation's durability guarantee and must surface, while an index
    /// append failure is swallowed. The server handles that distinction at
    /// the call site; here it is classified as propagated so no caller
    /// swallows it by default.
    pub fn is_absorbed(&self) -> bool {
        match self {
            ErrorKind::TransientExtraction(_) | ErrorKind::AssetFetch { .. } => true,
            ErrorKind::ClientInput(_)
            | ErrorKind::Auth
            | ErrorKind::Organize(_)
            | ErrorKind::Persistence { .. } => false,
        }
    }
}
