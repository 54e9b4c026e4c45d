//! Archive ingest service: a small axum app that accepts capture payloads
//! and files them into the vault. Stateless per request; the URL log append
//! is the one durability guarantee, everything after it is best-effort.

use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::config::VaultConfig;
use crate::errors::ErrorKind;
use crate::vault;

const API_KEY_HEADER: &str = "x-api-key";
const URL_LOG_HEADER: &str = "# Saved URLs\n\n";

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult = Result<Json<serde_json::Value>, ApiError>;

pub fn router(config: Arc<VaultConfig>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/save-url", post(save_url))
        .route("/save-text", post(save_text))
        .layer(TraceLayer::new_for_http())
        .with_state(config)
}

pub async fn serve(config: VaultConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr.clone();
    let app = router(Arc::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "archive ingest service listening");
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

/// Permissive wire shape so field presence is checked after authentication,
/// with the spec's status codes, rather than by the JSON extractor.
#[derive(Debug, Deserialize)]
struct SaveUrlBody {
    url: Option<String>,
    directory_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveTextBody {
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
    directory_name: Option<String>,
}

async fn save_url(
    State(config): State<Arc<VaultConfig>>,
    headers: HeaderMap,
    Json(body): Json<SaveUrlBody>,
) -> ApiResult {
    authenticate(&config, &headers).map_err(api_error)?;

    let url = body
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| api_error(ErrorKind::ClientInput("url is required".into())))?
        .to_string();
    if let Some(directory_name) = body.directory_name.as_deref() {
        if !is_valid_directory_name(directory_name) {
            return Err(api_error(ErrorKind::ClientInput(
                "directory_name is not a valid path segment".into(),
            )));
        }
    }

    // Durability guarantee: the log line lands before anything else happens.
    let line = format!("- [{}] {url}\n", chrono::Utc::now().to_rfc3339());
    let log_path = config.url_log_path();
    let append = {
        let log_path = log_path.clone();
        tokio::task::spawn_blocking(move || {
            vault::append_with_header(&log_path, URL_LOG_HEADER, &line)
        })
        .await
        .map_err(join_error)?
    };
    if let Err(err) = append {
        tracing::error!(path = %log_path.display(), %err, "url log append failed");
        return Err(api_error(err));
    }
    tracing::info!(%url, "url saved");

    if let Some(directory_name) = body.directory_name {
        // File placement is best-effort; the log line above already
        // recorded the capture.
        let config = Arc::clone(&config);
        let source_url = url.clone();
        let placed = tokio::task::spawn_blocking(move || {
            let moved = vault::place(&config, &directory_name, &source_url);
            (directory_name, moved)
        })
        .await;
        match placed {
            Ok((directory_name, Ok(moved_pdfs))) => {
                tracing::info!(
                    %directory_name,
                    pdfs = moved_pdfs.len(),
                    "capture placed in vault"
                );
            }
            Ok((directory_name, Err(err))) => {
                tracing::warn!(%directory_name, %err, "organize failed");
            }
            Err(err) => {
                tracing::warn!(%err, "organize task failed");
            }
        }
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn save_text(
    State(config): State<Arc<VaultConfig>>,
    headers: HeaderMap,
    Json(body): Json<SaveTextBody>,
) -> ApiResult {
    authenticate(&config, &headers).map_err(api_error)?;

    let content = body
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| api_error(ErrorKind::ClientInput("content is required".into())))?;
    let directory_name = body
        .directory_name
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| api_error(ErrorKind::ClientInput("directory_name is required".into())))?;
    if !is_valid_directory_name(directory_name) {
        return Err(api_error(ErrorKind::ClientInput(
            "directory_name is not a valid path segment".into(),
        )));
    }

    let staging_dir = config.staging_dir(directory_name);
    if let Err(err) = tokio::fs::create_dir_all(&staging_dir).await {
        tracing::error!(path = %staging_dir.display(), %err, "create staging dir failed");
        return Err(api_error(ErrorKind::Persistence {
            path: staging_dir.display().to_string(),
            source: err,
        }));
    }

    let title = body.title.as_deref().unwrap_or("Untitled");
    let url = body.url.as_deref().unwrap_or("");
    let document = format!(
        "# {title}\n\nSource: <{url}>\nCaptured: {}\n\n---\n\n{content}\n",
        chrono::Utc::now().to_rfc3339()
    );

    // Deterministic overwrite; a re-sent capture replaces the prior document.
    let doc_path = staging_dir.join("article.md");
    if let Err(err) = tokio::fs::write(&doc_path, document).await {
        tracing::error!(path = %doc_path.display(), %err, "write article failed");
        return Err(api_error(ErrorKind::Persistence {
            path: doc_path.display().to_string(),
            source: err,
        }));
    }
    tracing::info!(directory_name, "text saved");

    Ok(Json(serde_json::json!({ "success": true })))
}

fn authenticate(config: &VaultConfig, headers: &HeaderMap) -> Result<(), ErrorKind> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != config.api_key {
        return Err(ErrorKind::Auth);
    }
    Ok(())
}

/// The one place an error kind picks its HTTP status.
fn api_error(kind: ErrorKind) -> ApiError {
    let status = match &kind {
        ErrorKind::ClientInput(_) => StatusCode::BAD_REQUEST,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": kind.to_string() })))
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    tracing::error!(%err, "filesystem task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )
}

/// Directory names arrive from the network; accept only clean path segments.
fn is_valid_directory_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
