//! Moves a staged capture into the permanent vault: PDFs into the shared
//! papers collection under collision-safe names, the remaining directory into
//! the vault root in one rename, and one line appended to the index.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::VaultConfig;
use crate::errors::ErrorKind;
use crate::formats::IndexRecord;

const INDEX_HEADER: &str = "# Archive Index\n\n";

/// Organize one staged capture. Returns the papers-folder file names of the
/// relocated PDFs. Fails only when the staging directory itself is missing or
/// the final move fails; every PDF sub-step is best-effort.
pub fn place(
    config: &VaultConfig,
    directory_name: &str,
    source_url: &str,
) -> Result<Vec<String>, ErrorKind> {
    let staging_dir = config.staging_dir(directory_name);
    if !staging_dir.is_dir() {
        return Err(ErrorKind::Organize(format!(
            "staging directory not found: {}",
            staging_dir.display()
        )));
    }

    let papers_dir = config.papers_path();
    std::fs::create_dir_all(&papers_dir).map_err(|err| {
        ErrorKind::Organize(format!("create papers dir {}: {err}", papers_dir.display()))
    })?;

    let moved_pdfs = relocate_pdfs(&staging_dir, &papers_dir, directory_name);

    // Whole-directory move, assumed atomic at the filesystem level. A vault
    // entry of the same name (same-second capture of the same page) gets a
    // suffixed destination rather than being overwritten.
    let vault_dest = unique_destination(&config.vault_root.join(directory_name));
    std::fs::rename(&staging_dir, &vault_dest).map_err(|err| {
        ErrorKind::Organize(format!(
            "move {} to {}: {err}",
            staging_dir.display(),
            vault_dest.display()
        ))
    })?;

    let record = IndexRecord {
        date: Utc::now().format("%Y-%m-%d").to_string(),
        article_tag: article_tag_from_url(source_url, directory_name),
        source_url: source_url.to_string(),
        directory_link: format!("./{}", file_name_of(&vault_dest)),
    };
    let index_path = config.index_path();
    if let Err(err) = append_with_header(&index_path, INDEX_HEADER, &record.to_markdown_line()) {
        // Index maintenance is best-effort; the capture itself is placed.
        tracing::warn!(path = %index_path.display(), %err, "index append failed");
    }

    Ok(moved_pdfs)
}

/// Move every PDF under `staging_dir` into `papers_dir`, prefixed with the
/// capture's directory name. Per-file failures are logged and skipped.
fn relocate_pdfs(staging_dir: &Path, papers_dir: &Path, directory_name: &str) -> Vec<String> {
    let mut moved = Vec::new();
    for pdf in find_pdfs(staging_dir) {
        let file_name = file_name_of(&pdf);
        let dest = unique_destination(&papers_dir.join(format!("{directory_name}_{file_name}")));
        match std::fs::rename(&pdf, &dest) {
            Ok(()) => moved.push(file_name_of(&dest)),
            Err(err) => {
                tracing::warn!(
                    src = %pdf.display(),
                    dest = %dest.display(),
                    %err,
                    "pdf move failed; leaving file in place"
                );
            }
        }
    }
    moved
}

fn find_pdfs(dir: &Path) -> Vec<PathBuf> {
    let mut pdfs = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %current.display(), %err, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf {
                pdfs.push(path);
            }
        }
    }
    pdfs.sort();
    pdfs
}

/// First free path at or after `wanted`: `name`, `name_2`, `name_3`, … with
/// any extension kept in place. Existing data is never overwritten.
fn unique_destination(wanted: &Path) -> PathBuf {
    if !wanted.exists() {
        return wanted.to_path_buf();
    }

    let stem = wanted
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture");
    let extension = wanted.extension().and_then(|e| e.to_str());
    let parent = wanted.parent().unwrap_or_else(|| Path::new("."));

    for n in 2_u32.. {
        let candidate = match extension {
            Some(ext) => parent.join(format!("{stem}_{n}.{ext}")),
            None => parent.join(format!("{stem}_{n}")),
        };
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("u32 suffix space exhausted");
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn article_tag_from_url(source_url: &str, directory_name: &str) -> String {
    url::Url::parse(source_url)
        .ok()
        .and_then(|url| {
            url.path()
                .rsplit('/')
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| directory_name.to_string())
}

/// Append `line` to `path`, creating the file with `header` first if absent.
pub fn append_with_header(path: &Path, header: &str, line: &str) -> Result<(), ErrorKind> {
    try_append(path, header, line).map_err(|source| ErrorKind::Persistence {
        path: path.display().to_string(),
        source,
    })
}

fn try_append(path: &Path, header: &str, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    use std::io::Write as _;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(false);
    if is_new {
        file.write_all(header.as_bytes())?;
    }
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_capture(config: &VaultConfig, name: &str) {
        let dir = config.staging_dir(name);
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("page.html"), "<html></html>").unwrap();
        std::fs::write(dir.join("assets").join("style.css"), "body{}").unwrap();
        std::fs::write(dir.join("paper.pdf"), "%PDF-1.4").unwrap();
        std::fs::write(dir.join("assets").join("slides.pdf"), "%PDF-1.4").unwrap();
    }

    fn list_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn place_splits_pdfs_from_page_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = VaultConfig::with_roots("k", temp.path());
        let name = "2024-03-09_123456_arxiv_2301.12345v2";
        staged_capture(&config, name);

        let moved = place(&config, name, "https://arxiv.org/abs/2301.12345v2").unwrap();
        let mut moved_sorted = moved.clone();
        moved_sorted.sort();
        assert_eq!(
            moved_sorted,
            [
                format!("{name}_paper.pdf"),
                format!("{name}_slides.pdf"),
            ]
        );

        // Exactly the two PDFs in papers/, exactly the non-PDFs in the vault.
        assert_eq!(
            list_files(&config.papers_path()),
            [format!("{name}_paper.pdf"), format!("{name}_slides.pdf")]
        );
        let vault_dir = config.vault_root.join(name);
        assert_eq!(list_files(&vault_dir), ["page.html"]);
        assert_eq!(list_files(&vault_dir.join("assets")), ["style.css"]);
        assert!(!config.staging_dir(name).exists());
    }

    #[test]
    fn place_fails_when_staging_dir_is_missing() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = VaultConfig::with_roots("k", temp.path());

        let err = place(&config, "2024-03-09_123456_hn_item_1", "https://x/").unwrap_err();
        assert!(matches!(err, ErrorKind::Organize(_)));
        assert!(err.to_string().contains("staging directory not found"));
    }

    #[test]
    fn index_is_append_only_across_places() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = VaultConfig::with_roots("k", temp.path());

        staged_capture(&config, "2024-03-09_123456_github_acme_widget");
        place(&config, "2024-03-09_123456_github_acme_widget", "https://github.com/acme/widget")
            .unwrap();
        let first = std::fs::read_to_string(config.index_path()).unwrap();
        assert!(first.starts_with(INDEX_HEADER));
        assert!(first.contains("[widget]"));

        staged_capture(&config, "2024-03-09_123457_hn_item_2");
        place(&config, "2024-03-09_123457_hn_item_2", "https://news.ycombinator.com/item?id=2")
            .unwrap();
        let second = std::fs::read_to_string(config.index_path()).unwrap();
        assert!(
            second.starts_with(&first),
            "prior index bytes must be preserved"
        );
        assert!(second.len() > first.len());
    }

    #[test]
    fn colliding_directory_names_never_overwrite() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = VaultConfig::with_roots("k", temp.path());
        let name = "2024-03-09_123456_examplecom_page";

        staged_capture(&config, name);
        place(&config, name, "https://example.com/page").unwrap();
        std::fs::write(
            config.vault_root.join(name).join("marker.txt"),
            "first capture",
        )
        .unwrap();

        staged_capture(&config, name);
        let moved = place(&config, name, "https://example.com/page").unwrap();

        let suffixed = config.vault_root.join(format!("{name}_2"));
        assert!(suffixed.is_dir(), "second capture must land beside the first");
        assert!(config.vault_root.join(name).join("marker.txt").exists());

        // Second round of identical PDF names gets suffixed, not clobbered.
        let mut moved_sorted = moved.clone();
        moved_sorted.sort();
        assert_eq!(
            moved_sorted,
            [
                format!("{name}_paper_2.pdf"),
                format!("{name}_slides_2.pdf"),
            ]
        );
    }

    #[test]
    fn append_with_header_writes_header_once() {
        let temp = tempfile::TempDir::new().unwrap();
        let log = temp.path().join("urls.md");

        append_with_header(&log, "# Saved URLs\n\n", "- one\n").unwrap();
        append_with_header(&log, "# Saved URLs\n\n", "- two\n").unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert_eq!(content, "# Saved URLs\n\n- one\n- two\n");
    }
}
