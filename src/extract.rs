//! Two-pass extraction over a fetched page: a text pass and an asset pass.
//! The passes are independent; one failing never blocks the other. The text
//! pass always runs first because downstream the asset step may navigate the
//! page away (triggered PDF downloads).

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::errors::ErrorKind;
use crate::formats::{AssetKind, AssetRef, ExtractedPage, PageText};

/// Candidate content containers, most specific first. The generic `body`
/// fallback keeps the text pass total on ordinary pages.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".post-content",
    ".article-body",
    "body",
];

const TRUNCATION_MARKER: &str = "\n\n[truncated]";

pub fn extract_page(html: &str, base_url: &str, text_cap_bytes: usize) -> ExtractedPage {
    let document = Html::parse_document(html);

    // Text pass first; see module docs for why the order matters.
    let text = match text_pass(&document, base_url, text_cap_bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!(url = base_url, %err, "text extraction failed; continuing without text");
            None
        }
    };

    let assets = match asset_pass(&document, base_url) {
        Ok(assets) => assets,
        Err(err) => {
            tracing::warn!(url = base_url, %err, "asset extraction failed; continuing without assets");
            Vec::new()
        }
    };

    ExtractedPage { text, assets }
}

pub fn text_pass(
    document: &Html,
    base_url: &str,
    text_cap_bytes: usize,
) -> Result<PageText, ErrorKind> {
    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .ok_or_else(|| {
            ErrorKind::TransientExtraction("no content container in document".to_string())
        })?;

    let raw = visible_text(container);
    let content = collapse_blank_lines(&raw);
    if content.trim().is_empty() {
        return Err(ErrorKind::TransientExtraction(
            "content container is empty".to_string(),
        ));
    }
    let content = truncate_at(&content, text_cap_bytes);

    Ok(PageText {
        title: page_title(document).unwrap_or_else(|| base_url.to_string()),
        content,
        url: base_url.to_string(),
    })
}

pub fn asset_pass(document: &Html, base_url: &str) -> Result<Vec<AssetRef>, ErrorKind> {
    let mut assets = Vec::new();

    collect_absolute(document, "img[src]", "src", AssetKind::Image, &mut assets);
    collect_absolute(
        document,
        "link[rel=\"stylesheet\"][href]",
        "href",
        AssetKind::Stylesheet,
        &mut assets,
    );
    collect_absolute(
        document,
        "script[src]",
        "src",
        AssetKind::Script,
        &mut assets,
    );

    for url in enumerate_pdf_affordances(document, base_url) {
        assets.push(AssetRef {
            kind: AssetKind::Pdf,
            url,
            was_triggered: false,
        });
    }

    Ok(assets)
}

/// PDF download affordances on the page: direct `.pdf` links, arxiv-style
/// `/pdf/` paths, and explicit download-button links. Enumeration only; the
/// orchestrator decides whether to trigger them.
pub fn enumerate_pdf_affordances(document: &Html, base_url: &str) -> Vec<String> {
    let anchor = Selector::parse("a[href]").expect("anchor selector");
    let base = Url::parse(base_url).ok();

    let mut found = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let resolved = match Url::parse(href) {
            Ok(url) => Some(url),
            Err(_) => base.as_ref().and_then(|b| b.join(href).ok()),
        };
        let Some(url) = resolved else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }

        let path = url.path().to_ascii_lowercase();
        let is_download_button = element
            .value()
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == "download-pdf"));
        if path.ends_with(".pdf") || path.starts_with("/pdf/") || is_download_button {
            found.push(url.to_string());
        }
    }
    found
}

fn collect_absolute(
    document: &Html,
    selector: &str,
    attr: &str,
    kind: AssetKind,
    out: &mut Vec<AssetRef>,
) {
    let selector = Selector::parse(selector).expect("asset selector");
    for element in document.select(&selector) {
        let Some(value) = element.value().attr(attr) else {
            continue;
        };
        // Absolute http(s) URLs only; relative and inline resources are
        // excluded from capture.
        let Ok(url) = Url::parse(value) else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }
        out.push(AssetRef {
            kind,
            url: url.to_string(),
            was_triggered: false,
        });
    }
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("title selector");
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Text as a reader would see it: script/style subtrees skipped, block
/// elements separated by newlines.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    walk_text(root, &mut out);
    out
}

fn walk_text(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();
    if matches!(tag, "script" | "style" | "noscript" | "template") {
        return;
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        if let Some(child_element) = ElementRef::wrap(child) {
            walk_text(child_element, out);
            if is_block_element(child_element.value().name()) {
                out.push('\n');
            }
        }
    }
}

fn is_block_element(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "li"
            | "ul"
            | "ol"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "tr"
            | "table"
    )
}

/// Collapse runs of 3+ blank lines down to 2 and trim trailing space per line.
fn collapse_blank_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut blank_run = 0_usize;
    for line in input.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
            out.push('\n');
            continue;
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }
    out.trim_matches('\n').to_string()
}

fn truncate_at(content: &str, cap_bytes: usize) -> String {
    if content.len() <= cap_bytes {
        return content.to_string();
    }
    let mut end = cap_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &content[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head>
    <title>Widget Review</title>
    <link rel="stylesheet" href="https://cdn.example.com/site.css">
    <link rel="stylesheet" href="/relative.css">
    <script src="https://cdn.example.com/app.js"></script>
    <script>var inline = true;</script>
  </head>
  <body>
    <nav>Site navigation</nav>
    <article>
      <h1>Widget Review</h1>
      <p>First paragraph.</p>
      <script>trackPageView();</script>
      <p>Second paragraph.</p>
    </article>
    <img src="https://images.example.com/photo.png" alt="">
    <img src="/relative.png" alt="">
    <a href="https://arxiv.org/pdf/2301.12345v2">Download PDF</a>
    <a href="paper.pdf">local paper</a>
    <a href="/about">About</a>
  </body>
</html>
"#;

    #[test]
    fn text_pass_prefers_article_over_body() {
        let document = Html::parse_document(PAGE);
        let text = text_pass(&document, "https://example.com/review", 4096).unwrap();
        assert_eq!(text.title, "Widget Review");
        assert!(text.content.contains("First paragraph."));
        assert!(text.content.contains("Second paragraph."));
        assert!(!text.content.contains("Site navigation"));
        assert!(!text.content.contains("trackPageView"));
    }

    #[test]
    fn asset_pass_keeps_absolute_http_urls_only() {
        let document = Html::parse_document(PAGE);
        let assets = asset_pass(&document, "https://example.com/review").unwrap();

        let of_kind = |kind: AssetKind| {
            assets
                .iter()
                .filter(|a| a.kind == kind)
                .map(|a| a.url.as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(of_kind(AssetKind::Image), ["https://images.example.com/photo.png"]);
        assert_eq!(of_kind(AssetKind::Stylesheet), ["https://cdn.example.com/site.css"]);
        assert_eq!(of_kind(AssetKind::Script), ["https://cdn.example.com/app.js"]);
    }

    #[test]
    fn pdf_affordances_resolve_relative_links_without_side_effects() {
        let document = Html::parse_document(PAGE);
        let pdfs = enumerate_pdf_affordances(&document, "https://example.com/review");
        assert_eq!(
            pdfs,
            [
                "https://arxiv.org/pdf/2301.12345v2",
                "https://example.com/paper.pdf",
            ]
        );

        let assets = asset_pass(&document, "https://example.com/review").unwrap();
        assert!(
            assets
                .iter()
                .filter(|a| a.kind == AssetKind::Pdf)
                .all(|a| !a.was_triggered),
            "enumeration must not mark anything as triggered"
        );
    }

    #[test]
    fn text_pass_failure_leaves_asset_pass_intact() {
        let html = r#"<html><head>
            <script src="https://cdn.example.com/app.js"></script>
            </head><body><article>   </article></body></html>"#;
        let page = extract_page(html, "https://example.com/", 4096);
        assert!(page.text.is_none());
        assert_eq!(page.assets.len(), 1);
        assert_eq!(page.assets[0].kind, AssetKind::Script);
    }

    #[test]
    fn text_survives_when_no_asset_resolves() {
        let html = r#"<html><head><title>T</title></head><body><article>
            <p>Body text.</p>
            <img src="data:image/png;base64,AAAA">
            <img src="relative/photo.png">
            <script src="ftp://cdn.example.com/app.js"></script>
            <a href="javascript:void(0)">noop</a>
            </article></body></html>"#;
        let page = extract_page(html, "https://example.com/", 4096);

        let text = page.text.expect("text pass is independent of the asset pass");
        assert!(text.content.contains("Body text."));
        assert!(page.assets.is_empty(), "no reference here is capturable");
    }

    #[test]
    fn blank_line_runs_collapse_to_two() {
        let collapsed = collapse_blank_lines("a\n\n\n\n\nb\n");
        assert_eq!(collapsed, "a\n\n\nb");
    }

    #[test]
    fn truncation_appends_marker_on_char_boundary() {
        let content = "é".repeat(100);
        let truncated = truncate_at(&content, 99);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(truncated.len() <= 99 + TRUNCATION_MARKER.len());

        let untouched = truncate_at("short", 99);
        assert_eq!(untouched, "short");
    }
}
