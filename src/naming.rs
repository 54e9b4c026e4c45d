//! Derives a canonical, collision-resistant directory name from a URL and a
//! page title. Pure string work, no I/O; never fails. Malformed input falls
//! back to a synthetic deterministic name.

use chrono::{DateTime, Utc};
use url::Url;

/// `<timestamp>_<domainTag>_<articleTag>`, always a valid path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryName(String);

impl DirectoryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for DirectoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hostname (with `www.` stripped) to short publisher tag.
const DOMAIN_TAGS: &[(&str, &str)] = &[
    ("arxiv.org", "arxiv"),
    ("github.com", "github"),
    ("news.ycombinator.com", "hn"),
    ("medium.com", "medium"),
    ("nytimes.com", "nytimes"),
    ("youtube.com", "youtube"),
    ("youtu.be", "youtube"),
];

pub fn resolve(url: &str, title: &str, now: DateTime<Utc>) -> DirectoryName {
    let timestamp = now.format("%Y-%m-%d_%H%M%S");

    let Ok(parsed) = Url::parse(url) else {
        return DirectoryName(format!("unknown_page_{}", now.timestamp_millis()));
    };

    let host = parsed
        .host_str()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let domain_tag = domain_tag(&host);

    let article_tag = article_tag_for_domain(&domain_tag, &parsed)
        .or_else(|| last_path_segment(&parsed))
        .or_else(|| tag_from_title(title))
        .unwrap_or_else(|| "page".to_string());
    let article_tag = sanitize_tag(&article_tag);

    DirectoryName(format!("{timestamp}_{domain_tag}_{article_tag}"))
}

fn domain_tag(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);

    for (known, tag) in DOMAIN_TAGS {
        if host == *known {
            return (*tag).to_string();
        }
    }
    if host.ends_with(".wikipedia.org") {
        return "wikipedia".to_string();
    }
    if host.ends_with(".substack.com") {
        return "substack".to_string();
    }

    let fallback: String = host.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if fallback.is_empty() {
        "unknown".to_string()
    } else {
        fallback
    }
}

/// Publisher-specific article identifier, matched against the URL path/query.
fn article_tag_for_domain(domain_tag: &str, url: &Url) -> Option<String> {
    match domain_tag {
        "arxiv" => {
            let path = url.path();
            let id = path
                .strip_prefix("/abs/")
                .or_else(|| path.strip_prefix("/pdf/"))?;
            let id = id.trim_end_matches(".pdf").trim_matches('/');
            non_empty(id.to_string())
        }
        "github" => {
            let mut segments = url.path().split('/').filter(|s| !s.is_empty());
            let owner = segments.next()?;
            let repo = segments.next()?;
            Some(format!("{owner}_{repo}"))
        }
        "wikipedia" => {
            let title = url.path().strip_prefix("/wiki/")?;
            non_empty(title.trim_matches('/').to_string())
        }
        "youtube" => query_value(url, "v"),
        "hn" => query_value(url, "id").map(|id| format!("item_{id}")),
        "nytimes" => {
            let last = url.path().rsplit('/').find(|s| !s.is_empty())?;
            non_empty(last.trim_end_matches(".html").to_string())
        }
        _ => None,
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| non_empty(v.into_owned()))
}

fn last_path_segment(url: &Url) -> Option<String> {
    url.path()
        .rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn tag_from_title(title: &str) -> Option<String> {
    let tag: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(30)
        .collect();
    non_empty(tag.trim_matches('_').to_string())
}

fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
