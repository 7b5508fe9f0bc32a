//! Stylesheet acquisition for harvested templates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use url::Url;

use super::http_client::HttpClient;

/// Aggregate of every inline `<style>` on the source page.
pub const INLINE_STYLES_FILE: &str = "inline-styles.css";

/// One requested stylesheet. `content` is `None` when the fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub url: String,
    pub content: Option<String>,
}

/// Fetch every URL with at most `concurrency` requests in flight.
///
/// The result has one entry per input URL, in input order. Transport errors
/// and non-2xx responses are logged and yield `content: None`.
pub async fn fetch_all(client: &HttpClient, urls: &[String], concurrency: usize) -> Vec<FetchedAsset> {
    let responses = client.get_many(urls, concurrency).await;
    urls.iter()
        .zip(responses)
        .map(|(url, resp)| {
            let content = match resp {
                Ok(r) if r.is_success() => Some(r.body),
                Ok(r) => {
                    tracing::warn!(url = %url, status = r.status, "stylesheet fetch rejected");
                    None
                }
                Err(e) => {
                    tracing::warn!(url = %url, "stylesheet fetch failed: {e:#}");
                    None
                }
            };
            FetchedAsset {
                url: url.clone(),
                content,
            }
        })
        .collect()
}

/// Absolute URLs of every `<link rel="stylesheet">` in `html`, resolved
/// against `base_url`, deduplicated in document order.
pub fn stylesheet_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("link[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for el in document.select(&selector) {
        let is_stylesheet = el
            .value()
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
        if !is_stylesheet {
            continue;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let resolved = match &base {
            Some(b) => b.join(href).map(|u| u.to_string()).ok(),
            None => Url::parse(href).map(|u| u.to_string()).ok(),
        };
        if let Some(url) = resolved {
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }
    links
}

/// Local filename for the stylesheet at `url`.
///
/// The URL's basename with any query stripped; `style-<index>.css` when there
/// is none. Names already in `taken` get a `-N` suffix before the extension.
pub fn stylesheet_filename(url: &str, index: usize, taken: &mut HashSet<String>) -> String {
    let basename = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .or_else(|| {
            let no_query = url.split(['?', '#']).next().unwrap_or(url);
            no_query.rsplit('/').next().map(str::to_string)
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("style-{index}.css"));

    if taken.insert(basename.clone()) {
        return basename;
    }
    let (stem, ext) = match basename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (basename.clone(), String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write fetched stylesheets plus the inline aggregate into `dir`. Failed
/// fetches are skipped. Returns the files written.
pub fn write_stylesheets(dir: &Path, assets: &[FetchedAsset], inline_css: &str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut taken = HashSet::from([INLINE_STYLES_FILE.to_string()]);
    let mut written = Vec::new();
    for (index, asset) in assets.iter().enumerate() {
        let Some(content) = &asset.content else {
            continue;
        };
        let name = stylesheet_filename(&asset.url, index, &mut taken);
        let path = dir.join(&name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }

    let inline_path = dir.join(INLINE_STYLES_FILE);
    std::fs::write(&inline_path, inline_css)
        .with_context(|| format!("failed to write {}", inline_path.display()))?;
    written.push(inline_path);

    Ok(written)
}
