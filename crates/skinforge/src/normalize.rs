//! Turn raw harvested card markup into canonical, self-contained documents.
//!
//! A raw card is the outer markup of one listing card. Inside it sits a
//! single root container (class `document` on the source site) holding the
//! actual résumé page. Normalizing:
//!
//! 1. locates that root and bounds it with [`crate::scan`],
//! 2. strips the inline `transform: scale(..)` the listing page applied,
//! 3. wraps the result in a fixed head (fonts, shared stylesheets, the card's
//!    own `<style>` blocks plus any collected ones) and a body holding only the
//!    bounded fragment.
//!
//! The output is a fixed point: normalizing it again returns it unchanged.

use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::scan::{self, TagKind, TagScanner};
use crate::types::{SkinError, SkinResult};

/// Google Fonts families the source templates reference.
pub const DEFAULT_FONT_HREF: &str = "https://fonts.googleapis.com/css?family=Allura|Dancing+Script|Dynalight|Mrs+Saint+Delafield|Fira+Sans|PT+Sans|Saira|Blinker|PT+Sans+Caption|Bodoni+MT|Oswald|Source+Sans+Pro";

/// Settings for the document wrapper.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Class token identifying the root container.
    pub root_class: String,
    /// `<title>` of generated documents.
    pub title: String,
    /// Font stylesheet link.
    pub font_href: Option<String>,
    /// Public path the stylesheet directory is served under.
    pub stylesheet_base: String,
    /// Stylesheet filenames linked from every document, in order.
    pub stylesheets: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            root_class: "document".to_string(),
            title: "CV Template".to_string(),
            font_href: Some(DEFAULT_FONT_HREF.to_string()),
            stylesheet_base: "/css".to_string(),
            stylesheets: vec!["all.min.css".to_string(), "main-1.0.0.380.css".to_string()],
        }
    }
}

/// A normalized template document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    /// The complete document.
    pub html: String,
    /// The bounded, cleaned root fragment exactly as it appears in `<body>`.
    pub fragment: String,
    /// Unique inline CSS blocks placed in the head.
    pub styles: Vec<String>,
    /// Closing tags of the root element consumed while bounding it.
    pub closing_tags: usize,
}

/// Files processed by [`Normalizer::normalize_dir`].
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    /// `(file name, reason)` for every skipped file.
    pub skipped: Vec<(String, String)>,
}

/// Builds canonical template documents.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Stylesheet filenames every generated document links to.
    pub fn referenced_styles(&self) -> Vec<String> {
        self.config.stylesheets.clone()
    }

    fn base_css(&self) -> String {
        format!(
            "body {{\n  margin: 0;\n  padding: 0;\n  background: #fff;\n}}\n.{} {{\n  transform: none !important;\n}}",
            self.config.root_class
        )
    }

    /// Normalize one raw fragment. `name` is only used in error reports.
    pub fn normalize(
        &self,
        name: &str,
        raw: &str,
        collected_styles: &[String],
    ) -> SkinResult<NormalizedDocument> {
        let root_class = &self.config.root_class;
        let root = scan::locate_root(raw, root_class).ok_or_else(|| SkinError::BoundaryNotFound {
            name: name.to_string(),
            root_class: root_class.clone(),
        })?;
        let boundary = scan::scan_balanced(raw, &root).ok_or_else(|| SkinError::Unbalanced {
            name: name.to_string(),
            tag: root.name.clone(),
        })?;

        let fragment = strip_scale_transforms(boundary.slice(raw));

        let base = self.base_css();
        let mut styles: Vec<String> = Vec::new();
        let candidates = style_blocks(raw)
            .into_iter()
            .chain(collected_styles.iter().map(|s| s.trim().to_string()));
        for css in candidates {
            if css.is_empty() || css == base || styles.contains(&css) {
                continue;
            }
            styles.push(css);
        }

        let html = self.wrap(&fragment, &styles, &base);
        tracing::debug!(
            name,
            closing_tags = boundary.closing_tags,
            styles = styles.len(),
            "normalized template"
        );

        Ok(NormalizedDocument {
            html,
            fragment,
            styles,
            closing_tags: boundary.closing_tags,
        })
    }

    fn wrap(&self, fragment: &str, styles: &[String], base_css: &str) -> String {
        let mut head = String::new();
        head.push_str("  <meta charset=\"UTF-8\">\n");
        head.push_str(
            "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        head.push_str(&format!(
            "  <title>{}</title>\n",
            escape_text(&self.config.title)
        ));
        if let Some(font) = &self.config.font_href {
            head.push_str(&format!(
                "  <link href=\"{}\" rel=\"stylesheet\">\n",
                escape_attr(font)
            ));
        }
        let base = self.config.stylesheet_base.trim_end_matches('/');
        for sheet in &self.config.stylesheets {
            head.push_str(&format!(
                "  <link rel=\"stylesheet\" href=\"{}\">\n",
                escape_attr(&format!("{base}/{sheet}"))
            ));
        }
        for css in styles {
            head.push_str(&format!("  <style>\n{css}\n</style>\n"));
        }
        head.push_str(&format!("  <style>\n{base_css}\n</style>\n"));

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n{head}</head>\n<body>\n{fragment}\n</body>\n</html>\n"
        )
    }

    /// Normalize every raw `*.html` file in `dir`, skipping overlay captures
    /// (`*-modal.html`). Output goes to `out_dir`, or back in place.
    ///
    /// Files without a root boundary are reported and skipped; the batch
    /// continues.
    pub fn normalize_dir(
        &self,
        dir: &Path,
        out_dir: Option<&Path>,
        collected_styles: &[String],
    ) -> SkinResult<BatchReport> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.ends_with(".html") && !name.contains("-modal")
            })
            .collect();
        files.sort();

        let target = out_dir.unwrap_or(dir);
        std::fs::create_dir_all(target)?;

        let mut report = BatchReport::default();
        for path in files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let raw = std::fs::read_to_string(&path)?;
            match self.normalize(&name, &raw, collected_styles) {
                Ok(doc) => {
                    let dest = target.join(&name);
                    std::fs::write(&dest, doc.html)?;
                    report.written.push(dest);
                }
                Err(e @ (SkinError::BoundaryNotFound { .. } | SkinError::Unbalanced { .. })) => {
                    tracing::warn!(file = %name, "skipping: {e}");
                    report.skipped.push((name, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

/// Contents of every `<style>` element, trimmed, in document order.
pub fn style_blocks(markup: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut open_end: Option<usize> = None;
    for tag in TagScanner::new(markup).filter(|t| t.name == "style") {
        match tag.kind {
            TagKind::Open => open_end = Some(tag.end),
            TagKind::Close => {
                if let Some(start) = open_end.take() {
                    blocks.push(markup[start..tag.start].trim().to_string());
                }
            }
            TagKind::SelfClosing => {}
        }
    }
    blocks
}

/// Isolate the first `<svg>` element, adding the SVG namespace when missing
/// so the result stands alone as a file.
pub fn extract_illustration(markup: &str) -> Option<String> {
    let boundary = scan::find_element(markup, "svg")?;
    let svg = boundary.slice(markup);
    let open_end = svg.find('>')?;
    if svg[..open_end].contains("xmlns=") {
        Some(svg.to_string())
    } else {
        Some(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"{}",
            &svg[4..]
        ))
    }
}

fn style_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(\s+)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid style regex")
    })
}

fn is_scale_transform(declaration: &str) -> bool {
    let Some((prop, value)) = declaration.split_once(':') else {
        return false;
    };
    let prop = prop.trim().to_ascii_lowercase();
    (prop == "transform" || prop == "-webkit-transform")
        && value.to_ascii_lowercase().contains("scale")
}

/// Remove inline `transform: scale(..)` declarations. Style attributes left
/// with nothing in them are dropped; untouched attributes keep their bytes.
pub fn strip_scale_transforms(fragment: &str) -> String {
    style_attr_regex()
        .replace_all(fragment, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let lead = caps.get(1).map_or(" ", |m| m.as_str());
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());

            if !value.split(';').any(is_scale_transform) {
                return whole.to_string();
            }
            let kept: Vec<&str> = value
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty() && !is_scale_transform(d))
                .collect();
            if kept.is_empty() {
                String::new()
            } else {
                format!("{lead}style=\"{}\"", kept.join("; ").replace('"', "'"))
            }
        })
        .into_owned()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(inner: &str) -> String {
        format!(
            r#"<div class="skins-card-container"><div class="card" data-index="3" data-skin-category="modern"><style id="skn-style">.skn-abc1 .name{{color:#222}}</style><div class="svg-skin"><div class="skn-abc1">{inner}</div></div><button>Preview template</button></div></div>"#
        )
    }

    #[test]
    fn test_ten_nested_divs_scenario() {
        // The root plus nine nested divs: ten divs, ten closing tags.
        let mut inner = String::new();
        for i in 0..9 {
            inner.push_str(&format!("<div class=\"level-{i}\">"));
        }
        inner.push_str("text");
        for _ in 0..9 {
            inner.push_str("</div>");
        }
        let raw = card(&format!(
            r#"<div class="document" style="transform: scale(0.5)">{inner}</div>"#
        ));

        let doc = Normalizer::default().normalize("t.html", &raw, &[]).unwrap();
        assert_eq!(doc.closing_tags, 10);
        assert_eq!(doc.fragment, format!(r#"<div class="document">{inner}</div>"#));
        assert!(!doc.html.contains("scale(0.5)"));
        assert!(doc.html.contains("<body>\n<div class=\"document\">"));
    }

    #[test]
    fn test_other_declarations_survive_strip() {
        let out = strip_scale_transforms(
            r#"<div class="document" style="width: 595px; transform: scale(0.35, 0.3); transform-origin: 0 0"><p style="color: red">x</p></div>"#,
        );
        assert_eq!(
            out,
            r#"<div class="document" style="width: 595px; transform-origin: 0 0"><p style="color: red">x</p></div>"#
        );
    }

    #[test]
    fn test_non_scale_transform_kept() {
        let src = r#"<div style="transform: rotate(3deg)"></div>"#;
        assert_eq!(strip_scale_transforms(src), src);
    }

    #[test]
    fn test_missing_root_is_reported_by_name() {
        let err = Normalizer::default()
            .normalize("broken.html", "<div class=\"card\"></div>", &[])
            .unwrap_err();
        assert!(matches!(err, SkinError::BoundaryNotFound { ref name, .. } if name == "broken.html"));
    }

    #[test]
    fn test_unbalanced_root_is_an_error() {
        let err = Normalizer::default()
            .normalize("cut.html", "<div class=\"document\"><div></div>", &[])
            .unwrap_err();
        assert!(matches!(err, SkinError::Unbalanced { .. }));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = card(
            r#"<div class="document" style="transform: scale(0.352941, 0.308642)"><div class="accent-panel"><br><img src="p.png"></div><style>.document .x{top:0}</style></div>"#,
        );
        let collected = vec![".extra { color: #000 }".to_string()];
        let n = Normalizer::default();
        let first = n.normalize("a.html", &raw, &collected).unwrap();
        let second = n.normalize("a.html", &first.html, &collected).unwrap();
        assert_eq!(first.html, second.html);
        assert_eq!(first.styles, second.styles);
        assert_eq!(first.styles.len(), 3);
    }

    #[test]
    fn test_output_has_single_depth_zero_at_fragment_end() {
        let raw = card(r#"<div class="document"><div><div></div></div></div>"#);
        let doc = Normalizer::default().normalize("a.html", &raw, &[]).unwrap();
        let offsets = scan::depth_zero_offsets(&doc.fragment, "div");
        assert_eq!(offsets, vec![doc.fragment.len()]);
    }

    #[test]
    fn test_head_links_follow_config() {
        let n = Normalizer::new(NormalizeConfig {
            font_href: None,
            stylesheet_base: "/static/css/".into(),
            stylesheets: vec!["site.css".into()],
            ..NormalizeConfig::default()
        });
        let doc = n
            .normalize("a.html", r#"<div class="document"></div>"#, &[])
            .unwrap();
        assert!(doc.html.contains(r#"<link rel="stylesheet" href="/static/css/site.css">"#));
        assert!(!doc.html.contains("fonts.googleapis.com"));
        assert_eq!(n.referenced_styles(), vec!["site.css".to_string()]);
    }

    #[test]
    fn test_extract_illustration_adds_namespace() {
        let svg = extract_illustration(
            r#"<div class="svg-skin"><svg viewBox="0 0 595 842"><g><rect/></g></svg></div>"#,
        )
        .unwrap();
        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox"#));
        assert!(svg.ends_with("</svg>"));
        assert!(extract_illustration("<div></div>").is_none());
    }

    #[test]
    fn test_normalize_dir_skips_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.html"), card(r#"<div class="document"></div>"#))
            .unwrap();
        std::fs::write(dir.path().join("bad.html"), "<p>no root</p>").unwrap();
        std::fs::write(dir.path().join("good-modal.html"), "<p>overlay</p>").unwrap();

        let out = dir.path().join("out");
        let report = Normalizer::default()
            .normalize_dir(dir.path(), Some(&out), &[])
            .unwrap();
        assert_eq!(report.written, vec![out.join("good.html")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "bad.html");
    }
}
