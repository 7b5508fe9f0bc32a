//! Content-derived template identifiers.
//!
//! The source site scopes each template's CSS under a class of the form
//! `.skn-<token>`. That token is stable across sessions for the same visual
//! template, so it is used as the artifact id. When it is absent the id falls
//! back to the card's position, which is only stable while the listing order
//! is, and is flagged as such.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefix of the scoped-style class the id token is read from.
pub const SKIN_CLASS_PREFIX: &str = "skn-";

/// Where an id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Read from the card's own scoped-style selector.
    Embedded,
    /// Positional `skin-<index>` fallback.
    Synthetic,
}

/// A derived template id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateId {
    pub value: String,
    pub source: IdSource,
}

impl TemplateId {
    pub fn is_degraded(&self) -> bool {
        self.source == IdSource::Synthetic
    }
}

fn skin_selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.skn-([a-z0-9]+)").expect("valid skin selector regex"))
}

/// Read the embedded skin token from a card's markup, if any.
pub fn embedded_skin_token(markup: &str) -> Option<&str> {
    skin_selector_regex()
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Derive the id for the card at `index`.
pub fn derive_template_id(markup: &str, index: usize) -> TemplateId {
    match embedded_skin_token(markup) {
        Some(token) => TemplateId {
            value: token.to_string(),
            source: IdSource::Embedded,
        },
        None => TemplateId {
            value: format!("skin-{index}"),
            source: IdSource::Synthetic,
        },
    }
}

/// Whether `id` is safe to use as a file stem.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"<div class="skins-card-container"><style id="skin-style">.skn-mlf1 .document{font-family:Oswald}.skn-mlf1 .name{color:#333}</style><div class="skn-mlf1"><div class="document"></div></div></div>"#;

    #[test]
    fn test_embedded_token_wins() {
        let id = derive_template_id(CARD, 7);
        assert_eq!(id.value, "mlf1");
        assert_eq!(id.source, IdSource::Embedded);
        assert!(!id.is_degraded());
    }

    #[test]
    fn test_id_is_stable_across_positions() {
        assert_eq!(derive_template_id(CARD, 0), derive_template_id(CARD, 41));
    }

    #[test]
    fn test_synthetic_fallback_is_flagged() {
        let id = derive_template_id(r#"<div class="card"></div>"#, 12);
        assert_eq!(id.value, "skin-12");
        assert!(id.is_degraded());
    }

    #[test]
    fn test_class_without_selector_dot_is_not_a_token() {
        // Only the CSS selector form counts, not a bare class attribute.
        assert_eq!(embedded_skin_token(r#"<div class="skn-abc"></div>"#), None);
    }

    #[test]
    fn test_safe_ids() {
        assert!(is_safe_id("mlf1"));
        assert!(is_safe_id("skin-3"));
        assert!(!is_safe_id("../etc"));
        assert!(!is_safe_id(""));
    }
}
