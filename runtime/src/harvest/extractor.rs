//! Per-card data extraction.

use skinforge::{derive_template_id, IdSource};

use super::page::{CardSnapshot, OverlaySnapshot, TemplatePage};
use super::{OverlayDetails, TemplateCard};

/// Why a single card could not be harvested.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("card {index} is no longer on the page")]
    CardMissing { index: usize },

    #[error("card {index} has no preview trigger")]
    PreviewUnavailable { index: usize },

    #[error("preview overlay for card {index} did not open within {timeout_ms}ms")]
    OverlayTimeout { index: usize, timeout_ms: u64 },

    #[error("preview overlay still showing at card {index} after {timeout_ms}ms; not opening another over it")]
    OverlayStuck { index: usize, timeout_ms: u64 },

    #[error("preview overlay for card {index} vanished before it could be read")]
    OverlayMissing { index: usize },

    #[error("overlay state: {0}")]
    Overlay(#[from] skinforge::SkinError),

    #[error("page call failed for card {index}: {source}")]
    Page {
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Reads cards and their overlays into [`TemplateCard`]s.
#[derive(Debug, Clone, Default)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Read card `index`, plus its overlay when `overlay_open` says one is
    /// showing.
    pub async fn extract_card<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
        overlay_open: bool,
    ) -> Result<TemplateCard, ExtractionError> {
        let mut card = self.read_card(page, index).await?;
        if overlay_open {
            card.overlay = Some(self.read_overlay(page, index).await?);
        }
        Ok(card)
    }

    pub async fn read_card<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
    ) -> Result<TemplateCard, ExtractionError> {
        let snapshot = page
            .card_snapshot(index)
            .await
            .map_err(|source| ExtractionError::Page { index, source })?
            .ok_or(ExtractionError::CardMissing { index })?;
        Ok(card_from_snapshot(index, snapshot))
    }

    pub async fn read_overlay<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
    ) -> Result<OverlayDetails, ExtractionError> {
        let snapshot = page
            .overlay_snapshot()
            .await
            .map_err(|source| ExtractionError::Page { index, source })?
            .ok_or(ExtractionError::OverlayMissing { index })?;
        Ok(overlay_from_snapshot(snapshot))
    }
}

/// Build a card from what the page reported.
pub fn card_from_snapshot(index: usize, snapshot: CardSnapshot) -> TemplateCard {
    let id = derive_template_id(&snapshot.outer_html, index);
    if id.source == IdSource::Synthetic {
        tracing::warn!(
            index,
            id = %id.value,
            "no scoped style selector on card; id depends on listing order"
        );
    }
    TemplateCard {
        index,
        id: id.value,
        id_source: id.source,
        raw_markup: snapshot.outer_html,
        style_id: snapshot.style_id.filter(|s| !s.is_empty()),
        style_text: snapshot.style_text,
        data_attrs: snapshot.data_attrs,
        category: snapshot.category.filter(|c| !c.is_empty()),
        popular: snapshot.popular,
        overlay: None,
    }
}

fn overlay_from_snapshot(snapshot: OverlaySnapshot) -> OverlayDetails {
    let colors = snapshot
        .colors
        .into_iter()
        .filter(|c| !c.color.is_empty())
        .collect();
    OverlayDetails {
        title: snapshot.title.filter(|t| !t.trim().is_empty()),
        colors,
        illustration: snapshot.illustration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinforge::ColorInput;

    #[test]
    fn test_embedded_id_from_scoped_style() {
        let card = card_from_snapshot(
            4,
            CardSnapshot {
                outer_html: r#"<div class="skins-card-container"><style id="x">.skn-mlt5 .name{}</style></div>"#.into(),
                style_id: Some("x".into()),
                category: Some("".into()),
                ..Default::default()
            },
        );
        assert_eq!(card.id, "mlt5");
        assert_eq!(card.id_source, IdSource::Embedded);
        assert_eq!(card.style_id.as_deref(), Some("x"));
        assert_eq!(card.category, None);
    }

    #[test]
    fn test_synthetic_id_is_flagged() {
        let card = card_from_snapshot(
            9,
            CardSnapshot {
                outer_html: "<div class=\"skins-card-container\"></div>".into(),
                ..Default::default()
            },
        );
        assert_eq!(card.id, "skin-9");
        assert_eq!(card.id_source, IdSource::Synthetic);
    }

    #[test]
    fn test_overlay_drops_blank_swatches() {
        let details = overlay_from_snapshot(OverlaySnapshot {
            title: Some("   ".into()),
            colors: vec![
                ColorInput {
                    color: "".into(),
                    label: "broken".into(),
                    group_index: None,
                    item_id: None,
                },
                ColorInput {
                    color: "#166C60".into(),
                    label: "Castleton".into(),
                    group_index: Some(0),
                    item_id: Some("main-0".into()),
                },
            ],
            illustration: Some("<svg></svg>".into()),
        });
        assert_eq!(details.title, None);
        assert_eq!(details.colors.len(), 1);
    }
}
