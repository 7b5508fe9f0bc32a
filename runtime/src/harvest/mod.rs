//! Template harvesting from the live listing page.
//!
//! The [`driver::AutomationDriver`] walks the page through a fixed sequence of
//! [`Stage`]s; the [`extractor::Extractor`] reads each card. Both talk to the
//! page only through the [`page::TemplatePage`] trait.

pub mod driver;
pub mod extractor;
pub mod page;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skinforge::colors::{flatten, palette_from_inputs};
use skinforge::{ColorInput, ColorOption, IdSource};
use uuid::Uuid;

use crate::config::HarvestConfig;

pub use driver::{AutomationDriver, DriverOptions, ScrollOutcome};
pub use extractor::{ExtractionError, Extractor};
pub use page::{BrowserPage, CardSnapshot, OverlaySnapshot, TemplatePage};

/// What the preview overlay revealed about a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDetails {
    pub title: Option<String>,
    pub colors: Vec<ColorInput>,
    /// Large preview illustration (`<svg>` markup).
    pub illustration: Option<String>,
}

/// One template card as read from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCard {
    pub index: usize,
    pub id: String,
    pub id_source: IdSource,
    /// Outer markup of the card.
    pub raw_markup: String,
    pub style_id: Option<String>,
    pub style_text: Option<String>,
    pub data_attrs: BTreeMap<String, String>,
    pub category: Option<String>,
    pub popular: bool,
    pub overlay: Option<OverlayDetails>,
}

impl TemplateCard {
    /// Overlay title, or a positional name when there is none.
    pub fn display_name(&self) -> String {
        self.overlay
            .as_ref()
            .and_then(|o| o.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Template {}", self.index + 1))
    }

    /// Swatches offered for this template, mains before their subs.
    pub fn palette(&self) -> Vec<ColorOption> {
        self.overlay
            .as_ref()
            .map(|o| flatten(&palette_from_inputs(&o.colors)))
            .unwrap_or_default()
    }
}

/// A card the harvest gave up on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardFailure {
    pub index: usize,
    pub stage: Stage,
    pub message: String,
}

/// Everything one harvest run collected from the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSession {
    pub run_id: Uuid,
    pub source_url: String,
    pub started_at: DateTime<Utc>,
    pub cards: Vec<TemplateCard>,
    pub failures: Vec<CardFailure>,
    /// Cards present on the page after lazy loading.
    pub discovered: usize,
    pub scroll: Option<ScrollOutcome>,
    pub stylesheet_urls: Vec<String>,
    /// All inline `<style>` text of the page, joined.
    #[serde(skip)]
    pub inline_css: String,
}

impl ExtractionSession {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_url: source_url.into(),
            started_at: Utc::now(),
            cards: Vec::new(),
            failures: Vec::new(),
            discovered: 0,
            scroll: None,
            stylesheet_urls: Vec::new(),
            inline_css: String::new(),
        }
    }

    pub fn extracted(&self) -> usize {
        self.cards.len()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    /// Cards whose id fell back to their position.
    pub fn degraded_ids(&self) -> Vec<&str> {
        self.cards
            .iter()
            .filter(|c| c.id_source == IdSource::Synthetic)
            .map(|c| c.id.as_str())
            .collect()
    }
}

/// Harvest stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Navigate,
    ConsentDismiss,
    CategorySelect,
    LazyLoad,
    CardExtract,
    AssetFetch,
    Normalize,
    Publish,
}

/// How a stage's failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StagePolicy {
    /// Abort the run.
    Fatal,
    /// Log and continue; absence is normal.
    Optional,
    /// Repeat up to a cap, then continue with what there is.
    Bounded { max_iterations: u32 },
    /// Skip the failing item after `retries` extra attempts.
    SkipOnError { retries: u32 },
}

impl StagePolicy {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StagePolicy::Fatal)
    }

    /// Attempts per item: one plus any retries.
    pub fn attempts(&self) -> u32 {
        match self {
            StagePolicy::SkipOnError { retries } => retries.saturating_add(1),
            _ => 1,
        }
    }
}

/// Run-specific numbers the stage policies are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageLimits {
    pub scroll_max: u32,
    pub card_retries: u32,
    pub asset_retries: u32,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            scroll_max: crate::config::DEFAULT_SCROLL_MAX,
            card_retries: 0,
            asset_retries: 0,
        }
    }
}

impl From<&HarvestConfig> for StageLimits {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            scroll_max: config.scroll_max,
            card_retries: 0,
            asset_retries: config.asset_retries,
        }
    }
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Navigate,
        Stage::ConsentDismiss,
        Stage::CategorySelect,
        Stage::LazyLoad,
        Stage::CardExtract,
        Stage::AssetFetch,
        Stage::Normalize,
        Stage::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Navigate => "navigate",
            Stage::ConsentDismiss => "consent_dismiss",
            Stage::CategorySelect => "category_select",
            Stage::LazyLoad => "lazy_load",
            Stage::CardExtract => "card_extract",
            Stage::AssetFetch => "asset_fetch",
            Stage::Normalize => "normalize",
            Stage::Publish => "publish",
        }
    }

    /// Failure policy of this stage under `limits`.
    pub fn policy(&self, limits: &StageLimits) -> StagePolicy {
        match self {
            Stage::Navigate | Stage::Publish => StagePolicy::Fatal,
            Stage::ConsentDismiss | Stage::CategorySelect => StagePolicy::Optional,
            Stage::LazyLoad => StagePolicy::Bounded {
                max_iterations: limits.scroll_max,
            },
            Stage::CardExtract => StagePolicy::SkipOnError {
                retries: limits.card_retries,
            },
            Stage::Normalize => StagePolicy::SkipOnError { retries: 0 },
            Stage::AssetFetch => StagePolicy::SkipOnError {
                retries: limits.asset_retries,
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failures that end a harvest run.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvestOverrides;

    fn card(index: usize, overlay: Option<OverlayDetails>) -> TemplateCard {
        TemplateCard {
            index,
            id: format!("skin-{index}"),
            id_source: IdSource::Synthetic,
            raw_markup: String::new(),
            style_id: None,
            style_text: None,
            data_attrs: BTreeMap::new(),
            category: None,
            popular: false,
            overlay,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_position() {
        assert_eq!(card(3, None).display_name(), "Template 4");
        let titled = card(
            0,
            Some(OverlayDetails {
                title: Some("  Modern  ".into()),
                ..Default::default()
            }),
        );
        assert_eq!(titled.display_name(), "Modern");
    }

    #[test]
    fn test_palette_from_overlay_swatches() {
        let swatch = |color: &str, group: u32, item: &str| ColorInput {
            color: color.into(),
            label: color.into(),
            group_index: Some(group),
            item_id: Some(item.into()),
        };
        let c = card(
            0,
            Some(OverlayDetails {
                colors: vec![
                    swatch("#111111", 0, "main-0"),
                    swatch("#222222", 0, "sub-0-0"),
                    swatch("#333333", 1, "main-1"),
                ],
                ..Default::default()
            }),
        );
        let colors: Vec<String> = c.palette().into_iter().map(|o| o.color).collect();
        assert_eq!(colors, vec!["#111111", "#222222", "#333333"]);
    }

    #[test]
    fn test_stage_policies() {
        let cfg = HarvestConfig::resolve_with(
            HarvestOverrides {
                asset_retries: Some(2),
                ..Default::default()
            },
            |_| None,
        )
        .unwrap();
        let limits = StageLimits::from(&cfg);
        assert!(Stage::Navigate.policy(&limits).is_fatal());
        assert!(Stage::Publish.policy(&limits).is_fatal());
        assert_eq!(Stage::ConsentDismiss.policy(&limits), StagePolicy::Optional);
        assert_eq!(
            Stage::LazyLoad.policy(&limits),
            StagePolicy::Bounded { max_iterations: 40 }
        );
        assert_eq!(
            Stage::AssetFetch.policy(&limits),
            StagePolicy::SkipOnError { retries: 2 }
        );
        assert_eq!(Stage::AssetFetch.policy(&limits).attempts(), 3);
        assert_eq!(Stage::CardExtract.policy(&limits).attempts(), 1);
        assert_eq!(Stage::ALL.len(), 8);
    }
}
