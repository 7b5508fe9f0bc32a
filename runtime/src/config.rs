//! Harvest configuration loading and resolution.
//!
//! Every setting resolves as explicit flag > `SKINFORGE_*` environment
//! variable > built-in default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::renderer::BrowserOptions;

pub const DEFAULT_SOURCE_URL: &str = "https://www.myperfectcv.co.uk/build-cv/choose-template";
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SCROLL_STEP_PX: u32 = 500;
pub const DEFAULT_SCROLL_MAX: u32 = 40;
pub const DEFAULT_SCROLL_SETTLE_MS: u64 = 200;
pub const DEFAULT_OVERLAY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CATEGORY: &str = "All";
pub const DEFAULT_OUT_DIR: &str = "skinforge-out";
pub const DEFAULT_ASSET_CONCURRENCY: usize = 4;
pub const DEFAULT_ASSET_TIMEOUT_MS: u64 = 30_000;

pub const ENV_SOURCE_URL: &str = "SKINFORGE_SOURCE_URL";
pub const ENV_NAV_TIMEOUT_MS: &str = "SKINFORGE_NAV_TIMEOUT_MS";
pub const ENV_SCROLL_MAX: &str = "SKINFORGE_SCROLL_MAX";
pub const ENV_CATEGORY: &str = "SKINFORGE_CATEGORY";
pub const ENV_OUT_DIR: &str = "SKINFORGE_OUT_DIR";
pub const ENV_CHROMIUM_PATH: &str = crate::renderer::chromium::CHROMIUM_PATH_ENV;
pub const ENV_HEADLESS: &str = "SKINFORGE_HEADLESS";
pub const ENV_ASSET_RETRIES: &str = "SKINFORGE_ASSET_RETRIES";

/// DOM conventions of the source listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// One listing card.
    pub card: String,
    /// Wrapper inside a card carrying `data-index` and `data-skin-category`.
    pub card_inner: String,
    /// Marker of a card flagged as popular.
    pub popular_marker: String,
    /// Cookie consent accept button.
    pub consent_button: String,
    /// Category tab buttons, matched by their text.
    pub category_tab: String,
    /// Text of the button that opens a card's preview overlay.
    pub preview_button_text: String,
    /// The preview overlay container.
    pub overlay: String,
    pub overlay_title: String,
    /// Colour swatch inputs inside the overlay.
    pub color_input: String,
    /// Large illustration inside the overlay.
    pub preview_illustration: String,
    /// Explicit close affordance of the overlay.
    pub close_button: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            card: ".skins-card-container".into(),
            card_inner: ".card".into(),
            popular_marker: "[class*=\"popular\"], [data-popular=\"true\"]".into(),
            consent_button: "#onetrust-accept-btn-handler".into(),
            category_tab: "[role=\"tablist\"] button, [role=\"tab\"], button".into(),
            preview_button_text: "Preview template".into(),
            overlay: "[class*=\"ModalStyles\"], [role=\"dialog\"], .modal-preview-skin-container"
                .into(),
            overlay_title: ".modal-head-text, [class*=\"title\"], h2, h3".into(),
            color_input: "input[data-color]".into(),
            preview_illustration: ".svg-skin".into(),
            close_button: "[class*=\"close-btn\"], .modal-close, button[aria-label=\"Close\"]"
                .into(),
        }
    }
}

/// Values given on the command line. `None` defers to env, then default.
#[derive(Debug, Clone, Default)]
pub struct HarvestOverrides {
    pub source_url: Option<String>,
    pub nav_timeout_ms: Option<u64>,
    pub scroll_max: Option<u32>,
    pub category: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub chromium_path: Option<PathBuf>,
    pub headless: Option<bool>,
    pub asset_concurrency: Option<usize>,
    pub asset_retries: Option<u32>,
    pub max_cards: Option<usize>,
    pub skip_previews: bool,
}

/// Fully resolved harvest settings.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub source_url: String,
    pub nav_timeout_ms: u64,
    pub scroll_step_px: u32,
    pub scroll_max: u32,
    pub scroll_settle_ms: u64,
    pub overlay_timeout_ms: u64,
    /// Category tab to select; `None` leaves the page's default tab.
    pub category: Option<String>,
    pub out_dir: PathBuf,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    pub asset_concurrency: usize,
    pub asset_retries: u32,
    pub asset_timeout_ms: u64,
    /// Stop after this many cards.
    pub max_cards: Option<usize>,
    /// Read cards without opening their preview overlays.
    pub open_previews: bool,
    pub selectors: SiteSelectors,
}

impl HarvestConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: HarvestOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with(
        overrides: HarvestOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let category = match overrides.category.or_else(|| env(ENV_CATEGORY)) {
            Some(c) if c.trim().is_empty() => None,
            Some(c) => Some(c),
            None => Some(DEFAULT_CATEGORY.to_string()),
        };

        Ok(Self {
            source_url: overrides
                .source_url
                .or_else(|| env(ENV_SOURCE_URL))
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            nav_timeout_ms: pick(overrides.nav_timeout_ms, &env, ENV_NAV_TIMEOUT_MS)?
                .unwrap_or(DEFAULT_NAV_TIMEOUT_MS),
            scroll_step_px: DEFAULT_SCROLL_STEP_PX,
            scroll_max: pick(overrides.scroll_max, &env, ENV_SCROLL_MAX)?
                .unwrap_or(DEFAULT_SCROLL_MAX),
            scroll_settle_ms: DEFAULT_SCROLL_SETTLE_MS,
            overlay_timeout_ms: DEFAULT_OVERLAY_TIMEOUT_MS,
            category,
            out_dir: resolve_out_dir(overrides.out_dir, &env),
            headless: pick(overrides.headless, &env, ENV_HEADLESS)?.unwrap_or(true),
            chromium_path: overrides
                .chromium_path
                .or_else(|| env(ENV_CHROMIUM_PATH).map(PathBuf::from)),
            asset_concurrency: overrides
                .asset_concurrency
                .unwrap_or(DEFAULT_ASSET_CONCURRENCY)
                .max(1),
            asset_retries: pick(overrides.asset_retries, &env, ENV_ASSET_RETRIES)?.unwrap_or(0),
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT_MS,
            max_cards: overrides.max_cards,
            open_previews: !overrides.skip_previews,
            selectors: SiteSelectors::default(),
        })
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            chromium_path: self.chromium_path.clone(),
            headless: self.headless,
            ..BrowserOptions::default()
        }
    }
}

fn pick<T: std::str::FromStr>(
    explicit: Option<T>,
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if explicit.is_some() {
        return Ok(explicit);
    }
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))
        })
        .transpose()
}

/// Resolve the output directory: explicit > `SKINFORGE_OUT_DIR` > `./skinforge-out`.
pub fn resolve_out_dir(
    explicit: Option<PathBuf>,
    env: &impl Fn(&str) -> Option<String>,
) -> PathBuf {
    explicit
        .or_else(|| env(ENV_OUT_DIR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
}

/// [`resolve_out_dir`] against the process environment.
pub fn out_dir_from_env(explicit: Option<PathBuf>) -> PathBuf {
    resolve_out_dir(explicit, &|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = HarvestConfig::resolve_with(HarvestOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(cfg.nav_timeout_ms, 60_000);
        assert_eq!(cfg.category.as_deref(), Some("All"));
        assert_eq!(cfg.out_dir, PathBuf::from("skinforge-out"));
        assert_eq!(cfg.asset_retries, 0);
        assert!(cfg.headless);
        assert!(cfg.open_previews);
    }

    #[test]
    fn test_flag_beats_env_beats_default() {
        let env = env_of(&[
            (ENV_SCROLL_MAX, "12"),
            (ENV_NAV_TIMEOUT_MS, "1000"),
            (ENV_OUT_DIR, "/tmp/from-env"),
        ]);
        let overrides = HarvestOverrides {
            nav_timeout_ms: Some(5),
            ..Default::default()
        };
        let cfg = HarvestConfig::resolve_with(overrides, env).unwrap();
        assert_eq!(cfg.nav_timeout_ms, 5);
        assert_eq!(cfg.scroll_max, 12);
        assert_eq!(cfg.out_dir, PathBuf::from("/tmp/from-env"));
    }

    #[test]
    fn test_empty_category_means_page_default() {
        let cfg = HarvestConfig::resolve_with(
            HarvestOverrides::default(),
            env_of(&[(ENV_CATEGORY, " ")]),
        )
        .unwrap();
        assert_eq!(cfg.category, None);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let err = HarvestConfig::resolve_with(
            HarvestOverrides::default(),
            env_of(&[(ENV_SCROLL_MAX, "lots")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_SCROLL_MAX));
    }
}
