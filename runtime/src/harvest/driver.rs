//! Drives one harvest session over a listing page.
//!
//! Cards are processed strictly one at a time: at most one preview overlay is
//! ever open. The page is asked whether an overlay is showing before every
//! open and after every close, and a card is never opened over one that is
//! still there.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use skinforge::OverlayState;
use tracing::{debug, info, warn};

use super::extractor::{ExtractionError, Extractor};
use super::page::TemplatePage;
use super::{
    CardFailure, ExtractionSession, HarvestError, Stage, StageLimits, StagePolicy, TemplateCard,
};
use crate::config::HarvestConfig;

/// Knobs the driver needs from the harvest configuration.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub source_url: String,
    pub nav_timeout_ms: u64,
    pub category: Option<String>,
    pub scroll_step_px: u32,
    pub scroll_settle_ms: u64,
    /// Bound on waiting for an overlay to appear or to go away.
    pub overlay_timeout_ms: u64,
    pub overlay_poll_ms: u64,
    /// Pause after page-level interactions (consent, tab switch, close).
    pub settle_ms: u64,
    pub open_previews: bool,
    pub max_cards: Option<usize>,
    pub limits: StageLimits,
}

impl From<&HarvestConfig> for DriverOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            source_url: config.source_url.clone(),
            nav_timeout_ms: config.nav_timeout_ms,
            category: config.category.clone(),
            scroll_step_px: config.scroll_step_px,
            scroll_settle_ms: config.scroll_settle_ms,
            overlay_timeout_ms: config.overlay_timeout_ms,
            overlay_poll_ms: 100,
            settle_ms: 1000,
            open_previews: config.open_previews,
            max_cards: config.max_cards,
            limits: StageLimits::from(config),
        }
    }
}

/// How lazy loading ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollOutcome {
    pub iterations: u32,
    pub final_height: u64,
    /// `false` when the iteration cap was hit first.
    pub converged: bool,
}

pub struct AutomationDriver {
    options: DriverOptions,
    extractor: Extractor,
}

impl AutomationDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            options,
            extractor: Extractor::new(),
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn policy(&self, stage: Stage) -> StagePolicy {
        stage.policy(&self.options.limits)
    }

    /// Apply `stage`'s policy to a failure: fatal stages end the run, the
    /// others are logged.
    fn tolerate(&self, stage: Stage, source: anyhow::Error) -> Result<(), HarvestError> {
        if !self.policy(stage).is_fatal() {
            warn!(stage = %stage, "{source:#}");
            return Ok(());
        }
        Err(match stage {
            Stage::Navigate => HarvestError::Navigation {
                url: self.options.source_url.clone(),
                source,
            },
            _ => HarvestError::Stage { stage, source },
        })
    }

    /// Run every page stage and return what was collected.
    pub async fn run<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
    ) -> Result<ExtractionSession, HarvestError> {
        let opts = &self.options;
        let mut session = ExtractionSession::new(opts.source_url.clone());
        info!(run = %session.run_id, url = %opts.source_url, "harvest started");

        if let Err(e) = page.navigate(&opts.source_url, opts.nav_timeout_ms).await {
            self.tolerate(Stage::Navigate, e)?;
        }

        match page.dismiss_consent().await {
            Ok(true) => {
                debug!(stage = %Stage::ConsentDismiss, "consent accepted");
                page.pause(opts.settle_ms).await;
            }
            Ok(false) => debug!(stage = %Stage::ConsentDismiss, "no consent banner"),
            Err(e) => self.tolerate(Stage::ConsentDismiss, e.context("consent dismissal failed"))?,
        }

        if let Some(category) = &opts.category {
            match page.select_category(category).await {
                Ok(true) => {
                    info!(stage = %Stage::CategorySelect, category = %category, "category selected");
                    page.pause(opts.settle_ms).await;
                }
                Ok(false) => warn!(
                    stage = %Stage::CategorySelect,
                    category = %category,
                    "category tab not found; using the page's default listing"
                ),
                Err(e) => {
                    self.tolerate(Stage::CategorySelect, e.context("category selection failed"))?
                }
            }
        }

        match self.scroll_until_stable(page).await {
            Ok(outcome) => {
                if !outcome.converged {
                    warn!(
                        stage = %Stage::LazyLoad,
                        iterations = outcome.iterations,
                        "page height still changing at the scroll cap; continuing"
                    );
                }
                session.scroll = Some(outcome);
            }
            Err(e) => self.tolerate(Stage::LazyLoad, e.context("scrolling failed"))?,
        }

        // Without a count there are no items to skip.
        let discovered = page
            .card_count()
            .await
            .map_err(|source| HarvestError::Stage {
                stage: Stage::CardExtract,
                source,
            })?;
        session.discovered = discovered;
        let limit = opts.max_cards.map_or(discovered, |m| m.min(discovered));
        info!(discovered, limit, "cards found");

        let attempts = self.policy(Stage::CardExtract).attempts();
        let mut overlay = OverlayState::default();
        for index in 0..limit {
            let mut attempt = 1;
            loop {
                match self.harvest_card(page, index, &mut overlay).await {
                    Ok(card) => {
                        debug!(index, id = %card.id, "card extracted");
                        session.cards.push(card);
                        break;
                    }
                    Err(e) => {
                        self.force_close(page, &mut overlay, index, &e.to_string()).await;
                        if attempt < attempts {
                            debug!(index, attempt, "retrying card: {e}");
                            attempt += 1;
                            continue;
                        }
                        warn!(index, stage = %Stage::CardExtract, "skipping card: {e}");
                        session.failures.push(CardFailure {
                            index,
                            stage: Stage::CardExtract,
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        // Page-level assets for the fetch stage
        match page.stylesheet_urls().await {
            Ok(urls) => session.stylesheet_urls = urls,
            Err(e) => self.tolerate(Stage::AssetFetch, e.context("stylesheet discovery failed"))?,
        }
        match page.inline_css().await {
            Ok(css) => session.inline_css = css,
            Err(e) => self.tolerate(Stage::AssetFetch, e.context("inline style capture failed"))?,
        }

        info!(
            run = %session.run_id,
            extracted = session.extracted(),
            failed = session.failures.len(),
            "harvest finished"
        );
        Ok(session)
    }

    /// Scroll until the document height stops changing between two
    /// consecutive measurements, or the lazy-load iteration cap is reached.
    /// Scrolls back to the top afterwards.
    pub async fn scroll_until_stable<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
    ) -> anyhow::Result<ScrollOutcome> {
        let opts = &self.options;
        let max_iterations = match self.policy(Stage::LazyLoad) {
            StagePolicy::Bounded { max_iterations } => max_iterations,
            _ => opts.limits.scroll_max,
        };
        let mut last = page.document_height().await?;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < max_iterations {
            page.scroll_by(opts.scroll_step_px).await?;
            iterations += 1;
            page.pause(opts.scroll_settle_ms).await;
            let height = page.document_height().await?;
            if height == last {
                converged = true;
                break;
            }
            last = height;
        }

        page.scroll_to_top().await?;
        debug!(iterations, height = last, converged, "lazy loading done");
        Ok(ScrollOutcome {
            iterations,
            final_height: last,
            converged,
        })
    }

    async fn harvest_card<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
        overlay: &mut OverlayState,
    ) -> Result<TemplateCard, ExtractionError> {
        let mut card = self.extractor.read_card(page, index).await?;
        if !self.options.open_previews {
            return Ok(card);
        }

        self.ensure_closed(page, index, overlay).await?;
        overlay.begin_open(card.id.clone())?;
        let triggered = page
            .open_preview(index)
            .await
            .map_err(|source| ExtractionError::Page { index, source })?;
        if !triggered {
            return Err(ExtractionError::PreviewUnavailable { index });
        }
        if !self.wait_for_overlay(page, index, true).await? {
            return Err(ExtractionError::OverlayTimeout {
                index,
                timeout_ms: self.options.overlay_timeout_ms,
            });
        }
        overlay.opened()?;

        card.overlay = Some(self.extractor.read_overlay(page, index).await?);
        self.close(page, index).await?;
        overlay.close();
        Ok(card)
    }

    /// Poll until the overlay's presence equals `present`. `false` when the
    /// timeout passed first.
    async fn wait_for_overlay<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
        present: bool,
    ) -> Result<bool, ExtractionError> {
        let poll = Duration::from_millis(self.options.overlay_poll_ms.max(1));
        let waited = tokio::time::timeout(
            Duration::from_millis(self.options.overlay_timeout_ms),
            async {
                loop {
                    if page.overlay_present().await? == present {
                        return Ok::<_, anyhow::Error>(());
                    }
                    tokio::time::sleep(poll).await;
                }
            },
        )
        .await;
        match waited {
            Ok(Ok(())) => Ok(true),
            Ok(Err(source)) => Err(ExtractionError::Page { index, source }),
            Err(_) => Ok(false),
        }
    }

    /// Make sure nothing is showing before card `index` opens its overlay.
    async fn ensure_closed<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
        overlay: &mut OverlayState,
    ) -> Result<(), ExtractionError> {
        let present = page
            .overlay_present()
            .await
            .map_err(|source| ExtractionError::Page { index, source })?;
        if present {
            warn!(index, "an overlay is still showing; closing it before opening the next");
            self.escape_until_closed(page, index).await?;
        }
        overlay.close();
        Ok(())
    }

    /// Close through the overlay's own affordance, falling back to Escape.
    /// Fails when the overlay is still showing afterwards.
    async fn close<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
    ) -> Result<(), ExtractionError> {
        match page.close_overlay().await {
            Ok(true) => {
                page.pause(self.options.scroll_settle_ms).await;
                if self.wait_for_overlay(page, index, false).await? {
                    return Ok(());
                }
                debug!(index, "close affordance did not dismiss the overlay");
            }
            Ok(false) => debug!(index, "no close affordance"),
            Err(e) => debug!(index, "close affordance failed: {e:#}"),
        }
        self.escape_until_closed(page, index).await
    }

    async fn escape_until_closed<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        index: usize,
    ) -> Result<(), ExtractionError> {
        page.press_escape()
            .await
            .map_err(|source| ExtractionError::Page { index, source })?;
        if self.wait_for_overlay(page, index, false).await? {
            Ok(())
        } else {
            Err(ExtractionError::OverlayStuck {
                index,
                timeout_ms: self.options.overlay_timeout_ms,
            })
        }
    }

    /// Dismiss whatever a failed card left behind. The overlay state only
    /// returns to `Closed` once the page confirms nothing is showing.
    async fn force_close<P: TemplatePage + ?Sized>(
        &self,
        page: &mut P,
        overlay: &mut OverlayState,
        index: usize,
        reason: &str,
    ) {
        match self.escape_until_closed(page, index).await {
            Ok(()) => overlay.fail_open(reason),
            Err(e) => warn!(index, "overlay left open after card error: {e}"),
        }
    }
}
