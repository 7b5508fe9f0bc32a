//! The full harvest: page stages, asset fetch, normalization and publishing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use skinforge::normalize::extract_illustration;
use skinforge::{
    ArtifactStore, CatalogEntry, NormalizeConfig, Normalizer, SkinError, TemplateArtifact,
    AUTHORED_HEIGHT, AUTHORED_WIDTH,
};
use tracing::{info, warn};

use crate::acquisition::assets::{fetch_all, write_stylesheets};
use crate::acquisition::HttpClient;
use crate::config::HarvestConfig;
use crate::harvest::{
    AutomationDriver, BrowserPage, DriverOptions, ExtractionSession, Stage, StageLimits,
};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;

pub const CSS_DIR: &str = "css";
pub const RAW_DIR: &str = "raw";
pub const REPORT_FILE: &str = "harvest-report.json";

/// What the publish stage wrote.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub published: Vec<String>,
    /// `(card index, reason)` for every card that produced no artifact.
    pub skipped: Vec<(usize, String)>,
    /// Ids that fell back to the card's position.
    pub degraded_ids: Vec<String>,
    pub catalog_path: PathBuf,
}

/// Summary of a complete harvest run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestSummary {
    pub session: ExtractionSession,
    pub publish: PublishReport,
    pub stylesheets: Vec<PathBuf>,
    pub out_dir: PathBuf,
}

/// Normalizer whose documents link exactly the stylesheets in `written`,
/// relative to the published `templates/` directory.
pub fn linked_normalizer(written: &[PathBuf]) -> Normalizer {
    let stylesheets = written
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    Normalizer::new(NormalizeConfig {
        stylesheet_base: format!("../{CSS_DIR}"),
        stylesheets,
        ..NormalizeConfig::default()
    })
}

/// Turns harvested cards into published artifacts.
pub struct Publisher {
    normalizer: Normalizer,
    store: ArtifactStore,
    limits: StageLimits,
}

impl Publisher {
    pub fn new(out_dir: &Path, normalizer: Normalizer) -> Result<Self> {
        let store = ArtifactStore::create(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        std::fs::create_dir_all(out_dir.join(RAW_DIR))?;
        Ok(Self {
            normalizer,
            store,
            limits: StageLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: StageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Normalize every card of `session`, write its artifacts and the catalog.
    ///
    /// Cards without a root boundary are skipped and reported unless the
    /// normalize stage is fatal. A repeated id keeps the first card.
    pub fn publish(&self, session: &ExtractionSession) -> Result<PublishReport> {
        let raw_dir = self.store.root().join(RAW_DIR);
        let mut report = PublishReport::default();
        let mut catalog = Vec::with_capacity(session.cards.len());
        let mut seen = HashSet::new();

        for card in &session.cards {
            if !seen.insert(card.id.clone()) {
                warn!(index = card.index, id = %card.id, "duplicate template id; keeping the first card");
                report
                    .skipped
                    .push((card.index, format!("duplicate id {}", card.id)));
                continue;
            }

            std::fs::write(raw_dir.join(format!("{}.html", card.id)), &card.raw_markup)
                .with_context(|| format!("failed to save raw markup for {}", card.id))?;

            let doc = match self.normalizer.normalize(&card.id, &card.raw_markup, &[]) {
                Ok(doc) => doc,
                Err(e @ (SkinError::BoundaryNotFound { .. } | SkinError::Unbalanced { .. }))
                    if !Stage::Normalize.policy(&self.limits).is_fatal() =>
                {
                    warn!(index = card.index, id = %card.id, stage = %Stage::Normalize, "skipping: {e}");
                    report.skipped.push((card.index, e.to_string()));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let display_name = card.display_name();
            let category = card.category.clone().unwrap_or_else(|| "all".to_string());
            let artifact = TemplateArtifact {
                id: card.id.clone(),
                display_name: display_name.clone(),
                category: category.clone(),
                popular: card.popular,
                html_fragment: doc.html,
                referenced_styles: self.normalizer.referenced_styles(),
                authored_width: AUTHORED_WIDTH,
                authored_height: AUTHORED_HEIGHT,
            };
            self.store.write_artifact(&artifact)?;

            let illustration = card
                .overlay
                .as_ref()
                .and_then(|o| o.illustration.as_deref())
                .and_then(extract_illustration)
                .or_else(|| extract_illustration(&card.raw_markup));
            if let Some(svg) = illustration {
                self.store.write_illustration(&card.id, &svg)?;
            }

            if card.id_source == skinforge::IdSource::Synthetic {
                report.degraded_ids.push(card.id.clone());
            }
            catalog.push(CatalogEntry {
                index: card.index,
                id: card.id.clone(),
                display_name,
                category,
                popular: card.popular,
                colors: card.palette(),
                referenced_styles: artifact.referenced_styles,
                authored_width: AUTHORED_WIDTH,
                authored_height: AUTHORED_HEIGHT,
            });
            report.published.push(card.id.clone());
        }

        report.catalog_path = self.store.write_catalog(&catalog)?;
        info!(
            published = report.published.len(),
            skipped = report.skipped.len(),
            stage = %Stage::Publish,
            "catalog written"
        );
        Ok(report)
    }
}

/// Harvest the live page described by `config` and publish into its output
/// directory.
pub async fn run_harvest(config: &HarvestConfig) -> Result<HarvestSummary> {
    let limits = StageLimits::from(config);
    let renderer = ChromiumRenderer::new(&config.browser_options()).await?;
    let ctx = renderer.new_context().await?;
    let mut page = BrowserPage::new(ctx, config.selectors.clone());

    let driver = AutomationDriver::new(DriverOptions::from(config));
    let harvested = driver.run(&mut page).await;
    if let Err(e) = page.close().await {
        warn!("failed to close page: {e:#}");
    }
    renderer.shutdown().await?;
    let session = harvested?;

    let retries = Stage::AssetFetch.policy(&limits).attempts() - 1;
    let client = HttpClient::new(config.asset_timeout_ms).with_retries(retries);
    let assets = fetch_all(&client, &session.stylesheet_urls, config.asset_concurrency).await;
    let stylesheets = write_stylesheets(
        &config.out_dir.join(CSS_DIR),
        &assets,
        &session.inline_css,
    )?;

    let publisher =
        Publisher::new(&config.out_dir, linked_normalizer(&stylesheets))?.with_limits(limits);
    let publish = publisher.publish(&session)?;

    let summary = HarvestSummary {
        session,
        publish,
        stylesheets,
        out_dir: config.out_dir.clone(),
    };
    let report_path = config.out_dir.join(REPORT_FILE);
    std::fs::write(&report_path, serde_json::to_vec_pretty(&summary)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    Ok(summary)
}
