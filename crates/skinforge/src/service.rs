//! Collaborator-facing surface over a published template store.

use std::path::PathBuf;
use std::sync::Arc;

use crate::colors::ColorSelection;
use crate::registry::TemplateRegistry;
use crate::render::{MountSlot, RenderEngine, RenderOutcome};
use crate::session::PreviewSession;
use crate::theme::ThemeEngine;
use crate::types::{CatalogEntry, CatalogSummary, ColorOption, SkinResult, TemplateArtifact};

/// Lists, renders and themes templates from one store root.
pub struct TemplateService {
    registry: Arc<TemplateRegistry>,
    engine: Arc<RenderEngine>,
    theme: ThemeEngine,
}

impl TemplateService {
    /// Open the store under `root` with the default theme hooks.
    pub fn open(root: impl Into<PathBuf>) -> SkinResult<Self> {
        let registry = TemplateRegistry::open(root)?;
        Ok(Self::with_registry(registry, ThemeEngine::default()))
    }

    pub fn with_registry(registry: TemplateRegistry, theme: ThemeEngine) -> Self {
        let registry = Arc::new(registry);
        let engine = Arc::new(RenderEngine::new(registry.clone()));
        Self {
            registry,
            engine,
            theme,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn list_templates(&self) -> Vec<CatalogSummary> {
        self.registry.list()
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        self.registry.catalog()
    }

    pub fn artifact(&self, id: &str) -> SkinResult<TemplateArtifact> {
        self.registry.get(id)
    }

    pub async fn render_template(
        &self,
        slot: &MountSlot,
        id: &str,
        width: f64,
        height: f64,
    ) -> SkinResult<RenderOutcome> {
        self.engine.render(slot, id, width, height).await
    }

    pub fn apply_theme(&self, slot: &MountSlot, color: &ColorOption) -> SkinResult<usize> {
        self.theme.apply_color(slot, color)
    }

    /// A fresh preview session sharing this service's fragment cache.
    pub fn session(&self, selection: ColorSelection) -> PreviewSession {
        PreviewSession::new(self.engine.clone(), self.theme.clone(), selection)
    }
}
