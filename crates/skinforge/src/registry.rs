//! Read-side catalog of published templates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::render::{ArtifactSource, SourceFragment};
use crate::storage::{check_id, read_catalog, template_path};
use crate::types::{CatalogEntry, CatalogSummary, SkinError, SkinResult, TemplateArtifact};

/// Catalog of templates available under a store root.
///
/// Populated once from `catalog.json`; regenerate the store to change it.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
}

impl TemplateRegistry {
    /// Load the catalog under `root`.
    pub fn open(root: impl Into<PathBuf>) -> SkinResult<Self> {
        let root = root.into();
        let entries = read_catalog(&root)?;
        Ok(Self::from_entries(root, entries))
    }

    /// Build a registry from in-memory entries. Later duplicates of an id are
    /// ignored.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<CatalogEntry>) -> Self {
        let mut kept = Vec::with_capacity(entries.len());
        let mut by_id = HashMap::new();
        for entry in entries {
            if by_id.contains_key(&entry.id) {
                tracing::warn!(id = %entry.id, index = entry.index, "duplicate template id ignored");
                continue;
            }
            by_id.insert(entry.id.clone(), kept.len());
            kept.push(entry);
        }
        Self {
            root: root.into(),
            entries: kept,
            by_id,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display metadata for every template, in catalog order.
    pub fn list(&self) -> Vec<CatalogSummary> {
        self.entries.iter().map(CatalogEntry::summary).collect()
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    fn known_entry(&self, id: &str) -> SkinResult<&CatalogEntry> {
        check_id(id)?;
        self.entry(id)
            .ok_or_else(|| SkinError::TemplateNotFound(id.to_string()))
    }

    /// Load the full artifact for `id`.
    pub fn get(&self, id: &str) -> SkinResult<TemplateArtifact> {
        let entry = self.known_entry(id)?;
        let html = std::fs::read_to_string(template_path(&self.root, id, "html"))?;
        Ok(TemplateArtifact {
            id: entry.id.clone(),
            display_name: entry.display_name.clone(),
            category: entry.category.clone(),
            popular: entry.popular,
            html_fragment: html,
            referenced_styles: entry.referenced_styles.clone(),
            authored_width: entry.authored_width,
            authored_height: entry.authored_height,
        })
    }
}

#[async_trait]
impl ArtifactSource for TemplateRegistry {
    async fn fetch(&self, id: &str) -> SkinResult<SourceFragment> {
        let entry = self.known_entry(id)?;
        let path = template_path(&self.root, id, "html");
        let markup = tokio::fs::read_to_string(&path).await?;
        Ok(SourceFragment {
            markup: Arc::from(markup),
            authored: entry.authored_size(),
        })
    }
}
