//! On-disk layout for published templates.
//!
//! ```text
//! <root>/catalog.json
//! <root>/templates/<id>.html
//! <root>/templates/<id>.svg      (optional preview illustration)
//! ```

use std::path::{Path, PathBuf};

use crate::ident::is_safe_id;
use crate::types::{CatalogEntry, SkinError, SkinResult, TemplateArtifact};

pub const CATALOG_FILE: &str = "catalog.json";
pub const TEMPLATES_DIR: &str = "templates";

/// Writer for the published template directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn create(root: impl Into<PathBuf>) -> SkinResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(TEMPLATES_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn html_path(&self, id: &str) -> PathBuf {
        template_path(&self.root, id, "html")
    }

    pub fn svg_path(&self, id: &str) -> PathBuf {
        template_path(&self.root, id, "svg")
    }

    /// Write `<id>.html`, overwriting any previous artifact with the same id.
    pub fn write_artifact(&self, artifact: &TemplateArtifact) -> SkinResult<PathBuf> {
        check_id(&artifact.id)?;
        let path = self.html_path(&artifact.id);
        std::fs::write(&path, &artifact.html_fragment)?;
        Ok(path)
    }

    pub fn write_illustration(&self, id: &str, svg: &str) -> SkinResult<PathBuf> {
        check_id(id)?;
        let path = self.svg_path(id);
        std::fs::write(&path, svg)?;
        Ok(path)
    }

    /// Replace `catalog.json`, written through a temp file so readers never
    /// see a partial catalog.
    pub fn write_catalog(&self, entries: &[CatalogEntry]) -> SkinResult<PathBuf> {
        let path = self.root.join(CATALOG_FILE);
        let tmp = self.root.join(format!("{CATALOG_FILE}.tmp"));
        let payload = serde_json::to_vec_pretty(entries)?;
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

pub(crate) fn template_path(root: &Path, id: &str, ext: &str) -> PathBuf {
    root.join(TEMPLATES_DIR).join(format!("{id}.{ext}"))
}

pub(crate) fn check_id(id: &str) -> SkinResult<()> {
    if is_safe_id(id) {
        Ok(())
    } else {
        Err(SkinError::TemplateNotFound(id.to_string()))
    }
}

/// Read `catalog.json` from a store root.
pub fn read_catalog(root: &Path) -> SkinResult<Vec<CatalogEntry>> {
    let bytes = std::fs::read(root.join(CATALOG_FILE))?;
    Ok(serde_json::from_slice(&bytes)?)
}
