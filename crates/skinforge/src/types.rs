//! Core data types for harvested templates, catalog entries and colours.

use serde::{Deserialize, Serialize};

/// Authored page width the source templates are designed at (A4 in CSS px).
pub const AUTHORED_WIDTH: f64 = 595.0;

/// Authored page height the source templates are designed at.
pub const AUTHORED_HEIGHT: f64 = 842.0;

/// Fixed page dimensions a fragment was designed for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: AUTHORED_WIDTH,
        height: AUTHORED_HEIGHT,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// A selectable colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorOption {
    pub color: String,
    pub label: String,
}

impl ColorOption {
    pub fn new(color: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            label: label.into(),
        }
    }

    /// Whether `color` is a `#rgb` or `#rrggbb` hex string.
    pub fn is_valid_hex(&self) -> bool {
        let Some(digits) = self.color.strip_prefix('#') else {
            return false;
        };
        matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
    }
}

/// A main colour with its related shades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorGroup {
    pub main_color: ColorOption,
    pub sub_colors: Vec<ColorOption>,
}

/// A colour swatch as read from a live preview overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInput {
    pub color: String,
    pub label: String,
    #[serde(default)]
    pub group_index: Option<u32>,
    #[serde(default)]
    pub item_id: Option<String>,
}

impl ColorInput {
    pub fn option(&self) -> ColorOption {
        ColorOption::new(self.color.clone(), self.label.clone())
    }

    /// Main swatches carry an item id of the form `main-*`.
    pub fn is_main(&self) -> bool {
        self.item_id
            .as_deref()
            .is_some_and(|id| id.starts_with("main"))
    }
}

/// A canonical, self-contained template document plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateArtifact {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub popular: bool,
    pub html_fragment: String,
    pub referenced_styles: Vec<String>,
    pub authored_width: f64,
    pub authored_height: f64,
}

impl TemplateArtifact {
    pub fn authored_size(&self) -> PageSize {
        PageSize::new(self.authored_width, self.authored_height)
    }
}

fn default_authored_width() -> f64 {
    AUTHORED_WIDTH
}

fn default_authored_height() -> f64 {
    AUTHORED_HEIGHT
}

/// One row of `catalog.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub index: usize,
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub popular: bool,
    #[serde(default)]
    pub colors: Vec<ColorOption>,
    #[serde(default)]
    pub referenced_styles: Vec<String>,
    #[serde(default = "default_authored_width")]
    pub authored_width: f64,
    #[serde(default = "default_authored_height")]
    pub authored_height: f64,
}

impl CatalogEntry {
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            category: self.category.clone(),
            popular: self.popular,
        }
    }

    pub fn authored_size(&self) -> PageSize {
        PageSize::new(self.authored_width, self.authored_height)
    }
}

/// What the UI sees when listing templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub popular: bool,
}

/// Errors that can occur in the template library.
#[derive(thiserror::Error, Debug)]
pub enum SkinError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No element with class '{root_class}' found in {name}")]
    BoundaryNotFound { name: String, root_class: String },

    #[error("Element <{tag}> in {name} is never closed")]
    Unbalanced { name: String, tag: String },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    #[error("Colour not in palette: {0}")]
    UnknownColor(String),

    #[error("Invalid size {width}x{height}")]
    InvalidSize { width: f64, height: f64 },

    #[error("Slot {0} is not mounted")]
    NotMounted(u64),

    #[error("Invalid overlay transition: {0}")]
    Overlay(String),
}

/// Convenience result type.
pub type SkinResult<T> = Result<T, SkinError>;
