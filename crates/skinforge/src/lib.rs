//! Canonical résumé template library for skinforge: boundary scanning,
//! normalization, catalog storage, scaled rendering and accent theming.

pub mod colors;
pub mod dom;
pub mod ident;
pub mod normalize;
pub mod overlay;
pub mod registry;
pub mod render;
pub mod scan;
pub mod service;
pub mod session;
pub mod storage;
pub mod theme;
pub mod types;

pub use colors::{default_palette, palette_from_inputs, ColorSelection};
pub use ident::{derive_template_id, IdSource, TemplateId};
pub use normalize::{NormalizeConfig, NormalizedDocument, Normalizer};
pub use overlay::OverlayState;
pub use registry::TemplateRegistry;
pub use render::{
    ArtifactSource, Fit, MountSlot, RenderEngine, RenderOutcome, SlotStatus, SourceFragment,
};
pub use scan::{find_boundary, Boundary};
pub use service::TemplateService;
pub use session::{PreviewSession, ThemeScope};
pub use storage::ArtifactStore;
pub use theme::{CssProperty, HookRegistry, ThemeEngine};
pub use types::*;
