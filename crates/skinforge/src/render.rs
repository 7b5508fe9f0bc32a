//! Scaled rendering of canonical templates into mount slots.
//!
//! A [`MountSlot`] is one place in the UI a template can be shown (a grid
//! thumbnail, the large preview). [`RenderEngine::render`] fetches the
//! template's canonical markup once per id, fits it to the slot with an
//! independent horizontal and vertical scale, and commits it to the slot only
//! if the slot still wants that result when the fetch resolves.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::dom::{self, Node};
use crate::types::{PageSize, SkinError, SkinResult};

/// Canonical markup for one template plus the size it was authored at.
#[derive(Debug, Clone)]
pub struct SourceFragment {
    pub markup: Arc<str>,
    pub authored: PageSize,
}

/// Where the renderer gets canonical markup from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, id: &str) -> SkinResult<SourceFragment>;
}

/// Per-id cache of source fragments. Concurrent first requests for the same
/// id share one fetch; a failed fetch is not cached.
#[derive(Default)]
pub struct FragmentCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<SourceFragment>>>>,
}

impl FragmentCache {
    pub async fn get_or_fetch(
        &self,
        id: &str,
        source: &dyn ArtifactSource,
    ) -> SkinResult<SourceFragment> {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(id.to_string()).or_default())
        };
        let fragment = cell.get_or_try_init(|| source.fetch(id)).await?;
        Ok(fragment.clone())
    }

    /// Number of ids with a resolved fragment.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|c| c.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-uniform fit of an authored page into a target box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub authored: PageSize,
    pub target: PageSize,
    pub scale_x: f64,
    pub scale_y: f64,
}

fn valid_dimension(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Fit {
    /// `scale_x = width / authored.width`, `scale_y = height / authored.height`.
    pub fn compute(authored: PageSize, width: f64, height: f64) -> SkinResult<Self> {
        if !valid_dimension(width) || !valid_dimension(height) {
            return Err(SkinError::InvalidSize { width, height });
        }
        if !valid_dimension(authored.width) || !valid_dimension(authored.height) {
            return Err(SkinError::InvalidSize {
                width: authored.width,
                height: authored.height,
            });
        }
        Ok(Self {
            authored,
            target: PageSize::new(width, height),
            scale_x: width / authored.width,
            scale_y: height / authored.height,
        })
    }

    /// CSS transform applying both scales at once.
    pub fn transform(&self) -> String {
        format!("scale({}, {})", self.scale_x, self.scale_y)
    }
}

/// A template committed to a slot.
#[derive(Debug, Clone)]
pub struct MountedView {
    pub template_id: String,
    pub fit: Fit,
    pub nodes: Vec<Node>,
}

impl MountedView {
    /// Viewport of the target size containing the authored-size content,
    /// scaled from its top-left corner.
    pub fn to_html(&self) -> String {
        let Fit {
            authored, target, ..
        } = self.fit;
        format!(
            "<div class=\"skin-viewport\" data-template=\"{id}\" style=\"width: {tw}px; height: {th}px; overflow: hidden; position: relative\"><div class=\"skin-content\" style=\"width: {aw}px; height: {ah}px; transform: {tf}; transform-origin: top left\">{body}</div></div>",
            id = self.template_id,
            tw = target.width,
            th = target.height,
            aw = authored.width,
            ah = authored.height,
            tf = self.fit.transform(),
            body = dom::serialize(&self.nodes),
        )
    }
}

/// What a slot is currently showing.
#[derive(Debug, Clone)]
pub enum ViewState {
    Empty,
    Loading {
        template_id: String,
        width: f64,
        height: f64,
    },
    Mounted(MountedView),
    Failed {
        template_id: String,
        message: String,
    },
}

/// Payload-free summary of a slot's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Loading,
    Mounted,
    Failed,
    Unmounted,
}

pub type SlotId = u64;

#[derive(Debug)]
struct SlotState {
    generation: u64,
    requested: Option<String>,
    mounted: bool,
    view: ViewState,
}

/// Proof of a render request; only the latest ticket of a live slot commits.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    pub slot: SlotId,
    pub generation: u64,
    pub template_id: String,
}

/// One place in the UI a template can be mounted.
#[derive(Debug)]
pub struct MountSlot {
    id: SlotId,
    state: Mutex<SlotState>,
}

impl MountSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            state: Mutex::new(SlotState {
                generation: 0,
                requested: None,
                mounted: true,
                view: ViewState::Empty,
            }),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Record a new request, superseding any in flight, and show the
    /// loading placeholder.
    pub fn begin(&self, template_id: &str, width: f64, height: f64) -> SkinResult<RenderTicket> {
        let mut state = self.state.lock();
        if !state.mounted {
            return Err(SkinError::NotMounted(self.id));
        }
        state.generation += 1;
        state.requested = Some(template_id.to_string());
        state.view = ViewState::Loading {
            template_id: template_id.to_string(),
            width,
            height,
        };
        Ok(RenderTicket {
            slot: self.id,
            generation: state.generation,
            template_id: template_id.to_string(),
        })
    }

    fn is_current(state: &SlotState, ticket: &RenderTicket) -> bool {
        state.mounted
            && state.generation == ticket.generation
            && state.requested.as_deref() == Some(ticket.template_id.as_str())
    }

    /// Commit a resolved view. Returns `false` when the ticket is stale and
    /// the view was dropped.
    pub fn commit(&self, ticket: &RenderTicket, view: MountedView) -> bool {
        let mut state = self.state.lock();
        if !Self::is_current(&state, ticket) {
            return false;
        }
        state.view = ViewState::Mounted(view);
        true
    }

    /// Record a failed fetch, if the ticket is still current.
    pub fn fail(&self, ticket: &RenderTicket, message: String) -> bool {
        let mut state = self.state.lock();
        if !Self::is_current(&state, ticket) {
            return false;
        }
        state.view = ViewState::Failed {
            template_id: ticket.template_id.clone(),
            message,
        };
        true
    }

    /// Tear the slot down. Nothing can be committed to it afterwards.
    pub fn unmount(&self) {
        let mut state = self.state.lock();
        state.mounted = false;
        state.generation += 1;
        state.requested = None;
        state.view = ViewState::Empty;
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    pub fn requested_id(&self) -> Option<String> {
        self.state.lock().requested.clone()
    }

    pub fn status(&self) -> SlotStatus {
        let state = self.state.lock();
        if !state.mounted {
            return SlotStatus::Unmounted;
        }
        match state.view {
            ViewState::Empty => SlotStatus::Empty,
            ViewState::Loading { .. } => SlotStatus::Loading,
            ViewState::Mounted(_) => SlotStatus::Mounted,
            ViewState::Failed { .. } => SlotStatus::Failed,
        }
    }

    pub fn view(&self) -> ViewState {
        self.state.lock().view.clone()
    }

    pub fn with_view<R>(&self, f: impl FnOnce(&MountedView) -> R) -> Option<R> {
        match &self.state.lock().view {
            ViewState::Mounted(view) => Some(f(view)),
            _ => None,
        }
    }

    pub fn with_view_mut<R>(&self, f: impl FnOnce(&mut MountedView) -> R) -> Option<R> {
        match &mut self.state.lock().view {
            ViewState::Mounted(view) => Some(f(view)),
            _ => None,
        }
    }

    /// Markup for whatever the slot currently shows.
    pub fn html(&self) -> String {
        match &self.state.lock().view {
            ViewState::Empty => String::new(),
            ViewState::Loading {
                template_id,
                width,
                height,
            } => format!(
                "<div class=\"skin-viewport skin-loading\" data-template=\"{template_id}\" style=\"width: {width}px; height: {height}px\"></div>"
            ),
            ViewState::Mounted(view) => view.to_html(),
            ViewState::Failed { template_id, .. } => format!(
                "<div class=\"skin-viewport skin-error\" data-template=\"{template_id}\"></div>"
            ),
        }
    }
}

/// Result of a render call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Mounted { template_id: String, fit: Fit },
    /// The slot moved on or was torn down before the fetch resolved.
    Discarded,
}

/// Fetches, caches and fits templates into slots.
pub struct RenderEngine {
    source: Arc<dyn ArtifactSource>,
    cache: FragmentCache,
}

impl RenderEngine {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            source,
            cache: FragmentCache::default(),
        }
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    pub async fn source_fragment(&self, id: &str) -> SkinResult<SourceFragment> {
        self.cache.get_or_fetch(id, self.source.as_ref()).await
    }

    /// Render `id` into `slot` at `width`×`height`.
    pub async fn render(
        &self,
        slot: &MountSlot,
        id: &str,
        width: f64,
        height: f64,
    ) -> SkinResult<RenderOutcome> {
        if !valid_dimension(width) || !valid_dimension(height) {
            return Err(SkinError::InvalidSize { width, height });
        }
        let ticket = slot.begin(id, width, height)?;

        let fetched = self
            .source_fragment(id)
            .await
            .and_then(|src| Fit::compute(src.authored, width, height).map(|fit| (src, fit)));

        match fetched {
            Ok((src, fit)) => {
                let view = MountedView {
                    template_id: id.to_string(),
                    fit,
                    nodes: dom::parse_document_body(&src.markup),
                };
                if slot.commit(&ticket, view) {
                    tracing::debug!(slot = slot.id(), id, sx = fit.scale_x, sy = fit.scale_y, "mounted template");
                    Ok(RenderOutcome::Mounted {
                        template_id: id.to_string(),
                        fit,
                    })
                } else {
                    tracing::debug!(slot = slot.id(), id, "discarding stale render");
                    Ok(RenderOutcome::Discarded)
                }
            }
            Err(e) => {
                if slot.fail(&ticket, e.to_string()) {
                    tracing::warn!(slot = slot.id(), id, "render failed: {e}");
                    Err(e)
                } else {
                    Ok(RenderOutcome::Discarded)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn page(id: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><style>.x{{}}</style></head><body><div class=\"document\">{id}</div></body></html>"
        )
    }

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactSource for CountingSource {
        async fn fetch(&self, id: &str) -> SkinResult<SourceFragment> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if id == "missing" {
                return Err(SkinError::TemplateNotFound(id.to_string()));
            }
            Ok(SourceFragment {
                markup: Arc::from(page(id)),
                authored: PageSize::A4,
            })
        }
    }

    struct GatedSource {
        gates: HashMap<String, Arc<Notify>>,
        fetches: AtomicUsize,
    }

    impl GatedSource {
        fn new(ids: &[&str]) -> Self {
            Self {
                gates: ids
                    .iter()
                    .map(|id| (id.to_string(), Arc::new(Notify::new())))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }

        fn release(&self, id: &str) {
            self.gates[id].notify_one();
        }

        async fn wait_for_fetches(&self, n: usize) {
            while self.fetches.load(Ordering::SeqCst) < n {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl ArtifactSource for GatedSource {
        async fn fetch(&self, id: &str) -> SkinResult<SourceFragment> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.gates[id].notified().await;
            Ok(SourceFragment {
                markup: Arc::from(page(id)),
                authored: PageSize::A4,
            })
        }
    }

    #[test]
    fn test_fit_is_independent_per_axis() {
        let small = Fit::compute(PageSize::A4, 210.0, 260.0).unwrap();
        assert!((small.scale_x - 210.0 / 595.0).abs() < 1e-12);
        assert!((small.scale_y - 260.0 / 842.0).abs() < 1e-12);
        assert_ne!(small.scale_x, small.scale_y);

        let full = Fit::compute(PageSize::A4, 595.0, 842.0).unwrap();
        assert_eq!((full.scale_x, full.scale_y), (1.0, 1.0));
        assert_eq!(full.transform(), "scale(1, 1)");
    }

    #[test]
    fn test_fit_rejects_degenerate_sizes() {
        assert!(Fit::compute(PageSize::A4, 0.0, 10.0).is_err());
        assert!(Fit::compute(PageSize::A4, 10.0, f64::NAN).is_err());
        assert!(Fit::compute(PageSize::new(0.0, 842.0), 10.0, 10.0).is_err());
    }

    #[tokio::test]
    async fn test_repeat_renders_share_cached_source() {
        let source = Arc::new(CountingSource::default());
        let engine = RenderEngine::new(source.clone());
        let thumb = MountSlot::new(1);
        let large = MountSlot::new(2);

        let a = engine.render(&thumb, "abc1", 210.0, 260.0).await.unwrap();
        let b = engine.render(&large, "abc1", 595.0, 842.0).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(engine.cache().len(), 1);

        let (RenderOutcome::Mounted { fit: fa, .. }, RenderOutcome::Mounted { fit: fb, .. }) = (a, b)
        else {
            panic!("both renders should mount");
        };
        assert!((fa.scale_x - 210.0 / 595.0).abs() < 1e-12);
        assert_eq!(fb.scale_y, 1.0);

        let html = thumb.html();
        assert!(html.contains("width: 210px; height: 260px"));
        assert!(html.contains("transform-origin: top left"));
        assert!(html.contains("<div class=\"document\">abc1</div>"));
        assert!(html.contains("<style>.x{}</style>"));
    }

    #[tokio::test]
    async fn test_failed_fetch_marks_slot_and_is_not_cached() {
        let source = Arc::new(CountingSource::default());
        let engine = RenderEngine::new(source.clone());
        let slot = MountSlot::new(1);
        assert!(engine.render(&slot, "missing", 10.0, 10.0).await.is_err());
        assert_eq!(slot.status(), SlotStatus::Failed);
        assert!(engine.render(&slot, "missing", 10.0, 10.0).await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unmount_before_resolve_discards_result() {
        let source = Arc::new(GatedSource::new(&["a"]));
        let engine = Arc::new(RenderEngine::new(source.clone()));
        let slot = Arc::new(MountSlot::new(7));

        let task = {
            let (engine, slot) = (Arc::clone(&engine), Arc::clone(&slot));
            tokio::spawn(async move { engine.render(&slot, "a", 100.0, 140.0).await })
        };
        source.wait_for_fetches(1).await;
        assert_eq!(slot.status(), SlotStatus::Loading);
        assert!(slot.html().contains("skin-loading"));

        slot.unmount();
        source.release("a");

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, RenderOutcome::Discarded);
        assert_eq!(slot.status(), SlotStatus::Unmounted);
        assert!(slot.html().is_empty());
        assert!(engine.render(&slot, "a", 1.0, 1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_newer_request_wins_over_late_result() {
        let source = Arc::new(GatedSource::new(&["a", "b"]));
        let engine = Arc::new(RenderEngine::new(source.clone()));
        let slot = Arc::new(MountSlot::new(1));

        let spawn_render = |id: &'static str| {
            let (engine, slot) = (Arc::clone(&engine), Arc::clone(&slot));
            tokio::spawn(async move { engine.render(&slot, id, 100.0, 100.0).await })
        };

        let first = spawn_render("a");
        source.wait_for_fetches(1).await;
        let second = spawn_render("b");
        source.wait_for_fetches(2).await;

        source.release("b");
        assert!(matches!(
            second.await.unwrap().unwrap(),
            RenderOutcome::Mounted { .. }
        ));
        source.release("a");
        assert_eq!(first.await.unwrap().unwrap(), RenderOutcome::Discarded);

        assert_eq!(slot.with_view(|v| v.template_id.clone()).as_deref(), Some("b"));
    }
}
