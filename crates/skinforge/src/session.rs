//! Per-UI preview state: mounted slots, the active slot, the selected colour
//! and the preview overlay.
//!
//! A session is created when the template picker mounts and torn down when it
//! unmounts. Every render and colour change goes through it explicitly.

use std::sync::Arc;

use crate::colors::ColorSelection;
use crate::overlay::OverlayState;
use crate::render::{MountSlot, RenderEngine, RenderOutcome, SlotId};
use crate::theme::ThemeEngine;
use crate::types::{ColorOption, SkinError, SkinResult};

/// Which mounted views a colour change reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeScope {
    /// Only the active slot.
    Active,
    /// Every live slot in the session.
    All,
}

pub struct PreviewSession {
    engine: Arc<RenderEngine>,
    theme: ThemeEngine,
    selection: ColorSelection,
    slots: Vec<Arc<MountSlot>>,
    next_slot: SlotId,
    active: Option<SlotId>,
    overlay: OverlayState,
    preview_slot: Option<SlotId>,
}

impl PreviewSession {
    pub fn new(engine: Arc<RenderEngine>, theme: ThemeEngine, selection: ColorSelection) -> Self {
        Self {
            engine,
            theme,
            selection,
            slots: Vec::new(),
            next_slot: 1,
            active: None,
            overlay: OverlayState::default(),
            preview_slot: None,
        }
    }

    /// Create a new slot. The first slot becomes active.
    pub fn mount(&mut self) -> Arc<MountSlot> {
        let slot = Arc::new(MountSlot::new(self.next_slot));
        self.next_slot += 1;
        if self.active.is_none() {
            self.active = Some(slot.id());
        }
        self.slots.push(Arc::clone(&slot));
        slot
    }

    pub fn slot(&self, id: SlotId) -> Option<Arc<MountSlot>> {
        self.slots.iter().find(|s| s.id() == id).cloned()
    }

    pub fn slots(&self) -> &[Arc<MountSlot>] {
        &self.slots
    }

    pub fn set_active(&mut self, id: SlotId) -> SkinResult<()> {
        if self.slot(id).is_none() {
            return Err(SkinError::NotMounted(id));
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn active_slot(&self) -> Option<Arc<MountSlot>> {
        self.active.and_then(|id| self.slot(id))
    }

    pub fn selected_color(&self) -> &ColorOption {
        self.selection.selected()
    }

    pub fn selection(&self) -> &ColorSelection {
        &self.selection
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    /// Render into a slot, then paint the selected colour on it.
    pub async fn render(
        &self,
        slot: &MountSlot,
        id: &str,
        width: f64,
        height: f64,
    ) -> SkinResult<RenderOutcome> {
        let outcome = self.engine.render(slot, id, width, height).await?;
        if matches!(outcome, RenderOutcome::Mounted { .. }) {
            self.theme.apply_color(slot, self.selection.selected())?;
        }
        Ok(outcome)
    }

    /// Select a palette colour and apply it to `scope`. Returns the number of
    /// property writes.
    pub fn select_color(&mut self, color: &ColorOption, scope: ThemeScope) -> SkinResult<usize> {
        let color = self.selection.select(color)?.clone();
        let targets: Vec<Arc<MountSlot>> = match scope {
            ThemeScope::Active => self.active_slot().into_iter().collect(),
            ThemeScope::All => self.slots.clone(),
        };
        let mut writes = 0;
        for slot in targets {
            writes += self.theme.apply_color(&slot, &color)?;
        }
        tracing::info!(color = %color.color, label = %color.label, ?scope, writes, "accent selected");
        Ok(writes)
    }

    /// Open the large preview for `id`: `Closed → Opening → Open`.
    ///
    /// The preview gets its own slot, which becomes active. Any failure while
    /// opening returns the overlay to `Closed` and releases the slot.
    pub async fn open_preview(
        &mut self,
        id: &str,
        width: f64,
        height: f64,
    ) -> SkinResult<Arc<MountSlot>> {
        self.overlay.begin_open(id)?;
        let slot = self.mount();
        let previous_active = self.active.replace(slot.id());

        match self.render(&slot, id, width, height).await {
            Ok(RenderOutcome::Mounted { .. }) => {
                self.overlay.opened()?;
                self.preview_slot = Some(slot.id());
                Ok(slot)
            }
            Ok(RenderOutcome::Discarded) => {
                self.overlay.fail_open("render superseded");
                self.release(slot.id(), previous_active);
                Err(SkinError::NotMounted(slot.id()))
            }
            Err(e) => {
                self.overlay.fail_open(&e.to_string());
                self.release(slot.id(), previous_active);
                Err(e)
            }
        }
    }

    /// Close the preview overlay and unmount its slot.
    pub fn close_preview(&mut self) {
        if let Some(id) = self.preview_slot.take() {
            self.unmount(id);
        }
        self.overlay.close();
    }

    fn release(&mut self, id: SlotId, previous_active: Option<SlotId>) {
        self.unmount(id);
        self.active = previous_active.filter(|p| self.slot(*p).is_some());
    }

    /// Unmount one slot; pending renders into it are discarded.
    pub fn unmount(&mut self, id: SlotId) {
        if let Some(pos) = self.slots.iter().position(|s| s.id() == id) {
            let slot = self.slots.remove(pos);
            slot.unmount();
        }
        if self.active == Some(id) {
            self.active = self.slots.first().map(|s| s.id());
        }
    }

    /// Unmount everything.
    pub fn teardown(mut self) {
        for slot in self.slots.drain(..) {
            slot.unmount();
        }
        self.overlay.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ArtifactSource, SlotStatus, SourceFragment};
    use crate::types::PageSize;
    use async_trait::async_trait;

    struct StaticSource;

    #[async_trait]
    impl ArtifactSource for StaticSource {
        async fn fetch(&self, id: &str) -> SkinResult<SourceFragment> {
            if id == "gone" {
                return Err(SkinError::TemplateNotFound(id.into()));
            }
            Ok(SourceFragment {
                markup: Arc::from(format!(
                    "<html><body><div class=\"document\"><div class=\"accent-panel\">{id}</div></div></body></html>"
                )),
                authored: PageSize::A4,
            })
        }
    }

    fn session() -> PreviewSession {
        PreviewSession::new(
            Arc::new(RenderEngine::new(Arc::new(StaticSource))),
            ThemeEngine::default(),
            ColorSelection::default(),
        )
    }

    fn panel_color(slot: &MountSlot) -> Option<String> {
        slot.with_view(|v| {
            let mut found = None;
            crate::dom::walk(&v.nodes, &mut |el| {
                if el.has_class("accent-panel") {
                    found = el.style_property("background-color");
                }
            });
            found
        })
        .flatten()
    }

    #[tokio::test]
    async fn test_new_mounts_get_selected_colour() {
        let mut s = session();
        let slot = s.mount();
        s.render(&slot, "abc1", 200.0, 280.0).await.unwrap();
        assert_eq!(panel_color(&slot).as_deref(), Some("#166C60"));
    }

    #[tokio::test]
    async fn test_scope_is_explicit() {
        let mut s = session();
        let grid = s.mount();
        let other = s.mount();
        s.render(&grid, "a", 100.0, 100.0).await.unwrap();
        s.render(&other, "b", 100.0, 100.0).await.unwrap();

        let ink = s.selection().lookup("Ink Blue").unwrap();
        assert_eq!(s.select_color(&ink, ThemeScope::Active).unwrap(), 1);
        assert_eq!(panel_color(&grid).as_deref(), Some("#102A73"));
        assert_eq!(panel_color(&other).as_deref(), Some("#166C60"));

        let lead = s.selection().lookup("Lead").unwrap();
        assert_eq!(s.select_color(&lead, ThemeScope::All).unwrap(), 2);
        assert_eq!(panel_color(&other).as_deref(), Some("#4A4A4A"));
        assert_eq!(s.selected_color(), &lead);
    }

    #[tokio::test]
    async fn test_preview_overlay_cycle() {
        let mut s = session();
        let grid = s.mount();
        let preview = s.open_preview("abc1", 595.0, 842.0).await.unwrap();
        assert!(matches!(s.overlay(), OverlayState::Open { .. }));
        assert_eq!(s.active_slot().unwrap().id(), preview.id());
        assert!(s.open_preview("other", 595.0, 842.0).await.is_err());

        s.close_preview();
        assert!(s.overlay().is_closed());
        assert_eq!(preview.status(), SlotStatus::Unmounted);
        assert_eq!(s.active_slot().unwrap().id(), grid.id());
    }

    #[tokio::test]
    async fn test_failed_preview_returns_to_closed() {
        let mut s = session();
        let grid = s.mount();
        assert!(s.open_preview("gone", 595.0, 842.0).await.is_err());
        assert!(s.overlay().is_closed());
        assert_eq!(s.slots().len(), 1);
        assert_eq!(s.active_slot().unwrap().id(), grid.id());
    }

    #[tokio::test]
    async fn test_teardown_unmounts_all() {
        let mut s = session();
        let a = s.mount();
        let b = s.mount();
        s.teardown();
        assert_eq!(a.status(), SlotStatus::Unmounted);
        assert_eq!(b.status(), SlotStatus::Unmounted);
    }
}
