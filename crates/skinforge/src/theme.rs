//! Accent recolouring through convention hooks.
//!
//! Templates from unrelated authors share a handful of class-name
//! conventions ("this element takes the accent colour on this property").
//! The [`HookRegistry`] lists them explicitly; applying a colour walks a
//! mounted view and overwrites the hooked property on every matching element.
//! Templates lacking a hook simply stay as they are.

use crate::dom::{self, Node};
use crate::render::MountSlot;
use crate::types::{ColorOption, SkinError, SkinResult};

/// CSS property a hook writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CssProperty {
    BackgroundColor,
    Color,
    BorderColor,
    Fill,
    Stroke,
}

impl CssProperty {
    pub fn as_css(&self) -> &'static str {
        match self {
            CssProperty::BackgroundColor => "background-color",
            CssProperty::Color => "color",
            CssProperty::BorderColor => "border-color",
            CssProperty::Fill => "fill",
            CssProperty::Stroke => "stroke",
        }
    }
}

/// One convention hook: elements with `class` take the colour on `property`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub class: String,
    pub property: CssProperty,
}

/// The fixed set of hooks theming understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn empty() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn with(mut self, class: &str, property: CssProperty) -> Self {
        self.register(class, property);
        self
    }

    /// Add a hook. Registering the same pair twice is a no-op.
    pub fn register(&mut self, class: &str, property: CssProperty) {
        let hook = Hook {
            class: class.to_string(),
            property,
        };
        if !self.hooks.contains(&hook) {
            self.hooks.push(hook);
        }
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Properties an element with these classes takes the accent on.
    pub fn properties_for<'a>(
        &'a self,
        classes: &'a [&'a str],
    ) -> impl Iterator<Item = CssProperty> + 'a {
        self.hooks
            .iter()
            .filter(move |h| classes.contains(&h.class.as_str()))
            .map(|h| h.property)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::empty()
            .with("accent-panel", CssProperty::BackgroundColor)
            .with("accent-text", CssProperty::Color)
            .with("rating-fill", CssProperty::BackgroundColor)
            .with("progress-fill", CssProperty::BackgroundColor)
            .with("section-divider", CssProperty::BorderColor)
            .with("badge", CssProperty::BackgroundColor)
    }
}

/// Applies colours to mounted views.
#[derive(Debug, Clone, Default)]
pub struct ThemeEngine {
    hooks: HookRegistry,
}

impl ThemeEngine {
    pub fn new(hooks: HookRegistry) -> Self {
        Self { hooks }
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Write `color` onto every hooked element of `nodes`. Returns the number
    /// of property writes.
    pub fn apply_to_nodes(&self, nodes: &mut [Node], color: &ColorOption) -> SkinResult<usize> {
        if !color.is_valid_hex() {
            return Err(SkinError::InvalidColor(color.color.clone()));
        }
        let mut writes = 0;
        dom::walk_mut(nodes, &mut |el| {
            let classes: Vec<String> = el.classes().map(str::to_string).collect();
            let classes: Vec<&str> = classes.iter().map(String::as_str).collect();
            let props: Vec<CssProperty> = self.hooks.properties_for(&classes).collect();
            for prop in props {
                el.set_style_property(prop.as_css(), &color.color);
                writes += 1;
            }
        });
        Ok(writes)
    }

    /// Apply `color` to whatever `slot` currently has mounted. A slot that is
    /// loading or empty is left alone and reports zero writes.
    pub fn apply_color(&self, slot: &MountSlot, color: &ColorOption) -> SkinResult<usize> {
        if !color.is_valid_hex() {
            return Err(SkinError::InvalidColor(color.color.clone()));
        }
        let writes = slot
            .with_view_mut(|view| self.apply_to_nodes(&mut view.nodes, color))
            .transpose()?
            .unwrap_or(0);
        tracing::debug!(slot = slot.id(), color = %color.color, writes, "applied accent");
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_fragment, serialize, walk};

    const FRAGMENT: &str = r#"<div class="document"><div class="header accent-panel" style="padding: 4px; background-color: #000"><h1 class="accent-text">Jo</h1></div><div class="skills"><span class="rating-fill" style="width: 80%"></span><span class="progress-fill"></span></div><hr class="section-divider"><i class="badge accent-text"></i><p class="plain">untouched</p></div>"#;

    fn hooked_values(nodes: &[Node], hooks: &HookRegistry) -> Vec<String> {
        let mut values = Vec::new();
        walk(nodes, &mut |el| {
            let classes: Vec<&str> = el.classes().collect();
            for prop in hooks.properties_for(&classes) {
                values.push(el.style_property(prop.as_css()).unwrap_or_default());
            }
        });
        values
    }

    #[test]
    fn test_registry_covers_default_roles() {
        let hooks = HookRegistry::default();
        let roles: Vec<&str> = hooks.hooks().iter().map(|h| h.class.as_str()).collect();
        assert_eq!(
            roles,
            vec!["accent-panel", "accent-text", "rating-fill", "progress-fill", "section-divider", "badge"]
        );
        let props: Vec<_> = hooks.properties_for(&["badge", "accent-text"]).collect();
        assert_eq!(props, vec![CssProperty::Color, CssProperty::BackgroundColor]);
    }

    #[test]
    fn test_apply_writes_every_hook_and_nothing_else() {
        let engine = ThemeEngine::default();
        let mut nodes = parse_fragment(FRAGMENT);
        let writes = engine
            .apply_to_nodes(&mut nodes, &ColorOption::new("#102A73", "Ink Blue"))
            .unwrap();
        // panel, h1, rating, progress, divider, badge (bg + text)
        assert_eq!(writes, 7);
        assert!(hooked_values(&nodes, engine.hooks()).iter().all(|v| v == "#102A73"));

        let html = serialize(&nodes);
        assert!(html.contains(r#"style="padding: 4px; background-color: #102A73""#));
        assert!(html.contains(r#"style="width: 80%; background-color: #102A73""#));
        assert!(html.contains(r#"<p class="plain">untouched</p>"#));
    }

    #[test]
    fn test_second_colour_leaves_no_residue() {
        let engine = ThemeEngine::default();
        let mut nodes = parse_fragment(FRAGMENT);
        let a = ColorOption::new("#944150", "Bordeaux");
        let b = ColorOption::new("#008E6E", "Persian Green");
        engine.apply_to_nodes(&mut nodes, &a).unwrap();
        engine.apply_to_nodes(&mut nodes, &b).unwrap();

        assert!(!serialize(&nodes).contains(&a.color));
        assert!(hooked_values(&nodes, engine.hooks()).iter().all(|v| v == &b.color));
    }

    #[test]
    fn test_template_without_hooks_is_not_an_error() {
        let engine = ThemeEngine::default();
        let mut nodes = parse_fragment(r#"<div class="document"><p>plain</p></div>"#);
        let before = serialize(&nodes);
        let writes = engine
            .apply_to_nodes(&mut nodes, &ColorOption::new("#fff", "White"))
            .unwrap();
        assert_eq!(writes, 0);
        assert_eq!(serialize(&nodes), before);
    }

    #[test]
    fn test_invalid_colour_rejected() {
        let engine = ThemeEngine::default();
        let mut nodes = parse_fragment(FRAGMENT);
        let err = engine
            .apply_to_nodes(&mut nodes, &ColorOption::new("red", "Red"))
            .unwrap_err();
        assert!(matches!(err, SkinError::InvalidColor(_)));
    }

    #[test]
    fn test_custom_hook_registry() {
        let engine = ThemeEngine::new(HookRegistry::empty().with("icon", CssProperty::Fill));
        let mut nodes = parse_fragment(r#"<svg><path class="icon"></path></svg><div class="badge"></div>"#);
        assert_eq!(
            engine
                .apply_to_nodes(&mut nodes, &ColorOption::new("#C28E56", "Ochre"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_unmounted_slot_reports_zero() {
        let engine = ThemeEngine::default();
        let slot = MountSlot::new(1);
        assert_eq!(
            engine
                .apply_color(&slot, &ColorOption::new("#C28E56", "Ochre"))
                .unwrap(),
            0
        );
    }
}
