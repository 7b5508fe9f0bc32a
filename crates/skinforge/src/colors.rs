//! Static colour palette and the single-selection state over it.

use crate::types::{ColorGroup, ColorInput, ColorOption, SkinError, SkinResult};

fn opt(color: &str, label: &str) -> ColorOption {
    ColorOption::new(color, label)
}

fn group(main: ColorOption, subs: Vec<ColorOption>) -> ColorGroup {
    ColorGroup {
        main_color: main,
        sub_colors: subs,
    }
}

/// The accent palette offered by the builder UI.
pub fn default_palette() -> Vec<ColorGroup> {
    vec![
        group(opt("#FFFFFF", "White"), vec![]),
        group(
            opt("#929496", "Aluminium"),
            vec![opt("#AE9B93", "Cedrus"), opt("#C4B08F", "Camel")],
        ),
        group(
            opt("#944150", "Bordeaux"),
            vec![opt("#B41C2E", "Cardinal"), opt("#CF142B", "Fire Engine")],
        ),
        group(
            opt("#B9481F", "Terracotta"),
            vec![opt("#C9652D", "Nasturtium"), opt("#C97375", "Ambrose")],
        ),
        group(
            opt("#C28E56", "Ochre"),
            vec![opt("#E8A509", "Luteum"), opt("#F2C000", "Tuscan Sun")],
        ),
        group(
            opt("#166C60", "Castleton"),
            vec![opt("#008E6E", "Persian Green"), opt("#56B239", "Shamrock")],
        ),
        group(
            opt("#496267", "Smalt Blue"),
            vec![opt("#027D89", "Ocean"), opt("#00B0C5", "Central Coast")],
        ),
        group(
            opt("#102A73", "Ink Blue"),
            vec![opt("#0069A5", "Cobalt"), opt("#009CCC", "Azure")],
        ),
        group(
            opt("#4A4A4A", "Lead"),
            vec![opt("#2A5978", "Blumine"), opt("#576C7C", "Slate")],
        ),
    ]
}

/// Index into [`default_palette`] of the initially selected group.
pub const DEFAULT_GROUP: usize = 5;

/// Every option of a palette, mains before their subs.
pub fn flatten(palette: &[ColorGroup]) -> Vec<ColorOption> {
    palette
        .iter()
        .flat_map(|g| std::iter::once(g.main_color.clone()).chain(g.sub_colors.iter().cloned()))
        .collect()
}

/// Rebuild colour groups from swatches read off a preview overlay.
///
/// Main swatches open a group; sub swatches attach to the group with the same
/// `group_index`, or to the most recent group when the index is missing.
/// Subs whose group never appears are dropped.
pub fn palette_from_inputs(inputs: &[ColorInput]) -> Vec<ColorGroup> {
    let mut groups: Vec<(Option<u32>, ColorGroup)> = Vec::new();
    for input in inputs.iter().filter(|i| i.is_main()) {
        groups.push((input.group_index, group(input.option(), Vec::new())));
    }
    for input in inputs.iter().filter(|i| !i.is_main()) {
        let target = match input.group_index {
            Some(idx) => groups.iter_mut().find(|(g, _)| *g == Some(idx)),
            None => groups.last_mut(),
        };
        match target {
            Some((_, g)) => g.sub_colors.push(input.option()),
            None => tracing::debug!(color = %input.color, "dropping swatch without a group"),
        }
    }
    groups.into_iter().map(|(_, g)| g).collect()
}

/// Exactly one selected option out of a fixed palette.
#[derive(Debug, Clone)]
pub struct ColorSelection {
    palette: Vec<ColorGroup>,
    selected: ColorOption,
}

impl ColorSelection {
    /// Start with `initial` selected; it must belong to `palette`.
    pub fn new(palette: Vec<ColorGroup>, initial: ColorOption) -> SkinResult<Self> {
        if !flatten(&palette).contains(&initial) {
            return Err(SkinError::UnknownColor(initial.color));
        }
        Ok(Self {
            palette,
            selected: initial,
        })
    }

    pub fn palette(&self) -> &[ColorGroup] {
        &self.palette
    }

    pub fn selected(&self) -> &ColorOption {
        &self.selected
    }

    /// Select a palette option. Unknown colours leave the selection as is.
    pub fn select(&mut self, color: &ColorOption) -> SkinResult<&ColorOption> {
        if !flatten(&self.palette).contains(color) {
            return Err(SkinError::UnknownColor(color.color.clone()));
        }
        self.selected = color.clone();
        Ok(&self.selected)
    }

    /// Resolve a hex value or label (case-insensitive) to a palette option.
    pub fn lookup(&self, key: &str) -> Option<ColorOption> {
        flatten(&self.palette)
            .into_iter()
            .find(|c| c.color.eq_ignore_ascii_case(key) || c.label.eq_ignore_ascii_case(key))
    }
}

impl Default for ColorSelection {
    fn default() -> Self {
        let palette = default_palette();
        let selected = palette[DEFAULT_GROUP].main_color.clone();
        Self { palette, selected }
    }
}
