//! `skinforge render <id>`: render one published template at a target size,
//! optionally recoloured, and emit the mounted markup.

use std::path::Path;

use anyhow::{bail, Context, Result};
use skinforge::{ColorOption, ColorSelection, MountSlot, RenderOutcome, TemplateService};

use crate::cli::output;

/// Arguments of the render command.
pub struct RenderArgs<'a> {
    pub out_dir: &'a Path,
    pub id: &'a str,
    pub width: f64,
    pub height: f64,
    /// Palette label or hex value.
    pub color: Option<&'a str>,
    /// Write the markup here instead of stdout.
    pub output: Option<&'a Path>,
}

/// Run the render command.
pub async fn run(args: RenderArgs<'_>) -> Result<()> {
    let service = TemplateService::open(args.out_dir)
        .with_context(|| format!("no published catalog under {}", args.out_dir.display()))?;

    let slot = MountSlot::new(1);
    let fit = match service
        .render_template(&slot, args.id, args.width, args.height)
        .await?
    {
        RenderOutcome::Mounted { fit, .. } => fit,
        RenderOutcome::Discarded => bail!("render of {} was superseded", args.id),
    };

    let writes = match args.color {
        Some(key) => {
            let color = resolve_color(key)?;
            Some((service.apply_theme(&slot, &color)?, color))
        }
        None => None,
    };

    let html = slot.html();
    match args.output {
        Some(path) => std::fs::write(path, &html)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None if !output::is_json() => println!("{html}"),
        None => {}
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "id": args.id,
            "scale_x": fit.scale_x,
            "scale_y": fit.scale_y,
            "transform": fit.transform(),
            "color": writes.as_ref().map(|(_, c)| c.color.clone()),
            "hook_writes": writes.as_ref().map(|(n, _)| *n),
            "html": if args.output.is_none() { Some(html) } else { None },
        }));
    } else if output::is_verbose() {
        eprintln!(
            "  {} at {}x{} ({})",
            args.id,
            args.width,
            args.height,
            fit.transform()
        );
    }
    Ok(())
}

/// Palette option by label or hex, or any well-formed hex value.
fn resolve_color(key: &str) -> Result<ColorOption> {
    if let Some(option) = ColorSelection::default().lookup(key) {
        return Ok(option);
    }
    let custom = ColorOption::new(key, key);
    if custom.is_valid_hex() {
        Ok(custom)
    } else {
        bail!("unknown colour '{key}'; run `skinforge palette` for the options")
    }
}
