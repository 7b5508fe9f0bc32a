//! `skinforge palette`: print the accent colour palette.

use anyhow::Result;
use skinforge::ColorSelection;

use crate::cli::output;

/// Run the palette command.
pub async fn run() -> Result<()> {
    let selection = ColorSelection::default();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "default": selection.selected(),
            "groups": selection.palette(),
        }));
        return Ok(());
    }

    let default = selection.selected();
    for group in selection.palette() {
        let main = &group.main_color;
        let marker = if main == default { " (default)" } else { "" };
        println!("  {:<8} {}{marker}", main.color, main.label);
        for sub in &group.sub_colors {
            println!("      {:<8} {}", sub.color, sub.label);
        }
    }
    Ok(())
}
