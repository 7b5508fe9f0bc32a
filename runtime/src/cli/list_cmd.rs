//! `skinforge list`: show the published catalog.

use std::path::Path;

use anyhow::{Context, Result};
use skinforge::TemplateService;

use crate::cli::output;

/// Run the list command.
pub async fn run(out_dir: &Path) -> Result<()> {
    let service = TemplateService::open(out_dir)
        .with_context(|| format!("no published catalog under {}", out_dir.display()))?;
    let templates = service.list_templates();

    if output::is_json() {
        output::print_json(&serde_json::to_value(&templates)?);
        return Ok(());
    }

    if !output::is_quiet() {
        println!("  {} templates in {}\n", templates.len(), out_dir.display());
        for t in &templates {
            println!(
                "    {:<14} {:<28} {:<12}{}",
                t.id,
                t.display_name,
                t.category,
                if t.popular { "  ★ popular" } else { "" }
            );
        }
    }
    Ok(())
}
