//! `skinforge normalize <dir>`: rebuild canonical documents from raw cards
//! saved on disk.

use std::path::Path;

use anyhow::{Context, Result};
use skinforge::{NormalizeConfig, Normalizer};

use crate::cli::output::{self, Styled};

/// Run the normalize command.
pub async fn run(dir: &Path, out: Option<&Path>, root_class: Option<&str>) -> Result<()> {
    let mut config = NormalizeConfig::default();
    if let Some(class) = root_class {
        config.root_class = class.to_string();
    }
    let normalizer = Normalizer::new(config);
    let report = normalizer
        .normalize_dir(dir, out, &[])
        .with_context(|| format!("failed to normalize {}", dir.display()))?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "written": report.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "skipped": report.skipped.iter().map(|(name, reason)| serde_json::json!({
                "file": name,
                "reason": reason,
            })).collect::<Vec<_>>(),
        }));
    } else if !output::is_quiet() {
        let s = Styled::new();
        println!("  {} {} documents normalized", s.ok_sym(), report.written.len());
        for (name, reason) in &report.skipped {
            println!("  {} {name}: {reason}", s.warn_sym());
        }
    }
    Ok(())
}
