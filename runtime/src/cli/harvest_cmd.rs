//! `skinforge harvest`: pull templates from the live listing page.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::{self, Styled};
use crate::config::{HarvestConfig, HarvestOverrides};
use crate::pipeline;

/// Run the harvest command.
pub async fn run(overrides: HarvestOverrides) -> Result<()> {
    let config = HarvestConfig::resolve(overrides)?;
    let s = Styled::new();

    let spinner = (!output::is_quiet()).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.set_message(format!("Harvesting {}", config.source_url));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = pipeline::run_harvest(&config).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let summary = result?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "run_id": summary.session.run_id.to_string(),
            "discovered": summary.session.discovered,
            "extracted": summary.session.extracted(),
            "failed": summary.session.failed_indices(),
            "published": summary.publish.published.len(),
            "skipped": summary.publish.skipped.len(),
            "degraded_ids": summary.publish.degraded_ids,
            "stylesheets": summary.stylesheets.len(),
            "out_dir": summary.out_dir.display().to_string(),
        }));
        return Ok(());
    }

    if !output::is_quiet() {
        let session = &summary.session;
        println!(
            "  {} {} of {} cards extracted",
            s.ok_sym(),
            session.extracted(),
            session.discovered
        );
        if let Some(scroll) = &session.scroll {
            println!(
                "    lazy load: {} scrolls, {}",
                scroll.iterations,
                if scroll.converged { "converged" } else { "hit the cap" }
            );
        }
        for failure in &session.failures {
            println!("  {} card {}: {}", s.warn_sym(), failure.index, failure.message);
        }
        for (index, reason) in &summary.publish.skipped {
            println!("  {} card {index} not published: {reason}", s.warn_sym());
        }
        if !summary.publish.degraded_ids.is_empty() {
            println!(
                "  {} positional ids (not stable across runs): {}",
                s.warn_sym(),
                summary.publish.degraded_ids.join(", ")
            );
        }
        println!(
            "  {} {} templates, {} stylesheets → {}",
            s.ok_sym(),
            summary.publish.published.len(),
            summary.stylesheets.len(),
            summary.out_dir.display()
        );
    }
    Ok(())
}
