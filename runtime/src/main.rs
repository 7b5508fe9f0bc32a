// Copyright 2026 Skinforge Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use skinforge_runtime::cli;
use skinforge_runtime::config::{out_dir_from_env, HarvestOverrides};

#[derive(Parser)]
#[command(
    name = "skinforge",
    about = "Skinforge: harvest, normalize, render and theme résumé templates",
    version,
    after_help = "Run 'skinforge <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest templates from the live listing page
    Harvest {
        /// Listing page URL
        #[arg(long)]
        url: Option<String>,
        /// Output directory
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Category tab to select (empty string keeps the page default)
        #[arg(long)]
        category: Option<String>,
        /// Navigation timeout in milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Maximum lazy-load scroll iterations
        #[arg(long)]
        scroll_max: Option<u32>,
        /// Stop after this many cards
        #[arg(long)]
        max_cards: Option<usize>,
        /// Read cards without opening their preview overlays
        #[arg(long)]
        skip_previews: bool,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Chromium executable
        #[arg(long)]
        chromium: Option<PathBuf>,
        /// Concurrent stylesheet downloads
        #[arg(long)]
        concurrency: Option<usize>,
        /// Extra attempts per failed stylesheet download
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Normalize a directory of raw card markup into canonical documents
    Normalize {
        /// Directory of raw *.html files
        dir: PathBuf,
        /// Write results here instead of in place
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Class token of the template root element
        #[arg(long)]
        root_class: Option<String>,
    },
    /// List published templates
    List {
        /// Published output directory
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Render a published template at a target size
    Render {
        /// Template id
        id: String,
        /// Target width in pixels
        #[arg(long, default_value = "210")]
        width: f64,
        /// Target height in pixels
        #[arg(long, default_value = "297")]
        height: f64,
        /// Accent colour (palette label or hex)
        #[arg(long)]
        color: Option<String>,
        /// Published output directory
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Write the markup to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the accent colour palette
    Palette,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(cli::output::JSON_ENV, "1");
    }
    if cli.quiet {
        std::env::set_var(cli::output::QUIET_ENV, "1");
    }
    if cli.verbose {
        std::env::set_var(cli::output::VERBOSE_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(cli::output::NO_COLOR_ENV, "1");
    }
    init_tracing(&cli);

    let result = match cli.command {
        Commands::Harvest {
            url,
            out,
            category,
            timeout,
            scroll_max,
            max_cards,
            skip_previews,
            headful,
            chromium,
            concurrency,
            retries,
        } => {
            cli::harvest_cmd::run(HarvestOverrides {
                source_url: url,
                nav_timeout_ms: timeout,
                scroll_max,
                category,
                out_dir: out,
                chromium_path: chromium,
                headless: headful.then_some(false),
                asset_concurrency: concurrency,
                asset_retries: retries,
                max_cards,
                skip_previews,
            })
            .await
        }
        Commands::Normalize {
            dir,
            out,
            root_class,
        } => cli::normalize_cmd::run(&dir, out.as_deref(), root_class.as_deref()).await,
        Commands::List { out } => cli::list_cmd::run(&out_dir_from_env(out)).await,
        Commands::Render {
            id,
            width,
            height,
            color,
            out,
            output,
        } => {
            let out_dir = out_dir_from_env(out);
            cli::render_cmd::run(cli::render_cmd::RenderArgs {
                out_dir: &out_dir,
                id: &id,
                width,
                height,
                color: color.as_deref(),
                output: output.as_deref(),
            })
            .await
        }
        Commands::Palette => cli::palette_cmd::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "skinforge", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
