//! Renderer abstraction for browser-based page automation.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Desktop Chrome user agent presented to the source site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/120.0.0.0 Safari/537.36";

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// How to launch the browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Explicit executable; discovered with [`chromium::find_chromium`] when unset.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Move the pointer over the `index`-th element matching `selector`.
    /// Returns `false` when there is no such element.
    async fn hover_nth(&self, selector: &str, index: usize) -> Result<bool>;
    /// Press a key (e.g. `"Escape"`) on the focused document.
    async fn press_key(&self, key: &str) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
