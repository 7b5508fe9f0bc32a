//! Chromium-based renderer using chromiumoxide.

use super::{BrowserOptions, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Environment variable naming an explicit Chromium executable.
pub const CHROMIUM_PATH_ENV: &str = "SKINFORGE_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. explicit flag
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured Chromium path does not exist");
    }

    // 2. SKINFORGE_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.skinforge/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".skinforge/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".skinforge/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".skinforge/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".skinforge/chromium/chrome-linux64/chrome"),
                home.join(".skinforge/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance.
    pub async fn new(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = find_chromium(options.chromium_path.as_deref()).with_context(|| {
            format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}.")
        })?;
        tracing::debug!(path = %chrome_path.display(), headless = options.headless, "launching Chromium");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(options.window_width, options.window_height)
            .arg(format!("--user-agent={}", options.user_agent))
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                if let Err(e) = self.page.wait_for_navigation().await {
                    tracing::debug!("wait_for_navigation: {e}");
                }

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn hover_nth(&self, selector: &str, index: usize) -> Result<bool> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("failed to query {selector}"))?;
        let Some(element) = elements.get(index) else {
            return Ok(false);
        };
        element
            .scroll_into_view()
            .await
            .context("failed to scroll element into view")?;
        element.hover().await.context("failed to hover element")?;
        Ok(true)
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let body = self
            .page
            .find_element("body")
            .await
            .context("page has no body")?;
        body.press_key(key)
            .await
            .with_context(|| format!("failed to press {key}"))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        if let Err(e) = self.page.close().await {
            tracing::debug!("page close: {e}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path_falls_through() {
        let found = find_chromium(Some(Path::new("/definitely/not/chrome")));
        assert_ne!(found.as_deref(), Some(Path::new("/definitely/not/chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_hover_and_keys() {
        let renderer = ChromiumRenderer::new(&BrowserOptions::default())
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<div class='card'>a</div><div class='card'>b</div>",
            10000,
        )
        .await
        .expect("navigation failed");

        assert!(ctx.hover_nth(".card", 1).await.expect("hover failed"));
        assert!(!ctx.hover_nth(".card", 5).await.expect("hover failed"));
        ctx.press_key("Escape").await.expect("key press failed");

        let count = ctx
            .execute_js("document.querySelectorAll('.card').length")
            .await
            .expect("JS execution failed");
        assert_eq!(count.as_u64(), Some(2));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
    }
}
