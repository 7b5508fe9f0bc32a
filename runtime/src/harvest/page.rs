//! The listing page as the harvester sees it.
//!
//! [`TemplatePage`] is everything the driver and extractor need from a page.
//! [`BrowserPage`] implements it over a live browser tab by injecting small
//! JavaScript snippets built from the configured [`SiteSelectors`].

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use skinforge::ColorInput;

use crate::acquisition::assets::stylesheet_links;
use crate::config::SiteSelectors;
use crate::renderer::RenderContext;

/// Raw card data read from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub outer_html: String,
    pub style_id: Option<String>,
    pub style_text: Option<String>,
    #[serde(default)]
    pub data_attrs: BTreeMap<String, String>,
    pub category: Option<String>,
    #[serde(default)]
    pub popular: bool,
}

/// Raw overlay data read from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub title: Option<String>,
    #[serde(default)]
    pub colors: Vec<ColorInput>,
    pub illustration: Option<String>,
}

/// Page operations used by the harvest.
#[async_trait]
pub trait TemplatePage: Send {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;
    /// Accept the consent banner. `false` when there is none.
    async fn dismiss_consent(&mut self) -> Result<bool>;
    /// Click the category tab labelled `label`. `false` when there is none.
    async fn select_category(&mut self, label: &str) -> Result<bool>;
    async fn scroll_by(&mut self, px: u32) -> Result<()>;
    async fn scroll_to_top(&mut self) -> Result<()>;
    async fn document_height(&mut self) -> Result<u64>;
    async fn card_count(&mut self) -> Result<usize>;
    /// `None` when the card at `index` is gone.
    async fn card_snapshot(&mut self, index: usize) -> Result<Option<CardSnapshot>>;
    /// Hover the card and click its preview trigger. `false` when the card has
    /// no trigger.
    async fn open_preview(&mut self, index: usize) -> Result<bool>;
    async fn overlay_present(&mut self) -> Result<bool>;
    async fn overlay_snapshot(&mut self) -> Result<Option<OverlaySnapshot>>;
    /// Click the overlay's close affordance. `false` when there is none.
    async fn close_overlay(&mut self) -> Result<bool>;
    async fn press_escape(&mut self) -> Result<()>;
    async fn stylesheet_urls(&mut self) -> Result<Vec<String>>;
    async fn inline_css(&mut self) -> Result<String>;

    /// Let the page settle.
    async fn pause(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Quote a string as a JavaScript literal.
fn js(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// A live browser tab.
pub struct BrowserPage {
    ctx: Box<dyn RenderContext>,
    selectors: SiteSelectors,
    hover_settle_ms: u64,
}

impl BrowserPage {
    pub fn new(ctx: Box<dyn RenderContext>, selectors: SiteSelectors) -> Self {
        Self {
            ctx,
            selectors,
            hover_settle_ms: 500,
        }
    }

    pub async fn close(self) -> Result<()> {
        self.ctx.close().await
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.ctx.execute_js(script).await?;
        serde_json::from_value(value).context("unexpected script result")
    }

    async fn click_first(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()",
            sel = js(selector)
        );
        self.eval(&script).await
    }
}

#[async_trait]
impl TemplatePage for BrowserPage {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let nav = self.ctx.navigate(url, timeout_ms).await?;
        tracing::info!(url = %nav.final_url, load_ms = nav.load_time_ms, "page loaded");
        Ok(())
    }

    async fn dismiss_consent(&mut self) -> Result<bool> {
        self.click_first(&self.selectors.consent_button).await
    }

    async fn select_category(&mut self, label: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
  const want = {label}.trim().toLowerCase();
  const tab = Array.from(document.querySelectorAll({sel}))
    .find(b => b.textContent.trim().toLowerCase() === want);
  if (!tab) return false;
  tab.click();
  return true;
}})()"#,
            label = js(label),
            sel = js(&self.selectors.category_tab)
        );
        self.eval(&script).await
    }

    async fn scroll_by(&mut self, px: u32) -> Result<()> {
        self.ctx
            .execute_js(&format!("window.scrollBy(0, {px}); true"))
            .await?;
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> Result<()> {
        self.ctx.execute_js("window.scrollTo(0, 0); true").await?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64> {
        let height: f64 = self
            .eval("Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)")
            .await?;
        Ok(height.max(0.0) as u64)
    }

    async fn card_count(&mut self) -> Result<usize> {
        self.eval(&format!(
            "document.querySelectorAll({}).length",
            js(&self.selectors.card)
        ))
        .await
    }

    async fn card_snapshot(&mut self, index: usize) -> Result<Option<CardSnapshot>> {
        let script = format!(
            r#"(() => {{
  const card = document.querySelectorAll({card})[{index}];
  if (!card) return null;
  const style = card.querySelector('style[id]') || card.querySelector('style');
  const inner = card.querySelector({inner}) || card;
  const dataAttrs = {{}};
  for (const a of inner.attributes) {{
    if (a.name.startsWith('data-')) dataAttrs[a.name] = a.value;
  }}
  return {{
    outerHtml: card.outerHTML,
    styleId: style && style.id ? style.id : null,
    styleText: style ? style.textContent : null,
    dataAttrs,
    category: inner.getAttribute('data-skin-category'),
    popular: !!card.querySelector({popular})
  }};
}})()"#,
            card = js(&self.selectors.card),
            inner = js(&self.selectors.card_inner),
            popular = js(&self.selectors.popular_marker),
        );
        self.eval(&script).await
    }

    async fn open_preview(&mut self, index: usize) -> Result<bool> {
        if !self.ctx.hover_nth(&self.selectors.card, index).await? {
            return Ok(false);
        }
        let settle = self.hover_settle_ms;
        self.pause(settle).await;
        let script = format!(
            r#"(() => {{
  const text = {text};
  const card = document.querySelectorAll({card})[{index}];
  for (const root of [card, document]) {{
    if (!root) continue;
    const trigger = Array.from(root.querySelectorAll('button, a, [role="button"]'))
      .find(b => b.textContent.includes(text));
    if (trigger) {{ trigger.click(); return true; }}
  }}
  return false;
}})()"#,
            text = js(&self.selectors.preview_button_text),
            card = js(&self.selectors.card),
        );
        self.eval(&script).await
    }

    async fn overlay_present(&mut self) -> Result<bool> {
        self.eval(&format!(
            "!!document.querySelector({})",
            js(&self.selectors.overlay)
        ))
        .await
    }

    async fn overlay_snapshot(&mut self) -> Result<Option<OverlaySnapshot>> {
        let script = format!(
            r#"(() => {{
  const modal = document.querySelector({overlay});
  if (!modal) return null;
  const title = modal.querySelector({title});
  const colors = Array.from(modal.querySelectorAll({color})).map(i => {{
    const group = parseInt(i.getAttribute('data-main-index'), 10);
    return {{
      color: i.getAttribute('data-color') || '',
      label: i.getAttribute('data-label') || '',
      groupIndex: Number.isFinite(group) ? group : null,
      itemId: i.getAttribute('data-item-id')
    }};
  }});
  const svg = modal.querySelector({illustration});
  return {{
    title: title ? title.textContent.trim() : null,
    colors,
    illustration: svg ? svg.outerHTML : null
  }};
}})()"#,
            overlay = js(&self.selectors.overlay),
            title = js(&self.selectors.overlay_title),
            color = js(&self.selectors.color_input),
            illustration = js(&self.selectors.preview_illustration),
        );
        self.eval(&script).await
    }

    async fn close_overlay(&mut self) -> Result<bool> {
        self.click_first(&self.selectors.close_button).await
    }

    async fn press_escape(&mut self) -> Result<()> {
        self.ctx.press_key("Escape").await
    }

    async fn stylesheet_urls(&mut self) -> Result<Vec<String>> {
        let html = self.ctx.get_html().await?;
        let base = self.ctx.get_url().await?;
        Ok(stylesheet_links(&html, &base))
    }

    async fn inline_css(&mut self) -> Result<String> {
        self.eval(
            "Array.from(document.querySelectorAll('style')).map(s => s.textContent).join('\\n\\n')",
        )
        .await
    }
}
