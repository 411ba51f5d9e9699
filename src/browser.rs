//! Chromium-backed [`PortalSession`].
//!
//! Locators are resolved in-page by a small script that walks the chained
//! steps from `document`. Reads (count, text, attributes) are answered by the
//! script directly. Interactions tag the first match with a marker attribute
//! and then go through a real CDP element handle, so clicks and keystrokes
//! are delivered as trusted input events rather than synthetic DOM events.

use crate::locator::Locator;
use crate::session::{PortalSession, SessionError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const TARGET_ATTRIBUTE: &str = "data-gradcas-target";

const RESOLVE_NODES: &str = r#"
const steps = __STEPS__;
let nodes = [document];
for (const step of steps) {
  if (step.kind === "css") {
    nodes = nodes.flatMap((n) => Array.from(n.querySelectorAll(step.selector)));
  } else if (step.kind === "text") {
    const needle = step.text.toLowerCase();
    const holds = (el) => (el.textContent || "").toLowerCase().includes(needle);
    nodes = nodes.flatMap((n) =>
      Array.from(n.querySelectorAll("*")).filter(
        (el) => holds(el) && !Array.from(el.children).some(holds)
      )
    );
  } else if (step.kind === "nth") {
    nodes = step.index < nodes.length ? [nodes[step.index]] : [];
  } else if (step.kind === "last") {
    nodes = nodes.length ? [nodes[nodes.length - 1]] : [];
  }
  nodes = Array.from(new Set(nodes));
}
"#;

/// Owns the launched browser and the task pumping its CDP event stream.
pub struct ChromeBrowser {
    browser: Browser,
    handle: JoinHandle<()>,
}

impl ChromeBrowser {
    pub async fn launch(headless: bool, request_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1400, 900)
            .request_timeout(request_timeout);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

        info!(headless, "launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handle })
    }

    pub async fn open(&self, url: &str) -> Result<ChromeSession> {
        let page = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;
        Ok(ChromeSession { page })
    }

    pub async fn close(mut self) -> Result<()> {
        info!("closing browser");
        self.browser.close().await.context("Failed to close browser")?;
        self.handle.abort();
        Ok(())
    }
}

pub struct ChromeSession {
    page: Page,
}

impl ChromeSession {
    fn script(locator: &Locator, action: &str) -> Result<String, SessionError> {
        let steps = serde_json::to_string(locator.steps())
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        Ok(format!(
            "(() => {{{}\n{}\n}})()",
            RESOLVE_NODES.replace("__STEPS__", &steps),
            action
        ))
    }

    async fn eval<T: DeserializeOwned>(
        &self,
        locator: &Locator,
        action: &str,
    ) -> Result<T, SessionError> {
        let script = Self::script(locator, action)?;
        let result = self.page.evaluate(script).await.map_err(map_cdp)?;
        result
            .into_value::<T>()
            .map_err(|e| SessionError::Browser(e.to_string()))
    }

    async fn element(&self, locator: &Locator) -> Result<Element, SessionError> {
        let action = format!(
            "document.querySelectorAll('[{attr}]').forEach((e) => e.removeAttribute('{attr}'));\n\
             const el = nodes[0];\n\
             if (!el) return false;\n\
             el.setAttribute('{attr}', '1');\n\
             el.scrollIntoView({{ block: 'center' }});\n\
             return true;",
            attr = TARGET_ATTRIBUTE
        );
        let marked: bool = self.eval(locator, &action).await?;
        if !marked {
            return Err(SessionError::NotFound(locator.to_string()));
        }
        self.page
            .find_element(format!("[{}='1']", TARGET_ATTRIBUTE))
            .await
            .map_err(map_cdp)
    }
}

#[async_trait]
impl PortalSession for ChromeSession {
    async fn count(&self, locator: &Locator) -> Result<usize, SessionError> {
        self.eval(locator, "return nodes.length;").await
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError> {
        self.eval(
            locator,
            "const el = nodes[0];\n\
             if (!el) return false;\n\
             const rect = el.getBoundingClientRect();\n\
             const style = getComputedStyle(el);\n\
             return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';",
        )
        .await
    }

    async fn click(&self, locator: &Locator) -> Result<(), SessionError> {
        debug!(%locator, "click");
        let element = self.element(locator).await?;
        element.click().await.map_err(map_cdp)?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), SessionError> {
        debug!(%locator, "fill");
        let cleared: bool = self
            .eval(
                locator,
                "const el = nodes[0];\n\
                 if (!el) return false;\n\
                 el.value = '';\n\
                 el.dispatchEvent(new Event('input', { bubbles: true }));\n\
                 return true;",
            )
            .await?;
        if !cleared {
            return Err(SessionError::NotFound(locator.to_string()));
        }
        let element = self.element(locator).await?;
        element.click().await.map_err(map_cdp)?;
        element.type_str(value).await.map_err(map_cdp)?;
        Ok(())
    }

    async fn press_enter(&self, locator: &Locator) -> Result<(), SessionError> {
        let element = self.element(locator).await?;
        element.press_key("Enter").await.map_err(map_cdp)?;
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> Result<Option<String>, SessionError> {
        self.eval(
            locator,
            "const el = nodes[0];\nreturn el ? el.textContent : null;",
        )
        .await
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let name = serde_json::to_string(name).map_err(|e| SessionError::Browser(e.to_string()))?;
        self.eval(
            locator,
            &format!("const el = nodes[0];\nreturn el ? el.getAttribute({name}) : null;"),
        )
        .await
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }
}

fn map_cdp(err: CdpError) -> SessionError {
    match err {
        err @ (CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse) => {
            SessionError::Disconnected(err.to_string())
        }
        other => SessionError::Browser(other.to_string()),
    }
}
