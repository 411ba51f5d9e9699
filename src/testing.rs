//! Scripted stand-ins for the browser session and the document transfer.

use crate::fetcher::{DocumentFetcher, FetchError};
use crate::locator::Locator;
use crate::models::{safe_name, Config, DocumentKind};
use crate::session::{PortalSession, SessionError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub count: usize,
    pub visible: bool,
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self::many(1)
    }

    pub fn many(count: usize) -> Self {
        Self {
            count,
            visible: count > 0,
            ..Self::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Default)]
struct PortalState {
    elements: HashMap<String, FakeElement>,
    reveals: HashMap<String, Vec<(String, FakeElement)>>,
    toggles: HashMap<String, Vec<(String, FakeElement)>>,
    disconnect_on: HashSet<String>,
    disconnected: bool,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
}

/// A static page keyed by locator text. Clicks can reveal or hide elements,
/// which is enough to model collapsible panels.
#[derive(Default)]
pub struct FakePortal {
    state: Mutex<PortalState>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, locator: Locator, element: FakeElement) -> Self {
        self.lock().elements.insert(locator.to_string(), element);
        self
    }

    /// Clicking `trigger` makes `target` appear.
    pub fn on_click(self, trigger: &Locator, target: Locator, element: FakeElement) -> Self {
        self.lock()
            .reveals
            .entry(trigger.to_string())
            .or_default()
            .push((target.to_string(), element));
        self
    }

    /// Clicking `trigger` shows `target` when it is absent and removes it
    /// when it is present, like a collapsible panel header.
    pub fn toggles_on_click(self, trigger: &Locator, target: Locator, element: FakeElement) -> Self {
        self.lock()
            .toggles
            .entry(trigger.to_string())
            .or_default()
            .push((target.to_string(), element));
        self
    }

    /// The next click on `trigger` fails as if the browser had dropped the
    /// connection. Later calls go through.
    pub fn disconnect_on_click(self, trigger: &Locator) -> Self {
        self.lock().disconnect_on.insert(trigger.to_string());
        self
    }

    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.lock().fills.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PortalState> {
        self.state.lock().expect("portal state mutex")
    }

    fn live(&self) -> Result<std::sync::MutexGuard<'_, PortalState>, SessionError> {
        let state = self.lock();
        if state.disconnected {
            return Err(SessionError::Disconnected("fake browser closed".to_string()));
        }
        Ok(state)
    }

    fn present(state: &PortalState, key: &str) -> Option<FakeElement> {
        state
            .elements
            .get(key)
            .filter(|element| element.count > 0)
            .cloned()
    }
}

#[async_trait]
impl PortalSession for FakePortal {
    async fn count(&self, locator: &Locator) -> Result<usize, SessionError> {
        let state = self.live()?;
        Ok(state
            .elements
            .get(&locator.to_string())
            .map(|element| element.count)
            .unwrap_or(0))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError> {
        let state = self.live()?;
        Ok(Self::present(&state, &locator.to_string())
            .map(|element| element.visible)
            .unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> Result<(), SessionError> {
        let key = locator.to_string();
        let mut state = self.live()?;
        if Self::present(&state, &key).is_none() {
            return Err(SessionError::NotFound(key));
        }
        if state.disconnect_on.remove(&key) {
            return Err(SessionError::Disconnected("fake browser crashed".to_string()));
        }
        state.clicks.push(key.clone());
        if let Some(toggled) = state.toggles.get(&key).cloned() {
            for (target, element) in toggled {
                if state.elements.remove(&target).is_none() {
                    state.elements.insert(target, element);
                }
            }
        }
        if let Some(revealed) = state.reveals.get(&key).cloned() {
            for (target, element) in revealed {
                state.elements.insert(target, element);
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<(), SessionError> {
        let key = locator.to_string();
        let mut state = self.live()?;
        if Self::present(&state, &key).is_none() {
            return Err(SessionError::NotFound(key));
        }
        state.fills.push((key, value.to_string()));
        Ok(())
    }

    async fn press_enter(&self, locator: &Locator) -> Result<(), SessionError> {
        let key = locator.to_string();
        let state = self.live()?;
        Self::present(&state, &key)
            .map(|_| ())
            .ok_or(SessionError::NotFound(key))
    }

    async fn text(&self, locator: &Locator) -> Result<Option<String>, SessionError> {
        let state = self.live()?;
        Ok(Self::present(&state, &locator.to_string()).and_then(|element| element.text))
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let state = self.live()?;
        Ok(Self::present(&state, &locator.to_string())
            .and_then(|element| element.attributes.get(name).cloned()))
    }

    async fn current_url(&self) -> Option<String> {
        Some("https://portal.test/".to_string())
    }

    async fn pause(&self, _duration: Duration) {}
}

/// Writes a stub PDF for every URL except the ones told to fail.
#[derive(Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fetch calls mutex").clone()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        self.calls
            .lock()
            .expect("fetch calls mutex")
            .push(url.to_string());
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 403,
            });
        }
        let body = b"%PDF-1.4 stub document";
        std::fs::write(destination, body).map_err(|source| FetchError::Write {
            path: destination.display().to_string(),
            source,
        })?;
        Ok(body.len() as u64)
    }
}

/// Signed storage URL the fake portal serves for a document label.
pub fn signed_url(label: &str) -> String {
    format!("https://storage.test/docs/{label}.pdf?X-Amz-Signature=abc123&X-Amz-Expires=300")
}

/// Viewer `src` wrapping `url` the way the portal's embedded viewer does.
pub fn viewer_source(url: &str) -> String {
    format!(
        "/pdfjs/web/viewer.html?file={}#zoom=page-width",
        urlencoding::encode(url)
    )
}

/// Roster list, search box, result rows and an application with both tabs.
pub fn roster_portal(config: &Config, rows: &[&str]) -> FakePortal {
    let sel = &config.selectors;
    let result_rows = Locator::css(&sel.result_rows);
    let mut portal = FakePortal::new()
        .with(Locator::css(&sel.people_icon).first(), FakeElement::visible())
        .with(Locator::css(&sel.search_button).first(), FakeElement::visible())
        .with(Locator::css(&sel.search_input).last(), FakeElement::visible())
        .with(result_rows.clone(), FakeElement::many(rows.len()))
        .with(Locator::text(&sel.applications_label).first(), FakeElement::visible())
        .with(Locator::css(&sel.application_link).first(), FakeElement::visible())
        .with(Locator::text(&sel.attachments_tab).first(), FakeElement::visible())
        .with(Locator::text(&sel.recommendations_tab).first(), FakeElement::visible());
    for (i, text) in rows.iter().enumerate() {
        portal = portal
            .with(result_rows.nth(i), FakeElement::visible().text(text))
            .with(result_rows.nth(i).child(&sel.row_cell).last(), FakeElement::visible());
    }
    portal
}

/// A collapsed attachment section whose viewer appears once its header is
/// clicked.
pub fn with_attachment(portal: FakePortal, config: &Config, kind: DocumentKind) -> FakePortal {
    let sel = &config.selectors;
    let Some(section) = sel.section(kind) else {
        return portal;
    };
    let toggle = Locator::text(&section.label).first();
    let viewer = Locator::css(&section.container).child(&sel.viewer);
    reveal_viewer(portal, config, &toggle, &viewer, kind.label())
}

/// Recommender entries in the container at `container`. A `None` name
/// leaves the entry unnamed.
pub fn with_recommenders(
    portal: FakePortal,
    config: &Config,
    container: usize,
    names: &[Option<&str>],
) -> FakePortal {
    let sel = &config.selectors;
    let entries = Locator::css(&sel.recommender_containers[container]).child(&sel.recommender_entry);
    let mut portal = portal.with(entries.clone(), FakeElement::many(names.len()));
    for (i, name) in names.iter().enumerate() {
        let entry = entries.nth(i);
        let label = match name {
            Some(name) => format!("lor_{}", safe_name(name)),
            None => format!("lor_recommender_{}", i + 1),
        };
        if let Some(name) = name {
            portal = portal.with(
                entry.child(&sel.recommender_name).first(),
                FakeElement::visible().text(name),
            );
        }
        let toggle = entry.child(&sel.recommender_toggle).first();
        let viewer = entry.child(&sel.viewer);
        portal = reveal_viewer(portal, config, &toggle, &viewer, &label);
    }
    portal
}

fn reveal_viewer(
    portal: FakePortal,
    config: &Config,
    toggle: &Locator,
    viewer: &Locator,
    label: &str,
) -> FakePortal {
    let source = viewer_source(&signed_url(label));
    portal
        .with(toggle.clone(), FakeElement::visible())
        .toggles_on_click(toggle, viewer.clone(), FakeElement::many(1))
        .toggles_on_click(
            toggle,
            viewer.first(),
            FakeElement::visible().attr(&config.selectors.viewer_source_attribute, &source),
        )
}
