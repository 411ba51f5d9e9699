//! Guarded transitions through the portal UI.
//!
//! The portal's own state is never modelled here. Every operation probes for
//! the element it needs within a bounded wait, acts, and settles; a missing
//! element becomes a [`NavigationFailure`] for the caller to classify. Only a
//! dead browser session surfaces as [`NavigationFailure::Session`].

use crate::locator::Locator;
use crate::models::{ApplicantRecord, Config, PortalSelectors, TimingConfig};
use crate::session::{PortalSession, SessionError};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationFailure {
    #[error("roster list unavailable")]
    RosterListUnavailable,
    #[error("not found")]
    NotFound,
    #[error("not uniquely identified among {0} rows")]
    NotUniquelyIdentified(usize),
    #[error("Applications sidebar missing")]
    ApplicationsMissing,
    #[error("could not open application")]
    ApplicationUnavailable,
    #[error("{0} tab missing")]
    TabMissing(String),
    #[error("section toggle {0} missing")]
    ToggleMissing(String),
    #[error("viewer did not render")]
    ViewerMissing,
    #[error(transparent)]
    Session(SessionError),
}

impl NavigationFailure {
    pub fn is_fatal(&self) -> bool {
        matches!(self, NavigationFailure::Session(err) if err.is_fatal())
    }
}

/// Keeps a dead session distinguishable from an ordinary step failure.
fn escalate(err: SessionError, otherwise: NavigationFailure) -> NavigationFailure {
    if err.is_fatal() {
        NavigationFailure::Session(err)
    } else {
        debug!(error = %err, "step probe failed");
        otherwise
    }
}

/// Row choice for a surname search: the first row whose text contains both
/// names (case-insensitive); else the only row if there is exactly one.
pub fn select_row(rows: &[String], first: &str, last: &str) -> Result<usize, NavigationFailure> {
    let first = first.to_lowercase();
    let last = last.to_lowercase();

    let matched = rows.iter().position(|text| {
        let text = text.to_lowercase();
        text.contains(&first) && text.contains(&last)
    });
    if let Some(index) = matched {
        return Ok(index);
    }

    match rows.len() {
        0 => Err(NavigationFailure::NotFound),
        1 => Ok(0),
        count => Err(NavigationFailure::NotUniquelyIdentified(count)),
    }
}

pub struct Navigator<'a> {
    session: &'a dyn PortalSession,
    selectors: &'a PortalSelectors,
    timing: &'a TimingConfig,
    timeout: Duration,
}

impl<'a> Navigator<'a> {
    pub fn new(session: &'a dyn PortalSession, config: &'a Config) -> Self {
        Self {
            session,
            selectors: &config.selectors,
            timing: &config.timing,
            timeout: config.timeout(),
        }
    }

    pub fn selectors(&self) -> &PortalSelectors {
        self.selectors
    }

    /// Back to the roster list with any previous search filter cleared.
    pub async fn return_to_roster_list(&self) -> Result<(), NavigationFailure> {
        info!(url = ?self.session.current_url().await, "returning to roster list");
        let icon = Locator::css(&self.selectors.people_icon).first();
        self.click_when_visible(&icon, self.timeout)
            .await
            .map_err(|e| escalate(e, NavigationFailure::RosterListUnavailable))?;
        self.settle(self.timing.settle_ms).await;

        let cancel = Locator::css(&self.selectors.cancel_search).first();
        match self.session.is_visible(&cancel).await {
            Ok(true) => {
                debug!("clearing residual search filter");
                if let Err(err) = self.session.click(&cancel).await {
                    if err.is_fatal() {
                        return Err(NavigationFailure::Session(err));
                    }
                    debug!(error = %err, "cancel search click ignored");
                }
                self.settle(self.timing.settle_ms).await;
            }
            Ok(false) => {}
            Err(err) if err.is_fatal() => return Err(NavigationFailure::Session(err)),
            Err(err) => debug!(error = %err, "cancel search probe ignored"),
        }
        Ok(())
    }

    /// Search by surname and open the row chosen by [`select_row`].
    pub async fn search_and_select(
        &self,
        applicant: &ApplicantRecord,
    ) -> Result<(), NavigationFailure> {
        info!(applicant = %applicant, "searching roster");
        let not_found = |e| escalate(e, NavigationFailure::NotFound);

        let button = Locator::css(&self.selectors.search_button).first();
        self.click_when_visible(&button, self.timeout)
            .await
            .map_err(not_found)?;
        self.settle(self.timing.search_reveal_ms).await;

        let input = Locator::css(&self.selectors.search_input).last();
        self.wait_visible(&input, self.timeout)
            .await
            .map_err(not_found)?;
        self.session
            .fill(&input, &applicant.last)
            .await
            .map_err(not_found)?;
        self.session.press_enter(&input).await.map_err(not_found)?;

        let rows = Locator::css(&self.selectors.result_rows);
        let count = self.stable_count(&rows).await?;
        info!(rows = count, "search results settled");

        let mut texts = Vec::with_capacity(count);
        for index in 0..count {
            let text = self
                .session
                .text(&rows.nth(index))
                .await
                .map_err(not_found)?
                .unwrap_or_default();
            debug!(row = index + 1, text = %text.trim(), "result row");
            texts.push(text);
        }

        let index = select_row(&texts, &applicant.first, &applicant.last).map_err(|failure| {
            warn!(applicant = %applicant, %failure, "row selection failed");
            failure
        })?;

        let row = rows.nth(index);
        let row_timeout = Duration::from_millis(self.timing.row_click_timeout_ms);
        let cell = row.child(&self.selectors.row_cell).last();
        if let Err(err) = self.click_when_visible(&cell, row_timeout).await {
            if err.is_fatal() {
                return Err(NavigationFailure::Session(err));
            }
            debug!(error = %err, "row cell click failed, clicking whole row");
            self.click_when_visible(&row, row_timeout)
                .await
                .map_err(not_found)?;
        }

        self.settle(self.timing.settle_ms).await;
        info!(url = ?self.session.current_url().await, "applicant opened");
        Ok(())
    }

    /// Applications sub-list, then its first row. Tries the row link first
    /// and falls back to the last cell of the first row.
    pub async fn open_first_application(&self) -> Result<(), NavigationFailure> {
        let applications = Locator::text(&self.selectors.applications_label).first();
        self.click_when_visible(&applications, self.timeout)
            .await
            .map_err(|e| escalate(e, NavigationFailure::ApplicationsMissing))?;
        self.settle(self.timing.settle_ms).await;

        let link = Locator::css(&self.selectors.application_link).first();
        if let Err(err) = self.click_when_visible(&link, self.timeout).await {
            if err.is_fatal() {
                return Err(NavigationFailure::Session(err));
            }
            debug!(error = %err, "application link missing, trying first row");
            let cell = Locator::css(&self.selectors.result_rows)
                .first()
                .child(&self.selectors.row_cell)
                .last();
            let row_timeout = Duration::from_millis(self.timing.row_click_timeout_ms);
            self.click_when_visible(&cell, row_timeout)
                .await
                .map_err(|e| escalate(e, NavigationFailure::ApplicationUnavailable))?;
        }

        self.settle(self.timing.settle_ms).await;
        info!(url = ?self.session.current_url().await, "application opened");
        Ok(())
    }

    /// Activate a tab by its visible label.
    pub async fn open_section(&self, tab_label: &str) -> Result<(), NavigationFailure> {
        let tab = Locator::text(tab_label).first();
        self.click_when_visible(&tab, self.timeout)
            .await
            .map_err(|e| escalate(e, NavigationFailure::TabMissing(tab_label.to_string())))?;
        self.settle(self.timing.tab_settle_ms).await;
        debug!(tab = tab_label, "tab opened");
        Ok(())
    }

    /// Make sure `viewer` is rendered, clicking `toggle` once if it is not.
    pub async fn expand_if_collapsed(
        &self,
        viewer: &Locator,
        toggle: &Locator,
    ) -> Result<(), NavigationFailure> {
        if self.is_present(viewer).await? {
            return Ok(());
        }

        self.click_when_visible(toggle, self.timeout)
            .await
            .map_err(|e| escalate(e, NavigationFailure::ToggleMissing(toggle.to_string())))?;
        self.settle(self.timing.viewer_settle_ms).await;

        if self.is_present(viewer).await? {
            Ok(())
        } else {
            warn!(%viewer, "viewer still absent after expanding");
            Err(NavigationFailure::ViewerMissing)
        }
    }

    /// Close an expanded panel so open viewers do not pile up.
    pub async fn collapse(&self, viewer: &Locator, toggle: &Locator) -> Result<(), NavigationFailure> {
        if !self.is_present(viewer).await? {
            return Ok(());
        }
        if let Err(err) = self.session.click(toggle).await {
            if err.is_fatal() {
                return Err(NavigationFailure::Session(err));
            }
            debug!(error = %err, "collapse click ignored");
        }
        self.settle(self.timing.poll_interval_ms).await;
        Ok(())
    }

    /// Source attribute of the first viewer element, `None` when there is no
    /// viewer.
    pub async fn viewer_source(&self, viewer: &Locator) -> Result<Option<String>, NavigationFailure> {
        if !self.is_present(viewer).await? {
            return Ok(None);
        }
        match self
            .session
            .attribute(&viewer.first(), &self.selectors.viewer_source_attribute)
            .await
        {
            Ok(source) => Ok(source),
            Err(err) if err.is_fatal() => Err(NavigationFailure::Session(err)),
            Err(err) => {
                debug!(error = %err, "viewer source unreadable");
                Ok(None)
            }
        }
    }

    pub async fn count(&self, locator: &Locator) -> Result<usize, NavigationFailure> {
        match self.session.count(locator).await {
            Ok(count) => Ok(count),
            Err(err) if err.is_fatal() => Err(NavigationFailure::Session(err)),
            Err(_) => Ok(0),
        }
    }

    pub async fn text(&self, locator: &Locator) -> Result<Option<String>, NavigationFailure> {
        match self.session.text(locator).await {
            Ok(text) => Ok(text),
            Err(err) if err.is_fatal() => Err(NavigationFailure::Session(err)),
            Err(_) => Ok(None),
        }
    }

    async fn is_present(&self, locator: &Locator) -> Result<bool, NavigationFailure> {
        Ok(self.count(locator).await? > 0)
    }

    async fn settle(&self, millis: u64) {
        self.session.pause(Duration::from_millis(millis)).await;
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms.max(1))
    }

    fn attempts(&self, timeout: Duration) -> u128 {
        (timeout.as_millis() / self.poll_interval().as_millis()).max(1)
    }

    async fn wait_visible(&self, locator: &Locator, timeout: Duration) -> Result<(), SessionError> {
        for _ in 0..self.attempts(timeout) {
            match self.session.is_visible(locator).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => debug!(%locator, error = %err, "visibility probe failed"),
            }
            self.session.pause(self.poll_interval()).await;
        }
        Err(SessionError::Timeout {
            locator: locator.to_string(),
            waited_ms: timeout.as_millis() as u64,
        })
    }

    async fn click_when_visible(&self, locator: &Locator, timeout: Duration) -> Result<(), SessionError> {
        self.wait_visible(locator, timeout).await?;
        self.session.click(locator).await
    }

    /// Result rows keep changing while the SPA filters, and its background
    /// polling means the network never goes idle. Wait until two consecutive
    /// probes agree, bounded by the operation timeout.
    async fn stable_count(&self, rows: &Locator) -> Result<usize, NavigationFailure> {
        self.settle(self.timing.results_settle_ms).await;
        let mut previous = None;
        let mut latest = 0;
        for _ in 0..self.attempts(self.timeout) {
            latest = self.count(rows).await?;
            if previous == Some(latest) {
                return Ok(latest);
            }
            previous = Some(latest);
            self.session.pause(self.poll_interval()).await;
        }
        Ok(latest)
    }
}
