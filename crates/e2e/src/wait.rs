//! Navigation and selector synchronization
//!
//! Every wait is bounded. Exceeding the bound yields
//! [`E2eError::NavigationTimeout`], never a retry.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::browser::{BrowserPage, NavigationResponse};
use crate::dom;
use crate::error::{E2eError, E2eResult};

/// Element state a selector wait resolves on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// Attached to the DOM
    Present,
    #[default]
    Visible,
    /// Detached or not rendered
    Hidden,
}

impl WaitState {
    fn describe(self, selector: &str) -> String {
        match self {
            WaitState::Present => format!("{} present", selector),
            WaitState::Visible => format!("{} visible", selector),
            WaitState::Hidden => format!("{} hidden", selector),
        }
    }
}

/// Poll the page until `selector` reaches `state` or `limit` elapses.
pub async fn wait_for_selector(
    page: &dyn BrowserPage,
    selector: &str,
    state: WaitState,
    limit: Duration,
    poll_interval: Duration,
) -> E2eResult<()> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        let satisfied = match state {
            WaitState::Present => dom::element_exists(page, selector).await,
            WaitState::Visible => dom::is_visible(page, selector).await,
            WaitState::Hidden => !dom::is_visible(page, selector).await,
        };

        if satisfied {
            debug!("{} after {} poll(s)", state.describe(selector), attempts);
            return Ok(());
        }

        if start.elapsed() >= limit {
            return Err(E2eError::NavigationTimeout {
                condition: state.describe(selector),
                timeout_ms: millis(limit),
            });
        }

        sleep(poll_interval).await;
    }
}

/// Marker of the current document; pass it to [`wait_for_new_document`]
/// after an action that may navigate.
pub async fn document_marker(page: &dyn BrowserPage) -> E2eResult<String> {
    Ok(page.document().await?.marker)
}

/// Poll until a document other than `previous` is loaded and complete.
/// With no `previous`, only completeness of the current document counts.
///
/// Actions return before the browser reports the navigation they start,
/// so the old document's load state is never trusted.
pub async fn wait_for_new_document(
    page: &dyn BrowserPage,
    previous: Option<&str>,
    limit: Duration,
    poll_interval: Duration,
) -> E2eResult<NavigationResponse> {
    let start = Instant::now();

    loop {
        match page.document().await {
            Ok(doc) if doc.ready && previous.map_or(true, |p| doc.marker != p) => {
                debug!("document {} loaded after {} ms", doc.url, millis(start.elapsed()));
                return Ok(doc.response());
            }
            Ok(_) => {}
            // Evaluation races the document swap
            Err(e) => debug!("document not readable yet: {}", e),
        }

        if start.elapsed() >= limit {
            return Err(E2eError::NavigationTimeout {
                condition: "new document loaded".to_string(),
                timeout_ms: millis(limit),
            });
        }

        sleep(poll_interval).await;
    }
}

/// Navigate and wait for completion within `limit`.
pub async fn goto(page: &dyn BrowserPage, url: &str, limit: Duration) -> E2eResult<NavigationResponse> {
    match timeout(limit, page.goto(url)).await {
        Ok(result) => result,
        Err(_) => Err(E2eError::NavigationTimeout {
            condition: format!("navigation to {}", url),
            timeout_ms: millis(limit),
        }),
    }
}

/// Fixed delay for flows with no observable readiness signal.
/// Clamped to `max`.
pub async fn bounded_delay(requested: Duration, max: Duration, reason: &str) {
    let effective = requested.min(max);
    if effective < requested {
        warn!(
            "sleep of {} ms clamped to {} ms ({})",
            millis(requested),
            millis(max),
            reason
        );
    }
    debug!("sleeping {} ms: {}", millis(effective), reason);
    sleep(effective).await;
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
