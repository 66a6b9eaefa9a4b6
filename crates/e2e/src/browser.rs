//! Browser session handling
//!
//! A scenario drives exactly one [`BrowserPage`]. The production
//! implementation, [`ChromeSession`], launches headless Chromium over the
//! DevTools protocol with a private profile directory so that cookies never
//! leak between scenarios.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{E2eError, E2eResult};

/// Main-document response of a completed navigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationResponse {
    pub url: String,
    pub status: Option<u16>,
    pub status_text: String,
}

impl NavigationResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    /// `200 OK`-style status line for logs
    pub fn status_line(&self) -> String {
        match self.status {
            Some(s) => format!("{} {}", s, self.status_text).trim_end().to_string(),
            None => "no response".to_string(),
        }
    }
}

/// Element property readable through [`BrowserPage::read`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomProperty {
    TextContent,
    InnerText,
    InnerHtml,
}

impl DomProperty {
    fn js_name(self) -> &'static str {
        match self {
            DomProperty::TextContent => "textContent",
            DomProperty::InnerText => "innerText",
            DomProperty::InnerHtml => "innerHTML",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Absent,
    Hidden,
    Visible,
}

/// Identity and load state of the current top-level document
///
/// `marker` is stamped on first read and is lost when the document is
/// replaced, so a changed marker means a navigation committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub marker: String,
    pub url: String,
    /// `document.readyState == "complete"`
    pub ready: bool,
    /// Main-document status; `None` when the browser does not expose it
    pub status: Option<u16>,
}

impl DocumentState {
    pub fn response(&self) -> NavigationResponse {
        NavigationResponse {
            url: self.url.clone(),
            status: self.status.filter(|s| *s != 0),
            status_text: String::new(),
        }
    }
}

/// Stamps the window with a random marker unless one is already set
const DOCUMENT_STATE_JS: &str = "(function () { \
    if (!Object.prototype.hasOwnProperty.call(window, '__authflowDocument')) { \
        Object.defineProperty(window, '__authflowDocument', { \
            value: Date.now().toString(36) + Math.random().toString(36).slice(2), \
            enumerable: false \
        }); \
    } \
    const nav = performance.getEntriesByType('navigation')[0]; \
    return { \
        marker: window.__authflowDocument, \
        url: location.href, \
        ready: document.readyState === 'complete', \
        status: nav && typeof nav.responseStatus === 'number' ? nav.responseStatus : null \
    }; \
})()";

/// Capability the engine needs from a browser tab
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Load `url` and resolve once the navigation completes.
    async fn goto(&self, url: &str) -> E2eResult<NavigationResponse>;

    /// Snapshot of the loaded document. Fails while no document is
    /// scriptable, e.g. mid-navigation.
    async fn document(&self) -> E2eResult<DocumentState>;

    /// Read a property of the first element matching `selector`;
    /// `None` when nothing matches.
    async fn read(&self, selector: &str, property: DomProperty) -> E2eResult<Option<String>>;

    async fn visibility(&self, selector: &str) -> E2eResult<Visibility>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()>;

    async fn press_key(&self, selector: &str, key: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn screenshot(&self, path: &Path) -> E2eResult<()>;

    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self) -> E2eResult<()>;
}

/// `document.querySelector(...)` with the selector as an escaped JS literal
fn query_selector_js(selector: &str) -> String {
    // A JSON string is a valid JS string literal
    format!("document.querySelector({})", Value::String(selector.to_string()))
}

/// Headless Chromium tab owned by one scenario
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    // Dropped after the browser so the profile is not removed under a live process
    _profile_dir: TempDir,
}

impl ChromeSession {
    /// Launch a fresh browser with a private profile and open a blank tab
    pub async fn launch(config: &BrowserConfig) -> E2eResult<Self> {
        let profile_dir = tempfile::Builder::new().prefix("authflow-profile-").tempdir()?;

        let mut builder = CdpBrowserConfig::builder()
            .user_data_dir(profile_dir.path())
            .window_size(config.window_width, config.window_height)
            .launch_timeout(Duration::from_millis(config.launch_timeout_ms))
            .no_sandbox();

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if config.ignore_certificate_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }

        let cdp_config = builder.build().map_err(E2eError::Browser)?;

        info!("Launching browser (headless: {})", config.headless);
        let (browser, mut handler) = Browser::launch(cdp_config).await?;

        // The CDP handler must be polled for the lifetime of the browser
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };

        Ok(Self {
            browser: Some(browser),
            page,
            handler,
            _profile_dir: profile_dir,
        })
    }

    async fn evaluate(&self, expression: &str) -> E2eResult<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(E2eError::Browser)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn last_navigation_response(&self) -> E2eResult<NavigationResponse> {
        let request = self.page.wait_for_navigation_response().await?;
        let url = self.page.url().await?.unwrap_or_default();

        let response = request
            .as_ref()
            .and_then(|req| req.response.as_ref())
            .map(|resp| NavigationResponse {
                url: resp.url.clone(),
                status: u16::try_from(resp.status).ok(),
                status_text: resp.status_text.clone(),
            })
            .unwrap_or_default();

        Ok(NavigationResponse { url, ..response })
    }

    async fn element(&self, selector: &str) -> E2eResult<chromiumoxide::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| E2eError::NotFound(selector.to_string()))
    }
}

#[async_trait]
impl BrowserPage for ChromeSession {
    async fn goto(&self, url: &str) -> E2eResult<NavigationResponse> {
        debug!("goto {}", url);
        self.page.goto(url).await?;
        self.last_navigation_response().await
    }

    async fn document(&self) -> E2eResult<DocumentState> {
        let value = self.evaluate(DOCUMENT_STATE_JS).await?;
        serde_json::from_value(value)
            .map_err(|e| E2eError::Browser(format!("unreadable document state: {}", e)))
    }

    async fn read(&self, selector: &str, property: DomProperty) -> E2eResult<Option<String>> {
        let expression = format!(
            "{q} === null ? null : String({q}.{prop} ?? '')",
            q = query_selector_js(selector),
            prop = property.js_name()
        );
        match self.evaluate(&expression).await? {
            Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn visibility(&self, selector: &str) -> E2eResult<Visibility> {
        let expression = format!(
            "(function (el) {{ \
                if (el === null) return 'absent'; \
                const style = window.getComputedStyle(el); \
                if (style.visibility === 'hidden' || style.display === 'none') return 'hidden'; \
                const rect = el.getBoundingClientRect(); \
                return rect.width > 0 && rect.height > 0 ? 'visible' : 'hidden'; \
            }})({})",
            query_selector_js(selector)
        );
        let value = self.evaluate(&expression).await?;
        Ok(serde_json::from_value(value).unwrap_or(Visibility::Absent))
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.element(selector).await?.click().await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.element(selector).await?.click().await?.type_str(text).await?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.element(selector).await?.press_key(key).await?;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page.save_screenshot(params, path).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        info!("Closing browser");
        if let Err(e) = browser.close().await {
            warn!("Graceful browser close failed, killing: {}", e);
            if let Some(Err(kill_err)) = browser.kill().await {
                warn!("Browser kill failed: {}", kill_err);
            }
        }
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("Browser session dropped without close(); aborting CDP handler");
            self.handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        let ok = NavigationResponse {
            url: "https://localhost:8443/cas/actuator/attributeConsent/casuser".to_string(),
            status: Some(200),
            status_text: "OK".to_string(),
        };
        assert!(ok.is_ok());
        assert_eq!(ok.status_line(), "200 OK");

        let missing = NavigationResponse::default();
        assert!(!missing.is_ok());
        assert_eq!(missing.status_line(), "no response");
    }

    #[test]
    fn test_http2_status_without_text() {
        let resp = NavigationResponse {
            url: String::new(),
            status: Some(404),
            status_text: String::new(),
        };
        assert_eq!(resp.status_line(), "404");
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_document_state_response_drops_opaque_status() {
        let doc = DocumentState {
            marker: "lx2k9".to_string(),
            url: "https://example.org/?ticket=ST-1".to_string(),
            ready: true,
            status: Some(0),
        };
        assert_eq!(doc.response().status, None);
        assert_eq!(doc.response().url, doc.url);

        let parsed: DocumentState = serde_json::from_value(serde_json::json!({
            "marker": "a1", "url": "https://localhost:8443/cas/login", "ready": false, "status": 200
        }))
        .unwrap();
        assert_eq!(parsed.status, Some(200));
        assert!(!parsed.ready);
    }

    #[test]
    fn test_selector_is_escaped_for_js() {
        let q = query_selector_js(r#"input[name="it's"]"#);
        assert_eq!(q, r#"document.querySelector("input[name=\"it's\"]")"#);
    }
}
