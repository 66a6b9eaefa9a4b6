//! Step execution against one browser page and one HTTP client

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::artifacts::Artifacts;
use crate::assert;
use crate::browser::{BrowserPage, NavigationResponse};
use crate::config::HarnessConfig;
use crate::dom;
use crate::error::{E2eError, E2eResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest};
use crate::spec::ScenarioStep;
use crate::token::{self, ClaimSet};
use crate::wait::{self, WaitState};

/// Side outputs of a successful step
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub screenshot_path: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,
    /// Set when a conditional step decided not to act
    pub skipped: bool,
}

/// Mutable state of one running scenario
pub struct StepExecutor<'a> {
    scenario: &'a str,
    page: &'a dyn BrowserPage,
    http: &'a HttpClient,
    config: &'a HarnessConfig,
    base_url: Url,
    scenario_dir: &'a Path,
    artifacts: Artifacts,
    /// Document seen before the last click that did not wait itself
    pending_marker: Option<String>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        scenario: &'a str,
        page: &'a dyn BrowserPage,
        http: &'a HttpClient,
        config: &'a HarnessConfig,
        base_url: &str,
        scenario_dir: &'a Path,
    ) -> E2eResult<Self> {
        Ok(Self {
            scenario,
            page,
            http,
            config,
            base_url: Url::parse(base_url)?,
            scenario_dir,
            artifacts: Artifacts::new(),
            pending_marker: None,
        })
    }

    /// Execute a single step
    pub async fn execute(&mut self, step: &ScenarioStep) -> E2eResult<StepOutcome> {
        let timeouts = &self.config.timeouts;
        debug!("[{}] executing {}", self.scenario, step.label());

        match step {
            ScenarioStep::Navigate { url, wait_for_selector, expect_status, expect_ok } => {
                let url = self.resolve_url(url)?;
                self.pending_marker = None;
                let response = wait::goto(self.page, &url, timeouts.navigation()).await?;
                info!("[{}] {} {}", self.scenario, response.status_line(), url);

                if let Some(want) = expect_status {
                    if response.status != Some(*want) {
                        return Err(E2eError::UnexpectedStatus {
                            method: "GET".to_string(),
                            url,
                            got: response.status.unwrap_or(0),
                            want: *want,
                        });
                    }
                }
                if *expect_ok && !response.is_ok() {
                    return Err(E2eError::assertion(format!(
                        "expected a 2xx response from {}, got {}",
                        url,
                        response.status_line()
                    )));
                }
                if let Some(selector) = wait_for_selector {
                    self.wait_for(selector, WaitState::Visible, None).await?;
                }
            }

            ScenarioStep::Login { username, password } => {
                let creds = &self.config.credentials;
                let username = match username {
                    Some(u) => self.artifacts.interpolate(u)?,
                    None => creds.username.clone(),
                };
                let password = match password {
                    Some(p) => self.artifacts.interpolate(p)?,
                    None => creds.password.clone(),
                };

                self.wait_for(&creds.username_selector, WaitState::Visible, None).await?;
                self.page.type_text(&creds.username_selector, &username).await?;
                self.page.type_text(&creds.password_selector, &password).await?;
                let before = wait::document_marker(self.page).await?;
                self.page.press_key(&creds.password_selector, "Enter").await?;
                let response = self.next_document(&before).await?;
                info!("[{}] logged in as {} -> {}", self.scenario, username, response.url);
            }

            ScenarioStep::Click { selector, wait_for_navigation } => {
                let before = wait::document_marker(self.page).await?;
                self.page.click(selector).await?;
                if *wait_for_navigation {
                    let response = self.next_document(&before).await?;
                    debug!("[{}] click {} navigated to {}", self.scenario, selector, response.url);
                } else {
                    self.pending_marker = Some(before);
                }
            }

            ScenarioStep::Type { selector, text } => {
                let text = self.artifacts.interpolate(text)?;
                self.page.type_text(selector, &text).await?;
            }

            ScenarioStep::Wait { selector, timeout_ms, state } => {
                self.wait_for(selector, *state, *timeout_ms).await?;
            }

            ScenarioStep::WaitForNavigation { timeout_ms } => {
                let limit = timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.navigation());
                let previous = self.pending_marker.take();
                wait::wait_for_new_document(self.page, previous.as_deref(), limit, timeouts.poll_interval())
                    .await?;
            }

            ScenarioStep::Sleep { ms, reason } => {
                wait::bounded_delay(
                    Duration::from_millis(*ms),
                    Duration::from_millis(timeouts.max_sleep_ms),
                    reason,
                )
                .await;
            }

            ScenarioStep::Assert { selector, exists, visible, text, inner_text, text_contains } => {
                match exists {
                    Some(true) => assert::element_exists(self.page, selector).await?,
                    Some(false) => assert::element_absent(self.page, selector).await?,
                    None => {}
                }
                match visible {
                    Some(true) => assert::visible(self.page, selector).await?,
                    Some(false) => assert::not_visible(self.page, selector).await?,
                    None => {}
                }
                if let Some(expected) = text {
                    let expected = self.artifacts.interpolate(expected)?;
                    assert::text_equals(self.page, selector, &expected).await?;
                }
                if let Some(expected) = inner_text {
                    let expected = self.artifacts.interpolate(expected)?;
                    assert::inner_text_equals(self.page, selector, &expected).await?;
                }
                if let Some(expected) = text_contains {
                    let expected = self.artifacts.interpolate(expected)?;
                    assert::text_contains(self.page, selector, &expected).await?;
                }
            }

            ScenarioStep::ConfirmIfVisible { selector, timeout_ms } => {
                let rendered = match timeout_ms {
                    Some(ms) => wait::wait_for_selector(
                        self.page,
                        selector,
                        WaitState::Visible,
                        Duration::from_millis(*ms),
                        timeouts.poll_interval(),
                    )
                    .await
                    .is_ok(),
                    None => dom::is_visible(self.page, selector).await,
                };

                if !rendered {
                    info!("[{}] {} not rendered, consent already given", self.scenario, selector);
                    return Ok(StepOutcome {
                        skipped: true,
                        ..Default::default()
                    });
                }

                let before = wait::document_marker(self.page).await?;
                self.page.click(selector).await?;
                let response = self.next_document(&before).await?;
                info!("[{}] confirmed {} -> {}", self.scenario, selector, response.url);
            }

            ScenarioStep::CaptureParameter { name, save_as } => {
                let value = assert::url_parameter(self.page, name).await?;
                info!("[{}] {} = {}", self.scenario, name, value);
                self.artifacts
                    .insert(save_as.as_deref().unwrap_or(name), Value::String(value))?;
            }

            ScenarioStep::AssertTicket { parameter, save_as } => {
                let ticket = assert::url_parameter(self.page, parameter).await?;
                assert::ticket_shape(&ticket)?;
                info!("[{}] service ticket {}", self.scenario, ticket);
                if let Some(name) = save_as {
                    self.artifacts.insert(name, Value::String(ticket))?;
                }
            }

            ScenarioStep::CaptureJson { selector, save_as, html } => {
                let value = dom::json_from_element(self.page, selector, *html).await?;
                debug!("[{}] captured {}: {}", self.scenario, save_as, value);
                self.artifacts.insert(save_as, value)?;
            }

            ScenarioStep::DecodeToken { source, save_as } => {
                let raw = self.artifacts.lookup_str(source)?;
                let claims = token::decode(raw)?;
                debug!(
                    "[{}] decoded {} with {} claim(s)",
                    self.scenario,
                    source,
                    claims.len()
                );
                self.artifacts.insert(save_as, claims.to_value())?;
            }

            ScenarioStep::AssertClaims { source, present, absent } => {
                let claims = ClaimSet::from_value(self.artifacts.lookup(source)?.clone())?;
                assert::claims(&claims, present, absent)?;
                debug!(
                    "[{}] {}: {} present, {} absent as required",
                    self.scenario,
                    source,
                    present.len(),
                    absent.len()
                );
            }

            ScenarioStep::AssertJson { source, length } => {
                assert::json_length(source, self.artifacts.lookup(source)?, *length)?;
            }

            ScenarioStep::Request {
                method,
                url,
                headers,
                expect_status,
                body,
                body_file,
                save_as,
            } => {
                let mut request = HttpRequest::new(*method, self.resolve_url(url)?).expect(*expect_status);
                for (name, value) in headers {
                    request = request.header(name.clone(), self.artifacts.interpolate(value)?);
                }
                if let Some(body) = body {
                    request = request.body(self.artifacts.interpolate(body)?);
                } else if let Some(file) = body_file {
                    let path = self.fixture_path(file)?;
                    let content = tokio::fs::read_to_string(&path).await?;
                    debug!("[{}] request body from {}", self.scenario, path.display());
                    request = request.body(self.artifacts.interpolate(&content)?);
                }

                let response = self.http.request(&request).await?;
                if let Some(name) = save_as {
                    let value = response.json().map_err(|e| {
                        E2eError::assertion(format!(
                            "{} {} did not return JSON: {}",
                            method.as_str(),
                            request.url,
                            e
                        ))
                    })?;
                    self.artifacts.insert(name, value)?;
                }
            }

            ScenarioStep::Export { url, path, headers, expect_status, min_bytes } => {
                let mut request =
                    HttpRequest::new(HttpMethod::Get, self.resolve_url(url)?).expect(*expect_status);
                for (name, value) in headers {
                    request = request.header(name.clone(), self.artifacts.interpolate(value)?);
                }
                let name = self.artifacts.interpolate(&path.to_string_lossy())?;
                let dest = confine(&std::env::temp_dir(), Path::new(&name))?;
                let written = self.http.download(&request, &dest).await?;
                if written < *min_bytes {
                    return Err(E2eError::assertion(format!(
                        "export from {} wrote {} byte(s), expected at least {}",
                        request.url, written, min_bytes
                    )));
                }
                info!("[{}] exported records are at {}", self.scenario, dest.display());
            }

            ScenarioStep::Screenshot { name } => {
                return Ok(self.screenshot(name).await);
            }

            ScenarioStep::RemoveDir { path } => {
                let dir = self.fixture_path(path)?;
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => info!("[{}] removed {}", self.scenario, dir.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("[{}] {} already absent", self.scenario, dir.display());
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            ScenarioStep::Log { message } => {
                info!("[{}] {}", self.scenario, self.artifacts.interpolate(message)?);
            }
        }

        Ok(StepOutcome::default())
    }

    /// Wait for the navigation started by an action taken after `before` was read.
    async fn next_document(&self, before: &str) -> E2eResult<NavigationResponse> {
        let timeouts = &self.config.timeouts;
        wait::wait_for_new_document(self.page, Some(before), timeouts.navigation(), timeouts.poll_interval())
            .await
    }

    async fn wait_for(&self, selector: &str, state: WaitState, timeout_ms: Option<u64>) -> E2eResult<()> {
        let timeouts = &self.config.timeouts;
        let limit = timeout_ms.map(Duration::from_millis).unwrap_or(timeouts.selector());
        wait::wait_for_selector(self.page, selector, state, limit, timeouts.poll_interval()).await
    }

    /// Screenshots are a side channel: failures are logged, never raised.
    async fn screenshot(&self, name: &str) -> StepOutcome {
        let path = self
            .config
            .screenshot_dir
            .join(format!("{}-{}.png", self.scenario, name));

        if let Err(e) = self.page.screenshot(&path).await {
            warn!("[{}] screenshot {} failed: {}", self.scenario, name, e);
            return StepOutcome::default();
        }

        let sha256 = match std::fs::read(&path) {
            Ok(data) => Some(hex::encode(Sha256::digest(&data))),
            Err(e) => {
                warn!("[{}] cannot hash {}: {}", self.scenario, path.display(), e);
                None
            }
        };
        debug!("[{}] screenshot {}", self.scenario, path.display());

        StepOutcome {
            screenshot_path: Some(path),
            screenshot_sha256: sha256,
            skipped: false,
        }
    }

    fn resolve_url(&self, raw: &str) -> E2eResult<String> {
        let raw = self.artifacts.interpolate(raw)?;
        resolve_against(&self.base_url, &raw)
    }

    /// Scenario-local path; must stay inside the scenario directory.
    fn fixture_path(&self, relative: &Path) -> E2eResult<PathBuf> {
        confine(self.scenario_dir, relative)
    }
}

/// Join `relative` onto `base`, rejecting absolute paths and `..`.
fn confine(base: &Path, relative: &Path) -> E2eResult<PathBuf> {
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(E2eError::SpecParse(format!(
            "path {} must stay inside {}",
            relative.display(),
            base.display()
        )));
    }
    Ok(base.join(relative))
}

/// Absolute URLs pass through; anything else joins onto `base`.
pub fn resolve_against(base: &Url, raw: &str) -> E2eResult<String> {
    match Url::parse(raw) {
        Ok(absolute) => Ok(absolute.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(base.join(raw)?.to_string()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_urls_join_base() {
        let base = Url::parse("https://localhost:8443").unwrap();
        assert_eq!(
            resolve_against(&base, "/cas/login?service=https://example.org").unwrap(),
            "https://localhost:8443/cas/login?service=https://example.org"
        );
    }

    #[test]
    fn test_paths_stay_inside_base() {
        let base = Path::new("/tmp/scenarios/saml2-idp-login-with-sso");
        assert_eq!(confine(base, Path::new("saml-md")).unwrap(), base.join("saml-md"));
        assert!(confine(base, Path::new("../attribute-consent")).is_err());
        assert!(confine(base, Path::new("/etc")).is_err());
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        let base = Url::parse("https://localhost:8443").unwrap();
        assert_eq!(
            resolve_against(
                &base,
                "http://localhost:9443/simplesaml/module.php/core/authenticate.php?as=default-sp"
            )
            .unwrap(),
            "http://localhost:9443/simplesaml/module.php/core/authenticate.php?as=default-sp"
        );
    }
}
