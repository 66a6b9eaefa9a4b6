//! Scenario runner: one browser and one HTTP client per scenario

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserPage, ChromeSession};
use crate::config::{BrowserConfig, HarnessConfig};
use crate::error::{E2eError, E2eResult};
use crate::executor::StepExecutor;
use crate::http::HttpClient;
use crate::spec::{ScenarioSpec, ScenarioStep};

/// Opens a fresh, isolated browser page for each scenario
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserPage>>;
}

/// Launches headless Chromium
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageLauncher for ChromeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserPage>> {
        Ok(Box::new(ChromeSession::launch(&self.config).await?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Main,
    Cleanup,
}

/// Result of executing a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub phase: Phase,
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    /// The scenario never started: HTTP client or browser could not be set up
    #[serde(default)]
    pub setup_failed: bool,
}

impl ScenarioResult {
    fn setup_failure(name: &str, err: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            steps: vec![],
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
            setup_failed: true,
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// True when any scenario failed before its first step
    pub fn setup_failed(&self) -> bool {
        self.results.iter().any(|r| r.setup_failed)
    }
}

/// Main scenario runner
pub struct ScenarioRunner {
    config: HarnessConfig,
    launcher: Arc<dyn PageLauncher>,
}

impl ScenarioRunner {
    /// Runner that launches headless Chromium per scenario
    pub fn new(config: HarnessConfig) -> Self {
        let launcher = Arc::new(ChromeLauncher::new(config.browser.clone()));
        Self { config, launcher }
    }

    /// Runner with a custom page source
    pub fn with_launcher(config: HarnessConfig, launcher: Arc<dyn PageLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run scenarios, at most `jobs` at a time. Results keep input order.
    pub async fn run_all(&self, specs: &[ScenarioSpec], jobs: usize) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let jobs = jobs.max(1);

        info!("Running {} scenario(s) with {} job(s)...", specs.len(), jobs);

        let results: Vec<ScenarioResult> = stream::iter(specs)
            .map(|spec| self.run_scenario(spec))
            .buffered(jobs)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = elapsed_ms(start);

        info!("");
        info!("Scenario results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteResult {
            started_at,
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run one scenario: main steps until the first failure, then every
    /// cleanup step, then close the browser on every path.
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let http = match HttpClient::new(
            self.config.timeouts.http(),
            self.config.browser.ignore_certificate_errors,
        ) {
            Ok(http) => http,
            Err(e) => {
                error!("✗ {} - {}", spec.name, e);
                return ScenarioResult::setup_failure(&spec.name, &e);
            }
        };

        let mut page = match self.launcher.launch().await {
            Ok(page) => page,
            Err(e) => {
                error!("✗ {} - browser launch failed: {}", spec.name, e);
                return ScenarioResult::setup_failure(&spec.name, &e);
            }
        };

        let outcome = self.drive(spec, page.as_ref(), &http).await;

        if let Err(e) = page.close().await {
            warn!("[{}] browser close failed: {}", spec.name, e);
        }

        let (steps, failure, setup_failed) = match outcome {
            Ok((steps, failure)) => (steps, failure, false),
            Err(e) => (vec![], Some(e), true),
        };

        let duration_ms = elapsed_ms(start);
        match &failure {
            None => info!("✓ {} ({} ms)", spec.name, duration_ms),
            Some(e) => error!("✗ {} - {}", spec.name, e),
        }

        ScenarioResult {
            name: spec.name.clone(),
            success: failure.is_none(),
            duration_ms,
            steps,
            error_kind: failure.as_ref().map(|e| e.kind().to_string()),
            error: failure.map(|e| e.to_string()),
            setup_failed,
        }
    }

    /// Returns the step log and the first failure, main or cleanup.
    async fn drive(
        &self,
        spec: &ScenarioSpec,
        page: &dyn BrowserPage,
        http: &HttpClient,
    ) -> E2eResult<(Vec<StepResult>, Option<E2eError>)> {
        let base_url = spec.base_url.as_deref().unwrap_or(&self.config.base_url);
        let mut executor = StepExecutor::new(&spec.name, page, http, &self.config, base_url, &spec.dir)?;

        let mut steps = Vec::new();
        let mut failure = None;

        for step in &spec.steps {
            let (result, err) = run_step(&mut executor, &spec.name, step, Phase::Main).await;
            steps.push(result);
            if let Some(e) = err {
                failure = Some(e);
                break; // Stop on first failure
            }
        }

        for step in &spec.cleanup {
            let (result, err) = run_step(&mut executor, &spec.name, step, Phase::Cleanup).await;
            steps.push(result);
            if let Some(e) = err {
                failure.get_or_insert(e);
            }
        }

        Ok((steps, failure))
    }

    /// Write suite results to `<output_dir>/results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn run_step(
    executor: &mut StepExecutor<'_>,
    scenario: &str,
    step: &ScenarioStep,
    phase: Phase,
) -> (StepResult, Option<E2eError>) {
    let start = Instant::now();
    let step_name = step.label();
    let outcome = executor.execute(step).await;
    let duration_ms = elapsed_ms(start);

    match outcome {
        Ok(outcome) => (
            StepResult {
                step_name,
                phase,
                success: true,
                skipped: outcome.skipped,
                duration_ms,
                error: None,
                error_kind: None,
                screenshot_path: outcome.screenshot_path,
                screenshot_sha256: outcome.screenshot_sha256,
            },
            None,
        ),
        Err(e) => {
            error!("[{}] step {} failed: {}", scenario, step_name, e);
            (
                StepResult {
                    step_name,
                    phase,
                    success: false,
                    skipped: false,
                    duration_ms,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind().to_string()),
                    screenshot_path: None,
                    screenshot_sha256: None,
                },
                Some(e),
            )
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
