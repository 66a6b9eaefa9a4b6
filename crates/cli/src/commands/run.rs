//! `authflow run`: execute scenarios against a live server

use std::path::PathBuf;
use std::process::ExitCode;

use authflow_e2e::{HarnessConfig, ScenarioRunner, SuiteResult};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use super::SourceArgs;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Base URL of the server under test
    #[arg(long, env = "AUTHFLOW_BASE_URL")]
    pub base_url: Option<String>,

    /// Scenarios to run concurrently, each in its own browser
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chrome/Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Directory for results.json and screenshots
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// Flags win over file values
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_path = Some(path.clone());
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
            config.screenshot_dir = dir.join("screenshots");
        }
    }
}

#[derive(Serialize)]
struct ScenarioRow {
    name: String,
    status: &'static str,
    steps: usize,
    duration_ms: u64,
    error: String,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Steps", "Duration (ms)", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.status.to_string(),
            self.steps.to_string(),
            self.duration_ms.to_string(),
            self.error.clone(),
        ]
    }
}

fn rows(suite: &SuiteResult) -> Vec<ScenarioRow> {
    suite
        .results
        .iter()
        .map(|r| ScenarioRow {
            name: r.name.clone(),
            status: if r.success { "passed" } else { "failed" },
            steps: r.steps.len(),
            duration_ms: r.duration_ms,
            error: r.error.clone().unwrap_or_default(),
        })
        .collect()
}

/// 0 when every scenario passed, 1 on a scenario failure, 2 when a
/// scenario could not even start.
pub fn exit_code(suite: &SuiteResult) -> ExitCode {
    if suite.setup_failed() {
        ExitCode::from(2)
    } else if suite.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    args.apply(&mut config);
    config.validate()?;

    let specs = args.source.load()?;
    if specs.is_empty() {
        output::print_warning("No scenarios matched");
        return Ok(ExitCode::SUCCESS);
    }

    info!("Server under test: {}", config.base_url);
    let runner = ScenarioRunner::new(config);
    let suite = runner.run_all(&specs, args.jobs).await;

    if let Err(e) = runner.write_results(&suite) {
        warn!("Could not write results: {}", e);
    }

    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            output::print_list(&rows(&suite), format);
            if suite.success() {
                output::print_success(&format!("{} scenario(s) passed", suite.passed));
            } else {
                output::print_error(&format!("{} of {} scenario(s) failed", suite.failed, suite.total));
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_value(&suite, format),
    }

    Ok(exit_code(&suite))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_flags_override_config() {
        let parsed = Harness::parse_from([
            "authflow",
            "--base-url",
            "https://cas.example.org:8443",
            "--headed",
            "--output",
            "out",
            "--jobs",
            "3",
        ]);
        let mut config = HarnessConfig::default();
        parsed.run.apply(&mut config);

        assert_eq!(config.base_url, "https://cas.example.org:8443");
        assert!(!config.browser.headless);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.screenshot_dir, PathBuf::from("out/screenshots"));
        assert_eq!(parsed.run.jobs, 3);
    }
}
