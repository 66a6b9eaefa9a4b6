//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::http::HttpMethod;
use crate::wait::WaitState;

/// File name looked up in each scenario directory
pub const SCENARIO_FILE: &str = "scenario.yaml";

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Overrides the configured base URL for relative step URLs
    #[serde(default)]
    pub base_url: Option<String>,

    /// Main flow, executed in order until the first failure
    pub steps: Vec<ScenarioStep>,

    /// Always executed after the main flow, pass or fail
    #[serde(default)]
    pub cleanup: Vec<ScenarioStep>,

    /// Directory the scenario was loaded from; fixture paths resolve here
    #[serde(skip)]
    pub dir: PathBuf,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Navigate to a URL (absolute, or relative to the base URL)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
        #[serde(default)]
        expect_status: Option<u16>,
        #[serde(default)]
        expect_ok: bool,
    },

    /// Submit the login form with configured (or overridden) credentials
    Login {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        wait_for_navigation: bool,
    },

    /// Type text into an element
    Type {
        selector: String,
        text: String,
    },

    /// Wait for an element state
    Wait {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait for the current navigation to complete
    WaitForNavigation {
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fixed delay for flows with no readiness signal (use sparingly)
    Sleep {
        ms: u64,
        reason: String,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        exists: Option<bool>,
        #[serde(default)]
        visible: Option<bool>,
        /// Trimmed `textContent` equals
        #[serde(default)]
        text: Option<String>,
        /// Trimmed rendered `innerText` equals
        #[serde(default)]
        inner_text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
    },

    /// Click the selector and wait for navigation only if it is rendered
    ConfirmIfVisible {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Require a URL parameter and store it
    CaptureParameter {
        name: String,
        #[serde(default)]
        save_as: Option<String>,
    },

    /// Require a service ticket parameter and store it
    AssertTicket {
        #[serde(default = "default_ticket_parameter")]
        parameter: String,
        #[serde(default)]
        save_as: Option<String>,
    },

    /// Parse JSON from an element and store it
    CaptureJson {
        selector: String,
        save_as: String,
        #[serde(default)]
        html: bool,
    },

    /// Decode a compact token artifact into a claim set artifact
    DecodeToken {
        source: String,
        save_as: String,
    },

    /// Claim presence/absence over a claim set or JSON object artifact
    AssertClaims {
        source: String,
        #[serde(default)]
        present: Vec<String>,
        #[serde(default)]
        absent: Vec<String>,
    },

    /// Size of a JSON array, object or string artifact
    AssertJson {
        source: String,
        length: usize,
    },

    /// Direct HTTP call, outside the browser session
    Request {
        #[serde(default)]
        method: HttpMethod,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        body_file: Option<PathBuf>,
        #[serde(default)]
        save_as: Option<String>,
    },

    /// Streamed GET into a file under the system temp directory
    Export {
        url: String,
        path: PathBuf,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
        #[serde(default = "default_min_bytes")]
        min_bytes: u64,
    },

    /// Best-effort screenshot
    Screenshot {
        name: String,
    },

    /// Remove a scenario-local directory
    RemoveDir {
        path: PathBuf,
    },

    /// Log a message
    Log {
        message: String,
    },
}

fn default_ticket_parameter() -> String {
    "ticket".to_string()
}

fn default_expect_status() -> u16 {
    200
}

fn default_min_bytes() -> u64 {
    1
}

impl ScenarioStep {
    /// Short label used in logs and reports
    pub fn label(&self) -> String {
        match self {
            ScenarioStep::Navigate { url, .. } => format!("navigate:{}", url),
            ScenarioStep::Login { .. } => "login".to_string(),
            ScenarioStep::Click { selector, .. } => format!("click:{}", selector),
            ScenarioStep::Type { selector, .. } => format!("type:{}", selector),
            ScenarioStep::Wait { selector, .. } => format!("wait:{}", selector),
            ScenarioStep::WaitForNavigation { .. } => "wait_for_navigation".to_string(),
            ScenarioStep::Sleep { ms, .. } => format!("sleep:{}ms", ms),
            ScenarioStep::Assert { selector, .. } => format!("assert:{}", selector),
            ScenarioStep::ConfirmIfVisible { selector, .. } => format!("confirm_if_visible:{}", selector),
            ScenarioStep::CaptureParameter { name, .. } => format!("capture_parameter:{}", name),
            ScenarioStep::AssertTicket { parameter, .. } => format!("assert_ticket:{}", parameter),
            ScenarioStep::CaptureJson { selector, .. } => format!("capture_json:{}", selector),
            ScenarioStep::DecodeToken { source, .. } => format!("decode_token:{}", source),
            ScenarioStep::AssertClaims { source, .. } => format!("assert_claims:{}", source),
            ScenarioStep::AssertJson { source, .. } => format!("assert_json:{}", source),
            ScenarioStep::Request { method, url, .. } => format!("request:{} {}", method.as_str(), url),
            ScenarioStep::Export { url, .. } => format!("export:{}", url),
            ScenarioStep::Screenshot { name } => format!("screenshot:{}", name),
            ScenarioStep::RemoveDir { path } => format!("remove_dir:{}", path.display()),
            ScenarioStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl ScenarioSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file; its directory becomes the fixture root
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))?;
        spec.dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(spec)
    }

    /// Load every `scenario.yaml` below a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }

        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == SCENARIO_FILE)
        {
            specs.push(Self::from_file(entry.path())?);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = specs.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(E2eError::SpecParse(format!(
                "duplicate scenario name: {}",
                pair[0].name
            )));
        }
        Ok(specs)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", self.name)));
        }
        for step in self.steps.iter().chain(&self.cleanup) {
            match step {
                ScenarioStep::Request { body: Some(_), body_file: Some(_), .. } => {
                    return Err(E2eError::SpecParse(format!(
                        "{}: body and body_file are mutually exclusive",
                        step.label()
                    )));
                }
                ScenarioStep::Assert {
                    exists: None,
                    visible: None,
                    text: None,
                    inner_text: None,
                    text_contains: None,
                    ..
                } => {
                    return Err(E2eError::SpecParse(format!(
                        "{}: assert needs at least one expectation",
                        step.label()
                    )));
                }
                ScenarioStep::Sleep { reason, .. } if reason.trim().is_empty() => {
                    return Err(E2eError::SpecParse(format!(
                        "{}: a fixed delay must state its reason",
                        step.label()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consent_flow() {
        let yaml = r##"
name: consent-flow
description: Confirm attribute release
tags:
  - cas
  - consent
steps:
  - action: navigate
    url: /cas/login
  - action: login
  - action: assert
    selector: '#content h2'
    text: Attribute Consent
  - action: click
    selector: '#confirm'
    wait_for_navigation: true
  - action: assert_ticket
cleanup:
  - action: request
    method: DELETE
    url: /cas/actuator/attributeConsent/casuser
"##;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "consent-flow");
        assert_eq!(spec.steps.len(), 5);
        assert_eq!(spec.cleanup.len(), 1);
        match &spec.steps[4] {
            ScenarioStep::AssertTicket { parameter, save_as } => {
                assert_eq!(parameter, "ticket");
                assert!(save_as.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &spec.cleanup[0] {
            ScenarioStep::Request { method, expect_status, .. } => {
                assert_eq!(*method, HttpMethod::Delete);
                assert_eq!(*expect_status, 200);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_wait_defaults_to_visible() {
        let yaml = r##"
name: wait-default
steps:
  - action: wait
    selector: '#table_with_attributes'
"##;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        match &spec.steps[0] {
            ScenarioStep::Wait { state, timeout_ms, .. } => {
                assert_eq!(*state, WaitState::Visible);
                assert!(timeout_ms.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_parse_assert_json_and_inner_text() {
        let yaml = r##"
name: remaining-records
steps:
  - action: assert
    selector: '#content h2'
    inner_text: Application Not Authorized to Use CAS
cleanup:
  - action: assert_json
    source: remaining
    length: 0
"##;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert!(matches!(
            &spec.steps[0],
            ScenarioStep::Assert { inner_text: Some(t), text: None, .. } if t == "Application Not Authorized to Use CAS"
        ));
        assert_eq!(spec.cleanup[0].label(), "assert_json:remaining");
    }

    #[test]
    fn test_rejects_empty_assert() {
        let yaml = r##"
name: empty-assert
steps:
  - action: assert
    selector: '#content'
"##;
        assert!(matches!(ScenarioSpec::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_rejects_sleep_without_reason() {
        let yaml = r##"
name: bare-sleep
steps:
  - action: sleep
    ms: 1000
    reason: ""
"##;
        assert!(ScenarioSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_action() {
        let yaml = r##"
name: unknown
steps:
  - action: teleport
"##;
        assert!(matches!(ScenarioSpec::from_yaml(yaml), Err(E2eError::Yaml(_))));
    }

    #[test]
    fn test_load_all_sets_dir_and_sorts() {
        let root = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha"] {
            let dir = root.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join(SCENARIO_FILE),
                format!("name: {}\nsteps:\n  - action: log\n    message: hi\n", name),
            )
            .unwrap();
        }
        std::fs::write(root.path().join("notes.yaml"), "not: a scenario").unwrap();

        let specs = ScenarioSpec::load_all(root.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "alpha");
        assert_eq!(specs[0].dir, root.path().join("alpha"));
    }
}
