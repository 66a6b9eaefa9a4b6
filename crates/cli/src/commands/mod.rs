//! CLI Commands

pub mod decode;
pub mod list;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use authflow_e2e::{HarnessConfig, ScenarioSpec};
use clap::Args;

/// Where scenarios and configuration come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory holding `<name>/scenario.yaml` files
    #[arg(long, default_value = "scenarios", env = "AUTHFLOW_SCENARIOS")]
    pub scenarios: PathBuf,

    /// Only scenarios carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only scenarios with these names
    #[arg(long = "name")]
    pub names: Vec<String>,
}

impl SourceArgs {
    /// Load and filter scenarios
    pub fn load(&self) -> anyhow::Result<Vec<ScenarioSpec>> {
        let specs = ScenarioSpec::load_all(&self.scenarios)
            .with_context(|| format!("loading scenarios from {}", self.scenarios.display()))?;
        Ok(select(specs, self.tag.as_deref(), &self.names))
    }
}

/// Keep scenarios matching the tag and the name list (either may be empty)
pub fn select(specs: Vec<ScenarioSpec>, tag: Option<&str>, names: &[String]) -> Vec<ScenarioSpec> {
    specs
        .into_iter()
        .filter(|s| tag.map_or(true, |t| s.tags.iter().any(|x| x == t)))
        .filter(|s| names.is_empty() || names.contains(&s.name))
        .collect()
}

/// File values, or defaults when no file is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, tags: &[&str]) -> ScenarioSpec {
        let yaml = format!(
            "name: {}\ntags: [{}]\nsteps:\n  - action: log\n    message: hi\n",
            name,
            tags.join(", ")
        );
        ScenarioSpec::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_select_by_tag_and_name() {
        let specs = vec![
            spec("attribute-consent", &["cas", "consent"]),
            spec("oidc-authzcode-login", &["oidc"]),
            spec("saml2-idp-login-with-sso", &["saml2"]),
        ];

        let oidc = select(specs.clone(), Some("oidc"), &[]);
        assert_eq!(oidc.len(), 1);
        assert_eq!(oidc[0].name, "oidc-authzcode-login");

        let named = select(specs.clone(), None, &["saml2-idp-login-with-sso".to_string()]);
        assert_eq!(named.len(), 1);

        assert!(select(specs.clone(), Some("consent"), &["oidc-authzcode-login".to_string()]).is_empty());
        assert_eq!(select(specs, None, &[]).len(), 3);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("authflow.toml"))).unwrap();
        assert_eq!(config.base_url, "https://localhost:8443");
    }
}
