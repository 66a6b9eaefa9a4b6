//! Protocol artifacts captured during a scenario
//!
//! Values are immutable once stored. Later steps reference them with
//! `{{name}}` or `{{name.field.sub}}` placeholders.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    values: BTreeMap<String, Value>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an artifact. Re-capturing the same name is rejected.
    pub fn insert(&mut self, name: &str, value: Value) -> E2eResult<()> {
        if self.values.contains_key(name) {
            return Err(E2eError::SpecParse(format!(
                "artifact '{}' is already captured",
                name
            )));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolve a dotted path such as `token.id_token`.
    pub fn lookup(&self, path: &str) -> E2eResult<&Value> {
        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        let mut current = self
            .values
            .get(root)
            .ok_or_else(|| E2eError::MissingArtifact(path.to_string()))?;

        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part),
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| E2eError::MissingArtifact(path.to_string()))?;
        }
        Ok(current)
    }

    /// Resolve a path that must hold a string.
    pub fn lookup_str(&self, path: &str) -> E2eResult<&str> {
        match self.lookup(path)? {
            Value::String(s) => Ok(s),
            other => Err(E2eError::assertion(format!(
                "artifact '{}' is not a string: {}",
                path, other
            ))),
        }
    }

    /// Replace every `{{path}}` placeholder in `template`.
    pub fn interpolate(&self, template: &str) -> E2eResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                E2eError::SpecParse(format!("unterminated placeholder in '{}'", template))
            })?;
            let path = after[..end].trim();
            match self.lookup(path)? {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
