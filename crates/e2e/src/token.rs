//! Compact token decoding into claim sets
//!
//! Signatures are never verified. The harness only runs against local test
//! instances and inspects what the server chose to release.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{E2eError, E2eResult};

/// Claims decoded from an ID token or returned by a profile endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: BTreeMap<String, Value>,
}

impl ClaimSet {
    /// Build a claim set from a JSON object. Anything else is a decode error.
    pub fn from_value(value: Value) -> E2eResult<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                claims: map.into_iter().collect(),
            }),
            other => Err(E2eError::DecodeError(format!(
                "expected a JSON object of claims, got {}",
                json_type(&other)
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Present means the key exists with a non-null value.
    pub fn is_present(&self, name: &str) -> bool {
        matches!(self.claims.get(name), Some(v) if !v.is_null())
    }

    /// Absent means the key is not in the mapping at all.
    pub fn is_absent(&self, name: &str) -> bool {
        !self.claims.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.claims.clone().into_iter().collect())
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode(token: &str) -> E2eResult<ClaimSet> {
    let token = token.trim();
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(E2eError::DecodeError(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(E2eError::DecodeError("empty payload segment".to_string()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| E2eError::DecodeError(format!("payload is not base64url: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| E2eError::DecodeError(format!("payload is not JSON: {}", e)))?;

    ClaimSet::from_value(value)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
