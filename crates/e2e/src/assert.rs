//! Assertion primitives
//!
//! Every assertion fails fast with a message naming the selector or claim,
//! the expectation and the observed value.

use serde_json::Value;
use tracing::debug;

use crate::browser::BrowserPage;
use crate::dom;
use crate::error::{E2eError, E2eResult};
use crate::token::ClaimSet;

/// Trimmed `textContent` equals `expected`.
pub async fn text_equals(page: &dyn BrowserPage, selector: &str, expected: &str) -> E2eResult<()> {
    let actual = dom::text_content(page, selector).await?;
    let actual = actual.trim();
    if actual != expected {
        return Err(E2eError::assertion(format!(
            "text of {}: expected {:?}, got {:?}",
            selector, expected, actual
        )));
    }
    debug!("text of {} == {:?}", selector, expected);
    Ok(())
}

/// Trimmed rendered `innerText` equals `expected`; hidden descendants
/// do not count.
pub async fn inner_text_equals(page: &dyn BrowserPage, selector: &str, expected: &str) -> E2eResult<()> {
    let actual = dom::inner_text(page, selector).await?;
    let actual = actual.trim();
    if actual != expected {
        return Err(E2eError::assertion(format!(
            "rendered text of {}: expected {:?}, got {:?}",
            selector, expected, actual
        )));
    }
    Ok(())
}

/// Rendered text contains `expected`.
pub async fn text_contains(page: &dyn BrowserPage, selector: &str, expected: &str) -> E2eResult<()> {
    let actual = dom::inner_text(page, selector).await?;
    if !actual.contains(expected) {
        return Err(E2eError::assertion(format!(
            "text of {}: expected to contain {:?}, got {:?}",
            selector,
            expected,
            actual.trim()
        )));
    }
    debug!("text of {} contains {:?}", selector, expected);
    Ok(())
}

pub async fn visible(page: &dyn BrowserPage, selector: &str) -> E2eResult<()> {
    if !dom::is_visible(page, selector).await {
        return Err(E2eError::assertion(format!("{} is not visible", selector)));
    }
    Ok(())
}

pub async fn not_visible(page: &dyn BrowserPage, selector: &str) -> E2eResult<()> {
    if dom::is_visible(page, selector).await {
        return Err(E2eError::assertion(format!("{} is visible but should not be", selector)));
    }
    Ok(())
}

pub async fn element_exists(page: &dyn BrowserPage, selector: &str) -> E2eResult<()> {
    if !dom::element_exists(page, selector).await {
        return Err(E2eError::NotFound(selector.to_string()));
    }
    Ok(())
}

pub async fn element_absent(page: &dyn BrowserPage, selector: &str) -> E2eResult<()> {
    if dom::element_exists(page, selector).await {
        return Err(E2eError::assertion(format!("{} exists but should not", selector)));
    }
    Ok(())
}

/// The current URL carries a non-empty `name` parameter; returns its value.
pub async fn url_parameter(page: &dyn BrowserPage, name: &str) -> E2eResult<String> {
    match dom::query_parameter(page, name).await? {
        Some(value) if !value.is_empty() => {
            debug!("URL parameter {} = {}", name, value);
            Ok(value)
        }
        _ => {
            let url = page.current_url().await.unwrap_or_default();
            Err(E2eError::assertion(format!(
                "URL parameter '{}' missing from {}",
                name, url
            )))
        }
    }
}

/// Service tickets are issued as `ST-...`.
pub fn ticket_shape(ticket: &str) -> E2eResult<()> {
    if ticket.starts_with("ST-") && ticket.len() > 3 {
        Ok(())
    } else {
        Err(E2eError::assertion(format!(
            "ticket {:?} is not a service ticket (expected ST- prefix)",
            ticket
        )))
    }
}

pub fn claim_present(claims: &ClaimSet, name: &str) -> E2eResult<()> {
    if !claims.is_present(name) {
        return Err(E2eError::assertion(format!(
            "claim '{}' must be present; claims: [{}]",
            name,
            claims.names().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}

/// A released claim that was not requested is an information leak and
/// fails exactly like a missing one.
pub fn claim_absent(claims: &ClaimSet, name: &str) -> E2eResult<()> {
    if !claims.is_absent(name) {
        let value = claims.get(name).cloned().unwrap_or(Value::Null);
        return Err(E2eError::assertion(format!(
            "claim '{}' must be absent but was released with value {}",
            name, value
        )));
    }
    Ok(())
}

/// Element count of an array or object, or char count of a string.
pub fn json_length(name: &str, value: &Value, expected: usize) -> E2eResult<()> {
    let actual = match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(E2eError::assertion(format!(
                "'{}' has no length: {}",
                name, other
            )))
        }
    };
    if actual != expected {
        return Err(E2eError::assertion(format!(
            "'{}': expected length {}, got {}: {}",
            name, expected, actual, value
        )));
    }
    Ok(())
}

/// Check both lists; stops at the first violation.
pub fn claims(claims: &ClaimSet, present: &[String], absent: &[String]) -> E2eResult<()> {
    for name in present {
        claim_present(claims, name)?;
    }
    for name in absent {
        claim_absent(claims, name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_token_claims() -> ClaimSet {
        ClaimSet::from_value(json!({
            "sub": "casuser",
            "client_id": "client",
            "preferred_username": "casuser",
            "cn": "CAS",
            "family_name": "User",
            "name": "CAS User"
        }))
        .unwrap()
    }

    #[test]
    fn test_presence_and_absence_hold() {
        let present: Vec<String> = ["sub", "client_id", "preferred_username", "cn", "family_name", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let absent: Vec<String> = ["identity-name", "common-name", "lastname"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        claims(&id_token_claims(), &present, &absent).unwrap();
    }

    #[test]
    fn test_leaked_claim_fails_like_missing_claim() {
        let leaked = ClaimSet::from_value(json!({ "sub": "casuser", "lastname": "User" })).unwrap();
        let leak = claim_absent(&leaked, "lastname").unwrap_err();
        let missing = claim_present(&leaked, "family_name").unwrap_err();
        assert_eq!(leak.kind(), missing.kind());
        assert!(leak.to_string().contains("\"User\""));
        assert!(missing.to_string().contains("family_name"));
    }

    #[test]
    fn test_json_length() {
        assert!(json_length("remaining", &json!([]), 0).is_ok());
        let err = json_length("remaining", &json!([{ "id": 1, "principal": "casuser" }]), 0).unwrap_err();
        assert_eq!(err.kind(), "assertion_failure");
        assert!(err.to_string().contains("casuser"));
        assert!(json_length("token", &json!({ "a": 1, "b": 2 }), 2).is_ok());
        assert!(json_length("expires_in", &json!(28800), 0).is_err());
    }

    #[test]
    fn test_ticket_shape() {
        assert!(ticket_shape("ST-1-abcdefg-cas").is_ok());
        assert!(ticket_shape("TGT-1-abc").is_err());
        assert!(ticket_shape("ST-").is_err());
    }
}
