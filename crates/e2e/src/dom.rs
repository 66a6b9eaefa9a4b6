//! Point-in-time reads of page state
//!
//! Callers are responsible for waiting for stability first (see [`crate::wait`]).

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::browser::{BrowserPage, DomProperty, Visibility};
use crate::error::{E2eError, E2eResult};

async fn read_required(page: &dyn BrowserPage, selector: &str, property: DomProperty) -> E2eResult<String> {
    page.read(selector, property)
        .await?
        .ok_or_else(|| E2eError::NotFound(selector.to_string()))
}

/// `textContent` of the first match
pub async fn text_content(page: &dyn BrowserPage, selector: &str) -> E2eResult<String> {
    read_required(page, selector, DomProperty::TextContent).await
}

/// Rendered `innerText` of the first match
pub async fn inner_text(page: &dyn BrowserPage, selector: &str) -> E2eResult<String> {
    read_required(page, selector, DomProperty::InnerText).await
}

pub async fn inner_html(page: &dyn BrowserPage, selector: &str) -> E2eResult<String> {
    read_required(page, selector, DomProperty::InnerHtml).await
}

async fn visibility(page: &dyn BrowserPage, selector: &str) -> Visibility {
    match page.visibility(selector).await {
        Ok(v) => v,
        Err(e) => {
            debug!("visibility check for {} failed: {}", selector, e);
            Visibility::Absent
        }
    }
}

/// Whether the selector matches an attached element. Never fails.
pub async fn element_exists(page: &dyn BrowserPage, selector: &str) -> bool {
    visibility(page, selector).await != Visibility::Absent
}

/// Whether the first match is rendered. Never fails; absence means false.
pub async fn is_visible(page: &dyn BrowserPage, selector: &str) -> bool {
    visibility(page, selector).await == Visibility::Visible
}

/// Read a parameter from the current page URL.
pub async fn query_parameter(page: &dyn BrowserPage, name: &str) -> E2eResult<Option<String>> {
    let current = page.current_url().await?;
    parameter_from_url(&current, name)
}

/// Query string first, then the fragment (implicit/hybrid responses put
/// artifacts there).
pub fn parameter_from_url(raw: &str, name: &str) -> E2eResult<Option<String>> {
    let url = Url::parse(raw)?;

    if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == name) {
        return Ok(Some(value.into_owned()));
    }

    let from_fragment = url.fragment().and_then(|fragment| {
        url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    });
    Ok(from_fragment)
}

/// Parse JSON out of an element's text (or inner HTML when `html` is set).
pub async fn json_from_element(page: &dyn BrowserPage, selector: &str, html: bool) -> E2eResult<Value> {
    let raw = if html {
        inner_html(page, selector).await?
    } else {
        text_content(page, selector).await?
    };
    serde_json::from_str(raw.trim())
        .map_err(|e| E2eError::assertion(format!("content of {} is not JSON: {}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameter_from_query_string() {
        let url = "https://apereo.github.io/?code=OC-1-abc&state=1735fd6c43c14";
        assert_eq!(
            parameter_from_url(url, "code").unwrap().as_deref(),
            Some("OC-1-abc")
        );
        assert_eq!(parameter_from_url(url, "ticket").unwrap(), None);
    }

    #[test]
    fn test_query_parameter_from_fragment() {
        let url = "https://apereo.github.io/#access_token=AT-1&token_type=bearer";
        assert_eq!(
            parameter_from_url(url, "access_token").unwrap().as_deref(),
            Some("AT-1")
        );
    }

    #[test]
    fn test_query_parameter_is_percent_decoded() {
        let url = "https://example.org/?service=https%3A%2F%2Fexample.org&ticket=ST-1";
        assert_eq!(
            parameter_from_url(url, "service").unwrap().as_deref(),
            Some("https://example.org")
        );
    }

    #[test]
    fn test_unparsable_url_is_an_error() {
        assert!(parameter_from_url("about blank", "code").is_err());
    }
}
