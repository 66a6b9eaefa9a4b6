//! Authflow protocol conformance harness
//!
//! Drives a real browser through CAS login, OIDC authorization-code,
//! SAML2 unsolicited SSO and attribute-consent flows, and checks the
//! protocol artifacts they produce (tickets, codes, tokens, claims).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  per scenario:                                              │
//! │    ├── PageLauncher::launch() -> Box<dyn BrowserPage>       │
//! │    ├── HttpClient (TLS verification off)                    │
//! │    ├── StepExecutor: steps until first failure              │
//! │    ├── StepExecutor: every cleanup step                     │
//! │    └── BrowserPage::close()  (always)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML)                                        │
//! │    ├── name, description, tags                              │
//! │    ├── steps: [ScenarioStep]                                │
//! │    │     ├── navigate / login / click / wait / assert       │
//! │    │     ├── confirm_if_visible / assert_ticket             │
//! │    │     ├── capture_parameter / capture_json               │
//! │    │     ├── decode_token / assert_claims / assert_json     │
//! │    │     └── request / export / screenshot                  │
//! │    └── cleanup: [ScenarioStep]                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod assert;
pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod executor;
pub mod http;
pub mod runner;
pub mod spec;
pub mod token;
pub mod wait;

pub use browser::{
    BrowserPage, ChromeSession, DocumentState, DomProperty, NavigationResponse, Visibility,
};
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use runner::{PageLauncher, ScenarioResult, ScenarioRunner, StepResult, SuiteResult};
pub use spec::{ScenarioSpec, ScenarioStep};
pub use token::ClaimSet;
