//! # formcheck
//!
//! Browser-driven form submission checks. Fill a form, submit it, and assert
//! on where the page landed, what the server echoed back, or the raw request
//! body the browser sent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formcheck::{Runner, Suite};
//!
//! # #[tokio::main]
//! # async fn main() -> formcheck::Result<()> {
//! let suite = Suite::load("suites/httpbin_form.yaml")?;
//! let runner = Runner::new(&suite.browser).await?;
//! let report = runner.run(&suite).await;
//! println!("{} passed, {} failed", report.passed(), report.failed());
//! runner.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The harness can also be driven directly:
//!
//! ```rust,no_run
//! use formcheck::elements::PizzaOrderElements;
//! use formcheck::harness::{self, SubmitOptions};
//!
//! # async fn demo(page: &eoka::Page) -> formcheck::Result<()> {
//! let form = PizzaOrderElements::new(page);
//! form.customer_name().fill("Gabriel Tester").await?;
//! form.topping("bacon").check().await?;
//! let submission = harness::submit(page, &form.submit(), &SubmitOptions::post("/post")).await?;
//! assert_eq!(submission.canonical()?.get("topping").unwrap(), &["bacon".to_string()]);
//! # Ok(())
//! # }
//! ```

mod config;
pub mod elements;
pub mod fixture;
pub mod harness;
pub mod payload;
mod runner;

pub use config::{
    BrowserConfig, Case, OnFailure, ParamDef, Params, PayloadExpectation, Step, Suite, Viewport,
};
pub use fixture::FormFixture;
pub use harness::{CapturedRequest, Submission, SubmitOptions};
pub use payload::{normalize, CanonicalPayload, EchoedPayload, FieldValue, FormBody};
pub use runner::{
    check_attribute, check_payload, check_url, CasePage, CaseReport, Runner, SuiteReport,
};

/// Result type for formcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading suites or checking a form.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("assertion failed: {subject}\n  expected: {expected}\n    actual: {actual}")]
    AssertionFailed {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("step {index} ({name}): {source}")]
    Step {
        index: usize,
        name: &'static str,
        #[source]
        source: Box<Error>,
    },
}
