use super::assertions;
use crate::config::Step;
use crate::elements::Locator;
use crate::fixture;
use crate::harness::{self, Submission, SubmitOptions};
use crate::{Error, Result};
use eoka::Page;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Slack left between a step's own bound and the case bound.
const BOUND_MARGIN_MS: u64 = 1_000;

/// Bound for a wait inside a case with `remaining_ms` left. Always below
/// `remaining_ms`, so the wait fails with its own diagnostics first.
pub fn inner_bound(remaining_ms: u64) -> u64 {
    if remaining_ms > 2 * BOUND_MARGIN_MS {
        remaining_ms - BOUND_MARGIN_MS
    } else {
        (remaining_ms / 2).max(1)
    }
}

/// Per-case state threaded through the steps.
pub struct CaseState {
    deadline: Instant,
    /// Last captured submission.
    pub submission: Option<Submission>,
}

impl CaseState {
    /// Starts the case clock.
    pub fn new(case_timeout_ms: u64) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_millis(case_timeout_ms),
            submission: None,
        }
    }

    /// Bound for the next wait, taken from what is left of the case.
    pub fn budget_ms(&self) -> u64 {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        inner_bound(remaining.as_millis() as u64)
    }

    fn submission(&self, step: &str) -> Result<&Submission> {
        self.submission
            .as_ref()
            .ok_or_else(|| Error::ActionFailed(format!("{} before any submit", step)))
    }
}

/// Execute a single step on the page.
pub async fn execute(page: &Page, step: &Step, state: &mut CaseState) -> Result<()> {
    match step {
        Step::Goto(s) => {
            info!("goto: {}", s.url);
            page.goto(&s.url).await?;
        }
        Step::Reload => {
            debug!("reload");
            page.reload().await?;
        }
        Step::Wait(s) => {
            debug!("wait: {}ms", s.ms);
            page.wait(s.ms).await;
        }
        Step::WaitForVisible(s) => {
            debug!("wait_for_visible: {}", s.selector);
            Locator::new(page, &s.selector).wait_visible(s.timeout_ms).await?;
        }
        Step::WaitForUrl(s) => {
            debug!("wait_for_url: contains '{}'", s.contains);
            page.wait_for_url_contains(&s.contains, s.timeout_ms)
                .await
                .map_err(|e| {
                    Error::Timeout(format!(
                        "url never contained '{}' within {}ms: {}",
                        s.contains, s.timeout_ms, e
                    ))
                })?;
        }
        Step::Fill(s) => {
            info!("fill: {} = '{}'", s.selector, s.value);
            Locator::new(page, &s.selector).fill(&s.value).await?;
        }
        Step::Check(s) => {
            debug!("check: {}", s.selector);
            Locator::new(page, &s.selector).check().await?;
        }
        Step::Uncheck(s) => {
            debug!("uncheck: {}", s.selector);
            Locator::new(page, &s.selector).uncheck().await?;
        }
        Step::Select(s) => {
            info!("select: {} = '{}'", s.selector, s.value);
            Locator::new(page, &s.selector).select_option(&s.value).await?;
        }
        Step::Click(s) => {
            info!("click: {}", s.selector);
            Locator::new(page, &s.selector).click().await?;
        }
        Step::FillForm(s) => {
            fixture::fill_fixture(page, &s.form, &s.fields).await?;
        }
        Step::Autofill(s) => {
            fixture::autofill(page, &s.form).await?;
        }
        Step::Submit(s) => {
            let budget = state.budget_ms();
            let bound = s.timeout_ms.map_or(budget, |t| t.min(budget));
            let mut opts = SubmitOptions::post(&s.target).timeout_ms(bound);
            opts.method = s.method.to_uppercase();
            if !s.response {
                opts = opts.request_only();
            }
            let trigger = Locator::new(page, &s.selector);
            let submission = harness::submit(page, &trigger, &opts).await?;
            info!(
                "submitted: {} {} -> {}",
                submission.request.method, submission.request.url, submission.url
            );
            state.submission = Some(submission);
        }
        Step::SubmitBlocked(s) => {
            let trigger = Locator::new(page, &s.selector);
            harness::submit_expect_blocked(page, &trigger, s.settle_ms).await?;
        }
        Step::ExpectUrl(s) => {
            let url = page.url().await?;
            debug!("expect_url: {}", url);
            assertions::check_url(&url, s)?;
        }
        Step::ExpectAttribute(s) => {
            debug!("expect_attribute: {} [{}]", s.selector, s.name);
            let actual = Locator::new(page, &s.selector).attribute(&s.name).await?;
            assertions::check_attribute(&s.selector, &s.name, actual.as_deref(), s.value.as_deref())?;
        }
        Step::ExpectValidity(s) => {
            let valid = Locator::new(page, &s.selector).is_valid().await?;
            debug!("expect_validity: {} valid={}", s.selector, valid);
            if valid != s.valid {
                return Err(Error::AssertionFailed {
                    subject: format!("validity of '{}'", s.selector),
                    expected: (if s.valid { "valid" } else { "invalid" }).into(),
                    actual: (if valid { "valid" } else { "invalid" }).into(),
                });
            }
        }
        Step::ExpectValue(s) => {
            let value = Locator::new(page, &s.selector).input_value().await?;
            debug!("expect_value: {} = '{}'", s.selector, value);
            if value != s.equals {
                return Err(Error::AssertionFailed {
                    subject: format!("value of '{}'", s.selector),
                    expected: format!("{:?}", s.equals),
                    actual: format!("{:?}", value),
                });
            }
        }
        Step::ExpectVisible(s) => {
            let visible = Locator::new(page, &s.selector).is_visible().await?;
            debug!("expect_visible: {} visible={}", s.selector, visible);
            if visible != s.visible {
                return Err(Error::AssertionFailed {
                    subject: format!("visibility of '{}'", s.selector),
                    expected: (if s.visible { "visible" } else { "hidden" }).into(),
                    actual: (if visible { "visible" } else { "hidden" }).into(),
                });
            }
        }
        Step::ExpectPayload(s) => {
            let canonical = state.submission(step.name())?.canonical()?;
            debug!("expect_payload: {}", canonical);
            assertions::check_payload("payload", &canonical, s)?;
        }
        Step::ExpectBody(s) => {
            let body = state.submission(step.name())?.body();
            debug!("expect_body: {:?}", body.pairs());
            assertions::check_payload("request body", &body.to_canonical(), s)?;
        }
        Step::Log(s) => {
            info!("[log] {}", s.message);
        }
        Step::Screenshot(s) => {
            info!("screenshot: {}", s.path);
            let data = page.screenshot().await?;
            std::fs::write(&s.path, data)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_bound_leaves_margin() {
        assert_eq!(inner_bound(30_000), 29_000);
        assert_eq!(inner_bound(2_001), 1_001);
        assert_eq!(inner_bound(2_000), 1_000);
        assert_eq!(inner_bound(600), 300);
        assert_eq!(inner_bound(1), 1);
        assert_eq!(inner_bound(0), 1);
    }

    #[test]
    fn test_budget_is_below_case_bound() {
        let state = CaseState::new(30_000);
        let budget = state.budget_ms();
        assert!(budget < 30_000, "{}", budget);
        assert!(budget > 28_000, "{}", budget);
    }

    #[test]
    fn test_expectation_before_submit_is_an_error() {
        let state = CaseState::new(1_000);
        let err = state.submission("expect_body").unwrap_err();
        assert!(err.to_string().contains("expect_body before any submit"), "{}", err);
    }
}
