mod assertions;
mod executor;

pub use assertions::{check_attribute, check_payload, check_url};

use crate::config::{BrowserConfig, Case, Suite};
use crate::elements::Locator;
use crate::fixture;
use crate::{Error, Result};
use eoka::{Browser, Page};
use executor::CaseState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of one case.
#[derive(Debug)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    /// Failure diagnostics.
    pub error: Option<String>,
    /// Steps that completed.
    pub steps_executed: usize,
    pub duration_ms: u64,
}

/// Outcome of a suite.
#[derive(Debug)]
pub struct SuiteReport {
    pub suite: String,
    pub cases: Vec<CaseReport>,
    pub duration_ms: u64,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// A tab owned by one case.
///
/// [`CasePage::release`] closes it in place. A `CasePage` dropped without
/// being released (a cancelled case future) closes its tab from a spawned task.
pub struct CasePage {
    browser: Arc<Browser>,
    page: Page,
    target_id: String,
    released: bool,
}

impl CasePage {
    pub async fn open(browser: Arc<Browser>) -> Result<CasePage> {
        let page = browser.new_page("about:blank").await?;
        let target_id = page.target_id().to_string();
        Ok(Self {
            browser,
            page,
            target_id,
            released: false,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.browser.close_tab(&self.target_id).await {
            warn!("Failed to close tab {}: {}", self.target_id, e);
        }
    }
}

impl Drop for CasePage {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Tab {} leaked: no runtime to close it", self.target_id);
            return;
        };
        debug!("Closing abandoned tab {}", self.target_id);
        let browser = Arc::clone(&self.browser);
        let id = std::mem::take(&mut self.target_id);
        handle.spawn(async move {
            if let Err(e) = browser.close_tab(&id).await {
                warn!("Failed to close tab {}: {}", id, e);
            }
        });
    }
}

/// Executes suites. Each case gets its own tab in one browser process.
pub struct Runner {
    browser: Arc<Browser>,
    /// Keeps the browser alive once every case tab is closed.
    anchor: Page,
}

impl Runner {
    /// Launch the browser.
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let anchor = browser.new_page("about:blank").await?;

        Ok(Self {
            browser: Arc::new(browser),
            anchor,
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Run every case of a suite.
    pub async fn run(&self, suite: &Suite) -> SuiteReport {
        self.run_filtered(suite, None).await
    }

    /// Run the cases whose name contains `filter`.
    pub async fn run_filtered(&self, suite: &Suite, filter: Option<&str>) -> SuiteReport {
        let start = Instant::now();
        info!("Suite: {}", suite.name);
        let mut cases = Vec::new();
        for case in suite.selected(filter) {
            cases.push(self.run_case(suite, case).await);
        }
        SuiteReport {
            suite: suite.name.clone(),
            cases,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Run one case in a fresh tab. Failures end up in the report, never retried.
    pub async fn run_case(&self, suite: &Suite, case: &Case) -> CaseReport {
        let start = Instant::now();
        info!("Case: {}", case.name);

        let case_page = match CasePage::open(Arc::clone(&self.browser)).await {
            Ok(p) => p,
            Err(e) => {
                return CaseReport {
                    name: case.name.clone(),
                    passed: false,
                    error: Some(e.to_string()),
                    steps_executed: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        };

        let mut steps_executed = 0;
        let bound = Duration::from_millis(suite.timeout_ms);
        let outcome = tokio::time::timeout(
            bound,
            run_steps(case_page.page(), suite, case, &mut steps_executed),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout(format!(
                "case exceeded {}ms",
                suite.timeout_ms
            )))
        });

        if let Err(ref e) = outcome {
            warn!("Case '{}' failed: {}", case.name, e);
            save_failure_screenshot(case_page.page(), suite, case).await;
        }
        case_page.release().await;

        CaseReport {
            name: case.name.clone(),
            passed: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            steps_executed,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Close the browser. Waits briefly for abandoned tabs to finish closing.
    pub async fn close(self) -> Result<()> {
        let Runner { mut browser, anchor } = self;
        drop(anchor);
        for _ in 0..50 {
            match Arc::try_unwrap(browser) {
                Ok(b) => {
                    b.close().await?;
                    return Ok(());
                }
                Err(shared) => {
                    browser = shared;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
        }
        Err(Error::ActionFailed(
            "browser still in use by a closing tab".into(),
        ))
    }
}

async fn run_steps(page: &Page, suite: &Suite, case: &Case, executed: &mut usize) -> Result<()> {
    let mut state = CaseState::new(suite.timeout_ms);

    info!("Navigating to: {}", suite.start_url);
    page.goto(&suite.start_url).await?;

    if let Some(ref ready) = suite.ready {
        Locator::new(page, ready.as_str())
            .wait_visible(state.budget_ms())
            .await?;
    }

    if let Some(ref fixture) = case.fixture {
        fixture::fill_fixture(page, &suite.form, fixture).await?;
    }

    for (i, step) in case.steps.iter().enumerate() {
        debug!("Executing step {}: {}", i + 1, step.name());
        executor::execute(page, step, &mut state)
            .await
            .map_err(|e| step_error(i + 1, step.name(), e))?;
        *executed += 1;
    }
    Ok(())
}

fn step_error(index: usize, name: &'static str, e: Error) -> Error {
    Error::Step {
        index,
        name,
        source: Box::new(e),
    }
}

fn screenshot_path(template: &str, case: &str) -> String {
    let slug: String = case
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    template
        .replace("{case}", slug.trim_matches('-'))
        .replace("{timestamp}", &chrono::Local::now().format("%Y%m%d-%H%M%S").to_string())
}

async fn save_failure_screenshot(page: &Page, suite: &Suite, case: &Case) {
    let Some(template) = suite.on_failure.as_ref().and_then(|f| f.screenshot.as_deref()) else {
        return;
    };
    let path = screenshot_path(template, &case.name);
    info!("Saving failure screenshot to: {}", path);
    match page.screenshot().await {
        Ok(data) => {
            if let Err(e) = std::fs::write(&path, data) {
                warn!("Failed to save screenshot: {}", e);
            }
        }
        Err(e) => warn!("Failed to take screenshot: {}", e),
    }
}
