//! Form submission capture.
//!
//! The request matcher is installed in the page before the submit control is
//! clicked; then the request matcher, the navigation matcher, the response
//! matcher and the click run together and are joined. Nothing is returned
//! until all of them resolved, or the bound elapsed.

use crate::elements::{js_str, Locator};
use crate::payload::{normalize, CanonicalPayload, EchoedPayload, FormBody};
use crate::{Error, Result};
use eoka::Page;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Tab-scoped storage key for the captured submission.
const CAPTURE_KEY: &str = "__formcheck_submission";

fn default_poll_ms() -> u64 {
    50
}

/// What to wait for after clicking the submit control.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Substring the form action URL and the landing URL must contain.
    pub target_path: String,
    /// Upper-case HTTP method to match, or `*` for any.
    pub method: String,
    /// Wait for the page to land on the target and read the response document.
    pub navigation: bool,
    pub timeout_ms: u64,
    pub poll_ms: u64,
}

impl SubmitOptions {
    /// POST to `target_path`, waiting for the response document.
    pub fn post(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            method: "POST".into(),
            navigation: true,
            timeout_ms: 15_000,
            poll_ms: default_poll_ms(),
        }
    }

    /// Only capture the outgoing request.
    pub fn request_only(mut self) -> Self {
        self.navigation = false;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// The outgoing form submission as the page built it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    pub method: String,
    /// `application/x-www-form-urlencoded` body.
    pub body: String,
}

/// Result of a captured submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub origin_url: String,
    /// Page URL once every matcher resolved.
    pub url: String,
    pub request: CapturedRequest,
    /// Text of the response document; `None` for request-only captures.
    pub response_text: Option<String>,
}

impl Submission {
    pub fn response_json(&self) -> Result<serde_json::Value> {
        let text = self.response_text.as_deref().ok_or_else(|| {
            Error::ActionFailed("submission was captured without waiting for a response".into())
        })?;
        Ok(serde_json::from_str(text.trim())?)
    }

    /// The echoed `form` object.
    pub fn echoed(&self) -> Result<EchoedPayload> {
        EchoedPayload::from_response(&self.response_json()?)
    }

    pub fn canonical(&self) -> Result<CanonicalPayload> {
        Ok(normalize(&self.echoed()?))
    }

    pub fn body(&self) -> FormBody {
        FormBody::parse(&self.request.body)
    }
}

/// Whether the page moved from `origin` to a URL containing `target`.
pub fn navigated(origin: &str, current: &str, target: &str) -> bool {
    current != origin && current.contains(target)
}

fn install_js(target: &str, method: &str) -> String {
    format!(
        r#"(() => {{
            const KEY = {key};
            const target = {target};
            const method = {method};
            try {{ sessionStorage.removeItem(KEY); }} catch (e) {{}}
            window.__formcheckSubmission = null;
            if (window.__formcheckListener) document.removeEventListener('submit', window.__formcheckListener, true);
            window.__formcheckListener = (ev) => {{
                const form = ev.target;
                if (!(form instanceof HTMLFormElement)) return;
                const submitter = ev.submitter || null;
                const action = (submitter && submitter.hasAttribute('formaction') ? submitter.formAction : form.action) || location.href;
                const m = ((submitter && submitter.getAttribute('formmethod')) || form.method || 'get').toUpperCase();
                if (method !== '*' && m !== method) return;
                if (!action.includes(target)) return;
                const body = new URLSearchParams(new FormData(form, submitter)).toString();
                const record = JSON.stringify({{ url: action, method: m, body }});
                window.__formcheckSubmission = record;
                try {{ sessionStorage.setItem(KEY, record); }} catch (e) {{}}
            }};
            document.addEventListener('submit', window.__formcheckListener, true);
            return true;
        }})()"#,
        key = js_str(CAPTURE_KEY),
        target = js_str(target),
        method = js_str(method)
    )
}

fn capture_js() -> String {
    format!(
        r#"(() => {{
            let raw = window.__formcheckSubmission || null;
            if (!raw) {{ try {{ raw = sessionStorage.getItem({key}); }} catch (e) {{}} }}
            return raw;
        }})()"#,
        key = js_str(CAPTURE_KEY)
    )
}

fn response_js(origin: &str, target: &str) -> String {
    format!(
        r#"(() => {{
            if (document.readyState !== 'complete') return null;
            if (location.href === {origin} || !location.href.includes({target})) return null;
            let raw = null;
            try {{ raw = sessionStorage.getItem({key}); }} catch (e) {{}}
            if (!raw) return null;
            const pre = document.querySelector('body > pre');
            return pre ? pre.textContent : (document.body ? document.body.innerText : '');
        }})()"#,
        origin = js_str(origin),
        target = js_str(target),
        key = js_str(CAPTURE_KEY)
    )
}

/// Register the request matcher. Must run before the submit control is triggered.
async fn install_matcher(page: &Page, target: &str, method: &str) -> Result<()> {
    let _: bool = page.evaluate(&install_js(target, method)).await?;
    Ok(())
}

async fn read_capture(page: &Page) -> Result<Option<CapturedRequest>> {
    let raw: Option<String> = page.evaluate(&capture_js()).await?;
    raw.map(|r| serde_json::from_str(&r).map_err(Error::from))
        .transpose()
}

/// A failed poll counts as "not yet". The error is logged so a later
/// timeout can be traced back to it.
fn poll_result<T>(matcher: &str, result: Result<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("{}: {}", matcher, e);
            None
        }
    }
}

/// Poll `check` until it yields a value. Bounded by the caller's timeout.
async fn poll_until<T, F, Fut>(poll_ms: u64, done: &AtomicBool, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    loop {
        if let Some(v) = check().await {
            done.store(true, Ordering::Relaxed);
            return v;
        }
        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
    }
}

/// Click `trigger` and capture the resulting submission.
pub async fn submit(page: &Page, trigger: &Locator<'_>, opts: &SubmitOptions) -> Result<Submission> {
    let origin_url = page.url().await?;
    info!(
        "submit: {} -> {} {}",
        trigger.selector(),
        opts.method,
        opts.target_path
    );
    install_matcher(page, &opts.target_path, &opts.method).await?;

    let origin = origin_url.as_str();
    let target = opts.target_path.as_str();
    let request_done = AtomicBool::new(false);
    let navigation_done = AtomicBool::new(!opts.navigation);
    let response_done = AtomicBool::new(!opts.navigation);

    let request = async {
        Ok::<_, Error>(
            poll_until(opts.poll_ms, &request_done, move || async move {
                poll_result("request matcher", read_capture(page).await)
            })
            .await,
        )
    };

    let navigation = async {
        if !opts.navigation {
            return Ok::<_, Error>(None);
        }
        let url = poll_until(opts.poll_ms, &navigation_done, move || async move {
            let url = page.url().await.map_err(Error::from);
            poll_result("navigation matcher", url.map(Some))
                .filter(|url| navigated(origin, url, target))
        })
        .await;
        Ok(Some(url))
    };

    let response_script = response_js(&origin_url, &opts.target_path);
    let script = response_script.as_str();
    let response = async {
        if !opts.navigation {
            return Ok::<_, Error>(None);
        }
        let text = poll_until(opts.poll_ms, &response_done, move || async move {
            let text: eoka::Result<Option<String>> = page.evaluate(script).await;
            poll_result("response matcher", text.map_err(Error::from))
        })
        .await;
        Ok(Some(text))
    };

    let joined = tokio::time::timeout(Duration::from_millis(opts.timeout_ms), async {
        tokio::try_join!(request, navigation, response, trigger.click())
    })
    .await;

    let (request, landed, response_text, ()) = match joined {
        Ok(result) => result?,
        Err(_) => {
            let pending: Vec<&str> = [
                (&request_done, "request"),
                (&navigation_done, "navigation"),
                (&response_done, "response"),
            ]
            .into_iter()
            .filter(|(done, _)| !done.load(Ordering::Relaxed))
            .map(|(_, name)| name)
            .collect();
            return Err(Error::Timeout(format!(
                "no {} matching {} '{}' within {}ms",
                pending.join("/"),
                opts.method,
                opts.target_path,
                opts.timeout_ms
            )));
        }
    };

    let url = match landed {
        Some(url) => url,
        None => page.url().await.unwrap_or_else(|_| origin_url.clone()),
    };
    debug!(
        "captured {} {} ({} bytes body)",
        request.method,
        request.url,
        request.body.len()
    );

    Ok(Submission {
        origin_url,
        url,
        request,
        response_text,
    })
}

/// Click `trigger` and require that no submission leaves the page.
///
/// Waits `settle_ms` after the click, then fails if the URL changed or a
/// submit event got through client-side validation.
pub async fn submit_expect_blocked(page: &Page, trigger: &Locator<'_>, settle_ms: u64) -> Result<()> {
    let origin_url = page.url().await?;
    info!("submit (expect blocked): {}", trigger.selector());
    install_matcher(page, "", "*").await?;
    trigger.click().await?;
    page.wait(settle_ms).await;

    let url = page.url().await?;
    if url != origin_url {
        return Err(Error::AssertionFailed {
            subject: "blocked submission: page url".into(),
            expected: origin_url,
            actual: url,
        });
    }
    if let Some(request) = read_capture(page).await? {
        return Err(Error::AssertionFailed {
            subject: "blocked submission: outgoing request".into(),
            expected: "none".into(),
            actual: format!("{} {} {}", request.method, request.url, request.body),
        });
    }
    debug!("submission blocked, still on {}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_result_treats_errors_as_pending() {
        assert_eq!(poll_result("m", Ok(Some(3))), Some(3));
        assert_eq!(poll_result::<u8>("m", Ok(None)), None);
        let bad: Result<Option<CapturedRequest>> =
            serde_json::from_str::<CapturedRequest>("{not json")
                .map(Some)
                .map_err(Error::from);
        assert!(poll_result("request matcher", bad).is_none());
    }

    fn submission(response: Option<&str>, body: &str) -> Submission {
        Submission {
            origin_url: "https://httpbin.org/forms/post".into(),
            url: "https://httpbin.org/post".into(),
            request: CapturedRequest {
                url: "https://httpbin.org/post".into(),
                method: "POST".into(),
                body: body.into(),
            },
            response_text: response.map(String::from),
        }
    }

    #[test]
    fn test_navigated_ignores_origin_containing_target() {
        let origin = "https://httpbin.org/forms/post";
        assert!(!navigated(origin, origin, "/post"));
        assert!(navigated(origin, "https://httpbin.org/post", "/post"));
        assert!(!navigated(origin, "https://httpbin.org/get", "/post"));
    }

    #[test]
    fn test_submission_canonical_payload() {
        let s = submission(
            Some("{\n  \"form\": {\"size\": \"large\", \"topping\": [\"bacon\", \"cheese\"]}\n}\n"),
            "size=large&topping=bacon&topping=cheese",
        );
        let canonical = s.canonical().unwrap();
        assert_eq!(canonical.get("size").unwrap(), &["large".to_string()]);
        assert_eq!(canonical.get("topping").unwrap().len(), 2);
        assert_eq!(canonical, s.body().to_canonical());
    }

    #[test]
    fn test_request_only_submission_has_no_payload() {
        let s = submission(None, "custname=Body+Check");
        assert!(s.echoed().is_err());
        assert_eq!(s.body().get("custname"), Some("Body Check"));
    }

    #[test]
    fn test_non_json_response_is_error() {
        let s = submission(Some("<html>oops</html>"), "");
        assert!(matches!(s.response_json(), Err(Error::Json(_))));
    }

    #[test]
    fn test_captured_request_decodes() {
        let raw = r#"{"url":"https://httpbin.org/post","method":"POST","body":"a=1&a=2"}"#;
        let req: CapturedRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(FormBody::parse(&req.body).get_all("a"), vec!["1", "2"]);
    }

    #[test]
    fn test_matcher_script_embeds_quoted_target() {
        let js = install_js(r#"/p"ost"#, "POST");
        assert!(js.contains(r#"const target = "/p\"ost";"#), "{}", js);
        assert!(js.contains(r#"const method = "POST";"#));
        assert!(js.contains("__formcheck_submission"));
    }

    #[test]
    fn test_submit_options_builders() {
        let opts = SubmitOptions::post("/post").request_only().timeout_ms(500);
        assert_eq!(opts.method, "POST");
        assert!(!opts.navigation);
        assert_eq!(opts.timeout_ms, 500);
    }
}
