use crate::fixture::FormFixture;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A single step of a case.
#[derive(Debug, Clone)]
pub enum Step {
    // Navigation
    Goto(GotoStep),
    Reload,

    // Waiting
    Wait(WaitStep),
    WaitForVisible(WaitForVisibleStep),
    WaitForUrl(WaitForUrlStep),

    // Input
    Fill(FillStep),
    Check(SelectorStep),
    Uncheck(SelectorStep),
    Select(SelectStep),
    Click(SelectorStep),
    FillForm(FillFormStep),
    Autofill(AutofillStep),

    // Submission
    Submit(SubmitStep),
    SubmitBlocked(SubmitBlockedStep),

    // Assertions
    ExpectUrl(ExpectUrlStep),
    ExpectAttribute(ExpectAttributeStep),
    ExpectValidity(ExpectValidityStep),
    ExpectValue(ExpectValueStep),
    ExpectVisible(ExpectVisibleStep),
    ExpectPayload(PayloadExpectation),
    ExpectBody(PayloadExpectation),

    // Debug
    Log(LogStep),
    Screenshot(ScreenshotStep),
}

impl Step {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Goto(_) => "goto",
            Self::Reload => "reload",
            Self::Wait(_) => "wait",
            Self::WaitForVisible(_) => "wait_for_visible",
            Self::WaitForUrl(_) => "wait_for_url",
            Self::Fill(_) => "fill",
            Self::Check(_) => "check",
            Self::Uncheck(_) => "uncheck",
            Self::Select(_) => "select",
            Self::Click(_) => "click",
            Self::FillForm(_) => "fill_form",
            Self::Autofill(_) => "autofill",
            Self::Submit(_) => "submit",
            Self::SubmitBlocked(_) => "submit_blocked",
            Self::ExpectUrl(_) => "expect_url",
            Self::ExpectAttribute(_) => "expect_attribute",
            Self::ExpectValidity(_) => "expect_validity",
            Self::ExpectValue(_) => "expect_value",
            Self::ExpectVisible(_) => "expect_visible",
            Self::ExpectPayload(_) => "expect_payload",
            Self::ExpectBody(_) => "expect_body",
            Self::Log(_) => "log",
            Self::Screenshot(_) => "screenshot",
        }
    }
}

const STEP_NAMES: &[&str] = &[
    "goto",
    "reload",
    "wait",
    "wait_for_visible",
    "wait_for_url",
    "fill",
    "check",
    "uncheck",
    "select",
    "click",
    "fill_form",
    "autofill",
    "submit",
    "submit_blocked",
    "expect_url",
    "expect_attribute",
    "expect_validity",
    "expect_value",
    "expect_visible",
    "expect_payload",
    "expect_body",
    "log",
    "screenshot",
];

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StepVisitor)
    }
}

struct StepVisitor;

impl<'de> Visitor<'de> for StepVisitor {
    type Value = Step;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a step (string for steps without options, or map with single key)")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "reload" => Ok(Step::Reload),
            "autofill" => Ok(Step::Autofill(AutofillStep::default())),
            "submit" => Ok(Step::Submit(SubmitStep::default())),
            "submit_blocked" => Ok(Step::SubmitBlocked(SubmitBlockedStep::default())),
            other => Err(de::Error::unknown_variant(
                other,
                &["reload", "autofill", "submit", "submit_blocked"],
            )),
        }
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected step type key"))?;

        let step = match key.as_str() {
            "goto" => Step::Goto(map.next_value()?),
            "reload" => {
                let _: serde_yaml::Value = map.next_value()?;
                Step::Reload
            }
            "wait" => Step::Wait(map.next_value()?),
            "wait_for_visible" => Step::WaitForVisible(map.next_value()?),
            "wait_for_url" => Step::WaitForUrl(map.next_value()?),
            "fill" => Step::Fill(map.next_value()?),
            "check" => Step::Check(map.next_value()?),
            "uncheck" => Step::Uncheck(map.next_value()?),
            "select" => Step::Select(map.next_value()?),
            "click" => Step::Click(map.next_value()?),
            "fill_form" => Step::FillForm(map.next_value()?),
            "autofill" => {
                let v: Option<AutofillStep> = map.next_value()?;
                Step::Autofill(v.unwrap_or_default())
            }
            "submit" => {
                let v: Option<SubmitStep> = map.next_value()?;
                Step::Submit(v.unwrap_or_default())
            }
            "submit_blocked" => {
                let v: Option<SubmitBlockedStep> = map.next_value()?;
                Step::SubmitBlocked(v.unwrap_or_default())
            }
            "expect_url" => Step::ExpectUrl(map.next_value()?),
            "expect_attribute" => Step::ExpectAttribute(map.next_value()?),
            "expect_validity" => Step::ExpectValidity(map.next_value()?),
            "expect_value" => Step::ExpectValue(map.next_value()?),
            "expect_visible" => Step::ExpectVisible(map.next_value()?),
            "expect_payload" => Step::ExpectPayload(map.next_value()?),
            "expect_body" => Step::ExpectBody(map.next_value()?),
            "log" => Step::Log(map.next_value()?),
            "screenshot" => Step::Screenshot(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, STEP_NAMES)),
        };

        if let Some(extra) = map.next_key::<String>()? {
            return Err(de::Error::custom(format!(
                "step '{}' has an extra key '{}'; options go under the step name",
                key, extra
            )));
        }

        Ok(step)
    }
}

// --- Step payloads ---

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_submit_selector() -> String {
    r#"form button[type="submit"]"#.into()
}

fn default_form_selector() -> String {
    "form".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GotoStep {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitStep {
    pub ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForVisibleStep {
    pub selector: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForUrlStep {
    pub contains: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorStep {
    pub selector: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillStep {
    pub selector: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectStep {
    pub selector: String,
    pub value: String,
}

/// Enter a fixture into a form.
#[derive(Debug, Clone, Deserialize)]
pub struct FillFormStep {
    #[serde(default = "default_form_selector")]
    pub form: String,
    pub fields: FormFixture,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutofillStep {
    #[serde(default = "default_form_selector")]
    pub form: String,
}

impl Default for AutofillStep {
    fn default() -> Self {
        Self {
            form: default_form_selector(),
        }
    }
}

fn default_target() -> String {
    "/post".into()
}

fn default_method() -> String {
    "POST".into()
}

fn default_true() -> bool {
    true
}

/// Submit and capture the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitStep {
    #[serde(default = "default_submit_selector")]
    pub selector: String,
    /// Substring of the form action and landing URL.
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Wait for the response document; `false` captures only the request.
    #[serde(default = "default_true")]
    pub response: bool,
    /// Overrides the suite timeout.
    pub timeout_ms: Option<u64>,
}

impl Default for SubmitStep {
    fn default() -> Self {
        Self {
            selector: default_submit_selector(),
            target: default_target(),
            method: default_method(),
            response: true,
            timeout_ms: None,
        }
    }
}

fn default_settle_ms() -> u64 {
    1_000
}

/// Submit and require that validation keeps the page in place.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBlockedStep {
    #[serde(default = "default_submit_selector")]
    pub selector: String,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for SubmitBlockedStep {
    fn default() -> Self {
        Self {
            selector: default_submit_selector(),
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectUrlStep {
    pub equals: Option<String>,
    pub contains: Option<String>,
}

/// Attribute check. Without `value` the attribute only has to be present.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectAttributeStep {
    pub selector: String,
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectValidityStep {
    pub selector: String,
    pub valid: bool,
}

/// Current `value` of a form control.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectValueStep {
    pub selector: String,
    pub equals: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectVisibleStep {
    pub selector: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Assertions on a canonical payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadExpectation {
    /// The whole payload, exactly.
    pub equals: Option<FormFixture>,
    /// Scalars must match exactly; lists must all be present.
    pub contains: Option<FormFixture>,
    /// Fields that must not have been transmitted.
    #[serde(default)]
    pub absent: Vec<String>,
}

impl PayloadExpectation {
    pub fn is_empty(&self) -> bool {
        self.equals.is_none() && self.contains.is_none() && self.absent.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogStep {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotStep {
    pub path: String,
}
