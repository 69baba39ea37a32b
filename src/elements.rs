//! Element accessors.
//!
//! A [`Locator`] is a page plus a selector. Nothing is looked up when it is
//! built; every interaction resolves the selector again, so a sequence of
//! interactions stays valid across DOM mutations in between.

use crate::{Error, Result};
use eoka::Page;
use serde::Deserialize;

/// Quote a string for use inside a CSS attribute selector.
pub fn css_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Selector for every control named `name`.
pub fn by_name(name: &str) -> String {
    format!("[name={}]", css_quote(name))
}

/// Selector for the control named `name` carrying `value` (radio, checkbox).
pub fn by_name_value(name: &str, value: &str) -> String {
    format!("[name={}][value={}]", css_quote(name), css_quote(value))
}

/// Encode a string as a JS literal.
pub(crate) fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

#[derive(Deserialize)]
struct AttributeRead {
    found: bool,
    value: Option<String>,
}

/// A lazy, re-resolvable reference to an element.
#[derive(Clone)]
pub struct Locator<'p> {
    page: &'p Page,
    selector: String,
}

impl<'p> Locator<'p> {
    pub fn new(page: &'p Page, selector: impl Into<String>) -> Self {
        Self {
            page,
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn page(&self) -> &'p Page {
        self.page
    }

    /// Number of elements the selector currently matches.
    pub async fn count(&self) -> Result<usize> {
        let js = format!(
            "document.querySelectorAll({}).length",
            js_str(&self.selector)
        );
        let n: u64 = self.page.evaluate(&js).await?;
        Ok(n as usize)
    }

    async fn ensure_present(&self) -> Result<()> {
        if self.count().await? == 0 {
            return Err(Error::ElementNotFound(self.selector.clone()));
        }
        Ok(())
    }

    fn browser_error(&self, e: eoka::Error) -> Error {
        match e {
            eoka::Error::ElementNotFound(_) => Error::ElementNotFound(self.selector.clone()),
            other => Error::Browser(other),
        }
    }

    pub async fn fill(&self, value: &str) -> Result<()> {
        self.ensure_present().await?;
        self.page
            .fill(&self.selector, value)
            .await
            .map_err(|e| self.browser_error(e))
    }

    pub async fn click(&self) -> Result<()> {
        self.ensure_present().await?;
        self.page
            .click(&self.selector)
            .await
            .map_err(|e| self.browser_error(e))
    }

    pub async fn check(&self) -> Result<()> {
        self.set_checked(true).await
    }

    pub async fn uncheck(&self) -> Result<()> {
        self.set_checked(false).await
    }

    async fn set_checked(&self, checked: bool) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return 'element_not_found';
                if (!('checked' in el)) return 'not_checkable';
                if (el.checked !== {want}) el.click();
                return el.checked === {want} ? 'ok' : 'unchanged';
            }})()"#,
            sel = js_str(&self.selector),
            want = checked
        );
        let status: String = self.page.evaluate(&js).await?;
        match status.as_str() {
            "ok" => Ok(()),
            "element_not_found" => Err(Error::ElementNotFound(self.selector.clone())),
            "not_checkable" => Err(Error::ActionFailed(format!(
                "'{}' is not a checkbox or radio",
                self.selector
            ))),
            _ => Err(Error::ActionFailed(format!(
                "'{}' refused to become {}",
                self.selector,
                if checked { "checked" } else { "unchecked" }
            ))),
        }
    }

    /// Select an option by value or visible text.
    pub async fn select_option(&self, value: &str) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const sel = document.querySelector({sel});
                if (!sel) return 'element_not_found';
                if (!sel.options) return 'not_select';
                const opt = Array.from(sel.options).find(o => o.value === {val} || o.text.trim() === {val});
                if (!opt) return 'option_not_found';
                sel.value = opt.value;
                sel.dispatchEvent(new Event('input', {{ bubbles: true }}));
                sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            sel = js_str(&self.selector),
            val = js_str(value)
        );
        let status: String = self.page.evaluate(&js).await?;
        match status.as_str() {
            "ok" => Ok(()),
            "element_not_found" => Err(Error::ElementNotFound(self.selector.clone())),
            "not_select" => Err(Error::ActionFailed(format!(
                "'{}' is not a select element",
                self.selector
            ))),
            "option_not_found" => Err(Error::ActionFailed(format!(
                "option '{}' not found in '{}'",
                value, self.selector
            ))),
            _ => Err(Error::ActionFailed(format!("select failed: {}", status))),
        }
    }

    /// Attribute value; `None` when the attribute is not set.
    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return JSON.stringify({{ found: !!el, value: el ? el.getAttribute({name}) : null }});
            }})()"#,
            sel = js_str(&self.selector),
            name = js_str(name)
        );
        let raw: String = self.page.evaluate(&js).await?;
        let read: AttributeRead = serde_json::from_str(&raw)?;
        if !read.found {
            return Err(Error::ElementNotFound(self.selector.clone()));
        }
        Ok(read.value)
    }

    /// Current `value` property of a form control.
    pub async fn input_value(&self) -> Result<String> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? String(el.value ?? '') : null; }})()",
            js_str(&self.selector)
        );
        let value: Option<String> = self.page.evaluate(&js).await?;
        value.ok_or_else(|| Error::ElementNotFound(self.selector.clone()))
    }

    /// Whether the element exists and is rendered. Missing elements are not visible.
    pub async fn is_visible(&self) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = getComputedStyle(el);
                return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
            }})()"#,
            js_str(&self.selector)
        );
        Ok(self.page.evaluate(&js).await?)
    }

    /// HTML constraint validity of a form control.
    pub async fn is_valid(&self) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return null;
                return typeof el.checkValidity === 'function' ? el.checkValidity() : true;
            }})()"#,
            js_str(&self.selector)
        );
        let valid: Option<bool> = self.page.evaluate(&js).await?;
        valid.ok_or_else(|| Error::ElementNotFound(self.selector.clone()))
    }

    pub async fn wait_visible(&self, timeout_ms: u64) -> Result<()> {
        self.page
            .wait_for_visible(&self.selector, timeout_ms)
            .await
            .map_err(|e| {
                Error::Timeout(format!(
                    "'{}' not visible within {}ms: {}",
                    self.selector, timeout_ms, e
                ))
            })?;
        Ok(())
    }
}

/// The fill.dev credit-card demo form.
pub struct CreditCardElements<'p> {
    page: &'p Page,
}

impl<'p> CreditCardElements<'p> {
    pub fn new(page: &'p Page) -> Self {
        Self { page }
    }

    pub fn card_name(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-name")
    }

    pub fn card_type(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-type")
    }

    pub fn number(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-number")
    }

    pub fn csc(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-csc")
    }

    pub fn exp_month(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-exp-month")
    }

    pub fn exp_year(&self) -> Locator<'p> {
        Locator::new(self.page, "#cc-exp-year")
    }

    pub fn submit(&self) -> Locator<'p> {
        Locator::new(self.page, r#"button[type="submit"]"#)
    }
}

/// httpbin's pizza-order form at `/forms/post`.
pub struct PizzaOrderElements<'p> {
    page: &'p Page,
}

impl<'p> PizzaOrderElements<'p> {
    pub fn new(page: &'p Page) -> Self {
        Self { page }
    }

    pub fn form(&self) -> Locator<'p> {
        Locator::new(self.page, "form")
    }

    pub fn customer_name(&self) -> Locator<'p> {
        Locator::new(self.page, r#"input[name="custname"]"#)
    }

    pub fn telephone(&self) -> Locator<'p> {
        Locator::new(self.page, r#"input[name="custtel"]"#)
    }

    pub fn email(&self) -> Locator<'p> {
        Locator::new(self.page, r#"input[name="custemail"]"#)
    }

    pub fn size(&self, value: &str) -> Locator<'p> {
        Locator::new(self.page, format!("input{}", by_name_value("size", value)))
    }

    pub fn topping(&self, value: &str) -> Locator<'p> {
        Locator::new(self.page, format!("input{}", by_name_value("topping", value)))
    }

    pub fn delivery(&self, value: &str) -> Locator<'p> {
        Locator::new(self.page, format!("input{}", by_name_value("delivery", value)))
    }

    pub fn comments(&self) -> Locator<'p> {
        Locator::new(self.page, r#"textarea[name="comments"]"#)
    }

    pub fn submit(&self) -> Locator<'p> {
        Locator::new(self.page, r#"form button[type="submit"]"#)
    }
}
