//! Form fixtures: what a case intends to enter, and how it gets into the page.

use crate::elements::{by_name, by_name_value, js_str, Locator};
use crate::payload::FieldValue;
use crate::{Error, Result};
use eoka::Page;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::{debug, info};

/// Ordered field → value(s) mapping. Order is fill order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFixture {
    fields: Vec<(String, FieldValue)>,
}

impl FormFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A repeated name replaces the earlier entry in place.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for FormFixture {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FixtureVisitor)
    }
}

struct FixtureVisitor;

impl<'de> Visitor<'de> for FixtureVisitor {
    type Value = FormFixture;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of field name to a string or a list of strings")
    }

    fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut fields: Vec<(String, FieldValue)> = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, FieldValue>()? {
            if fields.iter().any(|(k, _)| *k == key) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate fixture field '{}'",
                    key
                )));
            }
            fields.push((key, value));
        }
        Ok(FormFixture { fields })
    }
}

/// How a named control accepts values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    Radio,
    Checkbox,
    Select,
    SelectMultiple,
}

impl ControlKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "select-one" => Some(Self::Select),
            "select-multiple" => Some(Self::SelectMultiple),
            "missing" | "button" | "submit" | "reset" | "image" | "file" => None,
            _ => Some(Self::Text),
        }
    }
}

fn kind_js(scope: &str, field: &str) -> String {
    format!(
        r#"(() => {{
            const root = document.querySelector({scope});
            if (!root) return 'no_scope';
            const el = root.querySelector({sel});
            if (!el) return 'missing';
            return el.type || el.tagName.toLowerCase();
        }})()"#,
        scope = js_str(scope),
        sel = js_str(&by_name(field))
    )
}

/// Map the control lookup result. A missing scope is reported as the scope itself.
fn kind_from_raw(raw: &str, scope: &str, field: &str) -> Result<ControlKind> {
    match raw {
        "no_scope" => Err(Error::ElementNotFound(scope.to_string())),
        "missing" => Err(Error::ElementNotFound(format!("{} {}", scope, by_name(field)))),
        _ => ControlKind::parse(raw)
            .ok_or_else(|| Error::ActionFailed(format!("field '{}' is a {} control", field, raw))),
    }
}

async fn control_kind(page: &Page, scope: &str, field: &str) -> Result<ControlKind> {
    let raw: String = page.evaluate(&kind_js(scope, field)).await?;
    kind_from_raw(&raw, scope, field)
}

/// Enter every fixture field into the form matched by `scope`.
///
/// Radio values are checked in order so the last one stays selected;
/// checkbox values are all checked; a select takes the last value.
pub async fn fill_fixture(page: &Page, scope: &str, fixture: &FormFixture) -> Result<()> {
    for (field, value) in fixture.iter() {
        let kind = control_kind(page, scope, field).await?;
        debug!("fill_form: {} ({:?}) = {}", field, kind, value);
        match kind {
            ControlKind::Text => {
                let FieldValue::One(text) = value else {
                    return Err(Error::Config(format!(
                        "text field '{}' takes a single value, got {}",
                        field, value
                    )));
                };
                Locator::new(page, format!("{} {}", scope, by_name(field)))
                    .fill(text)
                    .await?;
            }
            ControlKind::Radio | ControlKind::Checkbox => {
                for v in value.values() {
                    Locator::new(page, format!("{} {}", scope, by_name_value(field, v)))
                        .check()
                        .await?;
                }
            }
            ControlKind::Select => {
                if let Some(v) = value.last() {
                    Locator::new(page, format!("{} {}", scope, by_name(field)))
                        .select_option(v)
                        .await?;
                }
            }
            ControlKind::SelectMultiple => {
                select_many(page, scope, field, &value.values()).await?;
            }
        }
    }
    info!("fill_form: {} field(s)", fixture.len());
    Ok(())
}

async fn select_many(page: &Page, scope: &str, field: &str, values: &[&str]) -> Result<()> {
    let selector = format!("{} {}", scope, by_name(field));
    let wanted: Vec<serde_json::Value> = values.iter().map(|v| (*v).into()).collect();
    let js = format!(
        r#"(() => {{
            const sel = document.querySelector({sel});
            if (!sel) return 'element_not_found';
            const wanted = {wanted};
            let hits = 0;
            for (const o of sel.options) {{
                o.selected = wanted.includes(o.value) || wanted.includes(o.text.trim());
                if (o.selected) hits++;
            }}
            sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return hits === wanted.length ? 'ok' : 'option_not_found';
        }})()"#,
        sel = js_str(&selector),
        wanted = serde_json::Value::Array(wanted)
    );
    let status: String = page.evaluate(&js).await?;
    match status.as_str() {
        "ok" => Ok(()),
        "element_not_found" => Err(Error::ElementNotFound(selector)),
        _ => Err(Error::ActionFailed(format!(
            "not every option of {:?} exists in '{}'",
            values, selector
        ))),
    }
}

/// Fill every empty control in the form with a plausible value for its type.
///
/// Controls that already carry a value are left alone, so explicit fixture
/// values win. Returns the number of controls touched.
pub async fn autofill(page: &Page, scope: &str) -> Result<u32> {
    let js = format!(
        r#"(() => {{
            const form = document.querySelector({scope});
            if (!form) return -1;
            const samples = {{
                email: 'formcheck@example.com', tel: '5550100', url: 'https://example.com',
                number: '123', date: '2030-01-01', month: '2030-01', password: 'formcheck-Pa55',
            }};
            const set = (el, v) => {{
                el.value = v;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }};
            const groups = new Set();
            let touched = 0;
            for (const el of form.querySelectorAll('input, select, textarea')) {{
                if (el.disabled || el.readOnly) continue;
                const type = (el.type || '').toLowerCase();
                if (['hidden', 'submit', 'button', 'reset', 'image', 'file'].includes(type)) continue;
                if (type === 'radio') {{
                    if (groups.has(el.name)) continue;
                    groups.add(el.name);
                    const group = form.querySelectorAll('input[type="radio"][name="' + CSS.escape(el.name) + '"]');
                    if (!Array.from(group).some(r => r.checked)) {{ el.click(); touched++; }}
                    continue;
                }}
                if (type === 'checkbox') {{
                    if (el.required && !el.checked) {{ el.click(); touched++; }}
                    continue;
                }}
                if (el.tagName === 'SELECT') {{
                    if (el.value) continue;
                    const opts = Array.from(el.options).filter(o => o.value && !o.disabled);
                    if (opts.length) {{ set(el, opts[opts.length - 1].value); touched++; }}
                    continue;
                }}
                if (el.value) continue;
                let v = samples[type] || 'formcheck';
                if (el.maxLength > 0) v = v.slice(0, el.maxLength);
                set(el, v);
                touched++;
            }}
            return touched;
        }})()"#,
        scope = js_str(scope)
    );
    let touched: i64 = page.evaluate(&js).await?;
    if touched < 0 {
        return Err(Error::ElementNotFound(scope.to_string()));
    }
    info!("autofill: {} control(s) in '{}'", touched, scope);
    Ok(touched as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_keeps_document_order() {
        let yaml = r#"
size: small
custname: "Radio User"
topping: [bacon, cheese]
"#;
        let fixture: FormFixture = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&str> = fixture.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["size", "custname", "topping"]);
        assert_eq!(
            fixture.get("topping"),
            Some(&FieldValue::Many(vec!["bacon".into(), "cheese".into()]))
        );
    }

    #[test]
    fn test_fixture_rejects_duplicate_fields() {
        let yaml = "size: small\nsize: large\n";
        let result: std::result::Result<FormFixture, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_fixture_rejects_nested_values() {
        let yaml = "size: { value: small }\n";
        let result: std::result::Result<FormFixture, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let fixture = FormFixture::new()
            .set("custname", "A")
            .set("size", "small")
            .set("custname", "B");
        let names: Vec<&str> = fixture.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["custname", "size"]);
        assert_eq!(fixture.get("custname"), Some(&FieldValue::One("B".into())));
    }

    #[test]
    fn test_missing_scope_is_not_document() {
        let js = kind_js("#checkout", "custname");
        assert!(js.contains("'no_scope'"), "{}", js);
        assert!(!js.contains("|| document"), "{}", js);

        match kind_from_raw("no_scope", "#checkout", "custname") {
            Err(Error::ElementNotFound(s)) => assert_eq!(s, "#checkout"),
            other => panic!("unexpected: {:?}", other),
        }
        match kind_from_raw("missing", "form", "custname") {
            Err(Error::ElementNotFound(s)) => assert_eq!(s, r#"form [name="custname"]"#),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            kind_from_raw("radio", "form", "size").unwrap(),
            ControlKind::Radio
        );
        assert!(matches!(
            kind_from_raw("submit", "form", "go"),
            Err(Error::ActionFailed(_))
        ));
    }

    #[test]
    fn test_control_kind_parse() {
        assert_eq!(ControlKind::parse("radio"), Some(ControlKind::Radio));
        assert_eq!(ControlKind::parse("checkbox"), Some(ControlKind::Checkbox));
        assert_eq!(ControlKind::parse("select-one"), Some(ControlKind::Select));
        assert_eq!(ControlKind::parse("email"), Some(ControlKind::Text));
        assert_eq!(ControlKind::parse("textarea"), Some(ControlKind::Text));
        assert_eq!(ControlKind::parse("missing"), None);
        assert_eq!(ControlKind::parse("submit"), None);
    }

    #[test]
    fn test_kind_js_quotes_field_name() {
        let js = kind_js("form", r#"we"ird"#);
        assert!(js.contains(r#"[name=\"we\\\"ird\"]"#), "{}", js);
    }
}
