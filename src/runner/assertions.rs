//! Comparisons behind the `expect_*` steps.

use crate::config::steps::ExpectUrlStep;
use crate::config::PayloadExpectation;
use crate::payload::{normalize, CanonicalPayload, EchoedPayload, FieldValue};
use crate::{Error, Result};

fn mismatch(subject: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Error {
    Error::AssertionFailed {
        subject: subject.into(),
        expected: expected.into(),
        actual: actual.into(),
    }
}

fn show(values: Option<&[String]>) -> String {
    match values {
        Some(vs) => format!("{:?}", vs),
        None => "<absent>".into(),
    }
}

/// Check a canonical payload against an expectation. `subject` names the
/// payload in diagnostics ("payload", "request body").
pub fn check_payload(
    subject: &str,
    actual: &CanonicalPayload,
    expected: &PayloadExpectation,
) -> Result<()> {
    if let Some(ref equals) = expected.equals {
        let mut want = EchoedPayload::new();
        for (field, value) in equals.iter() {
            want.insert(field, value.clone());
        }
        let want = normalize(&want);
        if &want != actual {
            return Err(mismatch(subject, want.to_string(), actual.to_string()));
        }
    }

    if let Some(ref contains) = expected.contains {
        for (field, value) in contains.iter() {
            let got = actual.get(field);
            let ok = match (value, got) {
                (_, None) => false,
                (FieldValue::One(v), Some(vs)) => vs.len() == 1 && vs[0] == *v,
                (FieldValue::Many(want), Some(vs)) => want.iter().all(|w| vs.contains(w)),
            };
            if !ok {
                let expected = match value {
                    FieldValue::One(v) => format!("{:?}", [v]),
                    FieldValue::Many(vs) => format!("containing {:?}", vs),
                };
                return Err(mismatch(format!("{} field '{}'", subject, field), expected, show(got)));
            }
        }
    }

    for field in &expected.absent {
        if let Some(vs) = actual.get(field) {
            return Err(mismatch(
                format!("{} field '{}'", subject, field),
                "<absent>",
                format!("{:?}", vs),
            ));
        }
    }

    Ok(())
}

pub fn check_url(actual: &str, expected: &ExpectUrlStep) -> Result<()> {
    if let Some(ref want) = expected.equals {
        if actual != want {
            return Err(mismatch("page url", want.as_str(), actual));
        }
    }
    if let Some(ref part) = expected.contains {
        if !actual.contains(part.as_str()) {
            return Err(mismatch("page url", format!("containing '{}'", part), actual));
        }
    }
    Ok(())
}

/// `want == None` only requires the attribute to be present.
pub fn check_attribute(
    selector: &str,
    name: &str,
    actual: Option<&str>,
    want: Option<&str>,
) -> Result<()> {
    let subject = || format!("attribute '{}' of '{}'", name, selector);
    match (actual, want) {
        (None, Some(w)) => Err(mismatch(subject(), format!("{:?}", w), "<not set>")),
        (None, None) => Err(mismatch(subject(), "<set>", "<not set>")),
        (Some(a), Some(w)) if a != w => Err(mismatch(subject(), format!("{:?}", w), format!("{:?}", a))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FormFixture;
    use crate::payload::FormBody;

    fn echoed(pairs: &[(&str, FieldValue)]) -> CanonicalPayload {
        let mut e = EchoedPayload::new();
        for (k, v) in pairs {
            e.insert(*k, v.clone());
        }
        normalize(&e)
    }

    fn common_values() -> CanonicalPayload {
        echoed(&[
            ("custname", "Gabriel Tester".into()),
            ("custtel", "11999990000".into()),
            ("custemail", "gabriel@example.com".into()),
            ("size", "medium".into()),
            ("topping", vec!["bacon", "cheese"].into()),
            ("delivery", "now".into()),
            ("comments", "E2E Playwright test".into()),
        ])
    }

    #[test]
    fn test_equals_common_values() {
        let fixture = FormFixture::new()
            .set("custname", "Gabriel Tester")
            .set("custtel", "11999990000")
            .set("custemail", "gabriel@example.com")
            .set("size", "medium")
            .set("topping", vec!["bacon", "cheese"])
            .set("delivery", "now")
            .set("comments", "E2E Playwright test");
        let exp = PayloadExpectation {
            equals: Some(fixture),
            ..Default::default()
        };
        check_payload("payload", &common_values(), &exp).unwrap();
    }

    #[test]
    fn test_equals_reports_both_sides() {
        let exp = PayloadExpectation {
            equals: Some(FormFixture::new().set("size", "large")),
            ..Default::default()
        };
        let err = check_payload("payload", &common_values(), &exp).unwrap_err();
        match err {
            Error::AssertionFailed { expected, actual, .. } => {
                assert!(expected.contains("large"));
                assert!(actual.contains("medium"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_contains_list_is_order_insensitive() {
        let exp = PayloadExpectation {
            contains: Some(FormFixture::new().set("topping", vec!["cheese", "bacon"])),
            ..Default::default()
        };
        check_payload("payload", &common_values(), &exp).unwrap();
    }

    #[test]
    fn test_contains_scalar_rejects_extra_values() {
        let actual = echoed(&[("size", vec!["small", "large"].into())]);
        let exp = PayloadExpectation {
            contains: Some(FormFixture::new().set("size", "large")),
            ..Default::default()
        };
        assert!(check_payload("payload", &actual, &exp).is_err());
    }

    #[test]
    fn test_contains_missing_field_fails() {
        let actual = echoed(&[("size", "small".into())]);
        let exp = PayloadExpectation {
            contains: Some(FormFixture::new().set("topping", vec!["bacon"])),
            ..Default::default()
        };
        let err = check_payload("payload", &actual, &exp).unwrap_err();
        assert!(err.to_string().contains("<absent>"), "{}", err);
    }

    #[test]
    fn test_absent() {
        let actual = echoed(&[("size", "small".into()), ("delivery", "later".into())]);
        let exp = PayloadExpectation {
            absent: vec!["topping".into()],
            ..Default::default()
        };
        check_payload("payload", &actual, &exp).unwrap();

        let exp = PayloadExpectation {
            absent: vec!["size".into()],
            ..Default::default()
        };
        assert!(check_payload("payload", &actual, &exp).is_err());
    }

    #[test]
    fn test_body_expectation_on_repeated_keys() {
        let body = FormBody::parse(
            "custname=Body+Check&custtel=11666665555&custemail=body.check%40example.com\
             &size=medium&topping=onion&topping=mushroom&delivery=later&comments=",
        );
        let exp = PayloadExpectation {
            contains: Some(
                FormFixture::new()
                    .set("custname", "Body Check")
                    .set("size", "medium")
                    .set("topping", vec!["onion", "mushroom"])
                    .set("delivery", "later"),
            ),
            ..Default::default()
        };
        check_payload("request body", &body.to_canonical(), &exp).unwrap();
        assert_eq!(body.to_canonical().get("topping").unwrap().len(), 2);
    }

    #[test]
    fn test_check_url() {
        let equals = ExpectUrlStep {
            equals: Some("https://fill.dev/submit".into()),
            contains: None,
        };
        check_url("https://fill.dev/submit", &equals).unwrap();
        assert!(check_url("https://fill.dev/form/credit-card-simple", &equals).is_err());

        let contains = ExpectUrlStep {
            equals: None,
            contains: Some("/post".into()),
        };
        check_url("https://httpbin.org/post", &contains).unwrap();
    }

    #[test]
    fn test_check_attribute() {
        check_attribute("#cc-number", "required", Some(""), Some("")).unwrap();
        check_attribute("#cc-number", "required", Some(""), None).unwrap();
        assert!(check_attribute("#cc-number", "required", None, None).is_err());
        assert!(check_attribute("#cc-type", "name", Some("type"), Some("cc-type")).is_err());
    }
}
