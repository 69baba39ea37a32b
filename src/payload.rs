//! Echoed and canonical form payloads.
//!
//! An echo endpoint reports each submitted field either as a single string or,
//! when the same name was sent more than once (checkbox groups), as an array.
//! [`normalize`] resolves that shape once so assertions never branch on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A field value as it appears in an echoed payload or a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(String),
    Many(Vec<String>),
}

impl FieldValue {
    /// All values, in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Owned values, in order.
    pub fn into_values(self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(vs) => vs,
        }
    }

    /// The value that ends up selected when the values are applied in order.
    pub fn last(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(vs) => vs.last().map(String::as_str),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::One(v.to_string())
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(vs: Vec<&str>) -> Self {
        Self::Many(vs.into_iter().map(String::from).collect())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(v) => write!(f, "{:?}", v),
            Self::Many(vs) => write!(f, "{:?}", vs),
        }
    }
}

/// The server's representation of what it received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EchoedPayload(BTreeMap<String, FieldValue>);

impl EchoedPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Decode the `form` object of an echo response.
    ///
    /// A missing or null `form` key yields an empty payload.
    pub fn from_response(json: &serde_json::Value) -> crate::Result<Self> {
        match json.get("form") {
            None | Some(serde_json::Value::Null) => Ok(Self::new()),
            Some(form) => Ok(serde_json::from_value(form.clone())?),
        }
    }
}

impl From<CanonicalPayload> for EchoedPayload {
    fn from(canonical: CanonicalPayload) -> Self {
        Self(
            canonical
                .0
                .into_iter()
                .map(|(k, vs)| (k, FieldValue::Many(vs)))
                .collect(),
        )
    }
}

/// Every field mapped to an ordered list of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalPayload(BTreeMap<String, Vec<String>>);

impl CanonicalPayload {
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for CanonicalPayload {
    fn from_iter<I: IntoIterator<Item = (K, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for CanonicalPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, vs)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", k, vs)?;
        }
        f.write_str("}")
    }
}

/// Wrap scalars into one-element lists; lists pass through untouched.
pub fn normalize(echoed: &EchoedPayload) -> CanonicalPayload {
    echoed
        .iter()
        .map(|(k, v)| (k, v.clone().into_values()))
        .collect()
}

/// A decoded `application/x-www-form-urlencoded` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    pub fn parse(body: &str) -> Self {
        let pairs = url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value sent under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value sent under `key`, in submission order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Group repeated keys, keeping submission order within each key.
    pub fn to_canonical(&self) -> CanonicalPayload {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in &self.pairs {
            grouped.entry(k.clone()).or_default().push(v.clone());
        }
        CanonicalPayload(grouped)
    }

    /// The shape an httpbin-style echo reports: one value stays a scalar.
    pub fn to_echoed(&self) -> EchoedPayload {
        let mut echoed = EchoedPayload::new();
        for (k, mut vs) in self.to_canonical().0 {
            let value = if vs.len() == 1 {
                FieldValue::One(vs.remove(0))
            } else {
                FieldValue::Many(vs)
            };
            echoed.insert(k, value);
        }
        echoed
    }
}
