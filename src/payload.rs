//! Request payloads for the recipients endpoints.

use serde::Serialize;
use serde_json::{Map, Value};
use url::form_urlencoded;

const EMAIL: &str = "email";

/// One recipient as sent to the vendor: `email` plus any custom fields.
///
/// Serializes as a flat JSON object. Field order follows insertion order,
/// with `email` first. Custom fields must already be registered with the
/// vendor; nothing is validated locally, including the address itself.
///
/// ```
/// use contactdb::ContactPayload;
/// use serde_json::json;
///
/// let payload = ContactPayload::new("ann@example.com")
///     .with_field("first_name", "Ann")
///     .with_field("age", 34);
///
/// assert_eq!(
///     serde_json::to_value(&payload).unwrap(),
///     json!({"email": "ann@example.com", "first_name": "Ann", "age": 34}),
/// );
/// ```
///
/// Payloads are only built through [`ContactPayload::new`], so every one
/// carries an `email` key:
///
/// ```compile_fail
/// let payload: contactdb::ContactPayload = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ContactPayload(Map<String, Value>);

impl ContactPayload {
    /// Creates a payload holding only the email address.
    pub fn new(email: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(EMAIL.to_string(), Value::String(email.into()));
        Self(fields)
    }

    /// Sets one field, replacing any previous value under the same key.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merges custom fields over the payload.
    ///
    /// Later values win, so an `email` entry in `fields` replaces the
    /// address the payload was created with.
    pub fn merge<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in fields {
            self.0.insert(key.into(), value.into());
        }
        self
    }

    /// The address currently carried by the payload.
    pub fn email(&self) -> Option<&str> {
        self.0.get(EMAIL)?.as_str()
    }

    /// Looks up any field, `email` included.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Encodes search criteria as an `application/x-www-form-urlencoded` query.
///
/// Pairs are emitted in iteration order and joined with `&`. Strings are
/// sent as is, `null` as an empty value, and numbers or booleans in their
/// JSON form.
///
/// ```
/// use contactdb::payload::search_query;
/// use serde_json::json;
///
/// let query = search_query([("first_name", "Ann"), ("last_name", "Lee")]);
/// assert_eq!(query, "first_name=Ann&last_name=Lee");
///
/// let query = search_query([("age", json!(34)), ("subscribed", json!(true))]);
/// assert_eq!(query, "age=34&subscribed=true");
/// ```
pub fn search_query<K, V>(criteria: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: Into<Value>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in criteria {
        serializer.append_pair(key.as_ref(), &query_value(value.into()));
    }
    serializer.finish()
}

fn query_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
