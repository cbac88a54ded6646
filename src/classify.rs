//! Response classification for the recipients endpoints.
//!
//! The vendor answers every call with a loosely shaped JSON object, and a
//! single body can satisfy more than one shape at once (a partial success
//! carries both `persisted_recipients` and an error block). Classification is
//! therefore an ordered chain of shape predicates: the first one that matches
//! decides the result.
//!
//! | # | Submission (`add`, `add_multiple`)        | Result                       |
//! |---|-------------------------------------------|------------------------------|
//! | 1 | transport failure                         | [`Rejection::Unexpected`]    |
//! | 2 | `persisted_recipients` longer than one    | [`Accepted::Recipients`]     |
//! | 3 | `error_count > 0`                         | [`Rejection::Vendor`]        |
//! | 4 | `persisted_recipients` of exactly one     | [`Accepted::Recipient`]      |
//! | 5 | `persisted_recipients` empty              | [`Rejection::NoChanges`]     |
//! | 6 | anything else                             | [`Rejection::Unexpected`]    |
//!
//! | # | Search                                    | Result                       |
//! |---|-------------------------------------------|------------------------------|
//! | 1 | `error_count > 0`                         | [`Rejection::Vendor`]        |
//! | 2 | `recipients` list                         | [`Accepted::Found`]          |
//! | 3 | anything else, or transport failure       | [`Rejection::Unexpected`]    |
//!
//! Every [`Rejection::Unexpected`] is reported exactly once to the injected
//! [`Diagnostics`] sink, since the caller only ever sees a generic message.

use std::fmt;

use serde_json::{Map, Value};

use crate::HttpOutcome;

const PERSISTED_RECIPIENTS: &str = "persisted_recipients";
const ERROR_COUNT: &str = "error_count";
const ERRORS: &str = "errors";
const MESSAGE: &str = "message";
const RECIPIENTS: &str = "recipients";

/// Message reported for [`Rejection::Unexpected`].
pub const UNEXPECTED_MESSAGE: &str = "Unexpected error";

/// Message reported for [`Rejection::NoChanges`].
pub const NO_CHANGES_MESSAGE: &str = "No changes applied for recipient";

/// The recipients operation an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a single recipient.
    Add,
    /// Create or update a batch of recipients.
    AddMultiple,
    /// Look recipients up by field values.
    Search,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "add",
            Operation::AddMultiple => "add_multiple",
            Operation::Search => "search",
        };
        f.write_str(name)
    }
}

/// A successful classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    /// One recipient was persisted; holds its vendor ID.
    Recipient(String),
    /// Several recipients were persisted; IDs in vendor order.
    Recipients(Vec<String>),
    /// Search matches, passed through as the vendor returned them.
    Found(Vec<Map<String, Value>>),
}

/// A failed classification.
///
/// Every variant maps to one or more human-readable messages through
/// [`Rejection::messages`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The vendor reported validation errors, one message per error.
    #[error("{}", .0.join("; "))]
    Vendor(Vec<String>),

    /// The vendor accepted the request but changed nothing.
    #[error("No changes applied for recipient")]
    NoChanges,

    /// The transport failed or the body had no recognised shape.
    #[error("Unexpected error")]
    Unexpected,
}

impl Rejection {
    /// Returns the caller-facing messages, in vendor order.
    ///
    /// ```
    /// use contactdb::Rejection;
    ///
    /// assert_eq!(Rejection::Unexpected.messages(), vec!["Unexpected error"]);
    /// assert_eq!(
    ///     Rejection::Vendor(vec!["bad email".into(), "dup".into()]).messages(),
    ///     vec!["bad email", "dup"],
    /// );
    /// ```
    pub fn messages(&self) -> Vec<String> {
        match self {
            Rejection::Vendor(messages) => messages.clone(),
            Rejection::NoChanges => vec![NO_CHANGES_MESSAGE.to_string()],
            Rejection::Unexpected => vec![UNEXPECTED_MESSAGE.to_string()],
        }
    }
}

/// The result of classifying one outcome.
pub type Classified = std::result::Result<Accepted, Rejection>;

/// Side channel for outcomes that classify as [`Rejection::Unexpected`].
///
/// Implement this to capture the raw outcome somewhere other than the log,
/// or to observe it in tests. Any `Fn(Operation, &HttpOutcome)` closure
/// works as a sink.
pub trait Diagnostics: Send + Sync {
    /// Records an outcome the classifier could not make sense of.
    fn unexpected(&self, operation: Operation, outcome: &HttpOutcome);
}

/// Default sink: one `tracing` error event per unexpected outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn unexpected(&self, operation: Operation, outcome: &HttpOutcome) {
        match outcome {
            HttpOutcome::Success(body) => tracing::error!(
                operation = %operation,
                body = %body,
                "Unrecognised response from recipients API"
            ),
            HttpOutcome::Failure(error) => tracing::error!(
                operation = %operation,
                error = %error,
                status = ?error.status(),
                raw_response = error.raw_response().unwrap_or_default(),
                "Recipients API request failed"
            ),
        }
    }
}

impl<F> Diagnostics for F
where
    F: Fn(Operation, &HttpOutcome) + Send + Sync,
{
    fn unexpected(&self, operation: Operation, outcome: &HttpOutcome) {
        self(operation, outcome)
    }
}

/// Classifies an outcome according to the table for `operation`.
pub fn classify(
    operation: Operation,
    outcome: &HttpOutcome,
    diagnostics: &dyn Diagnostics,
) -> Classified {
    match operation {
        Operation::Add | Operation::AddMultiple => {
            classify_submission(operation, outcome, diagnostics)
        }
        Operation::Search => classify_search(outcome, diagnostics),
    }
}

/// Classifies the outcome of an `add` or `add_multiple` call.
pub fn classify_submission(
    operation: Operation,
    outcome: &HttpOutcome,
    diagnostics: &dyn Diagnostics,
) -> Classified {
    let unexpected = || {
        diagnostics.unexpected(operation, outcome);
        Err(Rejection::Unexpected)
    };

    let Some(body) = outcome.body() else {
        return unexpected();
    };

    let persisted = string_list(body, PERSISTED_RECIPIENTS);
    if persisted.as_ref().is_some_and(|ids| ids.len() > 1) {
        return Ok(Accepted::Recipients(persisted.unwrap_or_default()));
    }

    if reports_errors(body) {
        return match vendor_messages(body) {
            Some(messages) => Err(Rejection::Vendor(messages)),
            None => unexpected(),
        };
    }

    match persisted {
        Some(mut ids) if ids.len() == 1 => Ok(Accepted::Recipient(ids.remove(0))),
        Some(ids) if ids.is_empty() => Err(Rejection::NoChanges),
        _ => unexpected(),
    }
}

/// Classifies the outcome of a `search` call.
pub fn classify_search(outcome: &HttpOutcome, diagnostics: &dyn Diagnostics) -> Classified {
    let unexpected = || {
        diagnostics.unexpected(Operation::Search, outcome);
        Err(Rejection::Unexpected)
    };

    let Some(body) = outcome.body() else {
        return unexpected();
    };

    if reports_errors(body) {
        return match vendor_messages(body) {
            Some(messages) => Err(Rejection::Vendor(messages)),
            None => unexpected(),
        };
    }

    match object_list(body, RECIPIENTS) {
        Some(found) => Ok(Accepted::Found(found)),
        None => unexpected(),
    }
}

/// `error_count` is a positive integer.
fn reports_errors(body: &Value) -> bool {
    body.get(ERROR_COUNT)
        .and_then(Value::as_u64)
        .is_some_and(|count| count > 0)
}

/// The `message` of every `errors` entry, or `None` when there are none to report.
fn vendor_messages(body: &Value) -> Option<Vec<String>> {
    let messages: Vec<String> = body
        .get(ERRORS)?
        .as_array()?
        .iter()
        .filter_map(|error| error.get(MESSAGE)?.as_str().map(str::to_owned))
        .collect();

    (!messages.is_empty()).then_some(messages)
}

fn string_list(body: &Value, key: &str) -> Option<Vec<String>> {
    body.get(key)?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}

fn object_list(body: &Value, key: &str) -> Option<Vec<Map<String, Value>>> {
    body.get(key)?
        .as_array()?
        .iter()
        .map(|item| item.as_object().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Operation>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl Diagnostics for Recorder {
        fn unexpected(&self, operation: Operation, _outcome: &HttpOutcome) {
            self.seen.lock().unwrap().push(operation);
        }
    }

    fn submit(body: Value) -> (Classified, usize) {
        let recorder = Recorder::default();
        let result = classify_submission(Operation::Add, &HttpOutcome::Success(body), &recorder);
        (result, recorder.count())
    }

    fn search(body: Value) -> (Classified, usize) {
        let recorder = Recorder::default();
        let result = classify_search(&HttpOutcome::Success(body), &recorder);
        (result, recorder.count())
    }

    #[test]
    fn test_single_persisted_recipient() {
        let (result, logged) = submit(json!({"persisted_recipients": ["abc123"]}));
        assert_eq!(result, Ok(Accepted::Recipient("abc123".to_string())));
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_many_persisted_recipients() {
        let (result, _) = submit(json!({"persisted_recipients": ["a", "b", "c"]}));
        assert_eq!(
            result,
            Ok(Accepted::Recipients(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ]))
        );
    }

    #[test]
    fn test_empty_persisted_means_no_changes() {
        let (result, logged) = submit(json!({"persisted_recipients": []}));
        assert_eq!(result, Err(Rejection::NoChanges));
        assert_eq!(
            result.unwrap_err().messages(),
            vec!["No changes applied for recipient"]
        );
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_vendor_errors_in_order() {
        let (result, logged) = submit(json!({
            "error_count": 2,
            "errors": [{"message": "bad email"}, {"message": "dup"}]
        }));
        assert_eq!(
            result.unwrap_err().messages(),
            vec!["bad email", "dup"]
        );
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_bulk_ids_win_over_partial_errors() {
        let (result, _) = submit(json!({
            "persisted_recipients": ["a", "b"],
            "error_count": 1,
            "errors": [{"message": "invalid email", "error_indices": [2]}]
        }));
        assert_eq!(
            result,
            Ok(Accepted::Recipients(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_errors_win_over_single_id() {
        let (result, _) = submit(json!({
            "persisted_recipients": ["a"],
            "error_count": 1,
            "errors": [{"message": "invalid email"}]
        }));
        assert_eq!(result, Err(Rejection::Vendor(vec!["invalid email".to_string()])));
    }

    #[test]
    fn test_errors_win_over_no_changes() {
        let (result, _) = submit(json!({
            "persisted_recipients": [],
            "error_count": 1,
            "errors": [{"message": "field does not exist"}]
        }));
        assert_eq!(
            result,
            Err(Rejection::Vendor(vec!["field does not exist".to_string()]))
        );
    }

    #[test]
    fn test_zero_error_count_is_ignored() {
        let (result, _) = submit(json!({
            "persisted_recipients": ["only"],
            "error_count": 0,
            "errors": []
        }));
        assert_eq!(result, Ok(Accepted::Recipient("only".to_string())));
    }

    #[test]
    fn test_empty_body_is_unexpected_and_logged_once() {
        let (result, logged) = submit(json!({}));
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(result.unwrap_err().messages(), vec!["Unexpected error"]);
        assert_eq!(logged, 1);
    }

    #[test]
    fn test_error_count_without_messages_is_unexpected() {
        let (result, logged) = submit(json!({"error_count": 1, "errors": [{"code": 400}]}));
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(logged, 1);
    }

    #[test]
    fn test_non_string_ids_are_unexpected() {
        let (result, logged) = submit(json!({"persisted_recipients": [1, 2]}));
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(logged, 1);
    }

    #[test]
    fn test_non_object_body_is_unexpected() {
        let (result, logged) = submit(json!(["abc123"]));
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(logged, 1);
    }

    #[test]
    fn test_transport_failure_is_unexpected_and_logged_once() {
        let recorder = Recorder::default();
        let outcome = HttpOutcome::Failure(crate::Error::Timeout);
        let result = classify_submission(Operation::AddMultiple, &outcome, &recorder);
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Operation::AddMultiple]);
    }

    #[test]
    fn test_search_found() {
        let (result, logged) = search(json!({"recipients": [{"email": "x@y.com"}]}));
        let mut expected = Map::new();
        expected.insert("email".to_string(), json!("x@y.com"));
        assert_eq!(result, Ok(Accepted::Found(vec![expected])));
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_search_empty_result() {
        let (result, _) = search(json!({"recipients": [], "recipient_count": 0}));
        assert_eq!(result, Ok(Accepted::Found(Vec::new())));
    }

    #[test]
    fn test_search_errors_win_over_empty_recipients() {
        let (result, logged) = search(json!({
            "recipients": [],
            "error_count": 1,
            "errors": [{"message": "invalid field"}]
        }));
        assert_eq!(result, Err(Rejection::Vendor(vec!["invalid field".to_string()])));
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_search_unexpected_shapes() {
        let (result, logged) = search(json!({"persisted_recipients": ["a"]}));
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(logged, 1);

        let recorder = Recorder::default();
        let outcome = HttpOutcome::Failure(crate::Error::Timeout);
        assert_eq!(classify_search(&outcome, &recorder), Err(Rejection::Unexpected));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Operation::Search]);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let outcome = HttpOutcome::Success(json!({
            "persisted_recipients": ["a"],
            "error_count": 1,
            "errors": [{"message": "dup"}]
        }));
        let first = classify(Operation::Add, &outcome, &TracingDiagnostics);
        let second = classify(Operation::Add, &outcome, &TracingDiagnostics);
        assert_eq!(first, second);
    }

    #[test]
    fn test_closure_sink() {
        let calls = Mutex::new(0);
        let sink = |_: Operation, _: &HttpOutcome| *calls.lock().unwrap() += 1;
        let result = classify(Operation::Search, &HttpOutcome::Success(json!({})), &sink);
        assert_eq!(result, Err(Rejection::Unexpected));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::Vendor(vec!["bad email".to_string(), "dup".to_string()]);
        assert_eq!(rejection.to_string(), "bad email; dup");
        assert_eq!(Rejection::NoChanges.to_string(), NO_CHANGES_MESSAGE);
    }
}
