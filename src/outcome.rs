//! The raw result of one HTTP exchange, before classification.

use serde_json::Value;

use crate::Error;

/// What an [`HttpClient`](crate::HttpClient) hands back for one request.
///
/// `Success` carries any JSON-decoded body, whatever the status code was.
/// `Failure` means no decodable body exists: the connection failed, the
/// request timed out, or the server answered with something that is not
/// JSON.
#[derive(Debug)]
pub enum HttpOutcome {
    /// A decoded JSON body.
    Success(Value),
    /// The transport could not produce a body.
    Failure(Error),
}

impl HttpOutcome {
    /// Returns the decoded body, if there is one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            HttpOutcome::Success(body) => Some(body),
            HttpOutcome::Failure(_) => None,
        }
    }

    /// Returns `true` for transport failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, HttpOutcome::Failure(_))
    }
}

impl From<Value> for HttpOutcome {
    fn from(body: Value) -> Self {
        HttpOutcome::Success(body)
    }
}

impl From<Error> for HttpOutcome {
    fn from(error: Error) -> Self {
        HttpOutcome::Failure(error)
    }
}

impl From<crate::Result<Value>> for HttpOutcome {
    fn from(result: crate::Result<Value>) -> Self {
        match result {
            Ok(body) => HttpOutcome::Success(body),
            Err(error) => HttpOutcome::Failure(error),
        }
    }
}
