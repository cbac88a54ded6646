//! The recipients operations: add one, upsert many, search.

use std::sync::Arc;

use serde_json::Value;

use crate::classify::{self, Classified, Diagnostics, Operation, TracingDiagnostics};
use crate::payload::{search_query, ContactPayload};
use crate::transport::{search_path, HttpClient, RECIPIENTS_PATH};

/// Contact Database recipients, reached through any [`HttpClient`].
///
/// Holds no state besides the transport and the diagnostics sink, so one
/// value can serve concurrent callers.
///
/// ```no_run
/// use contactdb::{Accepted, Client, Recipients};
///
/// # async fn example() -> Result<(), contactdb::Error> {
/// let recipients = Recipients::new(Client::new("SG.xxxxx")?);
///
/// if let Ok(Accepted::Found(found)) = recipients.search([("email", "ann@example.com")]).await {
///     println!("{} match(es)", found.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Recipients<H> {
    http: H,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<H: HttpClient> Recipients<H> {
    /// Wraps `http`, logging unexpected outcomes through `tracing`.
    pub fn new(http: H) -> Self {
        Self {
            http,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replaces the sink that receives unexpected outcomes.
    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// The underlying transport.
    pub fn http(&self) -> &H {
        &self.http
    }

    /// Creates one recipient from an email address alone.
    pub async fn add(&self, email: &str) -> Classified {
        self.add_with_fields(email, Vec::<(String, Value)>::new())
            .await
    }

    /// Creates one recipient with custom fields.
    ///
    /// `custom_fields` are merged over `{"email": email}`, so an `email`
    /// entry among them replaces `email`.
    pub async fn add_with_fields<K, V>(
        &self,
        email: &str,
        custom_fields: impl IntoIterator<Item = (K, V)>,
    ) -> Classified
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let payload = [ContactPayload::new(email).merge(custom_fields)];
        tracing::debug!(operation = %Operation::Add, "Submitting recipient");

        let outcome = self.http.post(RECIPIENTS_PATH, &payload).await;
        classify::classify_submission(Operation::Add, &outcome, self.diagnostics.as_ref())
    }

    /// Creates or updates every recipient in one request.
    ///
    /// Payloads are sent as given; the vendor validates them.
    pub async fn add_multiple(&self, recipients: &[ContactPayload]) -> Classified {
        tracing::debug!(
            operation = %Operation::AddMultiple,
            count = recipients.len(),
            "Submitting recipients"
        );

        let outcome = self.http.patch(RECIPIENTS_PATH, recipients).await;
        classify::classify_submission(Operation::AddMultiple, &outcome, self.diagnostics.as_ref())
    }

    /// Finds recipients whose fields match every `(field, value)` pair.
    ///
    /// Values may be strings, numbers or booleans; see
    /// [`search_query`](crate::payload::search_query) for the encoding.
    pub async fn search<K, V>(&self, criteria: impl IntoIterator<Item = (K, V)>) -> Classified
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let path = search_path(&search_query(criteria));
        tracing::debug!(operation = %Operation::Search, path = %path, "Searching recipients");

        let outcome = self.http.get(&path).await;
        classify::classify_search(&outcome, self.diagnostics.as_ref())
    }
}
