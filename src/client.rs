//! The stock `reqwest`-backed [`HttpClient`].
//!
//! [`Client`] turns each request into an [`HttpOutcome`]: any response whose
//! body decodes as JSON is a success, whatever its status, and everything
//! else becomes a [`Failure`](HttpOutcome::Failure) carrying an [`Error`].
//! Use [`ClientBuilder`] to configure it.

use crate::{
    rate_limit::{RateLimitConfig, RateLimitInfo},
    retry::{RetryOnRetryable, RetryPredicate, RetryStrategy},
    Error, HttpClient, HttpOutcome, Result,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Where requests go unless [`ClientBuilder::base_url`] says otherwise.
pub const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";

const USER_AGENT: &str = concat!("contactdb/", env!("CARGO_PKG_VERSION"));

/// An authenticated connection to the recipients API.
///
/// Cheap to clone; clones share one connection pool.
///
/// ```no_run
/// use contactdb::{Client, Recipients};
///
/// # async fn example() -> Result<(), contactdb::Error> {
/// let client = Client::builder().api_key("SG.xxxxx")?.build()?;
/// let recipients = Recipients::new(client);
///
/// match recipients.add("ann@example.com").await {
///     Ok(accepted) => println!("stored: {accepted:?}"),
///     Err(rejection) => eprintln!("rejected: {:?}", rejection.messages()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    retry_predicate: Box<dyn RetryPredicate>,
    timeout: Option<Duration>,
    rate_limit_config: RateLimitConfig,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client for the default base URL, authenticated with `api_key`.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        Self::builder().api_key(api_key)?.build()
    }

    /// The URL every request path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    async fn call<B>(&self, method: Method, path: &str, body: Option<&B>) -> HttpOutcome
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, body).await.into()
    }

    /// Runs the retry loop and settles the last attempt into a body or an error.
    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = resolve_url(&self.inner.base_url, path)?;
        let payload = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;

        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match self
                .execute_request(&method, &url, payload.as_ref(), attempt)
                .await
            {
                Ok(response) => {
                    self.parse_response(response, start_time.elapsed(), attempt)
                        .await
                }
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %method,
                path = %path,
                "Request failed"
            );

            if !self.inner.retry_predicate.should_retry(&error, attempt) {
                return settle(error);
            }

            let Some(delay) = self.retry_delay(&error, attempt) else {
                if attempt == 1 {
                    return settle(error);
                }
                return settle(Error::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            };

            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Rate limit headers win over the strategy when both apply.
    fn retry_delay(&self, error: &Error, attempt: usize) -> Option<Duration> {
        let config = &self.inner.rate_limit_config;
        if config.enabled {
            if let Some(delay) = error.rate_limit_delay(config.max_wait) {
                // Still bounded by the strategy's retry budget.
                self.inner.retry_strategy.delay_for_attempt(attempt)?;
                tracing::info!(
                    rate_limit_delay_ms = delay.as_millis(),
                    attempt = attempt,
                    "Rate limited - waiting for reset"
                );
                return Some(delay);
            }
        }
        self.inner.retry_strategy.delay_for_attempt(attempt)
    }

    async fn execute_request(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&Value>,
        attempt: usize,
    ) -> Result<reqwest::Response> {
        tracing::debug!(
            method = %method,
            url = %url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut request = self
            .inner
            .http_client
            .request(method.clone(), url.clone())
            .headers(self.inner.default_headers.clone());

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        if let Some(payload) = payload {
            request = request.json(payload);
        }

        request.send().await.map_err(transport_error)
    }

    /// Decodes the body; every non-2xx becomes an [`Error::HttpError`] so the
    /// retry loop can see it.
    async fn parse_response(
        &self,
        response: reqwest::Response,
        latency: Duration,
        attempts: usize,
    ) -> Result<Value> {
        let status = response.status();
        let headers = response.headers().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        let raw_body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let rate_limit_info = if self.inner.rate_limit_config.enabled {
                Some(RateLimitInfo::from_headers(&headers)).filter(RateLimitInfo::is_rate_limited)
            } else {
                None
            };

            if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Server error (5xx)"
                );
            } else {
                tracing::debug!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Client error (4xx)"
                );
            }

            return Err(Error::HttpError {
                status,
                raw_response: raw_body,
                headers,
                rate_limit_info,
            });
        }

        serde_json::from_str::<Value>(&raw_body).map_err(|e| {
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to decode response"
            );
            Error::DeserializationFailed {
                raw_response: raw_body.clone(),
                serde_error: e.to_string(),
                status,
            }
        })
    }
}

impl HttpClient for Client {
    async fn post<B>(&self, path: &str, body: &B) -> HttpOutcome
    where
        B: Serialize + Sync + ?Sized,
    {
        self.call(Method::POST, path, Some(body)).await
    }

    async fn patch<B>(&self, path: &str, body: &B) -> HttpOutcome
    where
        B: Serialize + Sync + ?Sized,
    {
        self.call(Method::PATCH, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> HttpOutcome {
        self.call::<()>(Method::GET, path, None).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry_strategy", &self.inner.retry_strategy)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

/// A vendor error body on a non-2xx response is still a body.
fn settle(error: Error) -> Result<Value> {
    let decoded = error
        .raw_response()
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok());

    match decoded {
        Some(body) if error.status().is_some_and(|s| !s.is_success()) => Ok(body),
        _ => Err(error),
    }
}

/// Appends `path` (which may carry a query) to the base URL's own path, so a
/// base of `https://proxy.example/sendgrid` keeps its `/sendgrid` prefix.
fn resolve_url(base: &Url, path: &str) -> Result<Url> {
    let prefix = base.path().trim_end_matches('/');
    Ok(base.join(&format!("{}{}", prefix, path))?)
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

/// Builder for [`Client`].
///
/// ```no_run
/// use contactdb::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), contactdb::Error> {
/// let client = ClientBuilder::new()
///     .api_key("SG.xxxxx")?
///     .timeout(Duration::from_secs(10))
///     .retry_strategy(RetryStrategy::Linear {
///         delay: Duration::from_millis(500),
///         max_retries: 2,
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    timeout: Option<Duration>,
    rate_limit_config: RateLimitConfig,
}

impl ClientBuilder {
    /// Creates a builder with no retries and the default base URL.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_strategy: RetryStrategy::None,
            retry_predicate: None,
            timeout: None,
            rate_limit_config: RateLimitConfig::default(),
        }
    }

    /// Overrides [`DEFAULT_BASE_URL`].
    ///
    /// Request paths are appended to the URL's path, so a gateway prefix such
    /// as `https://proxy.example/sendgrid` is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sends `Authorization: Bearer <api_key>` with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value.
    pub fn api_key(mut self, api_key: impl AsRef<str>) -> Result<Self> {
        let mut value = HeaderValue::try_from(format!("Bearer {}", api_key.as_ref()))
            .map_err(|e| Error::ConfigurationError(format!("Invalid API key: {}", e)))?;
        value.set_sensitive(true);
        self.default_headers.insert(header::AUTHORIZATION, value);
        Ok(self)
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry strategy. Defaults to [`RetryStrategy::None`].
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets which failures are retried. Defaults to [`RetryOnRetryable`].
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Sets a per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how rate limit headers are handled.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Builds the [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnRetryable));

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                default_headers: self.default_headers,
                retry_strategy: self.retry_strategy,
                retry_predicate,
                timeout: self.timeout,
                rate_limit_config: self.rate_limit_config,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;

    fn http_error(status: StatusCode, body: &str) -> Error {
        Error::HttpError {
            status,
            raw_response: body.to_string(),
            headers: HeaderMap::new(),
            rate_limit_info: None,
        }
    }

    #[test]
    fn test_default_base_url() {
        let client = Client::builder().build().unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.sendgrid.com/");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = Client::builder().api_key("line\nbreak");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = Client::builder().base_url("not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_resolve_url_keeps_base_path() {
        for base in ["https://proxy.example/sendgrid", "https://proxy.example/sendgrid/"] {
            let base = Url::parse(base).unwrap();
            let url = resolve_url(&base, "/v3/contactdb/recipients/search?email=a%40b.com").unwrap();
            assert_eq!(url.path(), "/sendgrid/v3/contactdb/recipients/search");
            assert_eq!(url.query(), Some("email=a%40b.com"));
        }

        let root = Url::parse(DEFAULT_BASE_URL).unwrap();
        let url = resolve_url(&root, "/v3/contactdb/recipients").unwrap();
        assert_eq!(url.as_str(), "https://api.sendgrid.com/v3/contactdb/recipients");
    }

    #[test]
    fn test_settle_keeps_json_error_bodies() {
        let body = settle(http_error(
            StatusCode::BAD_REQUEST,
            r#"{"errors":[{"message":"bad"}]}"#,
        ))
        .unwrap();
        assert_eq!(body, json!({"errors": [{"message": "bad"}]}));
    }

    #[test]
    fn test_settle_sees_through_exhausted_retries() {
        let error = Error::MaxRetriesExceeded {
            attempts: 2,
            last_error: Box::new(http_error(StatusCode::SERVICE_UNAVAILABLE, r#"{"x":1}"#)),
        };
        assert_eq!(settle(error).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_settle_rejects_non_json() {
        let error = settle(http_error(StatusCode::BAD_GATEWAY, "<html>")).unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(matches!(settle(Error::Timeout), Err(Error::Timeout)));
    }
}
