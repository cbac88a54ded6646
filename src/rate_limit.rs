//! Rate limit headers and how long to wait for them.
//!
//! The recipients API answers throttled requests with `429` plus
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
//! (a Unix timestamp). When a 429 is retried, [`Client`](crate::Client)
//! waits until the reset instead of using its retry strategy's delay.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rate limit state reported by one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// From `X-RateLimit-Reset` or `RateLimit-Reset`.
    pub reset_at: Option<SystemTime>,

    /// From `Retry-After`, in seconds or as an HTTP date.
    pub retry_after: Option<Duration>,

    /// From `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,

    /// From `X-RateLimit-Limit`.
    pub limit: Option<u64>,
}

impl RateLimitInfo {
    /// Reads every rate limit header present in `headers`.
    ///
    /// ```
    /// use contactdb::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-ratelimit-limit", "500".parse().unwrap());
    /// headers.insert("x-ratelimit-remaining", "0".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.limit, Some(500));
    /// assert!(info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            reset_at: parse_reset(headers),
            retry_after: parse_retry_after(headers),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
            limit: header_u64(headers, "x-ratelimit-limit"),
        }
    }

    /// Time to wait before trying again, capped at `max_wait`.
    ///
    /// `Retry-After` takes precedence over the reset timestamp. A reset that
    /// already passed yields `None`.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }

        let until_reset = self.reset_at?.duration_since(SystemTime::now()).ok()?;
        Some(until_reset.min(max_wait))
    }

    /// `Retry-After` was sent, or no requests remain in the window.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }
}

/// How [`Client`](crate::Client) reacts to rate limit headers.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Parse headers and prefer their delay over the retry strategy.
    pub enabled: bool,

    /// Longest wait accepted for a single reset. Defaults to one minute.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Ignores rate limit headers entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enabled, with a custom cap on each wait.
    pub fn with_max_wait(max_wait: Duration) -> Self {
        Self {
            enabled: true,
            max_wait,
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    httpdate::parse_http_date(value)
        .ok()?
        .duration_since(SystemTime::now())
        .ok()
}

fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    ["x-ratelimit-reset", "ratelimit-reset"]
        .into_iter()
        .find_map(|name| header_u64(headers, name))
        .and_then(|timestamp| UNIX_EPOCH.checked_add(Duration::from_secs(timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.retry_after, Some(Duration::from_secs(30)));
        assert!(info.is_rate_limited());
        assert_eq!(info.delay(Duration::from_secs(60)), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let later = SystemTime::now() + Duration::from_secs(120);
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_str(&httpdate::fmt_http_date(later)).unwrap(),
        );

        let delay = RateLimitInfo::from_headers(&headers).retry_after.unwrap();
        assert!(delay > Duration::from_secs(100) && delay <= Duration::from_secs(120));
    }

    #[test]
    fn test_reset_timestamp_delay() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&(unix_now() + 3).to_string()).unwrap(),
        );
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));

        let info = RateLimitInfo::from_headers(&headers);
        assert!(info.is_rate_limited());

        // Whole-second timestamps can shave up to a second off.
        let delay = info.delay(Duration::from_secs(60)).unwrap();
        assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
    }

    #[test]
    fn test_past_reset_has_no_delay() {
        let info = RateLimitInfo {
            reset_at: Some(UNIX_EPOCH + Duration::from_secs(1)),
            ..RateLimitInfo::default()
        };
        assert_eq!(info.delay(Duration::from_secs(60)), None);
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_delay_capped_by_max_wait() {
        let info = RateLimitInfo {
            retry_after: Some(Duration::from_secs(600)),
            ..RateLimitInfo::default()
        };
        assert_eq!(info.delay(Duration::from_secs(60)), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_out_of_range_reset_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("18446744073709551615"),
        );
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.reset_at, None);
        assert_eq!(info.remaining, Some(0));
        assert_eq!(info.delay(Duration::from_secs(60)), None);
    }

    #[test]
    fn test_garbage_headers_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("lots"));
        headers.insert("retry-after", HeaderValue::from_static("soon"));

        assert_eq!(RateLimitInfo::from_headers(&headers), RateLimitInfo::default());
    }
}
