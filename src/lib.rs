//! # contactdb - SendGrid Contact Database recipients client
//!
//! Adds, upserts and searches recipients in the SendGrid v3 Contact Database
//! (`/v3/contactdb/recipients`) and turns each loosely shaped vendor
//! response into a typed [`Classified`] result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use contactdb::{Accepted, Client, ContactPayload, Recipients};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), contactdb::Error> {
//!     let recipients = Recipients::new(Client::new("SG.xxxxx")?);
//!
//!     // One recipient, with a registered custom field
//!     match recipients
//!         .add_with_fields("ann@example.com", [("first_name", json!("Ann"))])
//!         .await
//!     {
//!         Ok(Accepted::Recipient(id)) => println!("created {id}"),
//!         Ok(other) => println!("unexpected success shape: {other:?}"),
//!         Err(rejection) => eprintln!("rejected: {:?}", rejection.messages()),
//!     }
//!
//!     // Several at once (create or update)
//!     let batch = [
//!         ContactPayload::new("bob@example.com"),
//!         ContactPayload::new("cy@example.com").with_field("last_name", "Cy"),
//!     ];
//!     if let Ok(Accepted::Recipients(ids)) = recipients.add_multiple(&batch).await {
//!         println!("stored {} recipients", ids.len());
//!     }
//!
//!     // Search by field values
//!     if let Ok(Accepted::Found(found)) = recipients.search([("last_name", "Cy")]).await {
//!         println!("{} match(es)", found.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Results
//!
//! Every operation returns `Result<Accepted, Rejection>` and never panics on
//! a vendor response. See [`classify`] for the exact decision tables.
//! [`Rejection::Unexpected`] always comes with one call to the configured
//! [`Diagnostics`] sink holding the full [`HttpOutcome`]; the default sink
//! logs it with `tracing`.
//!
//! ## Transport
//!
//! [`Recipients`] talks to the network through the [`HttpClient`] trait.
//! [`Client`] is the bundled implementation on top of `reqwest`, with
//! optional retries ([`RetryStrategy`]) and rate limit handling
//! ([`rate_limit::RateLimitConfig`]). Retries are off by default.

pub mod classify;
mod client;
mod error;
mod outcome;
pub mod payload;
pub mod rate_limit;
mod recipients;
pub mod retry;
mod transport;

pub use classify::{Accepted, Classified, Diagnostics, Operation, Rejection, TracingDiagnostics};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use outcome::HttpOutcome;
pub use payload::ContactPayload;
pub use recipients::Recipients;
pub use retry::{RetryPredicate, RetryStrategy};
pub use transport::{search_path, HttpClient, RECIPIENTS_PATH};
