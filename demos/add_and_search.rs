//! Adds a recipient, then searches for it.
//!
//! Run with: `cargo run --example add_and_search -- <api-key> <email>`

use contactdb::{Accepted, Client, Recipients, Rejection, RetryStrategy};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), contactdb::Error> {
    tracing_subscriber::fmt()
        .with_env_filter("contactdb=debug,add_and_search=info")
        .init();

    let mut args = std::env::args().skip(1);
    let api_key = args.next().unwrap_or_default();
    let email = args.next().unwrap_or_else(|| "ann@example.com".to_string());

    let client = Client::builder()
        .api_key(api_key)?
        .timeout(Duration::from_secs(10))
        .retry_strategy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_retries: 2,
            jitter: true,
        })
        .build()?;
    let recipients = Recipients::new(client);

    println!("=== Add ===");
    match recipients
        .add_with_fields(&email, [("first_name", json!("Ann"))])
        .await
    {
        Ok(Accepted::Recipient(id)) => println!("Created recipient {id}"),
        Ok(other) => println!("Stored: {other:?}"),
        Err(Rejection::NoChanges) => println!("Recipient already up to date"),
        Err(rejection) => {
            for message in rejection.messages() {
                println!("Rejected: {message}");
            }
        }
    }

    println!("=== Search ===");
    match recipients.search([("email", email.as_str())]).await {
        Ok(Accepted::Found(found)) => {
            for recipient in found {
                println!("{}", serde_json::Value::Object(recipient));
            }
        }
        Ok(other) => println!("Unexpected success shape: {other:?}"),
        Err(rejection) => println!("Search failed: {:?}", rejection.messages()),
    }

    Ok(())
}
