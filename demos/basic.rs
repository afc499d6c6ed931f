//! Basic usage example for the SignVault SDK.
//!
//! This example demonstrates:
//! - Creating a client with ETag caching enabled
//! - Creating and fetching an envelope
//! - Seeing a repeat read served from the cache
//! - Handling normalized errors
//!
//! Run with:
//! ```bash
//! SIGNVAULT_BASE_URL=https://api.signvault.io/v1 SIGNVAULT_API_KEY=sv_live_xxx cargo run --example basic
//! ```

use signvault::{Client, ClientConfig, CreateEnvelopeRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("SIGNVAULT_BASE_URL")
        .unwrap_or_else(|_| "https://api.signvault.io/v1".to_string());
    let api_key = std::env::var("SIGNVAULT_API_KEY")
        .expect("SIGNVAULT_API_KEY environment variable required");

    println!("Creating SignVault client...");
    let client = Client::with_config(ClientConfig {
        base_url,
        api_key: Some(api_key),
        enable_etag_cache: true,
        debug: true,
        ..Default::default()
    })?;

    println!("\nCreating a draft envelope...");
    let envelope = client
        .envelopes()
        .create(CreateEnvelopeRequest {
            subject: "Mutual NDA".to_string(),
            message: Some("Please review and sign.".to_string()),
            metadata: None,
        })
        .await?;
    println!("  ID:     {}", envelope.id);
    println!("  Status: {:?}", envelope.status);

    println!("\nFetching it twice...");
    let first = client.envelopes().get(&envelope.id).await?;
    let second = client.envelopes().get(&envelope.id).await?;
    println!("  first:  from_cache={} etag={:?}", first.from_cache, first.etag);
    println!("  second: from_cache={} etag={:?}", second.from_cache, second.etag);

    if let Some(cache) = client.cache() {
        let stats = cache.stats();
        println!("  cache:  {}/{} entries", stats.size, stats.max_size);
    }

    println!("\nDeleting the draft...");
    client.envelopes().delete(&envelope.id).await?;

    match client.envelopes().get(&envelope.id).await {
        Ok(_) => println!("Envelope still exists?"),
        Err(e) => match e.api() {
            Some(api) if api.is_not_found() => println!("Envelope gone (404)."),
            _ => println!("Error: {}", e),
        },
    }

    println!("\nDone!");
    Ok(())
}
