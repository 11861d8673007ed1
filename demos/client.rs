//! Example x402 client.
//!
//! This example demonstrates how to make requests to an x402-enabled server,
//! automatically paying for them on Stacks, first through the explicit client
//! and then through a wrapped `reqwest` client.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```
//!
//! Environment variables (a `.env` file is read as well):
//! - STACKS_PRIVATE_KEY: Your private key for signing payments
//! - STACKS_NETWORK: `mainnet` or `testnet` (default `testnet`)
//! - STACKS_API_URL: Stacks node API, defaults to Hiro's public API
//! - API_URL: The protected API endpoint to access

use x402_stacks::client::{get, X402ClientConfig};
use x402_stacks::middleware::wrap_client;
use x402_stacks::utils::payment_response_from_headers;
use x402_stacks::Network;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = X402ClientConfig::from_env()?;

    let api_url = std::env::var("API_URL")
        .unwrap_or_else(|_| "http://localhost:3000/weather".to_string());

    let network = config.preferred_network.unwrap_or(Network::Testnet);
    let payer = config
        .signer
        .sdk()
        .address_from_key(&config.private_key, network)?;

    println!("x402 Stacks client");
    println!("   Payer: {}", payer);
    println!("   API:   {}", api_url);
    println!();

    println!("Requesting with the explicit client...");
    match get(&config, &api_url).await {
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        Err(e) => {
            eprintln!("Error ({:?}): {}", e.kind(), e);
            return Err(e.into());
        }
    }

    println!("\nRequesting through the middleware...");
    let client = wrap_client(reqwest::Client::new(), config);
    let response = client.get(&api_url).send().await?;
    println!("Response status: {}", response.status());

    if let Some(receipt) = payment_response_from_headers(response.headers()) {
        println!("Payment {} is {}", receipt.tx_id, receipt.status);
    }
    println!("{}", response.text().await?);

    Ok(())
}
