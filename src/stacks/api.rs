//! Minimal client for a Stacks node's HTTP API.

use crate::errors::{Result, X402Error};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

#[derive(Deserialize)]
struct NoncesResponse {
    possible_next_nonce: u64,
}

#[derive(Deserialize)]
struct BroadcastRejection {
    error: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Nonce lookup, fee estimation and broadcast against one node.
#[derive(Debug, Clone)]
pub struct StacksApi {
    client: Client,
    base_url: Url,
}

impl StacksApi {
    /// Creates a client for the node at `base_url`.
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // keep the last path segment when joining relative paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Next nonce the node will accept for `address`.
    pub async fn next_nonce(&self, address: &str) -> Result<u64> {
        let url = self
            .base_url
            .join(&format!("extended/v1/address/{}/nonces", address))?;
        tracing::debug!(address = %address, "fetching nonce");

        let response = self.client.get(url).send().await?;
        let response = error_for_status(response).await?;
        let nonces: NoncesResponse = response.json().await?;
        Ok(nonces.possible_next_nonce)
    }

    /// Current fee rate in micro-STX per byte.
    pub async fn fee_rate(&self) -> Result<u64> {
        let url = self.base_url.join("v2/fees/transfer")?;
        let response = self.client.get(url).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json::<u64>().await?)
    }

    /// Submits a serialized transaction and returns its txid.
    pub async fn broadcast(&self, transaction: Vec<u8>) -> Result<String> {
        let url = self.base_url.join("v2/transactions")?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(transaction)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = match serde_json::from_str::<BroadcastRejection>(&body) {
                Ok(rejection) => match rejection.reason {
                    Some(reason) => format!("{} ({})", rejection.error, reason),
                    None => rejection.error,
                },
                Err(_) => body,
            };
            return Err(X402Error::BroadcastError(reason));
        }

        let txid: String = serde_json::from_str(&body)
            .map_err(|_| X402Error::BroadcastError(format!("unexpected response: {}", body)))?;
        Ok(txid.trim_start_matches("0x").to_string())
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(X402Error::HttpStatus {
        status: status.as_u16(),
        body,
    })
}
