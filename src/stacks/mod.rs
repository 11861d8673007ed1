//! The Stacks chain collaborator.
//!
//! The payment engine talks to the chain only through [`ChainSdk`]: derive an
//! address from a key, sign a transfer, and (for the legacy path) broadcast
//! it. [`StacksSdk`] is the production implementation, built on the
//! primitives in the submodules.

pub mod api;
pub mod c32;
pub mod clarity;
pub mod transaction;

use crate::encoder::UnsignedTransfer;
use crate::errors::{Result, X402Error};
use crate::types::{Network, PaymentDetails};
use api::StacksApi;
use async_trait::async_trait;
use reqwest::Client;
use transaction::{PostConditionMode, StacksPrivateKey, StacksTransaction, TransactionPayload};

/// Lowest fee the node will relay, in micro-STX.
pub const MINIMUM_FEE: u64 = 180;

/// A signed transaction, ready to attach as `X-PAYMENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// Hex-encoded serialized transaction
    pub transaction: String,
    /// Transaction id
    pub txid: String,
}

/// Chain operations the payment engine depends on.
///
/// Implementations must not broadcast from [`sign_transfer`](ChainSdk::sign_transfer).
#[async_trait]
pub trait ChainSdk: Send + Sync {
    /// Address controlled by `private_key` on `network`.
    fn address_from_key(&self, private_key: &str, network: Network) -> Result<String>;

    /// Builds and signs `transfer` with the key, network and overrides in `details`.
    async fn sign_transfer(
        &self,
        transfer: &UnsignedTransfer,
        details: &PaymentDetails,
    ) -> Result<SignedTransfer>;

    /// Submits a hex-encoded signed transaction and returns its txid.
    async fn broadcast(&self, signed_transaction: &str, network: Network) -> Result<String>;
}

/// [`ChainSdk`] backed by a Stacks node API.
///
/// Nodes are only contacted when a nonce or fee has to be looked up, or on
/// broadcast.
#[derive(Debug, Clone)]
pub struct StacksSdk {
    client: Client,
    mainnet_api_url: String,
    testnet_api_url: String,
}

impl Default for StacksSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl StacksSdk {
    /// Creates an SDK pointed at the public Hiro APIs.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            mainnet_api_url: Network::Mainnet.default_api_url().to_string(),
            testnet_api_url: Network::Testnet.default_api_url().to_string(),
        }
    }

    /// Uses `url` as the node API for `network`.
    pub fn with_api_url(mut self, network: Network, url: impl Into<String>) -> Self {
        match network {
            Network::Mainnet => self.mainnet_api_url = url.into(),
            Network::Testnet => self.testnet_api_url = url.into(),
        }
        self
    }

    /// Sets a custom HTTP client for node requests.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Node API URL configured for `network`.
    pub fn api_url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_api_url,
            Network::Testnet => &self.testnet_api_url,
        }
    }

    fn api(&self, network: Network) -> Result<StacksApi> {
        StacksApi::new(self.client.clone(), self.api_url(network))
    }
}

fn build_transaction(
    transfer: &UnsignedTransfer,
    network: Network,
    key: &StacksPrivateKey,
) -> Result<StacksTransaction> {
    let (mode, payload) = match transfer {
        UnsignedTransfer::Native {
            recipient,
            amount,
            memo,
        } => (
            PostConditionMode::Deny,
            TransactionPayload::token_transfer(recipient, *amount, memo.as_deref().unwrap_or(""))?,
        ),
        // no asset name to build a fungible post condition from
        UnsignedTransfer::ContractCall {
            contract,
            function_name,
            args,
        } => (
            PostConditionMode::Allow,
            TransactionPayload::contract_call(
                &contract.address,
                &contract.name,
                function_name,
                args.clone(),
            )?,
        ),
    };
    Ok(StacksTransaction::new(network, key, mode, payload))
}

#[async_trait]
impl ChainSdk for StacksSdk {
    fn address_from_key(&self, private_key: &str, network: Network) -> Result<String> {
        Ok(StacksPrivateKey::from_hex(private_key)?.address(network))
    }

    async fn sign_transfer(
        &self,
        transfer: &UnsignedTransfer,
        details: &PaymentDetails,
    ) -> Result<SignedTransfer> {
        let key = StacksPrivateKey::from_hex(&details.sender_key)?;
        let mut tx = build_transaction(transfer, details.network, &key)?;

        tx.nonce = match details.nonce {
            Some(nonce) => nonce,
            None => {
                self.api(details.network)?
                    .next_nonce(&key.address(details.network))
                    .await?
            }
        };
        tx.fee = match details.fee {
            Some(fee) => fee,
            None => {
                let rate = self.api(details.network)?.fee_rate().await?;
                let estimate = rate.saturating_mul(tx.serialize().len() as u64);
                estimate.max(MINIMUM_FEE)
            }
        };

        tx.sign(&key)?;
        Ok(SignedTransfer {
            transaction: hex::encode(tx.serialize()),
            txid: tx.txid(),
        })
    }

    async fn broadcast(&self, signed_transaction: &str, network: Network) -> Result<String> {
        let bytes = hex::decode(signed_transaction.trim_start_matches("0x"))
            .map_err(|e| X402Error::BroadcastError(format!("transaction is not hex: {}", e)))?;
        let txid = self.api(network)?.broadcast(bytes).await?;
        tracing::info!(txid = %txid, network = %network, "broadcast transaction");
        Ok(txid)
    }
}
