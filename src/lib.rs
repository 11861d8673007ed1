//! # x402-stacks
//!
//! Client-side x402 payments on the Stacks blockchain.
//!
//! The x402 protocol revitalizes the HTTP 402 "Payment Required" status code: a
//! server answers with a machine-readable payment offer, and the client pays by
//! attaching a signed transaction to a retried request. This crate is the
//! payer's half. It validates offers, signs STX, sBTC and USDCx transfers, and
//! drives the retry, either as an explicit call or as a `reqwest` middleware.
//!
//! ## Features
//!
//! - **Explicit client**: [`client::request_with_payment`] with a bounded number of payments per call
//! - **Middleware**: [`middleware::wrap_client`] adds 402 handling to any `reqwest::Client`
//! - **Tokens**: native STX transfers and SIP-010 `transfer` calls for sBTC and USDCx
//! - **Memos**: a small codec for packing resource and nonce into the 34-byte transfer memo
//! - **Pluggable chain access**: signing goes through the [`stacks::ChainSdk`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use x402_stacks::client::{get, X402ClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // STACKS_PRIVATE_KEY, STACKS_NETWORK, STACKS_API_URL
//! let config = X402ClientConfig::from_env()?;
//!
//! let body = get(&config, "https://api.example.com/weather").await?;
//! println!("Response: {}", body);
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! 1. **Client requests resource**: Standard HTTP request
//! 2. **Server responds with 402**: The body is a [`PaymentRequest`]
//! 3. **Client signs a payment**: A Stacks transaction paying `payTo`, not broadcast
//! 4. **Client retries with payment**: `X-PAYMENT` carries the transaction hex,
//!    `X-PAYMENT-TOKEN-TYPE` the token
//! 5. **Server settles**: It broadcasts the transaction itself, or through a facilitator
//! 6. **Server responds with 200**: Optionally with an `X-PAYMENT-RESPONSE` receipt
//!
//! Expired offers are never signed, and a request is paid for at most once per
//! allowed retry.
//!
//! ## References
//!
//! - [x402 Specification](https://github.com/coinbase/x402)
//! - [x402.org](https://x402.org)
//! - [SIP-010](https://github.com/stacksgov/sips/blob/main/sips/sip-010/sip-010-fungible-token-standard.md)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod encoder;
pub mod errors;
pub mod memo;
pub mod middleware;
pub mod signer;
pub mod stacks;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items
pub use client::{get, post, request_with_payment, RequestOptions, RetryBackoff, X402ClientConfig};
pub use errors::{ErrorKind, Result, X402Error};
pub use memo::{decode_memo, encode_memo, DecodedMemo};
pub use middleware::{wrap_client, X402Middleware};
pub use signer::PaymentSigner;
pub use stacks::{ChainSdk, StacksSdk};
pub use types::{
    Network, PaymentDetails, PaymentRequest, PaymentResponse, PaymentResult, SignedPayment,
    SignedPaymentResult, TokenContract, TokenType,
};
pub use validation::validate;
