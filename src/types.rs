//! Core type definitions for the x402 protocol on Stacks.
//!
//! This module contains the wire types exchanged with x402 servers (the 402
//! payment request and the `X-PAYMENT-RESPONSE` receipt) and the client-side
//! values derived from them while a payment is signed.

use crate::errors::{Result, X402Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header carrying the hex-encoded signed transaction on the retried request.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header naming the token the attached transaction pays with.
pub const X_PAYMENT_TOKEN_TYPE_HEADER: &str = "X-PAYMENT-TOKEN-TYPE";

/// Optional response header with the base64 JSON settlement receipt.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Size of the memo field carried by a Stacks token transfer, in bytes.
pub const MEMO_MAX_BYTES: usize = 34;

/// Stacks network a payment is made on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Stacks mainnet
    Mainnet,
    /// Stacks testnet
    Testnet,
}

impl Network {
    /// Returns the wire name (`"mainnet"` or `"testnet"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// c32 version byte of single-signature addresses on this network.
    pub fn address_version(&self) -> u8 {
        match self {
            Network::Mainnet => 22,
            Network::Testnet => 26,
        }
    }

    /// Transaction version byte.
    pub fn transaction_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x80,
        }
    }

    /// Chain id written into every transaction.
    pub fn chain_id(&self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    /// Public Hiro API endpoint used when no node URL is configured.
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet.hiro.so",
            Network::Testnet => "https://api.testnet.hiro.so",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(X402Error::Validation(format!(
                "unsupported network '{}', expected 'mainnet' or 'testnet'",
                other
            ))),
        }
    }
}

/// Token a payment request asks to be paid in.
///
/// `Stx` is the native asset. `Sbtc` and `Usdcx` are SIP-010 fungible tokens
/// that share one transfer encoding and differ only in label and default
/// contract.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenType {
    /// Native STX
    #[default]
    #[serde(rename = "STX")]
    Stx,
    /// sBTC (SIP-010)
    #[serde(rename = "sBTC")]
    Sbtc,
    /// USDCx (SIP-010)
    #[serde(rename = "USDCx")]
    Usdcx,
}

impl TokenType {
    /// Display label, also used as the `X-PAYMENT-TOKEN-TYPE` header value.
    pub fn label(&self) -> &'static str {
        match self {
            TokenType::Stx => "STX",
            TokenType::Sbtc => "sBTC",
            TokenType::Usdcx => "USDCx",
        }
    }

    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, TokenType::Stx)
    }

    /// Well-known contract for a fungible token on `network`.
    ///
    /// Returns `None` for STX. Signing never falls back to this value: a
    /// request for a fungible token must name its contract explicitly.
    pub fn default_contract(&self, network: Network) -> Option<TokenContract> {
        crate::encoder::TransferEncoder::for_token(*self).default_contract(network)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TokenType {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "STX" => Ok(TokenType::Stx),
            "sBTC" => Ok(TokenType::Sbtc),
            "USDCx" => Ok(TokenType::Usdcx),
            other => Err(X402Error::Validation(format!(
                "unsupported token type '{}'",
                other
            ))),
        }
    }
}

/// A deployed Clarity contract, identified by deployer address and name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenContract {
    /// Deployer address (c32check)
    pub address: String,
    /// Contract name
    pub name: String,
}

impl TokenContract {
    /// Creates a contract reference.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Fully qualified identifier, `address.name`.
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.address, self.name)
    }
}

impl fmt::Display for TokenContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.name)
    }
}

impl FromStr for TokenContract {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((address, name)) if !address.is_empty() && !name.is_empty() => {
                Ok(TokenContract::new(address, name))
            }
            _ => Err(X402Error::InvalidAddress(format!(
                "'{}' is not a contract identifier (expected address.name)",
                s
            ))),
        }
    }
}

/// Payment offer returned by a server with HTTP 402.
///
/// # Examples
///
/// ```
/// use x402_stacks::types::{Network, PaymentRequest, TokenType};
///
/// let body = r#"{
///     "maxAmountRequired": "1000000",
///     "resource": "/weather",
///     "payTo": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
///     "network": "testnet",
///     "nonce": "abc123",
///     "expiresAt": "2030-01-01T00:00:00Z"
/// }"#;
///
/// let request: PaymentRequest = serde_json::from_str(body).unwrap();
/// assert_eq!(request.network, Network::Testnet);
/// assert_eq!(request.token_type(), TokenType::Stx);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Amount to pay in base units, as a decimal string
    pub max_amount_required: String,

    /// Identifier of the protected resource
    pub resource: String,

    /// Recipient address
    pub pay_to: String,

    /// Network the payment must be made on
    pub network: Network,

    /// Server-chosen tracking token, carried in the transfer memo
    pub nonce: String,

    /// RFC 3339 timestamp after which the offer is void
    pub expires_at: String,

    /// Free-form memo supplied by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,

    /// Token to pay with (defaults to STX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,

    /// SIP-010 contract, required unless paying in STX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_contract: Option<TokenContract>,
}

impl PaymentRequest {
    /// Token type, falling back to STX when the server did not name one.
    pub fn token_type(&self) -> TokenType {
        self.token_type.unwrap_or_default()
    }

    /// Parses `expires_at` as an absolute UTC timestamp.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        crate::utils::parse_timestamp(&self.expires_at)
    }
}

/// Everything needed to build and sign one transfer.
///
/// Built fresh for every signing attempt and never persisted. The `Debug`
/// implementation redacts the key, and the type does not
/// implement `Serialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    /// Recipient address
    pub recipient: String,
    /// Amount in base units
    pub amount: String,
    /// Hex-encoded secp256k1 private key of the payer
    pub sender_key: String,
    /// Network to sign for
    pub network: Network,
    /// Memo, at most [`MEMO_MAX_BYTES`] bytes
    pub memo: Option<String>,
    /// Explicit account nonce; derived from the chain when `None`
    pub nonce: Option<u64>,
    /// Explicit fee in micro-STX; estimated when `None`
    pub fee: Option<u64>,
    /// Token to transfer
    pub token_type: TokenType,
    /// SIP-010 contract for fungible tokens
    pub token_contract: Option<TokenContract>,
}

impl PaymentDetails {
    /// Derives transfer details from a server offer and the payer's key.
    ///
    /// The memo is the first 34 bytes of the offer's nonce.
    pub fn from_request(request: &PaymentRequest, sender_key: impl Into<String>) -> Self {
        let memo = crate::memo::truncate_memo(&request.nonce, MEMO_MAX_BYTES);
        Self {
            recipient: request.pay_to.clone(),
            amount: request.max_amount_required.clone(),
            sender_key: sender_key.into(),
            network: request.network,
            memo: (!memo.is_empty()).then(|| memo.to_string()),
            nonce: None,
            fee: None,
            token_type: request.token_type(),
            token_contract: request.token_contract.clone(),
        }
    }

    /// Pins the account nonce instead of querying the chain.
    pub fn with_nonce(mut self, nonce: Option<u64>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Pins the fee instead of estimating it.
    pub fn with_fee(mut self, fee: Option<u64>) -> Self {
        self.fee = fee;
        self
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("recipient", &self.recipient)
            .field("amount", &self.amount)
            .field("sender_key", &"<redacted>")
            .field("network", &self.network)
            .field("memo", &self.memo)
            .field("nonce", &self.nonce)
            .field("fee", &self.fee)
            .field("token_type", &self.token_type)
            .field("token_contract", &self.token_contract)
            .finish()
    }
}

/// A signed, not yet broadcast, payment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayment {
    /// Hex-encoded serialized transaction, sent as `X-PAYMENT`
    pub signed_transaction: String,
    /// Address derived from the signing key
    pub sender_address: String,
    /// Token the transaction pays with
    pub token_type: TokenType,
}

/// Outcome of signing a payment. Exactly one of the two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedPaymentResult {
    /// The transfer was built and signed.
    Success {
        /// Hex-encoded serialized transaction
        signed_transaction: String,
        /// Address derived from the signing key
        sender_address: String,
    },
    /// Building or signing failed.
    Failure {
        /// Human-readable reason
        error: String,
    },
}

impl SignedPaymentResult {
    /// Returns `true` for [`SignedPaymentResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, SignedPaymentResult::Success { .. })
    }

    /// Converts into a `Result`, mapping failures to [`X402Error::Signing`].
    pub fn into_result(self, token_type: TokenType) -> Result<SignedPayment> {
        match self {
            SignedPaymentResult::Success {
                signed_transaction,
                sender_address,
            } => Ok(SignedPayment {
                signed_transaction,
                sender_address,
                token_type,
            }),
            SignedPaymentResult::Failure { error } => Err(X402Error::Signing(error)),
        }
    }
}

/// Outcome of the legacy sign-and-broadcast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    /// The transaction was accepted by the node.
    Success {
        /// Transaction id reported by the node
        tx_id: String,
        /// Hex-encoded serialized transaction
        signed_transaction: String,
        /// Address derived from the signing key
        sender_address: String,
    },
    /// Signing or submission failed.
    Failure {
        /// Human-readable reason
        error: String,
    },
}

impl PaymentResult {
    /// Returns `true` for [`PaymentResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResult::Success { .. })
    }
}

/// Settlement receipt carried in the `X-PAYMENT-RESPONSE` header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Transaction id of the settled payment
    pub tx_id: String,

    /// Settlement status reported by the server (e.g. "pending", "success")
    pub status: String,

    /// Address that paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,

    /// Network the payment settled on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
}
