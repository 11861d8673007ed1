//! Client-side functionality for the x402 protocol.
//!
//! This module provides functions for making HTTP requests that handle 402
//! Payment Required responses: validate the offer, sign a Stacks payment and
//! retry the request with the `X-PAYMENT` headers, up to a fixed number of
//! payments per call.

use crate::errors::{Result, X402Error};
use crate::signer::PaymentSigner;
use crate::stacks::{ChainSdk, StacksSdk};
use crate::types::{
    Network, PaymentDetails, PaymentRequest, SignedPayment, X_PAYMENT_HEADER,
    X_PAYMENT_TOKEN_TYPE_HEADER,
};
use crate::utils::{now, payment_response_from_headers};
use crate::validation::{check_expiration, validate};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay applied after signing a payment and before retrying the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryBackoff {
    /// Retry immediately
    #[default]
    None,
    /// Wait the same amount before every retry
    Fixed(Duration),
    /// Double the wait after every payment, starting at `initial`, capped at `max`
    Exponential {
        /// Wait before the first retry
        initial: Duration,
        /// Upper bound on any single wait
        max: Duration,
    },
}

impl RetryBackoff {
    /// Wait before the retry that follows payment number `payments` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use x402_stacks::client::RetryBackoff;
    ///
    /// let backoff = RetryBackoff::Exponential {
    ///     initial: Duration::from_millis(100),
    ///     max: Duration::from_millis(250),
    /// };
    /// assert_eq!(backoff.delay(1), Some(Duration::from_millis(100)));
    /// assert_eq!(backoff.delay(2), Some(Duration::from_millis(200)));
    /// assert_eq!(backoff.delay(3), Some(Duration::from_millis(250)));
    /// assert_eq!(RetryBackoff::None.delay(1), None);
    /// ```
    pub fn delay(&self, payments: u32) -> Option<Duration> {
        let delay = match *self {
            RetryBackoff::None => return None,
            RetryBackoff::Fixed(delay) => delay,
            RetryBackoff::Exponential { initial, max } => {
                let factor = 2u32
                    .checked_pow(payments.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                initial.checked_mul(factor).unwrap_or(max).min(max)
            }
        };
        (!delay.is_zero()).then_some(delay)
    }
}

/// Configuration for x402 client requests.
#[derive(Clone)]
pub struct X402ClientConfig {
    /// Private key of the payer, in Stacks hex format
    pub private_key: String,

    /// HTTP client to use for requests
    pub http_client: Client,

    /// Signs payments; wraps the chain SDK
    pub signer: PaymentSigner,

    /// Only pay offers on this network, if set
    pub preferred_network: Option<Network>,

    /// Account nonce to sign with instead of querying the node
    pub nonce: Option<u64>,

    /// Fee in micro-STX to sign with instead of estimating it
    pub fee: Option<u64>,

    /// Wait between signing and retrying
    pub backoff: RetryBackoff,
}

impl fmt::Debug for X402ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X402ClientConfig")
            .field("private_key", &"<redacted>")
            .field("preferred_network", &self.preferred_network)
            .field("nonce", &self.nonce)
            .field("fee", &self.fee)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl X402ClientConfig {
    /// Creates a new client configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_stacks::client::X402ClientConfig;
    /// use x402_stacks::types::Network;
    ///
    /// let config = X402ClientConfig::new(
    ///     "753b7cc01a1a2e86221266a154af739463fce51219d97e4f856cd7200c3bd2a601",
    /// )
    /// .with_network(Network::Testnet);
    /// ```
    pub fn new(private_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            http_client: Client::new(),
            signer: PaymentSigner::default(),
            preferred_network: None,
            nonce: None,
            fee: None,
            backoff: RetryBackoff::None,
        }
    }

    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// `STACKS_PRIVATE_KEY` is required. `STACKS_NETWORK` (`mainnet` or
    /// `testnet`, default `testnet`) restricts which offers are paid, and
    /// `STACKS_API_URL` overrides the node API for that network.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let private_key = std::env::var("STACKS_PRIVATE_KEY")
            .map_err(|_| X402Error::ConfigError("STACKS_PRIVATE_KEY is not set".to_string()))?;

        let network = match std::env::var("STACKS_NETWORK") {
            Ok(value) => value
                .parse::<Network>()
                .map_err(|e| X402Error::ConfigError(format!("STACKS_NETWORK: {}", e)))?,
            Err(_) => Network::Testnet,
        };

        let mut sdk = StacksSdk::new();
        if let Ok(url) = std::env::var("STACKS_API_URL") {
            sdk = sdk.with_api_url(network, url);
        }

        Ok(Self::new(private_key)
            .with_network(network)
            .with_chain_sdk(Arc::new(sdk)))
    }

    /// Only pays offers on `network`.
    pub fn with_network(mut self, network: Network) -> Self {
        self.preferred_network = Some(network);
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Sets a custom signer.
    pub fn with_signer(mut self, signer: PaymentSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Signs through `sdk` instead of the default [`StacksSdk`].
    pub fn with_chain_sdk(mut self, sdk: Arc<dyn ChainSdk>) -> Self {
        self.signer = PaymentSigner::new(sdk);
        self
    }

    /// Signs every payment with this account nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Signs every payment with this fee.
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Sets the wait between signing and retrying.
    pub fn with_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validates a 402 body and checks it is still payable by this client.
    pub(crate) fn accept_offer(&self, raw: &Value) -> Result<PaymentRequest> {
        let offer = validate(raw)
            .and_then(|offer| check_expiration(&offer, now()).map(|_| offer))
            .and_then(|offer| match self.preferred_network {
                Some(network) if network != offer.network => Err(X402Error::Validation(format!(
                    "offer is for {}, client is configured for {}",
                    offer.network, network
                ))),
                _ => Ok(offer),
            });

        if let Err(e) = &offer {
            tracing::warn!(error = %e, "rejected payment offer");
        }
        offer
    }

    /// Signs a payment for an accepted offer.
    pub(crate) async fn sign_offer(&self, offer: &PaymentRequest) -> Result<SignedPayment> {
        let details = PaymentDetails::from_request(offer, self.private_key.as_str())
            .with_nonce(self.nonce)
            .with_fee(self.fee);
        self.signer
            .sign_details(&details)
            .await
            .into_result(details.token_type)
    }
}

/// Options for [`request_with_payment`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// JSON body, sent with every attempt
    pub body: Option<Value>,
    /// Extra headers, sent with every attempt
    pub headers: HeaderMap,
    /// Payments allowed for this call
    pub max_retries: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            max_retries: 1,
        }
    }
}

impl RequestOptions {
    /// Options for a request with `method`.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the extra headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets how many payments the call may make.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Progress of one [`request_with_payment`] call.
struct RequestAttemptState {
    attempt: u32,
    max_retries: u32,
    payment: Option<(SignedPayment, PaymentRequest)>,
}

impl RequestAttemptState {
    fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
            payment: None,
        }
    }

    fn can_continue(&self) -> bool {
        self.attempt <= self.max_retries
    }

    fn can_pay(&self) -> bool {
        self.attempt < self.max_retries
    }

    fn record(&mut self, payment: SignedPayment, offer: PaymentRequest) {
        self.payment = Some((payment, offer));
        self.attempt += 1;
    }
}

/// Headers that attach `payment` to a retried request.
pub fn payment_headers(payment: &SignedPayment) -> Result<HeaderMap> {
    let header = |name: &str, value: &str| -> Result<(HeaderName, HeaderValue)> {
        let name = HeaderName::try_from(name)
            .map_err(|e| X402Error::Signing(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| X402Error::Signing(format!("invalid header value: {}", e)))?;
        Ok((name, value))
    };

    let mut headers = HeaderMap::new();
    let (name, value) = header(X_PAYMENT_HEADER, &payment.signed_transaction)?;
    headers.insert(name, value);
    let (name, value) = header(X_PAYMENT_TOKEN_TYPE_HEADER, payment.token_type.label())?;
    headers.insert(name, value);
    Ok(headers)
}

/// Reads a 402 body as JSON; anything else is not a payment offer.
pub(crate) async fn read_offer(response: Response) -> Result<Value> {
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| X402Error::Validation(format!("402 body is not JSON: {}", e)))
}

async fn read_body(response: Response) -> Result<Value> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Makes an HTTP request with automatic x402 payment handling.
///
/// If the server responds with 402 Payment Required, this function will:
/// 1. Validate the offer and reject it if it has expired
/// 2. Sign a payment for it
/// 3. Retry the request with the `X-PAYMENT` and `X-PAYMENT-TOKEN-TYPE` headers
///
/// At most `options.max_retries` payments are signed. A 402 after the last
/// one is [`X402Error::MaxRetriesExceeded`]. Any other error status is
/// returned as [`X402Error::HttpStatus`] without retrying.
///
/// Returns the final response body, as JSON when it parses and as a JSON
/// string otherwise.
///
/// # Examples
///
/// ```no_run
/// use x402_stacks::client::{request_with_payment, RequestOptions, X402ClientConfig};
/// use reqwest::Method;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = X402ClientConfig::from_env()?;
///
/// let body = request_with_payment(
///     &config,
///     "https://api.example.com/weather",
///     RequestOptions::new(Method::GET),
/// )
/// .await?;
///
/// println!("Response: {}", body);
/// # Ok(())
/// # }
/// ```
pub async fn request_with_payment(
    config: &X402ClientConfig,
    url: &str,
    options: RequestOptions,
) -> Result<Value> {
    let mut state = RequestAttemptState::new(options.max_retries);

    while state.can_continue() {
        let mut request = config
            .http_client
            .request(options.method.clone(), url)
            .headers(options.headers.clone());

        if let Some(body) = &options.body {
            request = request.json(body);
        }

        if let Some((payment, offer)) = &state.payment {
            tracing::info!(
                url = %url,
                token = %payment.token_type,
                sender = %payment.sender_address,
                resource = %offer.resource,
                "retrying with payment"
            );
            request = request.headers(payment_headers(payment)?);
        } else {
            tracing::debug!(method = %options.method, url = %url, "issuing request");
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::PAYMENT_REQUIRED {
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(X402Error::HttpStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            if let Some(receipt) = payment_response_from_headers(response.headers()) {
                tracing::debug!(
                    tx_id = %receipt.tx_id,
                    status = %receipt.status,
                    "payment response"
                );
            }
            return read_body(response).await;
        }

        let offer = config.accept_offer(&read_offer(response).await?)?;

        if !state.can_pay() {
            tracing::warn!(
                url = %url,
                payments = state.attempt,
                "server still requires payment"
            );
            return Err(X402Error::MaxRetriesExceeded(state.attempt));
        }

        let payment = config.sign_offer(&offer).await?;
        state.record(payment, offer);

        if let Some(delay) = config.backoff.delay(state.attempt) {
            tokio::time::sleep(delay).await;
        }
    }

    Err(X402Error::MaxRetriesExceeded(state.attempt))
}

/// A simpler convenience function for GET requests.
///
/// # Examples
///
/// ```no_run
/// use x402_stacks::client::{get, X402ClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = X402ClientConfig::from_env()?;
/// let data = get(&config, "https://api.example.com/data").await?;
/// println!("{}", data);
/// # Ok(())
/// # }
/// ```
pub async fn get(config: &X402ClientConfig, url: &str) -> Result<Value> {
    request_with_payment(config, url, RequestOptions::new(Method::GET)).await
}

/// A simpler convenience function for POST requests.
///
/// # Examples
///
/// ```no_run
/// use x402_stacks::client::{post, X402ClientConfig};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = X402ClientConfig::from_env()?;
///
/// let body = json!({"query": "temperature"});
/// let response = post(&config, "https://api.example.com/query", body).await?;
/// # Ok(())
/// # }
/// ```
pub async fn post(config: &X402ClientConfig, url: &str, body: Value) -> Result<Value> {
    request_with_payment(config, url, RequestOptions::new(Method::POST).with_body(body)).await
}
