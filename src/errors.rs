//! Error types for the x402-stacks library.
//!
//! Every failure the payment engine can produce is a variant of [`X402Error`].
//! Callers that only need to branch on the broad outcome can use
//! [`X402Error::kind`], which folds the variants onto [`ErrorKind`].

use thiserror::Error;

/// Main error type for x402 operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// The 402 body is malformed or incomplete
    #[error("Invalid payment request: {0}")]
    Validation(String),

    /// The payment offer expired before it could be signed
    #[error("Payment request expired at {0}")]
    Expired(String),

    /// Building or signing the transfer failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A second 402 arrived for a request that was already paid for
    #[error("Payment already attempted for this request")]
    PaymentAlreadyAttempted,

    /// The server kept answering 402 after every allowed retry
    #[error("Max retries exceeded ({0} payment attempts)")]
    MaxRetriesExceeded(u32),

    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The server answered with an error status other than 402
    #[error("Request failed with status {status}: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Failure reported by a `reqwest_middleware` layer other than this crate's
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed or unusable private key
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// The network rejected a broadcast transaction
    #[error("Broadcast failed: {0}")]
    BroadcastError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl From<reqwest_middleware::Error> for X402Error {
    /// Unwraps errors raised by [`X402Middleware`](crate::middleware::X402Middleware)
    /// back into the variant that caused them.
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => X402Error::HttpError(e),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<X402Error>() {
                Ok(inner) => inner,
                Err(other) => X402Error::Middleware(other.to_string()),
            },
        }
    }
}

/// Result type alias for x402 operations.
pub type Result<T> = std::result::Result<T, X402Error>;

/// Coarse classification of an [`X402Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or incomplete 402 body. Terminal.
    Validation,
    /// Offer expired. Terminal.
    Expiration,
    /// Missing contract info, bad key, or a failure inside the chain SDK. Terminal.
    Signing,
    /// Client-side retry policy was violated (one-shot marker or retry ceiling).
    ProtocolLoop,
    /// Anything that went wrong talking to the server or the chain node.
    Transport,
    /// The client itself is misconfigured.
    Configuration,
}

impl X402Error {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            X402Error::Validation(_) | X402Error::JsonError(_) | X402Error::Base64Error(_) => {
                ErrorKind::Validation
            }
            X402Error::Expired(_) => ErrorKind::Expiration,
            X402Error::Signing(_)
            | X402Error::InvalidAddress(_)
            | X402Error::InvalidAmount(_)
            | X402Error::InvalidKey(_) => ErrorKind::Signing,
            X402Error::PaymentAlreadyAttempted | X402Error::MaxRetriesExceeded(_) => {
                ErrorKind::ProtocolLoop
            }
            X402Error::HttpError(_)
            | X402Error::HttpStatus { .. }
            | X402Error::Middleware(_)
            | X402Error::BroadcastError(_) => ErrorKind::Transport,
            X402Error::ConfigError(_) | X402Error::UrlParseError(_) => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if the error ends the payment cycle without any retry.
    ///
    /// Only transport failures of the underlying HTTP client may be worth
    /// retrying by the caller; this crate itself never retries them.
    pub fn is_terminal(&self) -> bool {
        self.kind() != ErrorKind::Transport
    }
}
