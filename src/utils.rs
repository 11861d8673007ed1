//! Utility functions for x402 operations.
//!
//! This module provides the `X-PAYMENT-RESPONSE` codec, amount parsing and
//! timestamp helpers used throughout the library.

use crate::errors::{Result, X402Error};
use crate::types::{PaymentResponse, X_PAYMENT_RESPONSE_HEADER};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use ethers::types::U256;
use reqwest::header::HeaderMap;

/// Encodes a [`PaymentResponse`] as Base64 JSON for the `X-PAYMENT-RESPONSE` header.
///
/// # Examples
///
/// ```
/// use x402_stacks::types::PaymentResponse;
/// use x402_stacks::utils::encode_payment_response;
///
/// let receipt = PaymentResponse {
///     tx_id: "0xabc".to_string(),
///     status: "pending".to_string(),
///     sender_address: None,
///     network: None,
/// };
///
/// let encoded = encode_payment_response(&receipt).unwrap();
/// assert!(!encoded.is_empty());
/// ```
pub fn encode_payment_response(response: &PaymentResponse) -> Result<String> {
    let json = serde_json::to_string(response)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
///
/// Returns `None` for anything that is not Base64 JSON with at least `txId`
/// and `status`.
///
/// # Examples
///
/// ```
/// use x402_stacks::types::PaymentResponse;
/// use x402_stacks::utils::{decode_payment_response, encode_payment_response};
///
/// let receipt = PaymentResponse {
///     tx_id: "0xabc".to_string(),
///     status: "success".to_string(),
///     sender_address: None,
///     network: None,
/// };
///
/// let encoded = encode_payment_response(&receipt).unwrap();
/// assert_eq!(decode_payment_response(&encoded), Some(receipt));
/// assert_eq!(decode_payment_response("not base64!"), None);
/// ```
pub fn decode_payment_response(encoded: &str) -> Option<PaymentResponse> {
    let decoded = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Reads and decodes the `X-PAYMENT-RESPONSE` header, if present.
pub fn payment_response_from_headers(headers: &HeaderMap) -> Option<PaymentResponse> {
    headers
        .get(X_PAYMENT_RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_payment_response)
}

/// Converts a decimal count of base units to U256.
///
/// Amounts on the wire are plain decimal digits: no sign, no fraction, no
/// `0x` prefix.
///
/// # Examples
///
/// ```
/// use x402_stacks::utils::string_to_u256;
///
/// let value = string_to_u256("1000000").unwrap();
/// assert_eq!(value, 1000000u64.into());
/// assert!(string_to_u256("0x0f4240").is_err());
/// ```
pub fn string_to_u256(s: &str) -> Result<U256> {
    if s.is_empty() {
        return Err(X402Error::InvalidAmount("empty amount".to_string()));
    }

    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::InvalidAmount(format!(
            "'{}' is not a decimal integer",
            s
        )));
    }

    U256::from_dec_str(s)
        .map_err(|_| X402Error::InvalidAmount(format!("'{}' does not fit in 256 bits", s)))
}

/// Parses an amount that must fit a Clarity `uint`.
pub fn parse_amount_u128(s: &str) -> Result<u128> {
    let value = string_to_u256(s)?;
    u128::try_from(value)
        .map_err(|_| X402Error::InvalidAmount(format!("'{}' does not fit in 128 bits", s)))
}

/// Parses an amount that must fit a native STX transfer.
pub fn parse_amount_u64(s: &str) -> Result<u64> {
    let value = string_to_u256(s)?;
    u64::try_from(value)
        .map_err(|_| X402Error::InvalidAmount(format!("'{}' does not fit in 64 bits", s)))
}

/// Parses an RFC 3339 timestamp into UTC.
///
/// # Examples
///
/// ```
/// use x402_stacks::utils::parse_timestamp;
///
/// let ts = parse_timestamp("2030-01-01T00:00:00Z").unwrap();
/// assert_eq!(ts.timestamp(), 1893456000);
/// assert!(parse_timestamp("tomorrow").is_err());
/// ```
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| X402Error::Validation(format!("invalid timestamp '{}': {}", s, e)))
}

/// Gets the current time in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Network;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_encode_decode_payment_response() {
        let receipt = PaymentResponse {
            tx_id: "0x1234".to_string(),
            status: "pending".to_string(),
            sender_address: Some("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM".to_string()),
            network: Some(Network::Testnet),
        };

        let encoded = encode_payment_response(&receipt).unwrap();
        let decoded = decode_payment_response(&encoded).unwrap();
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn test_decode_payment_response_rejects_garbage() {
        assert_eq!(decode_payment_response(""), None);
        assert_eq!(decode_payment_response("%%%"), None);
        // valid base64, not JSON
        assert_eq!(decode_payment_response(&BASE64.encode("hello")), None);
        // JSON without the required fields
        assert_eq!(decode_payment_response(&BASE64.encode(r#"{"txId":"1"}"#)), None);
    }

    #[test]
    fn test_payment_response_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(payment_response_from_headers(&headers).is_none());

        let encoded = BASE64.encode(r#"{"txId":"0xfeed","status":"success"}"#);
        headers.insert(
            X_PAYMENT_RESPONSE_HEADER,
            HeaderValue::from_str(&encoded).unwrap(),
        );
        let receipt = payment_response_from_headers(&headers).unwrap();
        assert_eq!(receipt.tx_id, "0xfeed");
        assert_eq!(receipt.status, "success");
    }

    #[test]
    fn test_string_to_u256() {
        assert_eq!(string_to_u256("1000000").unwrap(), U256::from(1000000u64));
        assert_eq!(string_to_u256("0").unwrap(), U256::zero());
        assert!(string_to_u256("-5").is_err());
        assert!(string_to_u256("+5").is_err());
        assert!(string_to_u256(" 5").is_err());
        assert!(string_to_u256("1.5").is_err());
        assert!(string_to_u256("").is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(parse_amount_u64("18446744073709551615").unwrap(), u64::MAX);
        assert!(parse_amount_u64("18446744073709551616").is_err());
        assert_eq!(
            parse_amount_u128("18446744073709551616").unwrap(),
            u64::MAX as u128 + 1
        );
        assert!(parse_amount_u128("340282366920938463463374607431768211456").is_err());
        assert!(parse_amount_u64("0x0f4240").is_err());
        assert!(parse_amount_u128("0X0F4240").is_err());
    }

    #[test]
    fn test_parse_timestamp_offsets() {
        let utc = parse_timestamp("2030-01-01T00:00:00Z").unwrap();
        let offset = parse_timestamp("2030-01-01T02:00:00+02:00").unwrap();
        assert_eq!(utc, offset);
        assert!(parse_timestamp("").is_err());
    }
}
