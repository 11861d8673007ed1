//! Validation of 402 payment offers.
//!
//! [`validate`] is a pure structural check of the JSON body. Expiration is a
//! separate step, [`check_expiration`], which callers run before signing so a
//! stale offer is never signed.

use crate::errors::{Result, X402Error};
use crate::types::{Network, PaymentRequest};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fields every 402 body must carry as strings, whatever the token type.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "maxAmountRequired",
    "resource",
    "payTo",
    "network",
    "nonce",
    "expiresAt",
];

/// Parses a 402 body into a [`PaymentRequest`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use x402_stacks::validation::validate;
///
/// let body = json!({
///     "maxAmountRequired": "1000",
///     "resource": "/r",
///     "payTo": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
///     "network": "testnet",
///     "nonce": "n",
///     "expiresAt": "2030-01-01T00:00:00Z"
/// });
/// assert!(validate(&body).is_ok());
///
/// let mut missing = body.clone();
/// missing.as_object_mut().unwrap().remove("payTo");
/// assert!(validate(&missing).is_err());
/// ```
pub fn validate(raw: &Value) -> Result<PaymentRequest> {
    let object = raw.as_object().ok_or_else(|| {
        X402Error::Validation("payment request body must be a JSON object".to_string())
    })?;

    for field in REQUIRED_FIELDS {
        match object.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(X402Error::Validation(format!(
                    "field `{}` must be a string",
                    field
                )))
            }
            None => {
                return Err(X402Error::Validation(format!(
                    "missing required field `{}`",
                    field
                )))
            }
        }
    }

    if let Some(network) = object.get("network").and_then(Value::as_str) {
        network.parse::<Network>()?;
    }

    serde_json::from_value(raw.clone())
        .map_err(|e| X402Error::Validation(format!("malformed payment request: {}", e)))
}

/// Rejects offers whose `expiresAt` is not strictly after `now`.
pub fn check_expiration(request: &PaymentRequest, now: DateTime<Utc>) -> Result<()> {
    let expires_at = request.expires_at()?;
    if expires_at > now {
        Ok(())
    } else {
        Err(X402Error::Expired(request.expires_at.clone()))
    }
}

/// Runs [`validate`] then [`check_expiration`] against the current time.
pub fn validate_offer(raw: &Value) -> Result<PaymentRequest> {
    let request = validate(raw)?;
    check_expiration(&request, crate::utils::now())?;
    Ok(request)
}
