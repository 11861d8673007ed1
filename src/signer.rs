//! Signing of payment offers.
//!
//! [`PaymentSigner`] turns a validated [`PaymentRequest`] into a signed,
//! unbroadcast transaction. Its public methods report failures in the
//! returned value rather than through `Err`, so a caller holding a
//! [`SignedPaymentResult`] always has a message to show.

use crate::encoder::TransferEncoder;
use crate::errors::{Result, X402Error};
use crate::stacks::{ChainSdk, SignedTransfer, StacksSdk};
use crate::types::{PaymentDetails, PaymentRequest, PaymentResult, SignedPaymentResult};
use std::fmt;
use std::sync::Arc;

/// Builds and signs transfers through a [`ChainSdk`].
#[derive(Clone)]
pub struct PaymentSigner {
    sdk: Arc<dyn ChainSdk>,
}

impl fmt::Debug for PaymentSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentSigner").finish_non_exhaustive()
    }
}

impl Default for PaymentSigner {
    fn default() -> Self {
        Self::new(Arc::new(StacksSdk::new()))
    }
}

impl PaymentSigner {
    /// Creates a signer that uses `sdk` for key handling and signing.
    pub fn new(sdk: Arc<dyn ChainSdk>) -> Self {
        Self { sdk }
    }

    /// Chain SDK this signer delegates to.
    pub fn sdk(&self) -> &Arc<dyn ChainSdk> {
        &self.sdk
    }

    /// Signs a payment for `request` with `private_key`.
    ///
    /// The transaction is not broadcast. Expiry is not checked here; callers
    /// must reject expired offers before signing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use x402_stacks::signer::PaymentSigner;
    /// use x402_stacks::validation::validate;
    ///
    /// # async fn example(body: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    /// let request = validate(&body)?;
    /// let result = PaymentSigner::default()
    ///     .sign(&request, "753b7cc01a1a2e86221266a154af739463fce51219d97e4f856cd7200c3bd2a601")
    ///     .await;
    /// assert!(result.is_success());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn sign(&self, request: &PaymentRequest, private_key: &str) -> SignedPaymentResult {
        self.sign_details(&PaymentDetails::from_request(request, private_key))
            .await
    }

    /// Signs the transfer described by `details`.
    pub async fn sign_details(&self, details: &PaymentDetails) -> SignedPaymentResult {
        match self.try_sign(details).await {
            Ok((signed, sender_address)) => SignedPaymentResult::Success {
                signed_transaction: signed.transaction,
                sender_address,
            },
            Err(e) => {
                tracing::warn!(
                    token = %details.token_type,
                    error = %e,
                    "payment signing failed"
                );
                SignedPaymentResult::Failure {
                    error: failure_message(e),
                }
            }
        }
    }

    /// Signs and submits a payment in one step.
    ///
    /// x402 servers settle the payment themselves; submitting it from the
    /// client as well races their settlement.
    #[deprecated(note = "sign with `PaymentSigner::sign` and let the server settle")]
    pub async fn sign_and_broadcast(
        &self,
        request: &PaymentRequest,
        private_key: &str,
    ) -> PaymentResult {
        let details = PaymentDetails::from_request(request, private_key);
        let (signed, sender_address) = match self.try_sign(&details).await {
            Ok(signed) => signed,
            Err(e) => {
                return PaymentResult::Failure {
                    error: failure_message(e),
                }
            }
        };

        match self.sdk.broadcast(&signed.transaction, details.network).await {
            Ok(tx_id) => PaymentResult::Success {
                tx_id,
                signed_transaction: signed.transaction,
                sender_address,
            },
            Err(e) => {
                tracing::warn!(txid = %signed.txid, error = %e, "broadcast rejected");
                PaymentResult::Failure {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_sign(&self, details: &PaymentDetails) -> Result<(SignedTransfer, String)> {
        let sender = self
            .sdk
            .address_from_key(&details.sender_key, details.network)?;
        let transfer = TransferEncoder::for_token(details.token_type).encode(details, &sender)?;
        let signed = self.sdk.sign_transfer(&transfer, details).await?;

        tracing::info!(
            token = %details.token_type,
            amount = %details.amount,
            sender = %sender,
            recipient = %details.recipient,
            txid = %signed.txid,
            "signed payment"
        );
        Ok((signed, sender))
    }
}

/// Reason carried by a failed result. `into_result` adds the signing prefix back.
fn failure_message(error: X402Error) -> String {
    match error {
        X402Error::Signing(message) => message,
        other => other.to_string(),
    }
}
