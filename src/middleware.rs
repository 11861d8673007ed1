//! Transparent x402 handling for any `reqwest` client.
//!
//! [`X402Middleware`] answers a 402 by paying and replaying the same request
//! once. The [`PaymentAttempted`] marker lives in that request's
//! [`Extensions`], so concurrent requests through one client never see each
//! other's state, and a second 402 for a paid request is an error instead of
//! another payment.
//!
//! ```no_run
//! use x402_stacks::client::X402ClientConfig;
//! use x402_stacks::middleware::wrap_client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = wrap_client(reqwest::Client::new(), X402ClientConfig::from_env()?);
//! let response = client.get("https://api.example.com/weather").send().await?;
//! println!("{}", response.text().await?);
//! # Ok(())
//! # }
//! ```

use crate::client::{payment_headers, read_offer, X402ClientConfig};
use crate::errors::X402Error;
use crate::types::SignedPayment;
use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::sync::Arc;

/// Set on a request's extensions once a payment has been made for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAttempted;

/// Pays for 402 responses and replays the request once.
#[derive(Debug, Clone)]
pub struct X402Middleware {
    config: Arc<X402ClientConfig>,
}

impl X402Middleware {
    /// Creates the middleware.
    pub fn new(config: X402ClientConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Creates the middleware around an already shared configuration.
    pub fn from_shared(config: Arc<X402ClientConfig>) -> Self {
        Self { config }
    }

    /// Configuration payments are made with.
    pub fn config(&self) -> &X402ClientConfig {
        &self.config
    }

    async fn pay(&self, response: Response) -> crate::errors::Result<SignedPayment> {
        let offer = self.config.accept_offer(&read_offer(response).await?)?;
        self.config.sign_offer(&offer).await
    }
}

fn reject_if_paid(
    response: Response,
    extensions: &Extensions,
) -> reqwest_middleware::Result<Response> {
    if response.status() == StatusCode::PAYMENT_REQUIRED
        && extensions.get::<PaymentAttempted>().is_some()
    {
        tracing::warn!(url = %response.url(), "payment was not accepted");
        return Err(reqwest_middleware::Error::middleware(
            X402Error::PaymentAlreadyAttempted,
        ));
    }
    Ok(response)
}

#[async_trait]
impl Middleware for X402Middleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let replay = req.try_clone();
        let response = next.clone().run(req, extensions).await?;
        let response = reject_if_paid(response, extensions)?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        let Some(mut replay) = replay else {
            tracing::warn!(
                url = %response.url(),
                "payment required but the request body cannot be replayed"
            );
            return Ok(response);
        };

        extensions.insert(PaymentAttempted);
        let payment = self
            .pay(response)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;
        let headers = payment_headers(&payment).map_err(reqwest_middleware::Error::middleware)?;

        tracing::info!(
            url = %replay.url(),
            token = %payment.token_type,
            sender = %payment.sender_address,
            "retrying with payment"
        );
        replay.headers_mut().extend(headers);

        let response = next.run(replay, extensions).await?;
        reject_if_paid(response, extensions)
    }
}

/// Wraps `client` so every request through it handles 402 responses.
pub fn wrap_client(client: reqwest::Client, config: X402ClientConfig) -> ClientWithMiddleware {
    ClientBuilder::new(client)
        .with(X402Middleware::new(config))
        .build()
}
