//! Integration tests for the x402-stacks library.
//!
//! These tests run the explicit client and the middleware against an
//! in-process axum server that answers with 402 offers, and check what
//! actually goes over the wire.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use x402_stacks::{
    client::{get, post, request_with_payment, RequestOptions, RetryBackoff, X402ClientConfig},
    encoder::UnsignedTransfer,
    middleware::wrap_client,
    stacks::{ChainSdk, SignedTransfer, StacksSdk},
    types::{Network, PaymentDetails, PaymentResponse, TokenType},
    utils::{encode_payment_response, payment_response_from_headers},
    ErrorKind, Result, X402Error,
};

const KEY: &str = "753b7cc01a1a2e86221266a154af739463fce51219d97e4f856cd7200c3bd2a601";
const SENDER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
const PAY_TO: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 402 until a payment is attached
    PayOnce,
    /// 402 regardless of payment
    AlwaysRequire,
    /// 402 with an offer that already expired
    Expired,
    /// 402 asking for sBTC
    Sbtc,
    /// 402 asking for sBTC without naming its contract
    SbtcWithoutContract,
    /// 402 whose body lacks `maxAmountRequired`
    Malformed,
    /// 500 before any paywall
    Broken,
    /// 200 with a plain-text body, no paywall
    Text,
}

#[derive(Debug, Clone)]
struct Payment {
    transaction: String,
    token_type: String,
    body: Bytes,
}

#[derive(Clone)]
struct Paywall {
    mode: Mode,
    hits: Arc<AtomicUsize>,
    hit_times: Arc<Mutex<Vec<Instant>>>,
    payments: Arc<Mutex<Vec<Payment>>>,
}

impl Paywall {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn hit_times(&self) -> Vec<Instant> {
        self.hit_times.lock().unwrap().clone()
    }

    fn payments(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().clone()
    }

    fn offer(&self) -> Value {
        let expires_at = match self.mode {
            Mode::Expired => Utc::now() - Duration::minutes(5),
            _ => Utc::now() + Duration::hours(1),
        };
        let mut offer = json!({
            "maxAmountRequired": "1000000",
            "resource": "/resource",
            "payTo": PAY_TO,
            "network": "testnet",
            "nonce": "abc123",
            "expiresAt": expires_at.to_rfc3339(),
        });
        match self.mode {
            Mode::Sbtc => {
                offer["tokenType"] = json!("sBTC");
                offer["tokenContract"] = json!({
                    "address": "ST1F7QA2MDF17S807EPA36TSS8AMEFY4KA9TVGWXT",
                    "name": "sbtc-token"
                });
            }
            Mode::SbtcWithoutContract => offer["tokenType"] = json!("sBTC"),
            Mode::Malformed => {
                offer
                    .as_object_mut()
                    .unwrap()
                    .remove("maxAmountRequired");
            }
            _ => {}
        }
        offer
    }
}

async fn resource(State(paywall): State<Paywall>, headers: HeaderMap, body: Bytes) -> Response {
    paywall.hits.fetch_add(1, Ordering::SeqCst);
    paywall.hit_times.lock().unwrap().push(Instant::now());

    let payment = headers
        .get("x-payment")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match (paywall.mode, payment) {
        (Mode::Broken, _) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        (Mode::Text, _) => "plain text".into_response(),
        (Mode::AlwaysRequire, _) | (_, None) => {
            (StatusCode::PAYMENT_REQUIRED, Json(paywall.offer())).into_response()
        }
        (_, Some(transaction)) => {
            let token_type = headers
                .get("x-payment-token-type")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            paywall.payments.lock().unwrap().push(Payment {
                transaction,
                token_type,
                body,
            });

            let receipt = encode_payment_response(&PaymentResponse {
                tx_id: "0xfeed".to_string(),
                status: "pending".to_string(),
                sender_address: Some(SENDER.to_string()),
                network: Some(Network::Testnet),
            })
            .unwrap();
            ([("x-payment-response", receipt)], Json(json!({ "ok": true }))).into_response()
        }
    }
}

async fn spawn_paywall(mode: Mode) -> (String, Paywall) {
    let paywall = Paywall {
        mode,
        hits: Arc::new(AtomicUsize::new(0)),
        hit_times: Arc::new(Mutex::new(Vec::new())),
        payments: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/resource", any(resource))
        .with_state(paywall.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/resource", addr), paywall)
}

/// Signs with the real SDK and counts signatures.
#[derive(Default)]
struct CountingSdk {
    inner: StacksSdk,
    signatures: AtomicUsize,
}

#[async_trait]
impl ChainSdk for CountingSdk {
    fn address_from_key(&self, private_key: &str, network: Network) -> Result<String> {
        self.inner.address_from_key(private_key, network)
    }

    async fn sign_transfer(
        &self,
        transfer: &UnsignedTransfer,
        details: &PaymentDetails,
    ) -> Result<SignedTransfer> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_transfer(transfer, details).await
    }

    async fn broadcast(&self, signed_transaction: &str, network: Network) -> Result<String> {
        self.inner.broadcast(signed_transaction, network).await
    }
}

fn config() -> (X402ClientConfig, Arc<CountingSdk>) {
    let sdk = Arc::new(CountingSdk::default());
    // pinned nonce and fee keep signing offline
    let config = X402ClientConfig::new(KEY)
        .with_network(Network::Testnet)
        .with_nonce(0)
        .with_fee(180)
        .with_chain_sdk(sdk.clone());
    (config, sdk)
}

fn assert_testnet_transaction(hex_tx: &str, payload_type: u8) {
    let bytes = hex::decode(hex_tx).unwrap();
    assert_eq!(bytes[0], 0x80);
    assert_eq!(bytes[115], payload_type);
}

#[tokio::test]
async fn test_pays_once_and_returns_body() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, sdk) = config();

    let body = request_with_payment(&config, &url, RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(paywall.hits(), 2);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 1);

    let payments = paywall.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].token_type, "STX");
    assert_testnet_transaction(&payments[0].transaction, 0x00);
}

#[tokio::test]
async fn test_repeated_402_exceeds_retries() {
    let (url, paywall) = spawn_paywall(Mode::AlwaysRequire).await;
    let (config, sdk) = config();

    let err = request_with_payment(&config, &url, RequestOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, X402Error::MaxRetriesExceeded(1)));
    assert_eq!(err.kind(), ErrorKind::ProtocolLoop);
    // no third request, no second signature
    assert_eq!(paywall.hits(), 2);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_retries_never_signs() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, sdk) = config();

    let options = RequestOptions::default().with_max_retries(0);
    let err = request_with_payment(&config, &url, options).await.unwrap_err();

    assert!(matches!(err, X402Error::MaxRetriesExceeded(0)));
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_expired_offer_is_not_signed() {
    let (url, paywall) = spawn_paywall(Mode::Expired).await;
    let (config, sdk) = config();

    let err = get(&config, &url).await.unwrap_err();

    assert!(matches!(err, X402Error::Expired(_)));
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signing_failure_is_not_retried() {
    let (url, paywall) = spawn_paywall(Mode::SbtcWithoutContract).await;
    let (config, sdk) = config();

    let err = get(&config, &url).await.unwrap_err();

    match &err {
        X402Error::Signing(message) => {
            assert_eq!(message, "missing token contract for sBTC payment")
        }
        other => panic!("expected a signing error, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Signing);
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_offer_is_not_retried() {
    let (url, paywall) = spawn_paywall(Mode::Malformed).await;
    let (config, sdk) = config();

    let err = get(&config, &url).await.unwrap_err();

    assert!(matches!(err, X402Error::Validation(_)));
    assert!(err.to_string().contains("maxAmountRequired"));
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backoff_is_applied_before_retry() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, _) = config();
    let delay = std::time::Duration::from_millis(300);
    let config = config.with_backoff(RetryBackoff::Fixed(delay));

    let body = get(&config, &url).await.unwrap();
    assert_eq!(body, json!({ "ok": true }));

    let times = paywall.hit_times();
    assert_eq!(times.len(), 2);
    assert!(times[1].duration_since(times[0]) >= delay);
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let (url, paywall) = spawn_paywall(Mode::Broken).await;
    let (config, _) = config();

    match get(&config, &url).await {
        Err(X402Error::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected an HTTP status error, got {:?}", other),
    }
    assert_eq!(paywall.hits(), 1);
}

#[tokio::test]
async fn test_non_json_body_is_returned_as_string() {
    let (url, _) = spawn_paywall(Mode::Text).await;
    let (config, _) = config();

    let body = get(&config, &url).await.unwrap();
    assert_eq!(body, Value::String("plain text".to_string()));
}

#[tokio::test]
async fn test_post_body_is_resent_with_payment() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, _) = config();

    let body = post(&config, &url, json!({ "query": "temperature" }))
        .await
        .unwrap();
    assert_eq!(body["ok"], true);

    let payments = paywall.payments();
    let sent: Value = serde_json::from_slice(&payments[0].body).unwrap();
    assert_eq!(sent, json!({ "query": "temperature" }));
}

#[tokio::test]
async fn test_offer_on_other_network_is_rejected() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, sdk) = config();
    let config = config.with_network(Network::Mainnet);

    let options = RequestOptions::new(Method::GET);
    let err = request_with_payment(&config, &url, options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_pays_transparently() {
    let (url, paywall) = spawn_paywall(Mode::Sbtc).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let receipt = payment_response_from_headers(response.headers()).unwrap();
    assert_eq!(receipt.tx_id, "0xfeed");
    assert_eq!(receipt.sender_address.as_deref(), Some(SENDER));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true }));

    let payments = paywall.payments();
    assert_eq!(payments[0].token_type, TokenType::Sbtc.label());
    assert_testnet_transaction(&payments[0].transaction, 0x02);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_middleware_concurrent_requests_are_independent() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let (first, second) = tokio::join!(client.get(&url).send(), client.get(&url).send());

    assert_eq!(first.unwrap().status(), reqwest::StatusCode::OK);
    assert_eq!(second.unwrap().status(), reqwest::StatusCode::OK);
    assert_eq!(paywall.hits(), 4);
    assert_eq!(paywall.payments().len(), 2);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_middleware_second_402_is_rejected() {
    let (url, paywall) = spawn_paywall(Mode::AlwaysRequire).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let err = client.get(&url).send().await.unwrap_err();

    assert!(matches!(
        X402Error::from(err),
        X402Error::PaymentAlreadyAttempted
    ));
    assert_eq!(paywall.hits(), 2);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_middleware_rejects_expired_offer() {
    let (url, paywall) = spawn_paywall(Mode::Expired).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let err = client.get(&url).send().await.unwrap_err();

    assert!(matches!(X402Error::from(err), X402Error::Expired(_)));
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_passes_through_other_responses() {
    let (url, paywall) = spawn_paywall(Mode::Broken).await;
    let (config, _) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(paywall.hits(), 1);
}

#[tokio::test]
async fn test_middleware_surfaces_signing_failure() {
    let (url, paywall) = spawn_paywall(Mode::SbtcWithoutContract).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let err = X402Error::from(client.get(&url).send().await.unwrap_err());

    assert!(matches!(err, X402Error::Signing(_)));
    assert_eq!(
        err.to_string(),
        "Signing failed: missing token contract for sBTC payment"
    );
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_rejects_malformed_offer() {
    let (url, paywall) = spawn_paywall(Mode::Malformed).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let err = X402Error::from(client.get(&url).send().await.unwrap_err());

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("maxAmountRequired"));
    assert_eq!(paywall.hits(), 1);
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_returns_402_for_streaming_body() {
    let (url, paywall) = spawn_paywall(Mode::PayOnce).await;
    let (config, sdk) = config();
    let client = wrap_client(reqwest::Client::new(), config);

    let path = std::env::temp_dir().join(format!("x402-stacks-body-{}", std::process::id()));
    tokio::fs::write(&path, b"{\"query\":\"temperature\"}")
        .await
        .unwrap();
    let file = tokio::fs::File::open(&path).await.unwrap();

    let response = client.post(&url).body(file).send().await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);
    let offer: Value = response.json().await.unwrap();
    assert_eq!(offer["payTo"], PAY_TO);
    assert_eq!(paywall.hits(), 1);
    assert!(paywall.payments().is_empty());
    assert_eq!(sdk.signatures.load(Ordering::SeqCst), 0);
}
