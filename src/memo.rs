//! Tracking memos embedded in payment transfers.
//!
//! A memo has the shape `x402:<resource>,nonce=<nonce>[,key=value...]`. The
//! codec is lossless only for values free of `,` and `=`, and it never
//! truncates: the chain caps memos at [`MEMO_MAX_BYTES`](crate::types::MEMO_MAX_BYTES),
//! so callers must cut the encoded string with [`truncate_memo`] before
//! signing.

use std::collections::HashMap;

/// Prefix marking a memo as written by this codec.
pub const MEMO_PREFIX: &str = "x402:";

/// Fields recovered from a memo. All `None` when the memo is not an x402 memo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMemo {
    /// Protected resource
    pub resource: Option<String>,
    /// Server nonce
    pub nonce: Option<String>,
    /// Any other `key=value` pairs
    pub custom: Option<HashMap<String, String>>,
}

impl DecodedMemo {
    /// Returns `true` if nothing was recovered.
    pub fn is_empty(&self) -> bool {
        self.resource.is_none() && self.nonce.is_none() && self.custom.is_none()
    }
}

/// Encodes a resource and nonce.
///
/// # Examples
///
/// ```
/// use x402_stacks::memo::encode_memo;
///
/// assert_eq!(encode_memo("/weather", "abc123"), "x402:/weather,nonce=abc123");
/// ```
pub fn encode_memo(resource: &str, nonce: &str) -> String {
    encode_memo_with(resource, nonce, std::iter::empty::<(&str, &str)>())
}

/// Encodes a resource, nonce and custom pairs, in iteration order.
///
/// # Examples
///
/// ```
/// use x402_stacks::memo::encode_memo_with;
///
/// let memo = encode_memo_with("/r", "n1", [("user", "42"), ("plan", "pro")]);
/// assert_eq!(memo, "x402:/r,nonce=n1,user=42,plan=pro");
/// ```
pub fn encode_memo_with<I, K, V>(resource: &str, nonce: &str, custom: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut memo = format!("{}{},nonce={}", MEMO_PREFIX, resource, nonce);
    for (key, value) in custom {
        memo.push(',');
        memo.push_str(key.as_ref());
        memo.push('=');
        memo.push_str(value.as_ref());
    }
    memo
}

/// Decodes a memo produced by [`encode_memo`] / [`encode_memo_with`].
///
/// The leading segment is the resource, unless it is explicitly labelled
/// `resource=`. Segments without `=` after it are skipped.
///
/// # Examples
///
/// ```
/// use x402_stacks::memo::decode_memo;
///
/// let decoded = decode_memo("x402:/weather,nonce=abc123");
/// assert_eq!(decoded.resource.as_deref(), Some("/weather"));
/// assert_eq!(decoded.nonce.as_deref(), Some("abc123"));
///
/// assert!(decode_memo("not-x402-prefixed").is_empty());
/// ```
pub fn decode_memo(memo: &str) -> DecodedMemo {
    let Some(body) = memo.strip_prefix(MEMO_PREFIX) else {
        return DecodedMemo::default();
    };

    let mut decoded = DecodedMemo::default();
    let mut custom = HashMap::new();

    for (index, segment) in body.split(',').enumerate() {
        match segment.split_once('=') {
            Some(("resource", value)) => decoded.resource = Some(value.to_string()),
            Some(("nonce", value)) => decoded.nonce = Some(value.to_string()),
            _ if index == 0 => decoded.resource = Some(segment.to_string()),
            Some((key, value)) => {
                custom.insert(key.to_string(), value.to_string());
            }
            None => {}
        }
    }

    if !custom.is_empty() {
        decoded.custom = Some(custom);
    }
    decoded
}

/// Cuts `memo` to at most `max_bytes` bytes without splitting a UTF-8 character.
pub fn truncate_memo(memo: &str, max_bytes: usize) -> &str {
    if memo.len() <= max_bytes {
        return memo;
    }
    let mut end = max_bytes;
    while !memo.is_char_boundary(end) {
        end -= 1;
    }
    &memo[..end]
}
