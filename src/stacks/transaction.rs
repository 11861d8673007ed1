//! Single-signature Stacks transactions.
//!
//! Only what a payer needs is modelled: standard (non-sponsored) P2PKH
//! authorization, no post conditions, and the token-transfer and
//! contract-call payloads.

use super::c32::{c32_address, c32_address_decode};
use super::clarity::{validate_name, ClarityValue};
use crate::errors::{Result, X402Error};
use crate::types::{Network, MEMO_MAX_BYTES};
use ethers::core::k256::ecdsa::SigningKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512_256};

const AUTH_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const KEY_ENCODING_UNCOMPRESSED: u8 = 0x01;
const ANCHOR_MODE_ANY: u8 = 0x03;
const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;
const PAYLOAD_CONTRACT_CALL: u8 = 0x02;

/// Length of a recoverable signature: recovery id, r, s.
pub const SIGNATURE_LEN: usize = 65;

/// Whether transfers not covered by post conditions abort the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConditionMode {
    /// Unlisted asset movements are permitted
    Allow = 0x01,
    /// Unlisted asset movements abort the transaction
    Deny = 0x02,
}

/// `sha512/256`, the hash Stacks uses for txids and sighashes.
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha512_256::digest(data));
    out
}

/// `ripemd160(sha256(data))`
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(Sha256::digest(data)));
    out
}

/// A secp256k1 payer key in Stacks' hex format.
///
/// 64 hex characters select an uncompressed public key; 66 characters ending
/// in `01` select a compressed one, matching how Stacks wallets export keys.
#[derive(Clone)]
pub struct StacksPrivateKey {
    key: SigningKey,
    compressed: bool,
}

impl StacksPrivateKey {
    /// Parses a hex key, with or without a `0x` prefix.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let trimmed = hex_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)
            .map_err(|e| X402Error::InvalidKey(format!("not hex: {}", e)))?;

        let (secret, compressed) = match bytes.len() {
            32 => (&bytes[..], false),
            33 if bytes[32] == 0x01 => (&bytes[..32], true),
            33 => {
                return Err(X402Error::InvalidKey(
                    "33-byte keys must end with 0x01".to_string(),
                ))
            }
            n => {
                return Err(X402Error::InvalidKey(format!(
                    "expected 32 or 33 bytes, got {}",
                    n
                )))
            }
        };

        let key = SigningKey::from_slice(secret)
            .map_err(|_| X402Error::InvalidKey("not a valid secp256k1 scalar".to_string()))?;
        Ok(Self { key, compressed })
    }

    /// Whether the public key is used in compressed form.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// SEC1-encoded public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_encoded_point(self.compressed)
            .as_bytes()
            .to_vec()
    }

    /// hash160 of the public key, the signer field of a P2PKH spending condition.
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key())
    }

    /// Single-signature address on `network`.
    pub fn address(&self, network: Network) -> String {
        c32_address(network.address_version(), &self.public_key_hash())
    }

    /// Signs a 32-byte digest, returning `recovery_id || r || s`.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN]> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| X402Error::Signing(format!("secp256k1 signing failed: {}", e)))?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[0] = recovery_id.to_byte();
        out[1..].copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    fn key_encoding(&self) -> u8 {
        if self.compressed {
            KEY_ENCODING_COMPRESSED
        } else {
            KEY_ENCODING_UNCOMPRESSED
        }
    }
}

/// What a transaction does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    /// Native STX transfer
    TokenTransfer {
        /// Recipient principal
        recipient: ClarityValue,
        /// Amount in micro-STX
        amount: u64,
        /// Zero-padded memo
        memo: [u8; MEMO_MAX_BYTES],
    },
    /// Public function call
    ContractCall {
        /// Deployer address version
        address_version: u8,
        /// Deployer hash160
        address_hash: [u8; 20],
        /// Contract name
        contract_name: String,
        /// Function name
        function_name: String,
        /// Arguments, in declaration order
        args: Vec<ClarityValue>,
    },
}

impl TransactionPayload {
    /// Native transfer of `amount` micro-STX to `recipient`.
    pub fn token_transfer(recipient: &str, amount: u64, memo: &str) -> Result<Self> {
        let recipient = ClarityValue::principal(recipient)?;
        if memo.len() > MEMO_MAX_BYTES {
            return Err(X402Error::Signing(format!(
                "memo is {} bytes, the limit is {}",
                memo.len(),
                MEMO_MAX_BYTES
            )));
        }
        let mut padded = [0u8; MEMO_MAX_BYTES];
        padded[..memo.len()].copy_from_slice(memo.as_bytes());

        Ok(TransactionPayload::TokenTransfer {
            recipient,
            amount,
            memo: padded,
        })
    }

    /// Call of `function_name` on `contract_address.contract_name`.
    pub fn contract_call(
        contract_address: &str,
        contract_name: &str,
        function_name: &str,
        args: Vec<ClarityValue>,
    ) -> Result<Self> {
        let (address_version, address_hash) = c32_address_decode(contract_address)?;
        validate_name(contract_name)?;
        validate_name(function_name)?;

        Ok(TransactionPayload::ContractCall {
            address_version,
            address_hash,
            contract_name: contract_name.to_string(),
            function_name: function_name.to_string(),
            args,
        })
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            TransactionPayload::TokenTransfer {
                recipient,
                amount,
                memo,
            } => {
                out.push(PAYLOAD_TOKEN_TRANSFER);
                recipient.serialize_into(out);
                out.extend_from_slice(&amount.to_be_bytes());
                out.extend_from_slice(memo);
            }
            TransactionPayload::ContractCall {
                address_version,
                address_hash,
                contract_name,
                function_name,
                args,
            } => {
                out.push(PAYLOAD_CONTRACT_CALL);
                out.push(*address_version);
                out.extend_from_slice(address_hash);
                out.push(contract_name.len() as u8);
                out.extend_from_slice(contract_name.as_bytes());
                out.push(function_name.len() as u8);
                out.extend_from_slice(function_name.as_bytes());
                out.extend_from_slice(&(args.len() as u32).to_be_bytes());
                for arg in args {
                    arg.serialize_into(out);
                }
            }
        }
    }
}

/// A standard-authorization, single-signature transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacksTransaction {
    /// Network the transaction is valid on
    pub network: Network,
    /// hash160 of the signer's public key
    pub signer: [u8; 20],
    /// Whether the signer's public key is compressed
    pub compressed_key: bool,
    /// Account nonce
    pub nonce: u64,
    /// Fee in micro-STX
    pub fee: u64,
    /// `recovery_id || r || s`, zeroed until signed
    pub signature: [u8; SIGNATURE_LEN],
    /// Post-condition mode
    pub post_condition_mode: PostConditionMode,
    /// What the transaction does
    pub payload: TransactionPayload,
}

impl StacksTransaction {
    /// Creates an unsigned transaction paid for by `key`.
    pub fn new(
        network: Network,
        key: &StacksPrivateKey,
        post_condition_mode: PostConditionMode,
        payload: TransactionPayload,
    ) -> Self {
        Self {
            network,
            signer: key.public_key_hash(),
            compressed_key: key.is_compressed(),
            nonce: 0,
            fee: 0,
            signature: [0u8; SIGNATURE_LEN],
            post_condition_mode,
            payload,
        }
    }

    /// Wire serialization.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.push(self.network.transaction_version());
        out.extend_from_slice(&self.network.chain_id().to_be_bytes());

        out.push(AUTH_STANDARD);
        out.push(HASH_MODE_P2PKH);
        out.extend_from_slice(&self.signer);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.fee.to_be_bytes());
        out.push(self.key_encoding());
        out.extend_from_slice(&self.signature);

        out.push(ANCHOR_MODE_ANY);
        out.push(self.post_condition_mode as u8);
        // no post conditions
        out.extend_from_slice(&0u32.to_be_bytes());

        self.payload.serialize_into(&mut out);
        out
    }

    /// Transaction id: `sha512/256` of the serialized transaction.
    pub fn txid(&self) -> String {
        hex::encode(sha512_256(&self.serialize()))
    }

    /// Sighash of the transaction with nonce, fee and signature cleared.
    pub fn initial_sighash(&self) -> [u8; 32] {
        let mut cleared = self.clone();
        cleared.nonce = 0;
        cleared.fee = 0;
        cleared.signature = [0u8; SIGNATURE_LEN];
        sha512_256(&cleared.serialize())
    }

    /// Digest the payer signs: the initial sighash bound to auth type, fee and nonce.
    pub fn presign_sighash(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(32 + 1 + 8 + 8);
        data.extend_from_slice(&self.initial_sighash());
        data.push(AUTH_STANDARD);
        data.extend_from_slice(&self.fee.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        sha512_256(&data)
    }

    /// Signs with `key`, which must be the key the transaction was created for.
    pub fn sign(&mut self, key: &StacksPrivateKey) -> Result<()> {
        if key.public_key_hash() != self.signer || key.key_encoding() != self.key_encoding() {
            return Err(X402Error::Signing(
                "key does not match the transaction's signer".to_string(),
            ));
        }
        self.signature = key.sign_digest(&self.presign_sighash())?;
        Ok(())
    }

    fn key_encoding(&self) -> u8 {
        if self.compressed_key {
            KEY_ENCODING_COMPRESSED
        } else {
            KEY_ENCODING_UNCOMPRESSED
        }
    }
}
