//! The subset of Clarity value serialization used by SIP-010 transfers.

use super::c32::c32_address_decode;
use crate::errors::{Result, X402Error};

const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_PRINCIPAL_STANDARD: u8 = 0x05;
const TYPE_PRINCIPAL_CONTRACT: u8 = 0x06;
const TYPE_OPTIONAL_NONE: u8 = 0x09;
const TYPE_OPTIONAL_SOME: u8 = 0x0a;

/// Longest contract or function name Clarity accepts.
pub const MAX_NAME_LEN: usize = 128;

/// A Clarity value as passed to a contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    /// `uint`
    UInt(u128),
    /// `(buff n)`
    Buffer(Vec<u8>),
    /// Standard principal (an account)
    StandardPrincipal {
        /// c32 version byte
        version: u8,
        /// hash160 of the account's public key
        hash160: [u8; 20],
    },
    /// Contract principal
    ContractPrincipal {
        /// c32 version byte of the deployer
        version: u8,
        /// hash160 of the deployer
        hash160: [u8; 20],
        /// Contract name
        name: String,
    },
    /// `none`
    OptionalNone,
    /// `(some value)`
    OptionalSome(Box<ClarityValue>),
}

impl ClarityValue {
    /// Parses `address` or `address.contract-name` into a principal.
    pub fn principal(principal: &str) -> Result<Self> {
        match principal.split_once('.') {
            Some((address, name)) => {
                let (version, hash160) = c32_address_decode(address)?;
                validate_name(name)?;
                Ok(ClarityValue::ContractPrincipal {
                    version,
                    hash160,
                    name: name.to_string(),
                })
            }
            None => {
                let (version, hash160) = c32_address_decode(principal)?;
                Ok(ClarityValue::StandardPrincipal { version, hash160 })
            }
        }
    }

    /// `(some value)`
    pub fn some(value: ClarityValue) -> Self {
        ClarityValue::OptionalSome(Box::new(value))
    }

    /// Appends the consensus serialization of this value to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            ClarityValue::UInt(value) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&value.to_be_bytes());
            }
            ClarityValue::Buffer(bytes) => {
                out.push(TYPE_BUFFER);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ClarityValue::StandardPrincipal { version, hash160 } => {
                out.push(TYPE_PRINCIPAL_STANDARD);
                out.push(*version);
                out.extend_from_slice(hash160);
            }
            ClarityValue::ContractPrincipal {
                version,
                hash160,
                name,
            } => {
                out.push(TYPE_PRINCIPAL_CONTRACT);
                out.push(*version);
                out.extend_from_slice(hash160);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            ClarityValue::OptionalNone => out.push(TYPE_OPTIONAL_NONE),
            ClarityValue::OptionalSome(inner) => {
                out.push(TYPE_OPTIONAL_SOME);
                inner.serialize_into(out);
            }
        }
    }

    /// Consensus serialization of this value.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }
}

/// Checks a contract or function name against Clarity's length and charset rules.
pub fn validate_name(name: &str) -> Result<()> {
    let valid_chars = name.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '!' | '?' | '+' | '<' | '>' | '=' | '/' | '*')
    });
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());

    if name.len() > MAX_NAME_LEN || !valid_chars || !starts_with_letter {
        return Err(X402Error::InvalidAddress(format!(
            "'{}' is not a valid Clarity name",
            name
        )));
    }
    Ok(())
}
