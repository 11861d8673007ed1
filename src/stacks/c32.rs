//! c32check address encoding.
//!
//! Stacks addresses are `S` + a version character + the Crockford-style
//! base-32 encoding of `hash160 || checksum`, where the checksum is the first
//! four bytes of `sha256(sha256(version || hash160))`.

use crate::errors::{Result, X402Error};
use sha2::{Digest, Sha256};

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Mainnet single-signature (`SP`).
pub const VERSION_MAINNET_SINGLESIG: u8 = 22;
/// Mainnet multi-signature (`SM`).
pub const VERSION_MAINNET_MULTISIG: u8 = 20;
/// Testnet single-signature (`ST`).
pub const VERSION_TESTNET_SINGLESIG: u8 = 26;
/// Testnet multi-signature (`SN`).
pub const VERSION_TESTNET_MULTISIG: u8 = 21;

fn c32_value(c: u8) -> Result<u8> {
    let normalized = match c.to_ascii_uppercase() {
        b'O' => b'0',
        b'L' | b'I' => b'1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|&a| a == normalized)
        .map(|p| p as u8)
        .ok_or_else(|| X402Error::InvalidAddress(format!("invalid c32 character '{}'", c as char)))
}

fn checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let once = hasher.finalize();
    let twice = Sha256::digest(once);
    let mut out = [0u8; 4];
    out.copy_from_slice(&twice[..4]);
    out
}

/// Encodes bytes as c32, keeping one `0` per leading zero byte.
pub fn c32_encode(input: &[u8]) -> String {
    let mut result = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u16 = 0;

    for &byte in input.iter().rev() {
        carry |= (byte as u16) << carry_bits;
        carry_bits += 8;
        while carry_bits >= 5 {
            result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry >>= 5;
            carry_bits -= 5;
        }
    }
    if carry_bits > 0 {
        result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
    }

    while result.last() == Some(&b'0') {
        result.pop();
    }
    for _ in input.iter().take_while(|&&b| b == 0) {
        result.push(b'0');
    }

    result.reverse();
    result.into_iter().map(char::from).collect()
}

/// Decodes a c32 string, keeping one zero byte per leading `0`.
pub fn c32_decode(input: &str) -> Result<Vec<u8>> {
    let digits = input
        .bytes()
        .map(c32_value)
        .collect::<Result<Vec<u8>>>()?;

    let mut result = Vec::with_capacity(digits.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u16 = 0;

    for &digit in digits.iter().rev() {
        carry |= (digit as u16) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            result.push((carry & 0xff) as u8);
            carry >>= 8;
            carry_bits -= 8;
        }
    }
    if carry_bits > 0 {
        result.push(carry as u8);
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    for _ in digits.iter().take_while(|&&d| d == 0) {
        result.push(0);
    }

    result.reverse();
    Ok(result)
}

/// Builds a c32check address from a version byte and a hash160.
///
/// # Examples
///
/// ```
/// use x402_stacks::stacks::c32::c32_address;
///
/// let hash = hex::decode("a46ff88886c2ef9762d970b4d2c63678835bd39d").unwrap();
/// let mut hash160 = [0u8; 20];
/// hash160.copy_from_slice(&hash);
/// assert_eq!(c32_address(22, &hash160), "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7");
/// ```
pub fn c32_address(version: u8, hash160: &[u8; 20]) -> String {
    let mut data = hash160.to_vec();
    data.extend_from_slice(&checksum(version, hash160));
    format!(
        "S{}{}",
        C32_ALPHABET[(version & 0x1f) as usize] as char,
        c32_encode(&data)
    )
}

/// Splits a c32check address into its version byte and hash160.
pub fn c32_address_decode(address: &str) -> Result<(u8, [u8; 20])> {
    let invalid = |reason: &str| X402Error::InvalidAddress(format!("{}: {}", address, reason));

    let rest = address
        .strip_prefix('S')
        .ok_or_else(|| invalid("must start with 'S'"))?;
    let mut chars = rest.bytes();
    let version = chars
        .next()
        .ok_or_else(|| invalid("missing version"))
        .and_then(c32_value)?;

    let data = c32_decode(&rest[1..])?;
    if data.len() != 24 {
        return Err(invalid("wrong length"));
    }
    let (hash, check) = data.split_at(20);
    if checksum(version, hash) != check {
        return Err(invalid("checksum mismatch"));
    }

    let mut hash160 = [0u8; 20];
    hash160.copy_from_slice(hash);
    Ok((version, hash160))
}
