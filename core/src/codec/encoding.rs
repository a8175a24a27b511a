//! Hex, base64 and amount helpers shared by the codec and the builders.
//!
//! Hex input accepts an optional `0x` prefix. Malformed hex is always an
//! error here; the only place that tolerates it is the lock override in
//! [`crate::outputs`], which falls back to the default lock on purpose.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::config::{ADDRESS_LENGTH, HASH_LENGTH};
use crate::error::BuildError;
use crate::ledger::types::{Address, Hash32};

/// Decodes a hex string, stripping an optional `0x` prefix.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(trimmed)
}

/// Decodes a hex field, naming the field in the error.
pub fn decode_hex_field(field: &'static str, input: &str) -> Result<Vec<u8>, BuildError> {
    decode_hex(input).map_err(|e| BuildError::invalid(field, format!("malformed hex: {}", e)))
}

/// Decodes a hex field into a 20-byte address.
pub fn decode_address(field: &'static str, input: &str) -> Result<Address, BuildError> {
    let bytes = decode_hex_field(field, input)?;
    Address::try_from(bytes.as_slice()).map_err(|_| {
        BuildError::invalid(
            field,
            format!(
                "address must be {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            ),
        )
    })
}

/// Decodes a hex field into a 32-byte hash.
pub fn decode_hash(field: &'static str, input: &str) -> Result<Hash32, BuildError> {
    let bytes = decode_hex_field(field, input)?;
    hash_from_slice(field, &bytes)
}

/// Copies a 32-byte slice into a [`Hash32`].
pub fn hash_from_slice(field: &'static str, bytes: &[u8]) -> Result<Hash32, BuildError> {
    Hash32::try_from(bytes).map_err(|_| {
        BuildError::invalid(
            field,
            format!("hash must be {} bytes, got {}", HASH_LENGTH, bytes.len()),
        )
    })
}

/// Lowercase hex without prefix.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Standard (RFC 4648) base64 with padding.
pub fn encode_base64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

/// Parses a decimal amount string into base units.
///
/// An empty string is zero. Signs, separators and fractional parts are
/// rejected; amounts are always integers in the smallest unit.
pub fn parse_amount(field: &'static str, value: &str) -> Result<u64, BuildError> {
    if value.is_empty() {
        return Ok(0);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BuildError::invalid(
            field,
            format!("'{}' is not a decimal amount", value),
        ));
    }
    value
        .parse::<u64>()
        .map_err(|_| BuildError::invalid(field, format!("'{}' exceeds the u64 range", value)))
}

/// Validates a decimal amount and returns it with the text to store.
///
/// The stored text is the input without surrounding whitespace, or `"0"`
/// when nothing is left. Leading zeros are kept as written.
pub fn checked_amount<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<(u64, &'a str), BuildError> {
    let text = match value.trim() {
        "" => "0",
        trimmed => trimmed,
    };
    Ok((parse_amount(field, text)?, text))
}
