//! Passcode derivation and validation (RFC 4226 / RFC 6238, SHA-1, 6 digits).

use crate::{PasscodeError, PasscodeResult};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

/// Width of a passcode time bucket in seconds.
pub const TIME_STEP_SECS: u64 = 30;

/// Number of decimal digits in a passcode.
pub const CODE_DIGITS: u32 = 6;

/// Compute the RFC 4226 HOTP code for raw key bytes and a counter value.
pub fn hotp(key: &[u8], counter: u64) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 §5.3.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);
    let code = binary % 10u32.pow(CODE_DIGITS);
    format!("{code:06}")
}

/// The time bucket a unix timestamp falls into.
pub fn time_bucket(unix_seconds: u64) -> u64 {
    unix_seconds / TIME_STEP_SECS
}

/// Generate the passcode for an explicit unix timestamp.
pub fn generate_at(secret_b32: &str, unix_seconds: u64) -> PasscodeResult<String> {
    let key = decode_secret(secret_b32)?;
    Ok(hotp(&key, time_bucket(unix_seconds)))
}

/// Generate the passcode for the current time bucket.
pub fn generate(secret_b32: &str) -> PasscodeResult<String> {
    generate_at(secret_b32, current_unix_time())
}

/// Validate a candidate passcode at an explicit unix timestamp.
///
/// Only the bucket the timestamp falls into is checked; there is no grace
/// window on either side, so a request that crosses a 30-second boundary in
/// flight can legitimately fail.
pub fn validate_at(secret_b32: &str, candidate: &str, unix_seconds: u64) -> PasscodeResult<bool> {
    if candidate.len() != CODE_DIGITS as usize || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }
    let expected = generate_at(secret_b32, unix_seconds)?;
    Ok(constant_time_eq(expected.as_bytes(), candidate.as_bytes()))
}

/// Validate a candidate passcode against the current time bucket.
pub fn validate(secret_b32: &str, candidate: &str) -> PasscodeResult<bool> {
    validate_at(secret_b32, candidate, current_unix_time())
}

/// Decode a base32 secret; case-insensitive, padded or unpadded.
pub fn decode_secret(secret_b32: &str) -> PasscodeResult<Vec<u8>> {
    let cleaned = secret_b32.trim().to_uppercase();
    if cleaned.is_empty() {
        return Err(PasscodeError::InvalidSecret);
    }
    base32::decode(base32::Alphabet::Rfc4648 { padding: true }, &cleaned)
        .or_else(|| {
            base32::decode(
                base32::Alphabet::Rfc4648 { padding: false },
                cleaned.trim_end_matches('='),
            )
        })
        .filter(|key| !key.is_empty())
        .ok_or(PasscodeError::InvalidSecret)
}

fn current_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
