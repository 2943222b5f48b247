//! One-time passcode engine gating batch send requests.
//!
//! A shared secret is provisioned once per deployment; callers derive a
//! 6-digit code from it for the current 30-second bucket and the serving side
//! recomputes and compares. Strictly current-bucket: there is no drift window.

mod error;
mod otp;
mod secret;

pub use error::{PasscodeError, PasscodeResult};
pub use otp::{
    decode_secret, generate, generate_at, hotp, time_bucket, validate, validate_at, CODE_DIGITS,
    TIME_STEP_SECS,
};
pub use secret::{generate_secret, load_secret, SECRET_BYTES};
