//! Shared-secret provisioning and loading.

use crate::otp::decode_secret;
use crate::{PasscodeError, PasscodeResult};
use rand::Rng;
use std::path::Path;

/// Number of raw bytes in a generated secret.
pub const SECRET_BYTES: usize = 9;

/// Generate a fresh shared secret: random printable-ASCII bytes,
/// base32-encoded. Run once per deployment and distribute the result
/// out-of-band to every authorized caller.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..SECRET_BYTES).map(|_| rng.gen_range(0x20..=0x7eu8)).collect();
    base32::encode(base32::Alphabet::Rfc4648 { padding: true }, &bytes)
}

/// Load the shared secret from a file, verifying it decodes.
///
/// Surrounding whitespace is tolerated; a trailing newline from shell
/// redirection must not brick validation.
pub fn load_secret(path: &Path) -> PasscodeResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|source| PasscodeError::SecretUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let secret = raw.trim().to_string();
    decode_secret(&secret)?;
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::generate_at;
    use tempfile::tempdir;

    #[test]
    fn generated_secret_decodes_to_printable_bytes() {
        let secret = generate_secret();
        let bytes = decode_secret(&secret).unwrap();
        assert_eq!(bytes.len(), SECRET_BYTES);
        assert!(bytes.iter().all(|b| (0x20..=0x7e).contains(b)));
    }

    #[test]
    fn generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn load_secret_trims_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        let secret = generate_secret();
        std::fs::write(&path, format!("{secret}\n")).unwrap();

        let loaded = load_secret(&path).unwrap();
        assert_eq!(loaded, secret);
        assert!(generate_at(&loaded, 0).is_ok());
    }

    #[test]
    fn load_secret_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_secret(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PasscodeError::SecretUnreadable { .. }));
    }

    #[test]
    fn load_secret_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "not base32 at all!").unwrap();
        let err = load_secret(&path).unwrap_err();
        assert!(matches!(err, PasscodeError::InvalidSecret));
    }
}
