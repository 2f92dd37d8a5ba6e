//! Cryptographic helpers for authentication and storage links.
//!
//! - PBKDF2-SHA256 password hashing (600k iterations)
//! - HMAC-SHA256 JWT signing/verification
//! - Opaque random tokens (refresh tokens, invite tokens) and their SHA-256 digests
//! - Numeric email verification codes
//! - HMAC-signed, expiring storage URLs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::ServiceError;

const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Number of digits in an email verification code.
pub const VERIFICATION_CODE_DIGITS: usize = 6;

// ── Password hashing ────────────────────────────────────────────────────────

/// Hash a password with PBKDF2-SHA256. Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> Result<(String, String), ServiceError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    Ok((hex::encode(hash), hex::encode(salt)))
}

/// Verify a password against a stored hash and salt (both hex-encoded).
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    constant_time_eq(&hash, &expected)
}

// ── JWT (HMAC-SHA256) ───────────────────────────────────────────────────────

/// JWT header (always HS256).
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// JWT expiry: 1 hour in seconds.
pub const JWT_EXPIRY_SECS: u64 = 3600;

/// Refresh token expiry: 30 days in seconds.
pub const REFRESH_EXPIRY_SECS: u64 = 30 * 24 * 3600;

/// Sign a JWT for the given user. Returns the encoded JWT string.
pub fn sign_jwt(user_id: &str, secret: &str, now_unix: u64) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());

    let payload = serde_json::json!({
        "sub": user_id,
        "iat": now_unix,
        "exp": now_unix + JWT_EXPIRY_SECS,
    });
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

    format!("{signing_input}.{sig_b64}")
}

/// Verify a JWT and return the `sub` (user_id) if valid.
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<String, ServiceError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ServiceError::Unauthorized("invalid JWT format".into()));
    }

    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let expected_sig = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let actual_sig = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT signature encoding".into()))?;

    if !constant_time_eq(&expected_sig, &actual_sig) {
        return Err(ServiceError::Unauthorized("invalid JWT signature".into()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload encoding".into()))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid JWT payload".into()))?;

    let exp = payload["exp"]
        .as_u64()
        .ok_or_else(|| ServiceError::Unauthorized("missing exp claim".into()))?;
    if now_unix > exp {
        return Err(ServiceError::Unauthorized("JWT expired".into()));
    }

    let sub = payload["sub"]
        .as_str()
        .ok_or_else(|| ServiceError::Unauthorized("missing sub claim".into()))?
        .to_string();

    Ok(sub)
}

// ── Tokens and codes ────────────────────────────────────────────────────────

/// Generate a secure random token. Returns hex-encoded.
pub fn generate_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Hash a token with SHA-256 for storage. Returns hex-encoded.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    let hash = sha2::Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

/// Generate a zero-padded numeric verification code.
pub fn generate_verification_code() -> Result<String, ServiceError> {
    let modulus = 10u32.pow(VERIFICATION_CODE_DIGITS as u32);
    // Rejection sampling keeps the distribution uniform.
    let limit = u32::MAX - (u32::MAX % modulus);
    loop {
        let mut bytes = [0u8; 4];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
        let n = u32::from_le_bytes(bytes);
        if n < limit {
            return Ok(format!(
                "{:0width$}",
                n % modulus,
                width = VERIFICATION_CODE_DIGITS
            ));
        }
    }
}

// ── Signed storage URLs ─────────────────────────────────────────────────────

/// Signature over `path` valid until `expires_unix`. Returns hex-encoded.
pub fn sign_storage_path(path: &str, expires_unix: u64, secret: &str) -> String {
    let input = format!("{path}\n{expires_unix}");
    hex::encode(hmac_sha256(secret.as_bytes(), input.as_bytes()))
}

/// Check a storage signature produced by [`sign_storage_path`].
pub fn verify_storage_signature(
    path: &str,
    expires_unix: u64,
    sig_hex: &str,
    secret: &str,
    now_unix: u64,
) -> Result<(), ServiceError> {
    if now_unix > expires_unix {
        return Err(ServiceError::Forbidden("link expired".into()));
    }
    let Ok(actual) = hex::decode(sig_hex) else {
        return Err(ServiceError::Forbidden("invalid signature".into()));
    };
    let input = format!("{path}\n{expires_unix}");
    let expected = hmac_sha256(secret.as_bytes(), input.as_bytes());
    if !constant_time_eq(&expected, &actual) {
        return Err(ServiceError::Forbidden("invalid signature".into()));
    }
    Ok(())
}

// ── Internal ────────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_jwt_round_trip() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        assert_eq!(verify_jwt(&token, SECRET, 1_500).unwrap(), "user-1");
    }

    #[test]
    fn test_jwt_rejects_expired_and_tampered() {
        let token = sign_jwt("user-1", SECRET, 1_000);
        assert!(verify_jwt(&token, SECRET, 1_000 + JWT_EXPIRY_SECS + 1).is_err());
        assert!(verify_jwt(&token, "other-secret", 1_500).is_err());
        assert!(verify_jwt("a.b", SECRET, 1_500).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let (hash, salt) = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash, &salt));
        assert!(!verify_password("wrong horse", &hash, &salt));
        assert!(!verify_password("correct horse", "zz", &salt));
    }

    #[test]
    fn test_token_hash_is_stable_hex() {
        let token = generate_token().unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_verification_code_format() {
        for _ in 0..50 {
            let code = generate_verification_code().unwrap();
            assert_eq!(code.len(), VERIFICATION_CODE_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_storage_signature() {
        let path = "/storage/documents/d1";
        let sig = sign_storage_path(path, 2_000, SECRET);
        assert!(verify_storage_signature(path, 2_000, &sig, SECRET, 1_000).is_ok());
        // Expired.
        assert!(verify_storage_signature(path, 2_000, &sig, SECRET, 2_001).is_err());
        // Different path or expiry.
        let other = "/storage/documents/d2";
        assert!(verify_storage_signature(other, 2_000, &sig, SECRET, 1_000).is_err());
        assert!(verify_storage_signature(path, 3_000, &sig, SECRET, 1_000).is_err());
        assert!(verify_storage_signature(path, 2_000, "nothex", SECRET, 1_000).is_err());
    }
}
