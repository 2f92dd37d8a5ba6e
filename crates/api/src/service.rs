//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters around these helpers.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{AuthTokenResponse, ServiceError};

// ─── Expiry policy ──────────────────────────────────────────────────────────

/// Lifetime of an email verification code.
pub const VERIFICATION_CODE_TTL_SECS: u64 = 10 * 60;

/// Minimum delay between two verification emails for the same user.
pub const VERIFICATION_RESEND_COOLDOWN_SECS: u64 = 60;

/// Wrong guesses allowed before a verification code is burned.
pub const VERIFICATION_MAX_ATTEMPTS: i64 = 5;

/// Lifetime of a project invite.
pub const INVITE_TTL_SECS: u64 = 7 * 24 * 3600;

/// Lifetime of a signed document download URL.
pub const SIGNED_URL_TTL_SECS: u64 = 15 * 60;

pub const DEFAULT_ACTIVITY_LIMIT: u64 = 50;
pub const MAX_ACTIVITY_LIMIT: u64 = 200;

pub const DEFAULT_TREND_DAYS: u32 = 14;
pub const MAX_TREND_DAYS: u32 = 90;

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid_shape = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if !valid_shape || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Validate a password (8-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(ServiceError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if len > 128 {
        return Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        ));
    }
    Ok(())
}

fn validate_text(value: &str, field: &str, max: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be 1-{max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate and normalize a display name. Returns the trimmed name.
pub fn validate_display_name(name: &str) -> Result<String, ServiceError> {
    validate_text(name, "display name", 64)
}

pub fn validate_project_name(name: &str) -> Result<String, ServiceError> {
    validate_text(name, "project name", 120)
}

pub fn validate_task_title(title: &str) -> Result<String, ServiceError> {
    validate_text(title, "task title", 200)
}

pub fn validate_comment(body: &str) -> Result<String, ServiceError> {
    validate_text(body, "comment", 5000)
}

/// Document names become part of download headers, so no path separators
/// or control characters.
pub fn validate_document_name(name: &str) -> Result<String, ServiceError> {
    let name = validate_text(name, "document name", 255)?;
    if name.contains(['/', '\\']) || name.chars().any(char::is_control) || name == ".." {
        return Err(ServiceError::BadRequest("invalid document name".into()));
    }
    Ok(name)
}

/// Validate a `#rrggbb` color.
pub fn validate_color(color: &str) -> Result<String, ServiceError> {
    let color = color.trim();
    let ok = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !ok {
        return Err(ServiceError::BadRequest(
            "color must look like #1a2b3c".into(),
        ));
    }
    Ok(color.to_lowercase())
}

/// Validate an optional `YYYY-MM-DD` date, returning it normalized.
pub fn validate_due_date(date: &str) -> Result<String, ServiceError> {
    Ok(taskflow_core::parse_due_date(date)?
        .format("%Y-%m-%d")
        .to_string())
}

/// Trim optional free text; blank becomes `None`.
pub fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn clamp_activity_limit(limit: Option<u64>) -> u64 {
    limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT)
}

pub fn clamp_trend_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS)
}

// ─── Time helpers ───────────────────────────────────────────────────────────

const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Format a unix timestamp the way SQLite's `datetime()` does.
pub fn sqlite_datetime(unix: u64) -> Result<String, ServiceError> {
    let dt = DateTime::<Utc>::from_timestamp(unix as i64, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    Ok(dt.format(SQLITE_DATETIME).to_string())
}

/// `now + secs`, SQLite-formatted.
pub fn sqlite_datetime_after(now_unix: u64, secs: u64) -> Result<String, ServiceError> {
    let later = now_unix
        .checked_add(secs)
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))?;
    sqlite_datetime(later)
}

/// Parse a SQLite datetime string back to unix seconds.
pub fn parse_sqlite_datetime(s: &str) -> Option<u64> {
    NaiveDateTime::parse_from_str(s, SQLITE_DATETIME)
        .ok()
        .and_then(|dt| u64::try_from(dt.and_utc().timestamp()).ok())
}

/// True when a stored expiry is in the past (unparsable counts as expired).
pub fn is_expired(expires_at: &str, now_unix: u64) -> bool {
    parse_sqlite_datetime(expires_at).is_none_or(|exp| now_unix >= exp)
}

pub fn now_unix() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

// ─── Links ──────────────────────────────────────────────────────────────────

/// Browser link that opens the accept-invite flow.
pub fn invite_accept_url(base_url: &str, token: &str) -> String {
    format!("{}/invite/{token}", base_url.trim_end_matches('/'))
}

/// API path a signed document URL points at (also the signed input).
pub fn storage_path(document_id: &str) -> String {
    format!("/api/storage/documents/{document_id}")
}

// ─── Auth Token Resolution ──────────────────────────────────────────────────

/// Resolve a bearer token to a user id.
pub fn resolve_auth_token(token: &str, jwt_secret: &str, now: u64) -> Result<String, ServiceError> {
    if jwt_secret.is_empty() {
        return Err(ServiceError::Unauthorized(
            "authentication not configured".into(),
        ));
    }
    crate::crypto::verify_jwt(token, jwt_secret, now)
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Pre-computed token bundle returned by [`prepare_token_bundle`].
///
/// The caller only needs to insert the refresh token row and return
/// `response`.
pub struct TokenBundle {
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the refresh_tokens row.
    pub token_id: String,
    /// `datetime` string for the refresh token expiry (DB column value).
    pub expires_at: String,
    /// Ready-to-return API response.
    pub response: AuthTokenResponse,
}

pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    display_name: &str,
    email_verified: bool,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    let access_token = crypto::sign_jwt(user_id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let token_id = uuid::Uuid::new_v4().to_string();
    let expires_at = sqlite_datetime_after(now_unix, crypto::REFRESH_EXPIRY_SECS)?;

    let response = AuthTokenResponse {
        access_token,
        refresh_token,
        expires_in: crypto::JWT_EXPIRY_SECS,
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        email_verified,
    };

    Ok(TokenBundle {
        token_hash,
        token_id,
        expires_at,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("a da@example.com").is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(128)).is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert_eq!(validate_display_name("  bob  ").unwrap(), "bob");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
        assert!(validate_display_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_document_name() {
        assert_eq!(validate_document_name(" spec.pdf ").unwrap(), "spec.pdf");
        assert!(validate_document_name("../etc/passwd").is_err());
        assert!(validate_document_name("a\\b").is_err());
        assert!(validate_document_name("..").is_err());
    }

    #[test]
    fn test_validate_color_and_date() {
        assert_eq!(validate_color("#AABBCC").unwrap(), "#aabbcc");
        assert!(validate_color("red").is_err());
        assert_eq!(validate_due_date(" 2026-04-01 ").unwrap(), "2026-04-01");
        assert!(validate_due_date("2026-13-01").is_err());
    }

    #[test]
    fn test_clamps() {
        assert_eq!(clamp_activity_limit(None), DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(clamp_activity_limit(Some(0)), 1);
        assert_eq!(clamp_activity_limit(Some(10_000)), MAX_ACTIVITY_LIMIT);
        assert_eq!(clamp_trend_days(Some(365)), MAX_TREND_DAYS);
    }

    #[test]
    fn test_sqlite_datetime_round_trip() {
        let s = sqlite_datetime(1_700_000_000).unwrap();
        assert_eq!(s, "2023-11-14 22:13:20");
        assert_eq!(parse_sqlite_datetime(&s), Some(1_700_000_000));
        assert!(is_expired(&s, 1_700_000_000));
        assert!(!is_expired(&s, 1_699_999_999));
        assert!(is_expired("garbage", 0));
    }

    #[test]
    fn test_token_bundle() {
        let bundle = prepare_token_bundle("secret", "u1", "Ada", false, 1_700_000_000).unwrap();
        assert_eq!(bundle.response.user_id, "u1");
        assert_eq!(bundle.token_hash, crate::crypto::hash_token(&bundle.response.refresh_token));
        assert_eq!(
            resolve_auth_token(&bundle.response.access_token, "secret", 1_700_000_010).unwrap(),
            "u1"
        );
        assert!(resolve_auth_token(&bundle.response.access_token, "", 1_700_000_010).is_err());
    }

    #[test]
    fn test_links() {
        assert_eq!(
            invite_accept_url("http://localhost:3000/", "abc"),
            "http://localhost:3000/invite/abc"
        );
        assert_eq!(storage_path("d1"), "/api/storage/documents/d1");
    }
}
