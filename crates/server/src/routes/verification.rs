//! Email verification by numeric code.
//!
//! Sending retires every live code of the user and inserts a new one; the
//! plain code only ever exists in the email. Verifying checks the newest live
//! code, counting wrong guesses.

use axum::{extract::State, Json};
use uuid::Uuid;

use taskflow_api::{
    crypto, db, service, OkResponse, ServiceError, VerificationSentResponse, VerifyEmailRequest,
};

use crate::email::verification_email;
use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{execute, query_opt};
use crate::AppState;

/// Issue a fresh code and email it. Enforces the resend cooldown.
pub(crate) async fn issue_code(
    state: &AppState,
    user_id: &str,
    email: &str,
    display_name: &str,
) -> Result<VerificationSentResponse, ApiErr> {
    let now = service::now_unix();
    let code = crypto::generate_verification_code()?;
    let expires_at =
        service::sqlite_datetime_after(now, service::VERIFICATION_CODE_TTL_SECS)?;

    {
        let conn = state.db.conn();
        let last_sent: Option<String> =
            query_opt(&conn, db::verification::last_sent_at(user_id), |row| row.get(0))
                .map_err(ApiErr::from_db("verification cooldown lookup"))?;
        if let Some(last) = last_sent.as_deref().and_then(service::parse_sqlite_datetime) {
            let ready_at = last + service::VERIFICATION_RESEND_COOLDOWN_SECS;
            if now < ready_at {
                return Err(ServiceError::TooManyRequests(format!(
                    "please wait {}s before requesting another code",
                    ready_at - now
                ))
                .into());
            }
        }

        execute(&conn, db::verification::retire_live(user_id))
            .map_err(ApiErr::from_db("retire verification codes"))?;
        execute(
            &conn,
            db::verification::insert(
                &Uuid::new_v4().to_string(),
                user_id,
                &crypto::hash_token(&code),
                &expires_at,
            ),
        )
        .map_err(ApiErr::from_db("insert verification code"))?;
    }

    let message = verification_email(
        email,
        display_name,
        &code,
        service::VERIFICATION_CODE_TTL_SECS / 60,
    );
    let email_sent = state.mailer.deliver(&message).await;

    Ok(VerificationSentResponse {
        email: email.to_string(),
        expires_at,
        email_sent,
    })
}

/// POST /api/auth/verification/send: (re)send a verification code.
pub async fn send_code(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<VerificationSentResponse>, ApiErr> {
    if user.email_verified {
        return Err(ApiErr::conflict("email already verified"));
    }
    let sent = issue_code(&state, &user.user_id, &user.email, &user.display_name).await?;
    Ok(Json(sent))
}

/// POST /api/auth/verification/verify: check a code and mark the email verified.
pub async fn verify_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    if user.email_verified {
        return Err(ApiErr::conflict("email already verified"));
    }
    let code = req.code.trim();
    if code.len() != crypto::VERIFICATION_CODE_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiErr::bad_request("verification code must be 6 digits"));
    }

    let conn = state.db.conn();
    let live: Option<(String, String, i64, String)> =
        query_opt(&conn, db::verification::latest_live(&user.user_id), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .map_err(ApiErr::from_db("verification lookup"))?;
    let Some((code_id, code_hash, attempts, expires_at)) = live else {
        return Err(ApiErr::gone("no active verification code, request a new one"));
    };

    if service::is_expired(&expires_at, service::now_unix()) {
        return Err(ApiErr::gone("verification code expired, request a new one"));
    }
    if attempts >= service::VERIFICATION_MAX_ATTEMPTS {
        return Err(ApiErr::gone("too many attempts, request a new code"));
    }

    if crypto::hash_token(code) != code_hash {
        execute(&conn, db::verification::increment_attempts(&code_id))
            .map_err(ApiErr::from_db("count verification attempt"))?;
        return Err(ApiErr::bad_request("incorrect verification code"));
    }

    execute(&conn, db::verification::mark_used(&code_id))
        .map_err(ApiErr::from_db("consume verification code"))?;
    execute(&conn, db::users::mark_email_verified(&user.user_id))
        .map_err(ApiErr::from_db("mark email verified"))?;
    tracing::info!(user_id = %user.user_id, "email verified");

    Ok(Json(OkResponse { ok: true }))
}
