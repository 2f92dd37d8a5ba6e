use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use uuid::Uuid;

use taskflow_api::{
    crypto, db, service, AuthTokenResponse, ChangePasswordRequest, LoginRequest, LogoutRequest,
    OkResponse, RefreshRequest, SignupRequest, UpdateProfileRequest, UserResponse,
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::routes::verification;
use crate::storage::{execute, is_constraint_violation, query_opt, query_row, user_from_row, Db};
use crate::AppState;

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiErr::unauthorized("missing or invalid Authorization header"))?;

        let config = AppConfig::from_ref(state);
        let user_id = service::resolve_auth_token(token, &config.jwt_secret, service::now_unix())?;

        let db = Db::from_ref(state);
        let conn = db.conn();
        let user = query_opt(&conn, db::users::get_by_id(&user_id), user_from_row)
            .map_err(ApiErr::from_db("auth user lookup"))?
            .ok_or_else(|| ApiErr::unauthorized("account no longer exists"))?;

        Ok(AuthUser {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            email_verified: user.email_verified,
        })
    }
}

/// Issue an access/refresh token pair and persist the refresh token.
fn issue_tokens(
    conn: &rusqlite::Connection,
    config: &AppConfig,
    user_id: &str,
    display_name: &str,
    email_verified: bool,
) -> Result<AuthTokenResponse, ApiErr> {
    let bundle = service::prepare_token_bundle(
        &config.jwt_secret,
        user_id,
        display_name,
        email_verified,
        service::now_unix(),
    )?;
    execute(
        conn,
        db::refresh_tokens::insert(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
    )
    .map_err(ApiErr::from_db("insert refresh token"))?;
    Ok(bundle.response)
}

// ---------------------------------------------------------------------------
// Signup / login
// ---------------------------------------------------------------------------

/// POST /api/auth/signup: create an account, sign in, and email a verification code.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthTokenResponse>), ApiErr> {
    if !state.config.registration_open {
        return Err(ApiErr::forbidden("registration is currently closed"));
    }
    let email = service::validate_email(&req.email)?;
    service::validate_password(&req.password)?;
    let display_name = service::validate_display_name(&req.display_name)?;

    let (hash, salt) = crypto::hash_password(&req.password)?;
    let user_id = Uuid::new_v4().to_string();

    let tokens = {
        let conn = state.db.conn();
        match execute(
            &conn,
            db::users::insert(&user_id, &email, &display_name, &hash, &salt),
        ) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(ApiErr::conflict("email already registered"));
            }
            Err(e) => return Err(ApiErr::from_db("signup insert")(e)),
        }
        issue_tokens(&conn, &state.config, &user_id, &display_name, false)?
    };

    tracing::info!(user_id = %user_id, "account created");

    // The account exists either way; a failed send can be retried by the user.
    if let Err(e) = verification::issue_code(&state, &user_id, &email, &display_name).await {
        tracing::warn!(user_id = %user_id, "initial verification code not issued: {e}");
    }

    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /api/auth/login: email + password.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let email = req.email.trim().to_lowercase();
    let conn = state.db.conn();

    let row: Option<(String, String, String, String, bool)> =
        query_opt(&conn, db::users::get_by_email_for_login(&email), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .map_err(ApiErr::from_db("login lookup"))?;

    let Some((user_id, display_name, hash, salt, email_verified)) = row else {
        return Err(ApiErr::unauthorized("invalid email or password"));
    };
    if !crypto::verify_password(&req.password, &hash, &salt) {
        return Err(ApiErr::unauthorized("invalid email or password"));
    }
    if state.config.require_email_verification && !email_verified {
        return Err(ApiErr::forbidden("email address not verified"));
    }

    let tokens = issue_tokens(&conn, &state.config, &user_id, &display_name, email_verified)?;
    Ok(Json(tokens))
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/refresh: rotate a refresh token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = state.db.conn();

    let row: Option<(String, String, String)> =
        query_opt(&conn, db::refresh_tokens::lookup(&token_hash), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("refresh lookup"))?;
    let Some((token_id, user_id, expires_at)) = row else {
        return Err(ApiErr::unauthorized("invalid refresh token"));
    };

    // One use per token, valid or not.
    execute(&conn, db::refresh_tokens::delete_by_id(&token_id))
        .map_err(ApiErr::from_db("delete refresh token"))?;
    if service::is_expired(&expires_at, service::now_unix()) {
        return Err(ApiErr::unauthorized("refresh token expired"));
    }

    let user = query_opt(&conn, db::users::get_by_id(&user_id), user_from_row)
        .map_err(ApiErr::from_db("refresh user lookup"))?
        .ok_or_else(|| ApiErr::unauthorized("account no longer exists"))?;

    let tokens = issue_tokens(
        &conn,
        &state.config,
        &user.user_id,
        &user.display_name,
        user.email_verified,
    )?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout: revoke a refresh token.
pub async fn logout(
    State(db): State<Db>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = db.conn();
    execute(&conn, db::refresh_tokens::delete_by_hash(&token_hash))
        .map_err(ApiErr::from_db("logout"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// GET /api/auth/me
pub async fn me(State(db): State<Db>, user: AuthUser) -> Result<Json<UserResponse>, ApiErr> {
    let conn = db.conn();
    let profile = query_row(&conn, db::users::get_by_id(&user.user_id), user_from_row)
        .map_err(ApiErr::from_db("load profile"))?;
    Ok(Json(profile))
}

/// PUT /api/auth/me: change display name and/or avatar.
pub async fn update_me(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    let display_name = req
        .display_name
        .as_deref()
        .map(service::validate_display_name)
        .transpose()?;
    let avatar_url = req
        .avatar_url
        .as_ref()
        .map(|url| service::normalize_optional_text(url.as_deref()));
    if let Some(Some(url)) = &avatar_url {
        if url.len() > 2048 || !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ApiErr::bad_request("avatar_url must be an http(s) URL"));
        }
    }

    let conn = db.conn();
    if let Some(built) = db::users::update_profile(
        &user.user_id,
        display_name.as_deref(),
        avatar_url.as_ref().map(|a| a.as_deref()),
    ) {
        execute(&conn, built).map_err(ApiErr::from_db("update profile"))?;
    }
    let profile = query_row(&conn, db::users::get_by_id(&user.user_id), user_from_row)
        .map_err(ApiErr::from_db("load profile"))?;
    Ok(Json(profile))
}

/// PUT /api/auth/password: change password and sign out every other session.
pub async fn change_password(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    service::validate_password(&req.new_password)?;

    let conn = db.conn();
    let (hash, salt): (String, String) =
        query_row(&conn, db::users::get_password(&user.user_id), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("load password"))?;
    if !crypto::verify_password(&req.current_password, &hash, &salt) {
        return Err(ApiErr::unauthorized("current password is incorrect"));
    }

    let (new_hash, new_salt) = crypto::hash_password(&req.new_password)?;
    execute(
        &conn,
        db::users::update_password(&user.user_id, &new_hash, &new_salt),
    )
    .map_err(ApiErr::from_db("update password"))?;
    execute(&conn, db::refresh_tokens::delete_for_user(&user.user_id))
        .map_err(ApiErr::from_db("revoke refresh tokens"))?;

    Ok(Json(OkResponse { ok: true }))
}
