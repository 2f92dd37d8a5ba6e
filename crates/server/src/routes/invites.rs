use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use taskflow_api::{
    crypto, db, service, AcceptInviteResponse, CreateInviteRequest, CreatedInviteResponse,
    InviteResponse, ListInvitesResponse, OkResponse,
};
use taskflow_core::{ActivityAction, InviteStatus, ProjectRole};

use crate::email::invite_email;
use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{record_activity, require_role};
use crate::storage::{execute, invite_from_row, query_all, query_opt, query_row};
use crate::AppState;

fn load_by_token(conn: &rusqlite::Connection, token: &str) -> Result<InviteResponse, ApiErr> {
    let token_hash = crypto::hash_token(token);
    query_opt(conn, db::invites::get_by_token_hash(&token_hash), invite_from_row)
        .map_err(ApiErr::from_db("invite lookup"))?
        .ok_or_else(|| ApiErr::not_found("invite not found"))
}

/// An invite the caller may answer: addressed to them, pending, unexpired.
fn answerable(invite: &InviteResponse, user: &AuthUser) -> Result<(), ApiErr> {
    if invite.email != user.email {
        return Err(ApiErr::forbidden(
            "this invite was sent to a different email address",
        ));
    }
    if invite.status != InviteStatus::Pending {
        return Err(ApiErr::gone(format!("invite already {}", invite.status)));
    }
    if service::is_expired(&invite.expires_at, service::now_unix()) {
        return Err(ApiErr::gone("invite expired"));
    }
    Ok(())
}

/// POST /api/projects/{id}/invites: owner/admin invites an email address.
pub async fn create_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreatedInviteResponse>), ApiErr> {
    let email = service::validate_email(&req.email)?;
    let role = req.role.unwrap_or(ProjectRole::Member);
    if role.is_owner() {
        return Err(ApiErr::bad_request("cannot invite someone as owner"));
    }

    let token = crypto::generate_token()?;
    let expires_at = service::sqlite_datetime_after(service::now_unix(), service::INVITE_TTL_SECS)?;
    let invite_id = Uuid::new_v4().to_string();

    let invite = {
        let conn = state.db.conn();
        require_role(&conn, &project_id, &user.user_id, ProjectRole::can_manage, "invite members")?;

        let already_member: bool =
            query_row(&conn, db::members::email_is_member(&project_id, &email), |row| row.get(0))
                .map_err(ApiErr::from_db("invite member check"))?;
        if already_member {
            return Err(ApiErr::conflict("that person is already a member"));
        }
        let pending: bool =
            query_row(&conn, db::invites::pending_exists(&project_id, &email), |row| row.get(0))
                .map_err(ApiErr::from_db("invite duplicate check"))?;
        if pending {
            return Err(ApiErr::conflict("an invite for this email is already pending"));
        }

        execute(
            &conn,
            db::invites::insert(&db::invites::InsertParams {
                id: &invite_id,
                project_id: &project_id,
                email: &email,
                role: role.as_str(),
                token_hash: &crypto::hash_token(&token),
                invited_by: &user.user_id,
                expires_at: &expires_at,
            }),
        )
        .map_err(ApiErr::from_db("insert invite"))?;
        let activity_id = record_activity(
            &conn,
            &project_id,
            None,
            &user.user_id,
            ActivityAction::InviteSent,
            serde_json::json!({ "email": email, "role": role }),
        )?;
        state.changes.activity(&project_id, &activity_id);

        query_row(&conn, db::invites::get_by_id(&invite_id), invite_from_row)
            .map_err(ApiErr::from_db("load invite"))?
    };

    let accept_url = service::invite_accept_url(&state.config.base_url, &token);
    let message = invite_email(&email, &invite.project_name, &user.display_name, &accept_url);
    let email_sent = state.mailer.deliver(&message).await;

    Ok((
        StatusCode::CREATED,
        Json(CreatedInviteResponse {
            invite,
            token,
            accept_url,
            email_sent,
        }),
    ))
}

/// GET /api/projects/{id}/invites: pending invites (owner/admin).
pub async fn list_project_invites(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ListInvitesResponse>, ApiErr> {
    let conn = state.db.conn();
    require_role(&conn, &project_id, &user.user_id, ProjectRole::can_manage, "view invites")?;
    let invites = query_all(
        &conn,
        db::invites::list_pending_for_project(&project_id),
        invite_from_row,
    )
    .map_err(ApiErr::from_db("list project invites"))?;
    Ok(Json(ListInvitesResponse { invites }))
}

/// DELETE /api/projects/{id}/invites/{invite_id}: revoke a pending invite.
pub async fn revoke_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, invite_id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = state.db.conn();
    require_role(&conn, &project_id, &user.user_id, ProjectRole::can_manage, "revoke invites")?;

    let invite = query_opt(&conn, db::invites::get_by_id(&invite_id), invite_from_row)
        .map_err(ApiErr::from_db("invite lookup"))?
        .filter(|i| i.project_id == project_id)
        .ok_or_else(|| ApiErr::not_found("invite not found"))?;
    if invite.status != InviteStatus::Pending {
        return Err(ApiErr::conflict(format!("invite already {}", invite.status)));
    }

    execute(
        &conn,
        db::invites::update_status(&invite_id, InviteStatus::Revoked.as_str()),
    )
    .map_err(ApiErr::from_db("revoke invite"))?;
    let activity_id = record_activity(
        &conn,
        &project_id,
        None,
        &user.user_id,
        ActivityAction::InviteRevoked,
        serde_json::json!({ "email": invite.email }),
    )?;
    state.changes.activity(&project_id, &activity_id);

    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/invites: pending invites addressed to the caller's email.
pub async fn list_my_invites(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListInvitesResponse>, ApiErr> {
    let conn = state.db.conn();
    let invites = query_all(
        &conn,
        db::invites::list_pending_for_email(&user.email),
        invite_from_row,
    )
    .map_err(ApiErr::from_db("list my invites"))?;
    Ok(Json(ListInvitesResponse { invites }))
}

/// GET /api/invites/{token}: public preview for the accept page.
pub async fn preview_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InviteResponse>, ApiErr> {
    let conn = state.db.conn();
    load_by_token(&conn, &token).map(Json)
}

/// POST /api/invites/{token}/accept: join the project with the invited role.
pub async fn accept_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<AcceptInviteResponse>, ApiErr> {
    let mut conn = state.db.conn();
    let invite = load_by_token(&conn, &token)?;
    answerable(&invite, &user)?;

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("accept invite begin"))?;
    match execute(
        &tx,
        db::members::insert(&invite.project_id, &user.user_id, invite.role.as_str()),
    ) {
        Ok(_) => {}
        Err(e) if crate::storage::is_constraint_violation(&e) => {
            return Err(ApiErr::conflict("you are already a member of this project"));
        }
        Err(e) => return Err(ApiErr::from_db("accept invite membership")(e)),
    }
    execute(
        &tx,
        db::invites::update_status(&invite.id, InviteStatus::Accepted.as_str()),
    )
    .map_err(ApiErr::from_db("accept invite status"))?;
    let activity_id = record_activity(
        &tx,
        &invite.project_id,
        None,
        &user.user_id,
        ActivityAction::MemberJoined,
        serde_json::json!({ "role": invite.role, "invited_by": invite.invited_by }),
    )?;
    tx.commit().map_err(ApiErr::from_db("accept invite commit"))?;
    state.changes.activity(&invite.project_id, &activity_id);

    tracing::info!(project_id = %invite.project_id, user_id = %user.user_id, "invite accepted");
    Ok(Json(AcceptInviteResponse {
        project_id: invite.project_id,
        role: invite.role,
    }))
}

/// POST /api/invites/{token}/decline
pub async fn decline_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = state.db.conn();
    let invite = load_by_token(&conn, &token)?;
    answerable(&invite, &user)?;
    execute(
        &conn,
        db::invites::update_status(&invite.id, InviteStatus::Declined.as_str()),
    )
    .map_err(ApiErr::from_db("decline invite"))?;
    Ok(Json(OkResponse { ok: true }))
}
