use axum::{
    extract::{Path, State},
    Json,
};

use taskflow_api::{db, ListMembersResponse, MemberResponse, OkResponse, UpdateMemberRequest};
use taskflow_core::{ActivityAction, ProjectRole};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{member_role, membership, record_activity, require_role};
use crate::storage::{execute, member_from_row, query_all};
use crate::AppState;

/// GET /api/projects/{id}/members
pub async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ListMembersResponse>, ApiErr> {
    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let members = query_all(&conn, db::members::list(&project_id), member_from_row)
        .map_err(ApiErr::from_db("list members"))?;
    Ok(Json(ListMembersResponse { members }))
}

/// Role of another member, 404 if they are not one.
fn target_role(
    conn: &rusqlite::Connection,
    project_id: &str,
    user_id: &str,
) -> Result<ProjectRole, ApiErr> {
    membership(conn, project_id, user_id)?.ok_or_else(|| ApiErr::not_found("member not found"))
}

/// PUT /api/projects/{id}/members/{user_id}: owner/admin only. Ownership
/// can neither be granted nor taken away here.
pub async fn update_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ApiErr> {
    if req.role.is_owner() {
        return Err(ApiErr::bad_request("ownership cannot be assigned"));
    }

    let conn = state.db.conn();
    let my_role = require_role(
        &conn,
        &project_id,
        &user.user_id,
        ProjectRole::can_manage,
        "change member roles",
    )?;
    let current = target_role(&conn, &project_id, &member_id)?;
    if current.is_owner() {
        return Err(ApiErr::forbidden("the owner's role cannot be changed"));
    }
    if my_role == ProjectRole::Admin && current == ProjectRole::Admin && member_id != user.user_id {
        return Err(ApiErr::forbidden("only the owner can change another admin's role"));
    }

    if current != req.role {
        execute(
            &conn,
            db::members::update_role(&project_id, &member_id, req.role.as_str()),
        )
        .map_err(ApiErr::from_db("update member role"))?;
        let activity_id = record_activity(
            &conn,
            &project_id,
            None,
            &user.user_id,
            ActivityAction::MemberRoleChanged,
            serde_json::json!({ "user_id": member_id, "from": current, "to": req.role }),
        )?;
        state.changes.activity(&project_id, &activity_id);
    }

    let members = query_all(&conn, db::members::list(&project_id), member_from_row)
        .map_err(ApiErr::from_db("list members"))?;
    members
        .into_iter()
        .find(|m| m.user_id == member_id)
        .map(Json)
        .ok_or_else(|| ApiErr::not_found("member not found"))
}

/// DELETE /api/projects/{id}/members/{user_id}: owner/admin removes anyone
/// but the owner; any member may remove themselves to leave.
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, member_id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiErr> {
    let conn = state.db.conn();
    let my_role = member_role(&conn, &project_id, &user.user_id)?;
    let leaving = member_id == user.user_id;
    if !leaving && !my_role.can_manage() {
        return Err(ApiErr::forbidden(format!("{my_role} role cannot remove members")));
    }

    let target = target_role(&conn, &project_id, &member_id)?;
    if target.is_owner() {
        return Err(ApiErr::forbidden(
            "the owner cannot be removed; delete the project instead",
        ));
    }
    if !leaving && my_role == ProjectRole::Admin && target == ProjectRole::Admin {
        return Err(ApiErr::forbidden("only the owner can remove an admin"));
    }

    execute(&conn, db::members::delete(&project_id, &member_id))
        .map_err(ApiErr::from_db("remove member"))?;
    let activity_id = record_activity(
        &conn,
        &project_id,
        None,
        &user.user_id,
        ActivityAction::MemberRemoved,
        serde_json::json!({ "user_id": member_id, "left": leaving }),
    )?;
    state.changes.activity(&project_id, &activity_id);

    Ok(Json(OkResponse { ok: true }))
}
