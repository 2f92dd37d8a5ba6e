pub mod activities;
pub mod analytics;
pub mod auth;
pub mod changes;
pub mod chat;
pub mod documents;
pub mod health;
pub mod invites;
pub mod members;
pub mod projects;
pub mod tasks;
pub mod verification;

use rusqlite::Connection;
use uuid::Uuid;

use taskflow_api::db;
use taskflow_core::{ActivityAction, ProjectRole};

use crate::error::ApiErr;
use crate::storage::query_opt;

/// The user's role in a project, `None` if they are not a member.
pub(crate) fn membership(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectRole>, ApiErr> {
    let role: Option<String> = query_opt(conn, db::members::get_role(project_id, user_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("member role lookup"))?;
    role.map(|r| {
        r.parse::<ProjectRole>()
            .map_err(ApiErr::from_db("member role parse"))
    })
    .transpose()
}

/// The caller's role in a project. Non-members get 404 so ids of other
/// people's projects stay opaque.
pub(crate) fn member_role(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<ProjectRole, ApiErr> {
    membership(conn, project_id, user_id)?.ok_or_else(|| ApiErr::not_found("project not found"))
}

/// Like [`member_role`], then checks a capability.
pub(crate) fn require_role(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
    allowed: fn(&ProjectRole) -> bool,
    action: &str,
) -> Result<ProjectRole, ApiErr> {
    let role = member_role(conn, project_id, user_id)?;
    if allowed(&role) {
        Ok(role)
    } else {
        Err(ApiErr::forbidden(format!("{role} role cannot {action}")))
    }
}

/// Append an activity row and return its id. The caller publishes the
/// change once its write is committed.
pub(crate) fn record_activity(
    conn: &Connection,
    project_id: &str,
    task_id: Option<&str>,
    user_id: &str,
    action: ActivityAction,
    details: serde_json::Value,
) -> Result<String, ApiErr> {
    let id = Uuid::new_v4().to_string();
    crate::storage::execute(
        conn,
        db::activities::insert(
            &id,
            project_id,
            task_id,
            user_id,
            action.as_str(),
            &details.to_string(),
        ),
    )
    .map_err(ApiErr::from_db("record activity"))?;
    Ok(id)
}
