use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use taskflow_api::{
    db, service, ActivityQuery, ActivityResponse, CreateCommentRequest, ListActivitiesResponse,
};
use taskflow_core::ActivityAction;

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::tasks::load_visible_task;
use crate::routes::{member_role, record_activity};
use crate::storage::{activity_from_row, query_all, query_row};
use crate::AppState;

/// GET /api/projects/{id}/activities?limit=: newest first.
pub async fn list_activities(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ListActivitiesResponse>, ApiErr> {
    let limit = service::clamp_activity_limit(query.limit);
    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let activities = query_all(
        &conn,
        db::activities::list_for_project(&project_id, limit),
        activity_from_row,
    )
    .map_err(ApiErr::from_db("list activities"))?;
    Ok(Json(ListActivitiesResponse { activities }))
}

/// GET /api/tasks/{id}/comments: oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<ListActivitiesResponse>, ApiErr> {
    let conn = state.db.conn();
    load_visible_task(&conn, &task_id, &user.user_id)?;
    let activities = query_all(
        &conn,
        db::activities::list_comments(&task_id),
        activity_from_row,
    )
    .map_err(ApiErr::from_db("list comments"))?;
    Ok(Json(ListActivitiesResponse { activities }))
}

/// POST /api/tasks/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ActivityResponse>), ApiErr> {
    let body = service::validate_comment(&req.body)?;

    let conn = state.db.conn();
    let (task, role) = load_visible_task(&conn, &task_id, &user.user_id)?;
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot comment")));
    }

    let activity_id = record_activity(
        &conn,
        &task.project_id,
        Some(&task_id),
        &user.user_id,
        ActivityAction::Comment,
        serde_json::json!({ "body": body }),
    )?;
    state.changes.activity(&task.project_id, &activity_id);

    let comment = query_row(
        &conn,
        db::activities::get_by_id(&activity_id),
        activity_from_row,
    )
    .map_err(ApiErr::from_db("load comment"))?;
    Ok((StatusCode::CREATED, Json(comment)))
}
