use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use taskflow_api::{
    db, service, CreateProjectRequest, ListProjectsResponse, OkResponse, ProjectDetailResponse,
    ProjectResponse, StatusCount, UpdateProjectRequest,
};
use taskflow_core::{ActivityAction, ProjectRole, ProjectStatus, TaskStatus};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{member_role, record_activity, require_role};
use crate::storage::{
    execute, project_from_row, project_with_role_from_row, query_all, query_opt, query_row,
};
use crate::AppState;

fn validate_optional(
    value: Option<&str>,
    validate: fn(&str) -> Result<String, taskflow_api::ServiceError>,
) -> Result<Option<String>, ApiErr> {
    Ok(service::normalize_optional_text(value)
        .map(|v| validate(&v))
        .transpose()?)
}

/// Load a project row or 404.
pub(crate) fn load_project(
    conn: &rusqlite::Connection,
    project_id: &str,
) -> Result<ProjectResponse, ApiErr> {
    query_opt(conn, db::projects::get_by_id(project_id), project_from_row)
        .map_err(ApiErr::from_db("load project"))?
        .ok_or_else(|| ApiErr::not_found("project not found"))
}

/// POST /api/projects: create a project owned by the caller.
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiErr> {
    let name = service::validate_project_name(&req.name)?;
    let description = service::normalize_optional_text(req.description.as_deref());
    let color = validate_optional(req.color.as_deref(), service::validate_color)?;
    let due_date = validate_optional(req.due_date.as_deref(), service::validate_due_date)?;
    let status = req.status.unwrap_or_default();

    let project_id = Uuid::new_v4().to_string();
    let mut conn = state.db.conn();
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("create project begin"))?;

    execute(
        &tx,
        db::projects::insert(&db::projects::InsertParams {
            id: &project_id,
            name: &name,
            description: description.as_deref(),
            status: status.as_str(),
            color: color.as_deref(),
            due_date: due_date.as_deref(),
            owner_id: &user.user_id,
        }),
    )
    .map_err(ApiErr::from_db("insert project"))?;
    execute(
        &tx,
        db::members::insert(&project_id, &user.user_id, ProjectRole::Owner.as_str()),
    )
    .map_err(ApiErr::from_db("insert owner membership"))?;
    let activity_id = record_activity(
        &tx,
        &project_id,
        None,
        &user.user_id,
        ActivityAction::ProjectCreated,
        serde_json::json!({ "name": name }),
    )?;

    let mut project = load_project(&tx, &project_id)?;
    tx.commit().map_err(ApiErr::from_db("create project commit"))?;
    state.changes.activity(&project_id, &activity_id);

    project.role = Some(ProjectRole::Owner);
    tracing::info!(project_id = %project_id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects: projects the caller belongs to, with their role.
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListProjectsResponse>, ApiErr> {
    let conn = state.db.conn();
    let projects = query_all(
        &conn,
        db::projects::list_for_user(&user.user_id),
        project_with_role_from_row,
    )
    .map_err(ApiErr::from_db("list projects"))?;
    Ok(Json(ListProjectsResponse { projects }))
}

/// GET /api/projects/{id}: detail with member count and task counts per status.
pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetailResponse>, ApiErr> {
    let conn = state.db.conn();
    let role = member_role(&conn, &id, &user.user_id)?;
    let mut project = load_project(&conn, &id)?;
    project.role = Some(role);

    let member_count: i64 = query_row(&conn, db::members::count(&id), |row| row.get(0))
        .map_err(ApiErr::from_db("count members"))?;
    let counted: Vec<(String, i64)> = query_all(&conn, db::tasks::count_by_status(&id), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .map_err(ApiErr::from_db("count tasks"))?;

    let task_counts = TaskStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: counted
                .iter()
                .find(|(s, _)| s == status.as_str())
                .map_or(0, |(_, n)| *n),
        })
        .collect();

    Ok(Json(ProjectDetailResponse {
        project,
        member_count,
        task_counts,
    }))
}

/// PUT /api/projects/{id}: owner/admin only.
pub async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiErr> {
    let name = req
        .name
        .as_deref()
        .map(service::validate_project_name)
        .transpose()?;
    let description = req
        .description
        .as_ref()
        .map(|d| service::normalize_optional_text(d.as_deref()));
    let color = req
        .color
        .as_ref()
        .map(|c| validate_optional(c.as_deref(), service::validate_color))
        .transpose()?;
    let due_date = req
        .due_date
        .as_ref()
        .map(|d| validate_optional(d.as_deref(), service::validate_due_date))
        .transpose()?;
    let status: Option<ProjectStatus> = req.status;

    let conn = state.db.conn();
    let role = require_role(
        &conn,
        &id,
        &user.user_id,
        ProjectRole::can_manage,
        "edit the project",
    )?;

    let changes = db::projects::Changes {
        name: name.as_deref(),
        description: description.as_ref().map(|d| d.as_deref()),
        status: status.as_ref().map(ProjectStatus::as_str),
        color: color.as_ref().map(|c| c.as_deref()),
        due_date: due_date.as_ref().map(|d| d.as_deref()),
    };
    execute(&conn, db::projects::update(&id, &changes)).map_err(ApiErr::from_db("update project"))?;

    let mut changed = Vec::new();
    if changes.name.is_some() {
        changed.push("name");
    }
    if changes.description.is_some() {
        changed.push("description");
    }
    if changes.status.is_some() {
        changed.push("status");
    }
    if changes.color.is_some() {
        changed.push("color");
    }
    if changes.due_date.is_some() {
        changed.push("due_date");
    }
    let activity_id = record_activity(
        &conn,
        &id,
        None,
        &user.user_id,
        ActivityAction::ProjectUpdated,
        serde_json::json!({ "fields": changed }),
    )?;
    state.changes.activity(&id, &activity_id);

    let mut project = load_project(&conn, &id)?;
    project.role = Some(role);
    Ok(Json(project))
}

/// DELETE /api/projects/{id}: owner only. Rows cascade; blobs are removed after.
pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    {
        let conn = state.db.conn();
        require_role(&conn, &id, &user.user_id, ProjectRole::is_owner, "delete the project")?;
        execute(&conn, db::projects::delete(&id)).map_err(ApiErr::from_db("delete project"))?;
    }

    if let Err(e) = state.db.delete_project_documents(&id) {
        tracing::error!(project_id = %id, "removing document blobs: {e:#}");
    }
    tracing::info!(project_id = %id, "project deleted");
    Ok(Json(OkResponse { ok: true }))
}
