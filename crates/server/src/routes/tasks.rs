use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rusqlite::Connection;
use uuid::Uuid;

use taskflow_api::{
    db, service, BoardColumn, BoardResponse, ChangeKind, CreateTaskRequest, ListTasksResponse,
    MoveTaskRequest, MoveTaskResponse, OkResponse, TaskListQuery, TaskResponse, UpdateTaskRequest,
};
use taskflow_core::board::{Board, Card};
use taskflow_core::{ActivityAction, ProjectRole, TaskPriority, TaskStatus};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{member_role, membership, record_activity, require_role};
use crate::storage::{execute, query_all, query_opt, task_from_row};
use crate::AppState;

/// Load a task row or 404.
pub(crate) fn load_task(conn: &Connection, task_id: &str) -> Result<TaskResponse, ApiErr> {
    query_opt(conn, db::tasks::get_by_id(task_id), task_from_row)
        .map_err(ApiErr::from_db("load task"))?
        .ok_or_else(|| ApiErr::not_found("task not found"))
}

/// Load a task the caller can see, with their role in its project.
/// Tasks of projects the caller is not in are reported as missing.
pub(crate) fn load_visible_task(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
) -> Result<(TaskResponse, ProjectRole), ApiErr> {
    let task = load_task(conn, task_id)?;
    let role = membership(conn, &task.project_id, user_id)?
        .ok_or_else(|| ApiErr::not_found("task not found"))?;
    Ok((task, role))
}

fn board_for(conn: &Connection, project_id: &str) -> Result<Board, ApiErr> {
    let cards = query_all(conn, db::tasks::board_cards(project_id), |row| {
        let status: String = row.get(1)?;
        Ok((row.get::<_, String>(0)?, status, row.get::<_, i64>(2)?))
    })
    .map_err(ApiErr::from_db("load board"))?;

    let cards = cards
        .into_iter()
        .map(|(id, status, position)| {
            let status = status
                .parse::<TaskStatus>()
                .map_err(ApiErr::from_db("board status parse"))?;
            Ok(Card {
                id,
                status,
                position,
            })
        })
        .collect::<Result<Vec<_>, ApiErr>>()?;
    Ok(Board::from_cards(cards))
}

fn ensure_assignable(conn: &Connection, project_id: &str, assignee_id: &str) -> Result<(), ApiErr> {
    let role: Option<String> =
        query_opt(conn, db::members::get_role(project_id, assignee_id), |row| row.get(0))
            .map_err(ApiErr::from_db("assignee lookup"))?;
    if role.is_none() {
        return Err(ApiErr::bad_request("assignee must be a member of the project"));
    }
    Ok(())
}

/// `completed_at` change for a status transition: stamped on entering
/// `done`, cleared on leaving it, untouched otherwise.
fn completion_change(from: TaskStatus, to: TaskStatus) -> Result<Option<Option<String>>, ApiErr> {
    if from == to {
        return Ok(None);
    }
    if to == TaskStatus::Done {
        return Ok(Some(Some(service::sqlite_datetime(service::now_unix())?)));
    }
    if from == TaskStatus::Done {
        return Ok(Some(None));
    }
    Ok(None)
}

/// Validated input for a new task.
pub(crate) struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
}

/// Insert a task at the bottom of its column and log it. Publishes once committed.
pub(crate) fn insert_task(
    conn: &mut Connection,
    state: &AppState,
    project_id: &str,
    user_id: &str,
    new: &NewTask,
) -> Result<TaskResponse, ApiErr> {
    if let Some(assignee) = new.assignee_id.as_deref() {
        ensure_assignable(conn, project_id, assignee)?;
    }

    let task_id = Uuid::new_v4().to_string();
    let completed_at = completion_change(TaskStatus::Todo, new.status)?.flatten();

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("create task begin"))?;
    let position = board_for(&tx, project_id)?.next_position(new.status);
    execute(
        &tx,
        db::tasks::insert(&db::tasks::InsertParams {
            id: &task_id,
            project_id,
            title: &new.title,
            description: new.description.as_deref(),
            status: new.status.as_str(),
            priority: new.priority.as_str(),
            assignee_id: new.assignee_id.as_deref(),
            due_date: new.due_date.as_deref(),
            position,
            created_by: user_id,
            completed_at: completed_at.as_deref(),
        }),
    )
    .map_err(ApiErr::from_db("insert task"))?;
    let activity_id = record_activity(
        &tx,
        project_id,
        Some(&task_id),
        user_id,
        ActivityAction::TaskCreated,
        serde_json::json!({ "title": new.title }),
    )?;
    let task = load_task(&tx, &task_id)?;
    tx.commit().map_err(ApiErr::from_db("create task commit"))?;

    state.changes.task(ChangeKind::Insert, project_id, &task_id);
    state.changes.activity(project_id, &activity_id);
    Ok(task)
}

/// Move a task to the bottom of another column, keeping `completed_at` in step.
pub(crate) fn set_status(
    conn: &mut Connection,
    state: &AppState,
    task: &TaskResponse,
    status: TaskStatus,
    user_id: &str,
) -> Result<TaskResponse, ApiErr> {
    if task.status == status {
        return Ok(task.clone());
    }
    let completed_at = completion_change(task.status, status)?;

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("status change begin"))?;
    let position = board_for(&tx, &task.project_id)?.next_position(status);
    execute(
        &tx,
        db::tasks::update(
            &task.id,
            &db::tasks::Changes {
                status: Some(status.as_str()),
                position: Some(position),
                completed_at: completed_at.as_ref().map(|c| c.as_deref()),
                ..Default::default()
            },
        ),
    )
    .map_err(ApiErr::from_db("update task status"))?;
    let activity_id = record_activity(
        &tx,
        &task.project_id,
        Some(&task.id),
        user_id,
        ActivityAction::TaskStatusChanged,
        serde_json::json!({ "title": task.title, "from": task.status, "to": status }),
    )?;
    let updated = load_task(&tx, &task.id)?;
    tx.commit().map_err(ApiErr::from_db("status change commit"))?;

    state.changes.task(ChangeKind::Update, &task.project_id, &task.id);
    state.changes.activity(&task.project_id, &activity_id);
    Ok(updated)
}

fn optional<T>(
    value: Option<&str>,
    validate: fn(&str) -> Result<T, taskflow_api::ServiceError>,
) -> Result<Option<T>, ApiErr> {
    Ok(service::normalize_optional_text(value)
        .map(|v| validate(&v))
        .transpose()?)
}

/// POST /api/projects/{id}/tasks
pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiErr> {
    let new = NewTask {
        title: service::validate_task_title(&req.title)?,
        description: service::normalize_optional_text(req.description.as_deref()),
        status: req.status.unwrap_or_default(),
        priority: req.priority.unwrap_or_default(),
        assignee_id: service::normalize_optional_text(req.assignee_id.as_deref()),
        due_date: optional(req.due_date.as_deref(), service::validate_due_date)?,
    };

    let mut conn = state.db.conn();
    require_role(&conn, &project_id, &user.user_id, ProjectRole::can_edit, "create tasks")?;
    let task = insert_task(&mut conn, &state, &project_id, &user.user_id, &new)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/projects/{id}/tasks?status=&priority=&assignee_id=&q=
pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<ListTasksResponse>, ApiErr> {
    let search = service::normalize_optional_text(query.q.as_deref());
    let filter = db::tasks::Filter {
        status: query.status.as_ref().map(TaskStatus::as_str),
        priority: query.priority.as_ref().map(TaskPriority::as_str),
        assignee_id: query.assignee_id.as_deref(),
        search: search.as_deref(),
    };

    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let tasks = query_all(&conn, db::tasks::list(&project_id, &filter), task_from_row)
        .map_err(ApiErr::from_db("list tasks"))?;
    Ok(Json(ListTasksResponse { tasks }))
}

/// GET /api/projects/{id}/board: one column per status, in board order.
pub async fn get_board(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<BoardResponse>, ApiErr> {
    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let tasks = query_all(&conn, db::tasks::list_for_board(&project_id), task_from_row)
        .map_err(ApiErr::from_db("load board tasks"))?;

    let columns = TaskStatus::ALL
        .iter()
        .map(|status| BoardColumn {
            status: *status,
            tasks: tasks.iter().filter(|t| t.status == *status).cloned().collect(),
        })
        .collect();
    Ok(Json(BoardResponse {
        project_id,
        columns,
    }))
}

/// GET /api/tasks/mine: open tasks assigned to the caller across projects.
pub async fn my_tasks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ListTasksResponse>, ApiErr> {
    let conn = state.db.conn();
    let tasks = query_all(
        &conn,
        db::tasks::list_open_for_assignee(&user.user_id),
        task_from_row,
    )
    .map_err(ApiErr::from_db("list my tasks"))?;
    Ok(Json(ListTasksResponse { tasks }))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let conn = state.db.conn();
    let (task, _) = load_visible_task(&conn, &task_id, &user.user_id)?;
    Ok(Json(task))
}

/// PUT /api/tasks/{id}: partial update; explicit `null` clears a field.
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiErr> {
    let title = req
        .title
        .as_deref()
        .map(service::validate_task_title)
        .transpose()?;
    let description = req
        .description
        .as_ref()
        .map(|d| service::normalize_optional_text(d.as_deref()));
    let assignee_id = req
        .assignee_id
        .as_ref()
        .map(|a| service::normalize_optional_text(a.as_deref()));
    let due_date = req
        .due_date
        .as_ref()
        .map(|d| optional(d.as_deref(), service::validate_due_date))
        .transpose()?;

    let mut conn = state.db.conn();
    let (task, role) = load_visible_task(&conn, &task_id, &user.user_id)?;
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot edit tasks")));
    }
    if let Some(Some(assignee)) = &assignee_id {
        ensure_assignable(&conn, &task.project_id, assignee)?;
    }

    let status = req.status.filter(|s| *s != task.status);
    let completed_at = match status {
        Some(to) => completion_change(task.status, to)?,
        None => None,
    };

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("update task begin"))?;
    let position = match status {
        Some(to) => Some(board_for(&tx, &task.project_id)?.next_position(to)),
        None => None,
    };
    let changes = db::tasks::Changes {
        title: title.as_deref(),
        description: description.as_ref().map(|d| d.as_deref()),
        status: status.as_ref().map(TaskStatus::as_str),
        priority: req.priority.as_ref().map(TaskPriority::as_str),
        assignee_id: assignee_id.as_ref().map(|a| a.as_deref()),
        due_date: due_date.as_ref().map(|d| d.as_deref()),
        position,
        completed_at: completed_at.as_ref().map(|c| c.as_deref()),
    };
    execute(&tx, db::tasks::update(&task_id, &changes)).map_err(ApiErr::from_db("update task"))?;

    let mut activity_ids = Vec::new();
    if let Some(to) = status {
        activity_ids.push(record_activity(
            &tx,
            &task.project_id,
            Some(&task_id),
            &user.user_id,
            ActivityAction::TaskStatusChanged,
            serde_json::json!({ "title": task.title, "from": task.status, "to": to }),
        )?);
    }
    let mut fields = Vec::new();
    for (name, changed) in [
        ("title", changes.title.is_some()),
        ("description", changes.description.is_some()),
        ("priority", changes.priority.is_some()),
        ("assignee_id", changes.assignee_id.is_some()),
        ("due_date", changes.due_date.is_some()),
    ] {
        if changed {
            fields.push(name);
        }
    }
    if !fields.is_empty() {
        activity_ids.push(record_activity(
            &tx,
            &task.project_id,
            Some(&task_id),
            &user.user_id,
            ActivityAction::TaskUpdated,
            serde_json::json!({
                "title": title.as_deref().unwrap_or(&task.title),
                "fields": fields,
            }),
        )?);
    }

    let updated = load_task(&tx, &task_id)?;
    tx.commit().map_err(ApiErr::from_db("update task commit"))?;

    state.changes.task(ChangeKind::Update, &task.project_id, &task_id);
    for id in &activity_ids {
        state.changes.activity(&task.project_id, id);
    }
    Ok(Json(updated))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let mut conn = state.db.conn();
    let (task, role) = load_visible_task(&conn, &task_id, &user.user_id)?;
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot delete tasks")));
    }

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("delete task begin"))?;
    execute(&tx, db::tasks::delete(&task_id)).map_err(ApiErr::from_db("delete task"))?;
    // The task's own activity rows go with it, so this one is project-level.
    let activity_id = record_activity(
        &tx,
        &task.project_id,
        None,
        &user.user_id,
        ActivityAction::TaskDeleted,
        serde_json::json!({ "task_id": task_id, "title": task.title }),
    )?;
    tx.commit().map_err(ApiErr::from_db("delete task commit"))?;

    state.changes.task(ChangeKind::Delete, &task.project_id, &task_id);
    state.changes.activity(&task.project_id, &activity_id);
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/tasks/{id}/move: drag a card to `index` within `status`.
///
/// Every card whose placement changed is written in one transaction. Two
/// concurrent moves are not reconciled; the later write wins.
pub async fn move_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<String>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<Json<MoveTaskResponse>, ApiErr> {
    let mut conn = state.db.conn();
    let (task, role) = load_visible_task(&conn, &task_id, &user.user_id)?;
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot move tasks")));
    }

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("move task begin"))?;
    let mut board = board_for(&tx, &task.project_id)?;
    let placements = board
        .move_card(&task_id, req.status, req.index)
        .map_err(|e| ApiErr::not_found(e.to_string()))?;

    let completed_at = completion_change(task.status, req.status)?;
    for placement in &placements {
        let is_moved = placement.id == task_id;
        execute(
            &tx,
            db::tasks::update(
                &placement.id,
                &db::tasks::Changes {
                    status: Some(placement.status.as_str()),
                    position: Some(placement.position),
                    completed_at: if is_moved {
                        completed_at.as_ref().map(|c| c.as_deref())
                    } else {
                        None
                    },
                    ..Default::default()
                },
            ),
        )
        .map_err(ApiErr::from_db("apply placement"))?;
    }

    let activity_id = if task.status != req.status {
        Some(record_activity(
            &tx,
            &task.project_id,
            Some(&task_id),
            &user.user_id,
            ActivityAction::TaskStatusChanged,
            serde_json::json!({ "title": task.title, "from": task.status, "to": req.status }),
        )?)
    } else {
        None
    };

    let moved = load_task(&tx, &task_id)?;
    tx.commit().map_err(ApiErr::from_db("move task commit"))?;

    for placement in &placements {
        state
            .changes
            .task(ChangeKind::Update, &task.project_id, &placement.id);
    }
    if let Some(id) = activity_id {
        state.changes.activity(&task.project_id, &id);
    }

    tracing::debug!(task_id = %task_id, changed = placements.len(), "task moved");

    Ok(Json(MoveTaskResponse {
        task: moved,
        placements,
    }))
}
