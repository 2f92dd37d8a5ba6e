//! `POST /api/assistant/chat`.
//!
//! Messages that parse as a command (create a task, change a task's status)
//! are executed directly against the caller's projects. Everything else is
//! answered by the language model when one is configured, or by a local
//! summary of the caller's tasks otherwise.

use axum::{extract::State, Json};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use taskflow_api::{db, ChatAction, ChatRequest, ChatResponse, ProjectResponse, TaskResponse};
use taskflow_core::assistant::{
    self, AssistantContext, ChatCommand, NamedRef, ProjectDigest, Resolution, TaskDigest,
};
use taskflow_core::{TaskPriority, TaskStatus};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::tasks::{insert_task, set_status, NewTask};
use crate::storage::{project_with_role_from_row, query_all, task_from_row};
use crate::AppState;

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug)]
struct ProjectTasks {
    project: ProjectResponse,
    tasks: Vec<TaskResponse>,
}

fn load_workspace(conn: &Connection, user_id: &str) -> Result<Vec<ProjectTasks>, ApiErr> {
    let projects = query_all(
        conn,
        db::projects::list_for_user(user_id),
        project_with_role_from_row,
    )
    .map_err(ApiErr::from_db("chat projects"))?;

    projects
        .into_iter()
        .map(|project| {
            let tasks = query_all(conn, db::tasks::list_for_board(&project.id), task_from_row)
                .map_err(ApiErr::from_db("chat tasks"))?;
            Ok(ProjectTasks { project, tasks })
        })
        .collect()
}

fn digest(user_name: &str, workspace: &[ProjectTasks]) -> AssistantContext {
    AssistantContext {
        user_name: user_name.to_string(),
        projects: workspace
            .iter()
            .map(|p| ProjectDigest {
                name: p.project.name.clone(),
                tasks: p
                    .tasks
                    .iter()
                    .map(|t| TaskDigest {
                        title: t.title.clone(),
                        status: t.status,
                        priority: t.priority,
                        due_date: t
                            .due_date
                            .as_deref()
                            .and_then(|d| taskflow_core::parse_due_date(d).ok()),
                        assignee: t.assignee_name.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn text(reply: impl Into<String>) -> ChatResponse {
    ChatResponse {
        reply: reply.into(),
        action: None,
    }
}

/// Pick the project a new task goes to: the one named in the message, else
/// the one the client is looking at, else the caller's only project.
fn target_project<'a>(
    workspace: &'a [ProjectTasks],
    named: Option<&str>,
    current: Option<&str>,
) -> Result<&'a ProjectTasks, String> {
    let candidates: Vec<NamedRef> = workspace
        .iter()
        .map(|p| NamedRef {
            id: p.project.id.clone(),
            name: p.project.name.clone(),
        })
        .collect();

    let id = match (named, current) {
        (Some(name), _) => match assistant::resolve(&candidates, name) {
            Resolution::Found(id) => id,
            Resolution::Ambiguous(names) => {
                return Err(format!(
                    "Several projects match \"{name}\": {}. Which one did you mean?",
                    names.join(", ")
                ));
            }
            Resolution::NotFound => {
                return Err(format!("I couldn't find a project named \"{name}\"."));
            }
        },
        (None, Some(id)) => id.to_string(),
        (None, None) => match workspace {
            [] => return Err("You don't have any projects yet. Create one first.".to_string()),
            [only] => only.project.id.clone(),
            many => {
                let names: Vec<&str> = many.iter().map(|p| p.project.name.as_str()).collect();
                return Err(format!(
                    "Which project should the task go in? You have: {}.",
                    names.join(", ")
                ));
            }
        },
    };

    workspace
        .iter()
        .find(|p| p.project.id == id)
        .ok_or_else(|| "I couldn't find that project.".to_string())
}

fn create_task(
    conn: &mut Connection,
    state: &AppState,
    user: &AuthUser,
    current_project: Option<&str>,
    title: &str,
    priority: Option<TaskPriority>,
    project: Option<&str>,
) -> Result<ChatResponse, ApiErr> {
    let workspace = load_workspace(conn, &user.user_id)?;
    let target = match target_project(&workspace, project, current_project) {
        Ok(target) => target,
        Err(reply) => return Ok(text(reply)),
    };
    let role = target.project.role.unwrap_or(taskflow_core::ProjectRole::Viewer);
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot create tasks")));
    }

    let new = NewTask {
        title: taskflow_api::service::validate_task_title(title)?,
        description: None,
        status: TaskStatus::Todo,
        priority: priority.unwrap_or_default(),
        assignee_id: None,
        due_date: None,
    };
    let task = insert_task(conn, state, &target.project.id, &user.user_id, &new)?;
    Ok(ChatResponse {
        reply: format!(
            "Created task \"{}\" in {} with {} priority.",
            task.title, target.project.name, task.priority
        ),
        action: Some(ChatAction::TaskCreated { task }),
    })
}

fn update_status(
    conn: &mut Connection,
    state: &AppState,
    user: &AuthUser,
    current_project: Option<&str>,
    query: &str,
    status: TaskStatus,
) -> Result<ChatResponse, ApiErr> {
    let workspace = load_workspace(conn, &user.user_id)?;
    let scoped: Vec<&ProjectTasks> = workspace
        .iter()
        .filter(|p| current_project.is_none_or(|id| p.project.id == id))
        .collect();
    let candidates: Vec<NamedRef> = scoped
        .iter()
        .flat_map(|p| p.tasks.iter())
        .map(|t| NamedRef {
            id: t.id.clone(),
            name: t.title.clone(),
        })
        .collect();

    let task_id = match assistant::resolve(&candidates, query) {
        Resolution::Found(id) => id,
        Resolution::Ambiguous(names) => {
            return Ok(text(format!(
                "Several tasks match \"{query}\": {}. Which one did you mean?",
                names.join(", ")
            )));
        }
        Resolution::NotFound => {
            return Ok(text(format!("I couldn't find a task matching \"{query}\".")));
        }
    };
    let Some((project, task)) = scoped.iter().find_map(|p| {
        p.tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| (&p.project, t))
    }) else {
        return Ok(text(format!("I couldn't find a task matching \"{query}\".")));
    };

    let role = project.role.unwrap_or(taskflow_core::ProjectRole::Viewer);
    if !role.can_edit() {
        return Err(ApiErr::forbidden(format!("{role} role cannot edit tasks")));
    }
    if task.status == status {
        return Ok(text(format!("\"{}\" is already {}.", task.title, status.label())));
    }

    let updated = set_status(conn, state, task, status, &user.user_id)?;
    Ok(ChatResponse {
        reply: format!("Moved \"{}\" to {}.", updated.title, status.label()),
        action: Some(ChatAction::TaskUpdated { task: updated }),
    })
}

/// POST /api/assistant/chat
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiErr> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiErr::bad_request("message is required"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiErr::bad_request(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    let current_project = req.project_id.as_deref().filter(|id| !id.is_empty());

    if let Some(command) = assistant::parse_command(message) {
        tracing::debug!(user_id = %user.user_id, ?command, "chat command");
        let mut conn = state.db.conn();
        let response = match command {
            ChatCommand::CreateTask {
                title,
                priority,
                project,
            } => create_task(
                &mut conn,
                &state,
                &user,
                current_project,
                &title,
                priority,
                project.as_deref(),
            )?,
            ChatCommand::UpdateStatus { task, status } => {
                update_status(&mut conn, &state, &user, current_project, &task, status)?
            }
        };
        return Ok(Json(response));
    }

    let today: NaiveDate = Utc::now().date_naive();
    let context = {
        let conn = state.db.conn();
        let workspace = load_workspace(&conn, &user.user_id)?;
        digest(&user.display_name, &workspace)
    };

    let reply = match &state.assistant {
        Some(client) => {
            let system = assistant::build_system_prompt(&context, today);
            match client.reply(&system, &req.history, message).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.user_id,
                        "assistant unavailable, answering locally: {e}"
                    );
                    assistant::summarize(&context, message, today)
                }
            }
        }
        None => assistant::summarize(&context, message, today),
    };
    Ok(Json(text(reply)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::{ProjectRole, ProjectStatus};

    fn project(id: &str, name: &str) -> ProjectTasks {
        ProjectTasks {
            project: ProjectResponse {
                id: id.into(),
                name: name.into(),
                description: None,
                status: ProjectStatus::Active,
                color: None,
                due_date: None,
                owner_id: "u1".into(),
                created_at: "2026-01-01 00:00:00".into(),
                updated_at: "2026-01-01 00:00:00".into(),
                role: Some(ProjectRole::Owner),
            },
            tasks: Vec::new(),
        }
    }

    #[test]
    fn test_target_project_prefers_named_then_current_then_only() {
        let workspace = vec![project("p1", "Website"), project("p2", "Mobile App")];
        assert_eq!(
            target_project(&workspace, Some("mobile"), Some("p1")).unwrap().project.id,
            "p2"
        );
        assert_eq!(target_project(&workspace, None, Some("p1")).unwrap().project.id, "p1");
        assert!(target_project(&workspace, None, None).unwrap_err().contains("Website"));
        assert!(target_project(&workspace, Some("backend"), None).is_err());

        let single = vec![project("p1", "Website")];
        assert_eq!(target_project(&single, None, None).unwrap().project.id, "p1");
        assert!(target_project(&[], None, None).is_err());
    }

    #[test]
    fn test_target_project_rejects_foreign_current_project() {
        let workspace = vec![project("p1", "Website")];
        assert!(target_project(&workspace, None, Some("not-mine")).is_err());
    }
}
