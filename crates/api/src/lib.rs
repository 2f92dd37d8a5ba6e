//! Shared API types, crypto, and SQL builders for Taskflow.
//!
//! This crate is the **single source of truth** for all API request/response
//! types. The server serializes them and clients deserialize them.

use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
#[cfg(feature = "backend")]
pub mod service;

pub use taskflow_core::analytics::ProjectAnalytics;
pub use taskflow_core::board::Placement;
pub use taskflow_core::{
    ActivityAction, InviteStatus, ProjectRole, ProjectStatus, TaskPriority, TaskStatus,
};

/// Deserialize a field that distinguishes "absent" (`None`) from an explicit
/// `null` (`Some(None)`). Pair with `#[serde(default)]`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Email + password sign-up.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Email + password login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned on successful signup / login / refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub display_name: String,
    pub email_verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request (invalidate refresh token).
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
}

/// Returned by `POST /api/auth/verification/send`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationSentResponse {
    pub email: String,
    pub expires_at: String,
    pub email_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub code: String,
}

/// Generic success response for operations that don't return data.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ─── Projects ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub color: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub color: Option<String>,
    pub due_date: Option<String>,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
    /// The caller's role in this project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ProjectRole>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: i64,
}

/// `GET /api/projects/:id`: project plus member and task counts.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDetailResponse {
    #[serde(flatten)]
    pub project: ProjectResponse,
    pub member_count: i64,
    pub task_counts: Vec<StatusCount>,
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub role: ProjectRole,
    pub joined_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMembersResponse {
    pub members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: ProjectRole,
}

// ─── Invites ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
    pub role: Option<ProjectRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub email: String,
    pub role: ProjectRole,
    pub status: InviteStatus,
    pub invited_by: String,
    pub invited_by_name: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Returned once, at creation: the only time the raw token is visible.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedInviteResponse {
    #[serde(flatten)]
    pub invite: InviteResponse,
    pub token: String,
    pub accept_url: String,
    pub email_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListInvitesResponse {
    pub invites: Vec<InviteResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptInviteResponse {
    pub project_id: String,
    pub role: ProjectRole,
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
}

/// Partial task update. Nullable fields accept an explicit `null` to clear.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    pub due_date: Option<String>,
    pub position: i64,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
}

/// Query parameters for `GET /api/projects/:id/tasks`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
    /// Case-insensitive substring of the title or description.
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveTaskRequest {
    pub status: TaskStatus,
    pub index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveTaskResponse {
    pub task: TaskResponse,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<TaskResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardResponse {
    pub project_id: String,
    pub columns: Vec<BoardColumn>,
}

// ─── Activities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub user_id: String,
    pub user_name: Option<String>,
    pub action: ActivityAction,
    pub details: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListActivitiesResponse {
    pub activities: Vec<ActivityResponse>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentResponse>,
}

/// Query parameters for `POST /api/projects/:id/documents` (body is the file).
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadDocumentQuery {
    pub name: String,
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_at: String,
}

/// Query parameters carried by a signed storage URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlQuery {
    pub expires: u64,
    pub sig: String,
}

// ─── Analytics ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectAnalyticsResponse {
    pub project_id: String,
    #[serde(flatten)]
    pub analytics: ProjectAnalytics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardProject {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub role: ProjectRole,
    pub total_tasks: i64,
    pub open_tasks: i64,
    pub overdue_tasks: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub projects: Vec<DashboardProject>,
    /// Sums over `projects`.
    pub total_tasks: i64,
    pub open_tasks: i64,
    pub overdue_tasks: i64,
    pub my_open_tasks: i64,
    pub my_overdue_tasks: i64,
    pub recent_activity: Vec<ActivityResponse>,
}

// ─── Assistant ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub project_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Data change performed on the user's behalf while answering.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatAction {
    TaskCreated { task: TaskResponse },
    TaskUpdated { task: TaskResponse },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChatAction>,
}

// ─── Realtime ────────────────────────────────────────────────────────────────

/// Table a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Tasks,
    Activities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Change notification pushed to subscribers; clients refetch on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    pub project_id: String,
    pub record_id: String,
}

// ─── Service error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code. The server converts this into
/// its own response type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Gone(_) => 410,
            Self::PayloadTooLarge(_) => 413,
            Self::TooManyRequests(_) => 429,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Gone(m)
            | Self::PayloadTooLarge(m)
            | Self::TooManyRequests(m)
            | Self::Internal(m) => m,
        }
    }

    /// Build a closure that wraps a DB/IO error as `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

impl From<taskflow_core::ModelError> for ServiceError {
    fn from(e: taskflow_core::ModelError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_task_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"assignee_id": null, "title": "x"}"#).unwrap();
        assert_eq!(req.assignee_id, Some(None));
        assert_eq!(req.due_date, None);
        assert_eq!(req.title.as_deref(), Some("x"));

        let req: UpdateTaskRequest = serde_json::from_str(r#"{"due_date": "2026-01-02"}"#).unwrap();
        assert_eq!(req.due_date, Some(Some("2026-01-02".to_string())));
    }

    #[test]
    fn test_project_detail_is_flattened() {
        let detail = ProjectDetailResponse {
            project: ProjectResponse {
                id: "p1".into(),
                name: "Website".into(),
                description: None,
                status: ProjectStatus::Active,
                color: None,
                due_date: None,
                owner_id: "u1".into(),
                created_at: "2026-01-01 00:00:00".into(),
                updated_at: "2026-01-01 00:00:00".into(),
                role: Some(ProjectRole::Owner),
            },
            member_count: 1,
            task_counts: vec![],
        };
        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["id"], "p1");
        assert_eq!(v["role"], "owner");
        assert_eq!(v["member_count"], 1);
    }

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(ServiceError::Gone("x".into()).status_code(), 410);
        assert_eq!(ServiceError::TooManyRequests("x".into()).status_code(), 429);
        let api: ApiError = (&ServiceError::NotFound("task not found".into())).into();
        assert_eq!(api.error, "task not found");
    }
}
