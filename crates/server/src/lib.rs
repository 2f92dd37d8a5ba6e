//! Taskflow HTTP server: Axum routes over SQLite, on-disk document storage,
//! transactional email, an optional LLM assistant and an in-process change feed.

pub mod assistant;
pub mod config;
pub mod email;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod storage;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use assistant::AssistantClient;
pub use config::AppConfig;
pub use email::Mailer;
pub use realtime::ChangeFeed;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub mailer: Mailer,
    pub changes: ChangeFeed,
    pub assistant: Option<AssistantClient>,
}

impl AppState {
    /// Open the database under `config.data_dir` and wire up collaborators.
    pub fn new(
        config: AppConfig,
        mailer: Mailer,
        assistant: Option<AssistantClient>,
    ) -> anyhow::Result<Self> {
        let db = storage::init_db(&config.data_dir)?;
        Ok(Self {
            db,
            config,
            mailer,
            changes: ChangeFeed::new(),
            assistant,
        })
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Build the full router: `/api` routes, CORS, tracing, and the static UI
/// fallback when its build directory exists.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth (email/password + JWT)
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route(
            "/auth/me",
            get(routes::auth::me).put(routes::auth::update_me),
        )
        .route("/auth/password", put(routes::auth::change_password))
        // Email verification
        .route(
            "/auth/verification/send",
            post(routes::verification::send_code),
        )
        .route(
            "/auth/verification/verify",
            post(routes::verification::verify_code),
        )
        // Projects
        .route(
            "/projects",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .route(
            "/projects/{id}",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        // Members
        .route("/projects/{id}/members", get(routes::members::list_members))
        .route(
            "/projects/{id}/members/{user_id}",
            put(routes::members::update_member).delete(routes::members::remove_member),
        )
        // Invites
        .route(
            "/projects/{id}/invites",
            post(routes::invites::create_invite).get(routes::invites::list_project_invites),
        )
        .route(
            "/projects/{id}/invites/{invite_id}",
            delete(routes::invites::revoke_invite),
        )
        .route("/invites", get(routes::invites::list_my_invites))
        .route("/invites/{token}", get(routes::invites::preview_invite))
        .route("/invites/{token}/accept", post(routes::invites::accept_invite))
        .route(
            "/invites/{token}/decline",
            post(routes::invites::decline_invite),
        )
        // Tasks & board
        .route(
            "/projects/{id}/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route("/projects/{id}/board", get(routes::tasks::get_board))
        .route("/tasks/mine", get(routes::tasks::my_tasks))
        .route(
            "/tasks/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/{id}/move", post(routes::tasks::move_task))
        // Activity feed & comments
        .route(
            "/projects/{id}/activities",
            get(routes::activities::list_activities),
        )
        .route(
            "/tasks/{id}/comments",
            get(routes::activities::list_comments).post(routes::activities::create_comment),
        )
        // Documents
        .route(
            "/projects/{id}/documents",
            post(routes::documents::upload_document)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(routes::documents::list_documents),
        )
        .route(
            "/documents/{id}",
            delete(routes::documents::delete_document),
        )
        .route("/documents/{id}/url", get(routes::documents::signed_url))
        .route(
            "/storage/documents/{id}",
            get(routes::documents::download_signed),
        )
        // Analytics & dashboard
        .route(
            "/projects/{id}/analytics",
            get(routes::analytics::project_analytics),
        )
        .route("/dashboard", get(routes::analytics::dashboard))
        // Assistant
        .route("/assistant/chat", post(routes::chat::chat))
        // Realtime
        .route("/projects/{id}/changes", get(routes::changes::stream_changes));

    let mut app = Router::new().nest("/api", api);

    // Serve static files from web build if present
    let web_dir = &state.config.web_dir;
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
