use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use taskflow_api::{ChangeEvent, ChangeTable};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{member_role, membership};
use crate::storage::Db;
use crate::AppState;

const KEEP_ALIVE_SECS: u64 = 30;

/// Membership at delivery time; a removed member's stream ends.
fn still_member(db: &Db, project_id: &str, user_id: &str) -> bool {
    match membership(&db.conn(), project_id, user_id) {
        Ok(role) => role.is_some(),
        Err(e) => {
            tracing::warn!(project_id, user_id, "closing change stream: {e}");
            false
        }
    }
}

fn event_name(event: &ChangeEvent) -> &'static str {
    match event.table {
        ChangeTable::Tasks => "tasks",
        ChangeTable::Activities => "activities",
    }
}

/// GET /api/projects/{id}/changes: SSE stream of task and activity changes.
///
/// Starts with an `init` event, then one event per change named after the
/// table. Clients refetch on receipt. Events missed while lagging are dropped.
/// Membership is checked again per event; the stream ends once it is gone.
pub async fn stream_changes(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiErr> {
    {
        let conn = state.db.conn();
        member_role(&conn, &project_id, &user.user_id)?;
    }
    tracing::debug!(project_id = %project_id, user_id = %user.user_id, "change stream opened");

    let receiver = state.changes.subscribe();
    let init = serde_json::json!({ "project_id": project_id }).to_string();
    let init_stream = futures::stream::once(async move {
        Ok::<_, Infallible>(Event::default().event("init").data(init))
    });

    let db = state.db.clone();
    let user_id = user.user_id;
    let member_project = project_id.clone();
    let updates = BroadcastStream::new(receiver)
        .filter_map(move |result| match result {
            Ok(event) if event.project_id == project_id => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "change stream lagged");
                None
            }
        })
        .take_while(move |_| still_member(&db, &member_project, &user_id))
        .filter_map(|event| match serde_json::to_string(&event) {
            Ok(json) => Some(Ok::<_, Infallible>(
                Event::default().event(event_name(&event)).data(json),
            )),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize change event");
                None
            }
        });

    Ok(Sse::new(init_stream.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("heartbeat"),
    ))
}
