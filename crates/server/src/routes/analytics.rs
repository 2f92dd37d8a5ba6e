use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use taskflow_api::{
    db, service, AnalyticsQuery, DashboardProject, DashboardResponse, ProjectAnalyticsResponse,
};
use taskflow_core::analytics::{self, ProjectAnalytics, TaskFacts};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::member_role;
use crate::storage::{
    activity_from_row, facts_from_row, project_with_role_from_row, query_all, task_from_row,
};
use crate::AppState;

const DASHBOARD_ACTIVITY_LIMIT: u64 = 10;

fn analytics_for(
    conn: &Connection,
    project_id: &str,
    today: NaiveDate,
    trend_days: u32,
) -> Result<ProjectAnalytics, ApiErr> {
    let facts: Vec<TaskFacts> = query_all(conn, db::tasks::facts(project_id), facts_from_row)
        .map_err(ApiErr::from_db("load analytics facts"))?;
    Ok(analytics::project_analytics(&facts, today, trend_days))
}

/// GET /api/projects/{id}/analytics?days=
pub async fn project_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ProjectAnalyticsResponse>, ApiErr> {
    let days = service::clamp_trend_days(query.days);
    let today = Utc::now().date_naive();

    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let analytics = analytics_for(&conn, &project_id, today, days)?;
    Ok(Json(ProjectAnalyticsResponse {
        project_id,
        analytics,
    }))
}

/// GET /api/dashboard: the caller's projects at a glance plus their own workload.
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiErr> {
    let today = Utc::now().date_naive();
    let conn = state.db.conn();

    let memberships = query_all(
        &conn,
        db::projects::list_for_user(&user.user_id),
        project_with_role_from_row,
    )
    .map_err(ApiErr::from_db("dashboard projects"))?;

    let mut projects = Vec::with_capacity(memberships.len());
    for project in memberships {
        let Some(role) = project.role else {
            continue;
        };
        let stats = analytics_for(&conn, &project.id, today, 1)?;
        let open_tasks = stats
            .by_status
            .iter()
            .filter(|c| c.status.is_open())
            .map(|c| c.count)
            .sum();
        projects.push(DashboardProject {
            id: project.id,
            name: project.name,
            status: project.status,
            role,
            total_tasks: stats.total,
            open_tasks,
            overdue_tasks: stats.overdue,
            completion_rate: stats.completion_rate,
        });
    }

    let mine = query_all(
        &conn,
        db::tasks::list_open_for_assignee(&user.user_id),
        task_from_row,
    )
    .map_err(ApiErr::from_db("dashboard my tasks"))?;
    let my_overdue_tasks = mine
        .iter()
        .filter(|t| {
            t.due_date
                .as_deref()
                .and_then(|d| taskflow_core::parse_due_date(d).ok())
                .is_some_and(|d| d < today)
        })
        .count();

    let recent_activity = query_all(
        &conn,
        db::activities::list_for_member(&user.user_id, DASHBOARD_ACTIVITY_LIMIT),
        activity_from_row,
    )
    .map_err(ApiErr::from_db("dashboard activity"))?;

    let total_tasks: i64 = projects.iter().map(|p| p.total_tasks).sum();
    let open_tasks: i64 = projects.iter().map(|p| p.open_tasks).sum();
    let overdue_tasks: i64 = projects.iter().map(|p| p.overdue_tasks).sum();

    Ok(Json(DashboardResponse {
        projects,
        total_tasks,
        open_tasks,
        overdue_tasks,
        my_open_tasks: mine.len() as i64,
        my_overdue_tasks: my_overdue_tasks as i64,
        recent_activity,
    }))
}
