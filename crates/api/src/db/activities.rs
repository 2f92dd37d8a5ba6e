//! Activity feed query builders. Comments are activities with
//! `action = 'comment'` and the text under `details.body`.

use sea_query::{Alias, Expr, Order, Query, SqliteQueryBuilder};

use super::tables::{Activities, ProjectMembers, Users};
use super::Built;

/// Activity SELECT with the actor's display name (matches `activity_from_row`).
fn activity_select() -> sea_query::SelectStatement {
    Query::select()
        .column((Activities::Table, Activities::Id))
        .column((Activities::Table, Activities::ProjectId))
        .column((Activities::Table, Activities::TaskId))
        .column((Activities::Table, Activities::UserId))
        .expr_as(
            Expr::col((Users::Table, Users::DisplayName)),
            Alias::new("user_name"),
        )
        .column((Activities::Table, Activities::Action))
        .column((Activities::Table, Activities::Details))
        .column((Activities::Table, Activities::CreatedAt))
        .from(Activities::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Activities::Table, Activities::UserId)),
        )
        .to_owned()
}

/// Newest first; rowid breaks ties within the same second.
fn newest_first(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.order_by((Activities::Table, Activities::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("\"activities\".rowid"), Order::Desc)
}

pub fn insert(
    id: &str,
    project_id: &str,
    task_id: Option<&str>,
    user_id: &str,
    action: &str,
    details: &str,
) -> Built {
    Query::insert()
        .into_table(Activities::Table)
        .columns([
            Activities::Id,
            Activities::ProjectId,
            Activities::TaskId,
            Activities::UserId,
            Activities::Action,
            Activities::Details,
        ])
        .values_panic([
            id.into(),
            project_id.into(),
            task_id.map(str::to_string).into(),
            user_id.into(),
            action.into(),
            details.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    activity_select()
        .and_where(Expr::col((Activities::Table, Activities::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list_for_project(project_id: &str, limit: u64) -> Built {
    let mut q = activity_select();
    q.and_where(Expr::col((Activities::Table, Activities::ProjectId)).eq(project_id));
    newest_first(&mut q).limit(limit).build(SqliteQueryBuilder)
}

/// Comments on a task, oldest first.
pub fn list_comments(task_id: &str) -> Built {
    activity_select()
        .and_where(Expr::col((Activities::Table, Activities::TaskId)).eq(task_id))
        .and_where(Expr::col((Activities::Table, Activities::Action)).eq("comment"))
        .order_by((Activities::Table, Activities::CreatedAt), Order::Asc)
        .order_by_expr(Expr::cust("\"activities\".rowid"), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Recent activity across every project the user belongs to.
pub fn list_for_member(user_id: &str, limit: u64) -> Built {
    let mut q = activity_select();
    q.inner_join(
        ProjectMembers::Table,
        Expr::col((ProjectMembers::Table, ProjectMembers::ProjectId))
            .equals((Activities::Table, Activities::ProjectId)),
    )
    .and_where(Expr::col((ProjectMembers::Table, ProjectMembers::UserId)).eq(user_id));
    newest_first(&mut q).limit(limit).build(SqliteQueryBuilder)
}
