//! Project query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::tables::{ProjectMembers, Projects};
use super::{now_expr, Built};

// ── Project columns helper ─────────────────────────────────────────────────

/// Column list for project SELECT queries (matches `project_from_row`).
fn project_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.column((Projects::Table, Projects::Id))
        .column((Projects::Table, Projects::Name))
        .column((Projects::Table, Projects::Description))
        .column((Projects::Table, Projects::Status))
        .column((Projects::Table, Projects::Color))
        .column((Projects::Table, Projects::DueDate))
        .column((Projects::Table, Projects::OwnerId))
        .column((Projects::Table, Projects::CreatedAt))
        .column((Projects::Table, Projects::UpdatedAt))
}

// ── Queries ────────────────────────────────────────────────────────────────

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub color: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub owner_id: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Projects::Table)
        .columns([
            Projects::Id,
            Projects::Name,
            Projects::Description,
            Projects::Status,
            Projects::Color,
            Projects::DueDate,
            Projects::OwnerId,
        ])
        .values_panic([
            p.id.into(),
            p.name.into(),
            p.description.map(str::to_string).into(),
            p.status.into(),
            p.color.map(str::to_string).into(),
            p.due_date.map(str::to_string).into(),
            p.owner_id.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a single project by id.
pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    project_columns(&mut q);
    q.from(Projects::Table)
        .and_where(Expr::col((Projects::Table, Projects::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Projects the user belongs to, with the user's role as the last column.
pub fn list_for_user(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    project_columns(&mut q);
    q.column((ProjectMembers::Table, ProjectMembers::Role))
        .from(Projects::Table)
        .inner_join(
            ProjectMembers::Table,
            Expr::col((ProjectMembers::Table, ProjectMembers::ProjectId))
                .equals((Projects::Table, Projects::Id)),
        )
        .and_where(Expr::col((ProjectMembers::Table, ProjectMembers::UserId)).eq(user_id))
        .order_by((Projects::Table, Projects::UpdatedAt), Order::Desc)
        .order_by((Projects::Table, Projects::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Field changes for [`update`]. `None` means untouched; the nested
/// `Option` of nullable fields distinguishes "set" from "clear".
#[derive(Default)]
pub struct Changes<'a> {
    pub name: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub status: Option<&'a str>,
    pub color: Option<Option<&'a str>>,
    pub due_date: Option<Option<&'a str>>,
}

/// UPDATE the given fields and bump `updated_at`.
pub fn update(id: &str, c: &Changes<'_>) -> Built {
    let mut q = Query::update();
    q.table(Projects::Table);
    if let Some(name) = c.name {
        q.value(Projects::Name, name);
    }
    if let Some(description) = c.description {
        q.value(Projects::Description, description.map(str::to_string));
    }
    if let Some(status) = c.status {
        q.value(Projects::Status, status);
    }
    if let Some(color) = c.color {
        q.value(Projects::Color, color.map(str::to_string));
    }
    if let Some(due_date) = c.due_date {
        q.value(Projects::DueDate, due_date.map(str::to_string));
    }
    q.value(Projects::UpdatedAt, now_expr())
        .and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a project. Members, invites, tasks, activities and documents
/// cascade in the schema.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Projects::Table)
        .and_where(Expr::col(Projects::Id).eq(id))
        .build(SqliteQueryBuilder)
}
