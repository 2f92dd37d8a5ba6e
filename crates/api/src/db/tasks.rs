//! Task query builders.

use sea_query::{Alias, Asterisk, Cond, Expr, Func, LikeExpr, Order, Query, SqliteQueryBuilder};

use super::tables::{ProjectMembers, Tasks, Users};
use super::{now_expr, Built};

// ── Task columns helper ────────────────────────────────────────────────────

/// Base SELECT for tasks with the assignee's display name
/// (matches `task_from_row`).
fn task_select() -> sea_query::SelectStatement {
    Query::select()
        .column((Tasks::Table, Tasks::Id))
        .column((Tasks::Table, Tasks::ProjectId))
        .column((Tasks::Table, Tasks::Title))
        .column((Tasks::Table, Tasks::Description))
        .column((Tasks::Table, Tasks::Status))
        .column((Tasks::Table, Tasks::Priority))
        .column((Tasks::Table, Tasks::AssigneeId))
        .expr_as(
            Expr::col((Users::Table, Users::DisplayName)),
            Alias::new("assignee_name"),
        )
        .column((Tasks::Table, Tasks::DueDate))
        .column((Tasks::Table, Tasks::Position))
        .column((Tasks::Table, Tasks::CreatedBy))
        .column((Tasks::Table, Tasks::CreatedAt))
        .column((Tasks::Table, Tasks::UpdatedAt))
        .column((Tasks::Table, Tasks::CompletedAt))
        .from(Tasks::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Tasks::Table, Tasks::AssigneeId)),
        )
        .to_owned()
}

// ── Queries ────────────────────────────────────────────────────────────────

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub priority: &'a str,
    pub assignee_id: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub position: i64,
    pub created_by: &'a str,
    pub completed_at: Option<&'a str>,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Tasks::Table)
        .columns([
            Tasks::Id,
            Tasks::ProjectId,
            Tasks::Title,
            Tasks::Description,
            Tasks::Status,
            Tasks::Priority,
            Tasks::AssigneeId,
            Tasks::DueDate,
            Tasks::Position,
            Tasks::CreatedBy,
            Tasks::CompletedAt,
        ])
        .values_panic([
            p.id.into(),
            p.project_id.into(),
            p.title.into(),
            p.description.map(str::to_string).into(),
            p.status.into(),
            p.priority.into(),
            p.assignee_id.map(str::to_string).into(),
            p.due_date.map(str::to_string).into(),
            p.position.into(),
            p.created_by.into(),
            p.completed_at.map(str::to_string).into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    task_select()
        .and_where(Expr::col((Tasks::Table, Tasks::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Optional task list filters.
#[derive(Default)]
pub struct Filter<'a> {
    pub status: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub assignee_id: Option<&'a str>,
    /// Substring match on title or description.
    pub search: Option<&'a str>,
}

const LIKE_ESCAPE: char = '!';

/// `LIKE` pattern matching `needle` anywhere, with wildcards in it taken literally.
fn contains(needle: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Tasks of a project, newest first.
pub fn list(project_id: &str, f: &Filter<'_>) -> Built {
    let mut q = task_select();
    q.and_where(Expr::col((Tasks::Table, Tasks::ProjectId)).eq(project_id));
    if let Some(status) = f.status {
        q.and_where(Expr::col((Tasks::Table, Tasks::Status)).eq(status));
    }
    if let Some(priority) = f.priority {
        q.and_where(Expr::col((Tasks::Table, Tasks::Priority)).eq(priority));
    }
    if let Some(assignee) = f.assignee_id {
        q.and_where(Expr::col((Tasks::Table, Tasks::AssigneeId)).eq(assignee));
    }
    if let Some(search) = f.search {
        q.cond_where(
            Cond::any()
                .add(Expr::col((Tasks::Table, Tasks::Title)).like(contains(search)))
                .add(Expr::col((Tasks::Table, Tasks::Description)).like(contains(search))),
        );
    }
    q.order_by((Tasks::Table, Tasks::CreatedAt), Order::Desc)
        .order_by((Tasks::Table, Tasks::Id), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// All tasks of a project in board order.
pub fn list_for_board(project_id: &str) -> Built {
    task_select()
        .and_where(Expr::col((Tasks::Table, Tasks::ProjectId)).eq(project_id))
        .order_by((Tasks::Table, Tasks::Position), Order::Asc)
        .order_by((Tasks::Table, Tasks::Id), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Open tasks assigned to a user, in projects they still belong to.
/// Soonest due first, undated last.
pub fn list_open_for_assignee(user_id: &str) -> Built {
    task_select()
        .inner_join(
            ProjectMembers::Table,
            Expr::col((ProjectMembers::Table, ProjectMembers::ProjectId))
                .equals((Tasks::Table, Tasks::ProjectId))
                .and(
                    Expr::col((ProjectMembers::Table, ProjectMembers::UserId))
                        .equals((Tasks::Table, Tasks::AssigneeId)),
                ),
        )
        .and_where(Expr::col((Tasks::Table, Tasks::AssigneeId)).eq(user_id))
        .and_where(Expr::col((Tasks::Table, Tasks::Status)).ne("done"))
        .order_by_expr(Expr::col((Tasks::Table, Tasks::DueDate)).is_null(), Order::Asc)
        .order_by((Tasks::Table, Tasks::DueDate), Order::Asc)
        .order_by((Tasks::Table, Tasks::CreatedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Board cards only (returns id, status, position).
pub fn board_cards(project_id: &str) -> Built {
    Query::select()
        .columns([Tasks::Id, Tasks::Status, Tasks::Position])
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ProjectId).eq(project_id))
        .build(SqliteQueryBuilder)
}

/// Analytics inputs (returns status, priority, assignee_id, due_date,
/// created_at, completed_at).
pub fn facts(project_id: &str) -> Built {
    Query::select()
        .columns([
            Tasks::Status,
            Tasks::Priority,
            Tasks::AssigneeId,
            Tasks::DueDate,
            Tasks::CreatedAt,
            Tasks::CompletedAt,
        ])
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ProjectId).eq(project_id))
        .build(SqliteQueryBuilder)
}

/// `(status, count)` pairs for a project.
pub fn count_by_status(project_id: &str) -> Built {
    Query::select()
        .column(Tasks::Status)
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Tasks::Table)
        .and_where(Expr::col(Tasks::ProjectId).eq(project_id))
        .group_by_col(Tasks::Status)
        .build(SqliteQueryBuilder)
}

/// Field changes for [`update`]. Nested options distinguish "set" from
/// "clear" on nullable columns.
#[derive(Default)]
pub struct Changes<'a> {
    pub title: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub status: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub assignee_id: Option<Option<&'a str>>,
    pub due_date: Option<Option<&'a str>>,
    pub position: Option<i64>,
    pub completed_at: Option<Option<&'a str>>,
}

/// UPDATE the given fields and bump `updated_at`.
pub fn update(id: &str, c: &Changes<'_>) -> Built {
    let mut q = Query::update();
    q.table(Tasks::Table);
    if let Some(title) = c.title {
        q.value(Tasks::Title, title);
    }
    if let Some(description) = c.description {
        q.value(Tasks::Description, description.map(str::to_string));
    }
    if let Some(status) = c.status {
        q.value(Tasks::Status, status);
    }
    if let Some(priority) = c.priority {
        q.value(Tasks::Priority, priority);
    }
    if let Some(assignee) = c.assignee_id {
        q.value(Tasks::AssigneeId, assignee.map(str::to_string));
    }
    if let Some(due_date) = c.due_date {
        q.value(Tasks::DueDate, due_date.map(str::to_string));
    }
    if let Some(position) = c.position {
        q.value(Tasks::Position, position);
    }
    if let Some(completed_at) = c.completed_at {
        q.value(Tasks::CompletedAt, completed_at.map(str::to_string));
    }
    q.value(Tasks::UpdatedAt, now_expr())
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Tasks::Table)
        .and_where(Expr::col(Tasks::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_applies_only_given_filters() {
        let (sql, values) = list("p1", &Filter::default());
        assert!(sql.contains("LEFT JOIN \"users\""));
        assert!(!sql.contains("LIKE"));
        assert_eq!(values.0.len(), 1);

        let (sql, values) = list(
            "p1",
            &Filter {
                status: Some("done"),
                search: Some("beta"),
                ..Default::default()
            },
        );
        assert!(sql.contains("\"tasks\".\"status\" = ?"));
        assert!(sql.contains("LIKE"));
        assert_eq!(values.0.len(), 4);
        assert_eq!(values.0[2], sea_query::Value::from("%beta%"));
    }

    #[test]
    fn test_search_escapes_like_wildcards() {
        let (sql, values) = list(
            "p1",
            &Filter {
                search: Some("50%_off!"),
                ..Default::default()
            },
        );
        assert!(sql.contains("ESCAPE '!'"));
        assert_eq!(values.0[1], sea_query::Value::from("%50!%!_off!!%"));
    }

    #[test]
    fn test_update_clears_nullable_fields() {
        let (sql, values) = update(
            "t1",
            &Changes {
                assignee_id: Some(None),
                completed_at: Some(None),
                ..Default::default()
            },
        );
        assert!(sql.contains("\"assignee_id\" = ?"));
        assert!(sql.contains("\"completed_at\" = ?"));
        assert!(sql.contains("\"updated_at\" = datetime('now')"));
        assert_eq!(values.0.len(), 3);
    }
}
