//! Project member query builders.

use sea_query::{Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::tables::{ProjectMembers, Users};
use super::Built;

pub fn insert(project_id: &str, user_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(ProjectMembers::Table)
        .columns([
            ProjectMembers::ProjectId,
            ProjectMembers::UserId,
            ProjectMembers::Role,
        ])
        .values_panic([project_id.into(), user_id.into(), role.into()])
        .build(SqliteQueryBuilder)
}

/// Role of a user in a project (no row = not a member).
pub fn get_role(project_id: &str, user_id: &str) -> Built {
    Query::select()
        .column(ProjectMembers::Role)
        .from(ProjectMembers::Table)
        .and_where(Expr::col(ProjectMembers::ProjectId).eq(project_id))
        .and_where(Expr::col(ProjectMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Members with profile data (returns user_id, display_name, email, role, joined_at).
pub fn list(project_id: &str) -> Built {
    Query::select()
        .column((ProjectMembers::Table, ProjectMembers::UserId))
        .column((Users::Table, Users::DisplayName))
        .column((Users::Table, Users::Email))
        .column((ProjectMembers::Table, ProjectMembers::Role))
        .column((ProjectMembers::Table, ProjectMembers::JoinedAt))
        .from(ProjectMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((ProjectMembers::Table, ProjectMembers::UserId)),
        )
        .and_where(Expr::col((ProjectMembers::Table, ProjectMembers::ProjectId)).eq(project_id))
        .order_by((ProjectMembers::Table, ProjectMembers::JoinedAt), Order::Asc)
        .order_by((Users::Table, Users::DisplayName), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Is the account with this email already a member?
pub fn email_is_member(project_id: &str, email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(ProjectMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((ProjectMembers::Table, ProjectMembers::UserId)),
        )
        .and_where(Expr::col((ProjectMembers::Table, ProjectMembers::ProjectId)).eq(project_id))
        .and_where(Expr::col((Users::Table, Users::Email)).eq(email))
        .build(SqliteQueryBuilder)
}

pub fn count(project_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(ProjectMembers::Table)
        .and_where(Expr::col(ProjectMembers::ProjectId).eq(project_id))
        .build(SqliteQueryBuilder)
}

pub fn update_role(project_id: &str, user_id: &str, role: &str) -> Built {
    Query::update()
        .table(ProjectMembers::Table)
        .value(ProjectMembers::Role, role)
        .and_where(Expr::col(ProjectMembers::ProjectId).eq(project_id))
        .and_where(Expr::col(ProjectMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

pub fn delete(project_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(ProjectMembers::Table)
        .and_where(Expr::col(ProjectMembers::ProjectId).eq(project_id))
        .and_where(Expr::col(ProjectMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
