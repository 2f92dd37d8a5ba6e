//! Project invite query builders.
//!
//! Invites are addressed by email and carry a one-time token whose SHA-256
//! digest is stored in `token_hash`.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::tables::{ProjectInvites, Projects, Users};
use super::{now_expr, Built};

/// Invite SELECT joined with project name and inviter name
/// (matches `invite_from_row`).
fn invite_select() -> sea_query::SelectStatement {
    Query::select()
        .column((ProjectInvites::Table, ProjectInvites::Id))
        .column((ProjectInvites::Table, ProjectInvites::ProjectId))
        .expr_as(
            Expr::col((Projects::Table, Projects::Name)),
            Alias::new("project_name"),
        )
        .column((ProjectInvites::Table, ProjectInvites::Email))
        .column((ProjectInvites::Table, ProjectInvites::Role))
        .column((ProjectInvites::Table, ProjectInvites::Status))
        .column((ProjectInvites::Table, ProjectInvites::InvitedBy))
        .expr_as(
            Expr::col((Users::Table, Users::DisplayName)),
            Alias::new("invited_by_name"),
        )
        .column((ProjectInvites::Table, ProjectInvites::CreatedAt))
        .column((ProjectInvites::Table, ProjectInvites::ExpiresAt))
        .from(ProjectInvites::Table)
        .inner_join(
            Projects::Table,
            Expr::col((Projects::Table, Projects::Id))
                .equals((ProjectInvites::Table, ProjectInvites::ProjectId)),
        )
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((ProjectInvites::Table, ProjectInvites::InvitedBy)),
        )
        .to_owned()
}

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub email: &'a str,
    pub role: &'a str,
    pub token_hash: &'a str,
    pub invited_by: &'a str,
    pub expires_at: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(ProjectInvites::Table)
        .columns([
            ProjectInvites::Id,
            ProjectInvites::ProjectId,
            ProjectInvites::Email,
            ProjectInvites::Role,
            ProjectInvites::TokenHash,
            ProjectInvites::InvitedBy,
            ProjectInvites::ExpiresAt,
        ])
        .values_panic([
            p.id.into(),
            p.project_id.into(),
            p.email.into(),
            p.role.into(),
            p.token_hash.into(),
            p.invited_by.into(),
            p.expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    invite_select()
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_token_hash(token_hash: &str) -> Built {
    invite_select()
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::TokenHash)).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Pending invites of a project, newest first.
pub fn list_pending_for_project(project_id: &str) -> Built {
    invite_select()
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::ProjectId)).eq(project_id))
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::Status)).eq("pending"))
        .order_by((ProjectInvites::Table, ProjectInvites::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Pending, unexpired invites addressed to an email.
pub fn list_pending_for_email(email: &str) -> Built {
    invite_select()
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::Email)).eq(email))
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::Status)).eq("pending"))
        .and_where(Expr::col((ProjectInvites::Table, ProjectInvites::ExpiresAt)).gt(now_expr()))
        .order_by((ProjectInvites::Table, ProjectInvites::CreatedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Is there already a live invite for this email?
pub fn pending_exists(project_id: &str, email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(ProjectInvites::Table)
        .and_where(Expr::col(ProjectInvites::ProjectId).eq(project_id))
        .and_where(Expr::col(ProjectInvites::Email).eq(email))
        .and_where(Expr::col(ProjectInvites::Status).eq("pending"))
        .and_where(Expr::col(ProjectInvites::ExpiresAt).gt(now_expr()))
        .build(SqliteQueryBuilder)
}

pub fn update_status(id: &str, status: &str) -> Built {
    Query::update()
        .table(ProjectInvites::Table)
        .value(ProjectInvites::Status, status)
        .and_where(Expr::col(ProjectInvites::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_select_joins_project_and_inviter() {
        let (sql, values) = get_by_token_hash("abc");
        assert!(sql.contains("INNER JOIN \"projects\""));
        assert!(sql.contains("AS \"project_name\""));
        assert!(sql.contains("AS \"invited_by_name\""));
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn test_pending_for_email_checks_expiry() {
        let (sql, _) = list_pending_for_email("a@b.co");
        assert!(sql.contains("\"expires_at\" > datetime('now')"));
    }
}
