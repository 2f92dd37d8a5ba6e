//! Email verification code query builders.
//!
//! A code row is live while `used_at IS NULL`; sending a new code retires
//! the old ones by stamping `used_at`.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::tables::EmailVerificationCodes as Codes;
use super::{now_expr, Built};

pub fn insert(id: &str, user_id: &str, code_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(Codes::Table)
        .columns([Codes::Id, Codes::UserId, Codes::CodeHash, Codes::ExpiresAt])
        .values_panic([
            id.into(),
            user_id.into(),
            code_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Retire all live codes of a user.
pub fn retire_live(user_id: &str) -> Built {
    Query::update()
        .table(Codes::Table)
        .value(Codes::UsedAt, now_expr())
        .and_where(Expr::col(Codes::UserId).eq(user_id))
        .and_where(Expr::col(Codes::UsedAt).is_null())
        .build(SqliteQueryBuilder)
}

/// `created_at` of the most recently issued code (for the resend cooldown).
pub fn last_sent_at(user_id: &str) -> Built {
    Query::select()
        .column(Codes::CreatedAt)
        .from(Codes::Table)
        .and_where(Expr::col(Codes::UserId).eq(user_id))
        .order_by(Codes::CreatedAt, Order::Desc)
        .limit(1)
        .build(SqliteQueryBuilder)
}

/// Newest live code (returns id, code_hash, attempts, expires_at).
pub fn latest_live(user_id: &str) -> Built {
    Query::select()
        .columns([Codes::Id, Codes::CodeHash, Codes::Attempts, Codes::ExpiresAt])
        .from(Codes::Table)
        .and_where(Expr::col(Codes::UserId).eq(user_id))
        .and_where(Expr::col(Codes::UsedAt).is_null())
        .order_by(Codes::CreatedAt, Order::Desc)
        .limit(1)
        .build(SqliteQueryBuilder)
}

pub fn increment_attempts(id: &str) -> Built {
    Query::update()
        .table(Codes::Table)
        .value(Codes::Attempts, Expr::col(Codes::Attempts).add(1))
        .and_where(Expr::col(Codes::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn mark_used(id: &str) -> Built {
    Query::update()
        .table(Codes::Table)
        .value(Codes::UsedAt, now_expr())
        .and_where(Expr::col(Codes::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_live_filters_used_codes() {
        let (sql, values) = latest_live("u1");
        assert!(sql.contains("\"used_at\" IS NULL"));
        assert!(sql.contains("ORDER BY \"created_at\" DESC"));
        assert!(sql.contains("LIMIT"));
        assert_eq!(values.0[0], sea_query::Value::from("u1"));
    }

    #[test]
    fn test_retire_live_stamps_now() {
        let (sql, _) = retire_live("u1");
        assert!(sql.contains("datetime('now')"));
    }
}
