//! Refresh token query builders. Only SHA-256 digests are stored.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::tables::RefreshTokens;
use super::Built;

pub fn insert(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Look up a refresh token (returns id, user_id, expires_at).
pub fn lookup(token_hash: &str) -> Built {
    Query::select()
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::ExpiresAt,
        ])
        .from(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

pub fn delete_by_id(id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn delete_by_hash(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Revoke every session of a user (after a password change).
pub fn delete_for_user(user_id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
