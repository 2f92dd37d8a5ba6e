//! User / auth query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::tables::Users;
use super::Built;

// ── User lookups ───────────────────────────────────────────────────────────

/// Profile columns, in the order `user_from_row` reads them.
const PROFILE_COLUMNS: [Users; 6] = [
    Users::Id,
    Users::Email,
    Users::DisplayName,
    Users::AvatarUrl,
    Users::EmailVerified,
    Users::CreatedAt,
];

/// Find user profile by id.
pub fn get_by_id(user_id: &str) -> Built {
    Query::select()
        .columns(PROFILE_COLUMNS)
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Find user by email for login (returns id, display_name, password_hash, password_salt, email_verified).
pub fn get_by_email_for_login(email: &str) -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::DisplayName,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::EmailVerified,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Get password hash and salt.
pub fn get_password(user_id: &str) -> Built {
    Query::select()
        .columns([Users::PasswordHash, Users::PasswordSalt])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── User inserts ───────────────────────────────────────────────────────────

pub fn insert(
    id: &str,
    email: &str,
    display_name: &str,
    password_hash: &str,
    password_salt: &str,
) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::Email,
            Users::DisplayName,
            Users::PasswordHash,
            Users::PasswordSalt,
        ])
        .values_panic([
            id.into(),
            email.into(),
            display_name.into(),
            password_hash.into(),
            password_salt.into(),
        ])
        .build(SqliteQueryBuilder)
}

// ── User updates ───────────────────────────────────────────────────────────

/// Update password.
pub fn update_password(user_id: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Update the editable profile fields. `None` leaves a field untouched;
/// `Some(None)` clears the avatar. Returns `None` when nothing changes.
pub fn update_profile(
    user_id: &str,
    display_name: Option<&str>,
    avatar_url: Option<Option<&str>>,
) -> Option<Built> {
    if display_name.is_none() && avatar_url.is_none() {
        return None;
    }
    let mut q = Query::update();
    q.table(Users::Table);
    if let Some(name) = display_name {
        q.value(Users::DisplayName, name);
    }
    if let Some(avatar) = avatar_url {
        q.value(Users::AvatarUrl, avatar.map(str::to_string));
    }
    Some(
        q.and_where(Expr::col(Users::Id).eq(user_id))
            .build(SqliteQueryBuilder),
    )
}

pub fn mark_email_verified(user_id: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::EmailVerified, true)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_profile_only_sets_given_fields() {
        assert!(update_profile("u1", None, None).is_none());

        let (sql, values) = update_profile("u1", Some("Ada"), None).unwrap();
        assert!(sql.contains("\"display_name\""));
        assert!(!sql.contains("\"avatar_url\""));
        assert_eq!(values.0.len(), 2);

        let (sql, _) = update_profile("u1", None, Some(None)).unwrap();
        assert!(sql.contains("\"avatar_url\" = NULL") || sql.contains("\"avatar_url\" = ?"));
    }
}
