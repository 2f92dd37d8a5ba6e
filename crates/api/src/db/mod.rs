//! Shared database schema, migrations, and query builders.
//!
//! Every builder returns `(sql, values)` for the SQLite dialect; the server
//! binds the values with its own converter.

pub mod activities;
pub mod documents;
pub mod invites;
pub mod members;
pub mod migrations;
pub mod projects;
pub mod refresh_tokens;
pub mod tables;
pub mod tasks;
pub mod users;
pub mod verification;

// Re-export tables for convenience
pub use migrations::MIGRATIONS;
pub use tables::*;

pub type Built = (String, sea_query::Values);

/// SQL expression for the current UTC time in SQLite `datetime()` form.
pub(crate) fn now_expr() -> sea_query::SimpleExpr {
    sea_query::Expr::cust("datetime('now')")
}
