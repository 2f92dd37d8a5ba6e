//! Document metadata query builders. The bytes live in blob storage under
//! `storage_key`.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::tables::Documents;
use super::Built;

/// Column list in the order `document_from_row` reads them (storage_key last).
const DOCUMENT_COLUMNS: [Documents; 9] = [
    Documents::Id,
    Documents::ProjectId,
    Documents::TaskId,
    Documents::Name,
    Documents::ContentType,
    Documents::SizeBytes,
    Documents::UploadedBy,
    Documents::CreatedAt,
    Documents::StorageKey,
];

pub struct InsertParams<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub task_id: Option<&'a str>,
    pub name: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub storage_key: &'a str,
    pub uploaded_by: &'a str,
}

pub fn insert(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(Documents::Table)
        .columns([
            Documents::Id,
            Documents::ProjectId,
            Documents::TaskId,
            Documents::Name,
            Documents::ContentType,
            Documents::SizeBytes,
            Documents::StorageKey,
            Documents::UploadedBy,
        ])
        .values_panic([
            p.id.into(),
            p.project_id.into(),
            p.task_id.map(str::to_string).into(),
            p.name.into(),
            p.content_type.into(),
            p.size_bytes.into(),
            p.storage_key.into(),
            p.uploaded_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns(DOCUMENT_COLUMNS)
        .from(Documents::Table)
        .and_where(Expr::col(Documents::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn list_for_project(project_id: &str) -> Built {
    Query::select()
        .columns(DOCUMENT_COLUMNS)
        .from(Documents::Table)
        .and_where(Expr::col(Documents::ProjectId).eq(project_id))
        .order_by(Documents::CreatedAt, Order::Desc)
        .order_by(Documents::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Documents::Table)
        .and_where(Expr::col(Documents::Id).eq(id))
        .build(SqliteQueryBuilder)
}
