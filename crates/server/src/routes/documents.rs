//! Document uploads, listing and signed downloads.
//!
//! Bytes go to the blob store under `<project_id>/<document_id>`; the row
//! keeps the key. Downloads are served only through short-lived HMAC-signed
//! URLs so a browser can fetch them without an `Authorization` header.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use taskflow_api::{
    crypto, db, service, DocumentResponse, ListDocumentsResponse, OkResponse, SignedUrlQuery,
    SignedUrlResponse, UploadDocumentQuery,
};
use taskflow_core::{ActivityAction, ProjectRole};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::{member_role, membership, record_activity, require_role};
use crate::storage::{document_from_row, execute, query_all, query_opt, query_row, task_from_row};
use crate::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn load_document(
    conn: &rusqlite::Connection,
    document_id: &str,
) -> Result<(DocumentResponse, String), ApiErr> {
    query_opt(conn, db::documents::get_by_id(document_id), document_from_row)
        .map_err(ApiErr::from_db("load document"))?
        .ok_or_else(|| ApiErr::not_found("document not found"))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 255)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// `attachment` disposition with an ASCII fallback and the UTF-8 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}

/// POST /api/projects/{id}/documents?name=&task_id=: raw request body upload.
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<UploadDocumentQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiErr> {
    let limit = state.config.max_upload_bytes;
    let body = match body {
        Ok(bytes) if bytes.len() > limit => None,
        Ok(bytes) => Some(bytes),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => None,
        Err(rejection) => return Err(ApiErr::bad_request(rejection.body_text())),
    };
    let Some(bytes) = body else {
        return Err(ApiErr::payload_too_large(format!(
            "documents are limited to {limit} bytes"
        )));
    };

    let name = service::validate_document_name(&query.name)?;
    let task_id = service::normalize_optional_text(query.task_id.as_deref());
    let content_type = content_type(&headers);
    let document_id = Uuid::new_v4().to_string();

    {
        let conn = state.db.conn();
        require_role(&conn, &project_id, &user.user_id, ProjectRole::can_edit, "upload documents")?;
        if let Some(task_id) = task_id.as_deref() {
            let task = query_opt(&conn, db::tasks::get_by_id(task_id), task_from_row)
                .map_err(ApiErr::from_db("document task lookup"))?;
            if task.is_none_or(|t| t.project_id != project_id) {
                return Err(ApiErr::bad_request("task_id must refer to a task in this project"));
            }
        }
    }

    let storage_key = state
        .db
        .write_document(&project_id, &document_id, &bytes)
        .map_err(ApiErr::from_db("write document blob"))?;

    let conn = state.db.conn();
    let size_bytes = i64::try_from(bytes.len()).map_err(ApiErr::from_db("document size"))?;
    let inserted = execute(
        &conn,
        db::documents::insert(&db::documents::InsertParams {
            id: &document_id,
            project_id: &project_id,
            task_id: task_id.as_deref(),
            name: &name,
            content_type: &content_type,
            size_bytes,
            storage_key: &storage_key,
            uploaded_by: &user.user_id,
        }),
    );
    if let Err(e) = inserted {
        if let Err(cleanup) = state.db.delete_document(&storage_key) {
            tracing::warn!(storage_key = %storage_key, "orphaned document blob: {cleanup:#}");
        }
        return Err(ApiErr::from_db("insert document")(e));
    }

    let activity_id = record_activity(
        &conn,
        &project_id,
        task_id.as_deref(),
        &user.user_id,
        ActivityAction::DocumentUploaded,
        serde_json::json!({ "document_id": document_id, "name": name, "size_bytes": size_bytes }),
    )?;
    state.changes.activity(&project_id, &activity_id);

    let (document, _) = load_document(&conn, &document_id)?;
    tracing::info!(document_id = %document_id, size_bytes, "document uploaded");
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/projects/{id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ListDocumentsResponse>, ApiErr> {
    let conn = state.db.conn();
    member_role(&conn, &project_id, &user.user_id)?;
    let documents = query_all(
        &conn,
        db::documents::list_for_project(&project_id),
        document_from_row,
    )
    .map_err(ApiErr::from_db("list documents"))?
    .into_iter()
    .map(|(doc, _)| doc)
    .collect();
    Ok(Json(ListDocumentsResponse { documents }))
}

/// DELETE /api/documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let storage_key = {
        let conn = state.db.conn();
        let (document, storage_key) = load_document(&conn, &document_id)?;
        let role = membership(&conn, &document.project_id, &user.user_id)?
            .ok_or_else(|| ApiErr::not_found("document not found"))?;
        if !role.can_edit() {
            return Err(ApiErr::forbidden(format!("{role} role cannot delete documents")));
        }

        execute(&conn, db::documents::delete(&document_id))
            .map_err(ApiErr::from_db("delete document"))?;
        let activity_id = record_activity(
            &conn,
            &document.project_id,
            document.task_id.as_deref(),
            &user.user_id,
            ActivityAction::DocumentDeleted,
            serde_json::json!({ "document_id": document_id, "name": document.name }),
        )?;
        state.changes.activity(&document.project_id, &activity_id);
        storage_key
    };

    if let Err(e) = state.db.delete_document(&storage_key) {
        tracing::error!(document_id = %document_id, "removing document blob: {e:#}");
    }
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/documents/{id}/url: short-lived download link for members.
pub async fn signed_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<SignedUrlResponse>, ApiErr> {
    {
        let conn = state.db.conn();
        let (document, _) = load_document(&conn, &document_id)?;
        membership(&conn, &document.project_id, &user.user_id)?
            .ok_or_else(|| ApiErr::not_found("document not found"))?;
    }

    let expires = service::now_unix() + service::SIGNED_URL_TTL_SECS;
    let path = service::storage_path(&document_id);
    let sig = crypto::sign_storage_path(&path, expires, &state.config.jwt_secret);
    Ok(Json(SignedUrlResponse {
        url: format!("{}{path}?expires={expires}&sig={sig}", state.config.base_url),
        expires_at: service::sqlite_datetime(expires)?,
    }))
}

/// GET /api/storage/documents/{id}?expires=&sig=: no auth; the signature is the grant.
pub async fn download_signed(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<impl IntoResponse, ApiErr> {
    crypto::verify_storage_signature(
        &service::storage_path(&document_id),
        query.expires,
        &query.sig,
        &state.config.jwt_secret,
        service::now_unix(),
    )?;

    let (document, storage_key) = {
        let conn = state.db.conn();
        query_row(&conn, db::documents::get_by_id(&document_id), document_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => ApiErr::not_found("document not found"),
                other => ApiErr::from_db("load document")(other),
            })?
    };
    let bytes = state
        .db
        .read_document(&storage_key)
        .map_err(ApiErr::from_db("read document blob"))?;

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&document.name)),
        ],
        bytes,
    ))
}
