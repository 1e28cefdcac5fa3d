//! Note HTTP handlers.
//!
//! ```text
//! POST /api/v1/notes
//! GET  /api/v1/notes/{id}
//! PUT  /api/v1/notes/{id}
//! ```
//!
//! Responses carry the commit-assigned `createdAt`, `updatedAt`, and
//! `version`. Clients echo `version` back as `expectedVersion` on update; a
//! stale value yields `409 Conflict`.

use actix_web::{HttpResponse, get, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ports::{CreateNoteRequest, UpdateNoteRequest};
use crate::domain::{Error, Note};
use crate::inbound::http::error::{ApiError, ApiResult};
use crate::inbound::http::state::HttpState;

/// Request payload for creating a note.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteBody {
    #[schema(example = "Groceries")]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Request payload for updating a note.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteBody {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Version returned by the last read or write of this note.
    #[schema(example = 1)]
    pub expected_version: u32,
}

/// Note representation returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    #[schema(format = "uuid")]
    pub id: String,
    pub title: String,
    pub body: String,
    #[schema(format = "date-time")]
    pub created_at: String,
    #[schema(format = "date-time")]
    pub updated_at: String,
    pub version: u32,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id.to_string(),
            title: note.title,
            body: note.body,
            created_at: note.created_at.to_rfc3339(),
            updated_at: note.updated_at.to_rfc3339(),
            version: note.version,
        }
    }
}

fn parse_note_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|_| {
        Error::invalid_request("id must be a valid UUID").with_details(json!({
            "field": "id",
            "value": raw,
            "code": "invalid_uuid",
        }))
    })
}

/// Create a note. The commit stamps both timestamps and sets version 1.
#[utoipa::path(
    post,
    path = "/api/v1/notes",
    request_body = CreateNoteBody,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tags = ["notes"],
    operation_id = "createNote"
)]
#[post("/notes")]
pub async fn create_note(
    state: web::Data<HttpState>,
    payload: web::Json<CreateNoteBody>,
) -> ApiResult<HttpResponse> {
    let CreateNoteBody { title, body } = payload.into_inner();
    let note = state.notes.create(CreateNoteRequest { title, body }).await?;
    Ok(HttpResponse::Created().json(NoteResponse::from(note)))
}

/// Fetch a note by identifier.
#[utoipa::path(
    get,
    path = "/api/v1/notes/{id}",
    params(("id" = Uuid, Path, description = "Note identifier")),
    responses(
        (status = 200, description = "Note", body = NoteResponse),
        (status = 400, description = "Invalid identifier", body = ApiError),
        (status = 404, description = "Unknown note", body = ApiError)
    ),
    tags = ["notes"],
    operation_id = "getNote"
)]
#[get("/notes/{id}")]
pub async fn get_note(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<NoteResponse>> {
    let id = parse_note_id(&path.into_inner())?;
    let note = state.notes_query.fetch(id).await?;
    Ok(web::Json(NoteResponse::from(note)))
}

/// Update a note guarded by its expected version.
#[utoipa::path(
    put,
    path = "/api/v1/notes/{id}",
    params(("id" = Uuid, Path, description = "Note identifier")),
    request_body = UpdateNoteBody,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Unknown note", body = ApiError),
        (status = 409, description = "Version conflict", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tags = ["notes"],
    operation_id = "updateNote"
)]
#[put("/notes/{id}")]
pub async fn update_note(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<UpdateNoteBody>,
) -> ApiResult<web::Json<NoteResponse>> {
    let id = parse_note_id(&path.into_inner())?;
    let UpdateNoteBody {
        title,
        body,
        expected_version,
    } = payload.into_inner();
    let note = state
        .notes
        .update(UpdateNoteRequest {
            id,
            title,
            body,
            expected_version,
        })
        .await?;
    Ok(web::Json(NoteResponse::from(note)))
}
