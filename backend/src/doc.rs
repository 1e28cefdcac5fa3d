//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the health probes and the notes endpoints together
//! with their request, response, and error schemas. The document is served by
//! Swagger UI in debug builds and exported via `cargo run --bin openapi-dump`.

use utoipa::OpenApi;

use crate::domain::ErrorCode;
use crate::inbound::http::error::ApiError;
use crate::inbound::http::notes::{CreateNoteBody, NoteResponse, UpdateNoteBody};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Notes service API",
        description = "Notes with commit-time audit timestamps and optimistic concurrency versions."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::notes::create_note,
        crate::inbound::http::notes::get_note,
        crate::inbound::http::notes::update_note,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        CreateNoteBody,
        UpdateNoteBody,
        NoteResponse
    )),
    tags(
        (name = "notes", description = "Versioned notes"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying the registered OpenAPI surface.

    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    fn assert_object_schema_has_field(schema: &RefOr<Schema>, field: &str) {
        match schema {
            RefOr::T(Schema::Object(obj)) => {
                assert!(
                    obj.properties.contains_key(field),
                    "schema should have field '{field}'"
                );
            }
            _ => panic!("expected Object schema"),
        }
    }

    #[rstest]
    #[case("/api/v1/notes")]
    #[case("/api/v1/notes/{id}")]
    #[case("/health/ready")]
    #[case("/health/live")]
    fn paths_are_registered(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing path {path}");
    }

    #[rstest]
    fn note_schemas_expose_version_fields() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;

        let response = schemas.get("NoteResponse").expect("NoteResponse schema");
        assert_object_schema_has_field(response, "version");
        assert_object_schema_has_field(response, "updatedAt");

        let update = schemas.get("UpdateNoteBody").expect("UpdateNoteBody schema");
        assert_object_schema_has_field(update, "expectedVersion");

        let error = schemas.get("ApiError").expect("ApiError schema");
        assert_object_schema_has_field(error, "code");
        assert_object_schema_has_field(error, "traceId");
    }
}
