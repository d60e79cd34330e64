use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mockdrop_core::{ApiErrorBody, ApiErrorDetails, ConflictDetails, LookupError};
use tracing::{debug, warn};

use crate::store::{StoreError, to_lower};

/// Which field of the error body a failed path lookup is reported under.
#[derive(Debug, Clone)]
pub enum Scope {
    /// `{".tag": "path", "path": {...}}`
    Path,
    /// `{".tag": "path_lookup", "path_lookup": {...}}`
    PathLookup,
    /// Copy and move: a missing source is `from_lookup`, anything wrong with
    /// the destination is `to`.
    Relocation { from: String },
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, tag: &str, error_summary: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error_summary: error_summary.into(),
                error: ApiErrorDetails {
                    tag: tag.to_string(),
                    ..ApiErrorDetails::default()
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(%message, "malformed request");
        Self::new(StatusCode::BAD_REQUEST, "other", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_access_token",
            "invalid_access_token/",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "other", message)
    }

    fn lookup(tag: &str, lookup: LookupError, scope_field: LookupField) -> Self {
        let mut summary = format!("{tag}/{}/", lookup.tag);
        if let Some(conflict) = &lookup.conflict {
            summary.push_str(&conflict.tag);
            summary.push('/');
        }
        let mut error = Self::new(StatusCode::CONFLICT, tag, summary);
        match scope_field {
            LookupField::Path => error.body.error.path = Some(lookup),
            LookupField::PathLookup => error.body.error.path_lookup = Some(lookup),
        }
        error
    }

    pub fn from_store(err: StoreError, scope: &Scope) -> Self {
        debug!(error = %err, "store operation failed");
        match err {
            StoreError::NotFound(path) => scoped(scope, &path, LookupError::new("not_found")),
            StoreError::NotFolder(path) => scoped(scope, &path, LookupError::new("not_folder")),
            StoreError::MalformedPath(path) => {
                scoped(scope, &path, LookupError::new("malformed_path"))
            }
            StoreError::Conflict { kind, .. } => {
                let lookup = LookupError {
                    tag: "conflict".to_string(),
                    conflict: Some(ConflictDetails {
                        tag: kind.as_str().to_string(),
                    }),
                };
                let tag = match scope {
                    Scope::Relocation { .. } => "to",
                    Scope::Path | Scope::PathLookup => "path",
                };
                Self::lookup(tag, lookup, LookupField::Path)
            }
            StoreError::NotFile(_) => {
                Self::new(StatusCode::CONFLICT, "unsupported_file", "unsupported_file/")
            }
            StoreError::RenameExhausted(path) => Self::new(
                StatusCode::CONFLICT,
                "other",
                format!("other/no free name left for {path}"),
            ),
            StoreError::RelocationIntoSelf(_) => Self::new(
                StatusCode::CONFLICT,
                "cant_move_folder_into_itself",
                "cant_move_folder_into_itself/",
            ),
            StoreError::InvalidSession(_) => {
                Self::new(StatusCode::CONFLICT, "not_found", "not_found/")
            }
            StoreError::IncorrectOffset { correct_offset } => {
                let mut error = Self::new(
                    StatusCode::CONFLICT,
                    "incorrect_offset",
                    "incorrect_offset/",
                );
                error.body.error.correct_offset = Some(correct_offset);
                error
            }
            StoreError::InvalidCursor(reason) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_cursor",
                format!("Invalid cursor: {reason}"),
            ),
            StoreError::RootUnsupported => Self::new(
                StatusCode::BAD_REQUEST,
                "other",
                "The root folder is unsupported.",
            ),
            err @ StoreError::InvalidRange { .. } => Self::new(
                StatusCode::RANGE_NOT_SATISFIABLE,
                "invalid_range",
                err.to_string(),
            ),
        }
    }
}

enum LookupField {
    Path,
    PathLookup,
}

fn scoped(scope: &Scope, path: &str, lookup: LookupError) -> ApiError {
    match scope {
        Scope::Path => ApiError::lookup("path", lookup, LookupField::Path),
        Scope::PathLookup => ApiError::lookup("path_lookup", lookup, LookupField::PathLookup),
        Scope::Relocation { from } if to_lower(path) == to_lower(from) => {
            ApiError::lookup("from_lookup", lookup, LookupField::PathLookup)
        }
        Scope::Relocation { .. } => ApiError::lookup("to", lookup, LookupField::Path),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConflictKind;

    #[test]
    fn lookup_errors_follow_scope() {
        let err = ApiError::from_store(StoreError::NotFound("/a".into()), &Scope::Path);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.error_summary, "path/not_found/");
        assert_eq!(err.body.error.path, Some(LookupError::new("not_found")));

        let err = ApiError::from_store(StoreError::NotFound("/a".into()), &Scope::PathLookup);
        assert_eq!(err.body.error.tag, "path_lookup");
        assert_eq!(err.body.error.path_lookup, Some(LookupError::new("not_found")));
        assert!(err.body.error.path.is_none());
    }

    #[test]
    fn relocation_separates_source_and_destination() {
        let scope = Scope::Relocation {
            from: "/Src".to_string(),
        };
        let missing_source = ApiError::from_store(StoreError::NotFound("/src".into()), &scope);
        assert_eq!(missing_source.body.error.tag, "from_lookup");

        let missing_parent = ApiError::from_store(StoreError::NotFound("/dst".into()), &scope);
        assert_eq!(missing_parent.body.error.tag, "to");

        let conflict = ApiError::from_store(
            StoreError::Conflict {
                path: "/dst".into(),
                kind: ConflictKind::File,
            },
            &scope,
        );
        assert_eq!(conflict.body.error_summary, "to/conflict/file/");
    }

    #[test]
    fn non_lookup_errors_use_matching_status() {
        let offset = ApiError::from_store(
            StoreError::IncorrectOffset { correct_offset: 4 },
            &Scope::Path,
        );
        assert_eq!(offset.status, StatusCode::CONFLICT);
        assert_eq!(offset.body.error.correct_offset, Some(4));

        let cursor = ApiError::from_store(StoreError::InvalidCursor("bad".into()), &Scope::Path);
        assert_eq!(cursor.status, StatusCode::BAD_REQUEST);
        assert_eq!(cursor.body.error.tag, "invalid_cursor");

        let range = ApiError::from_store(
            StoreError::InvalidRange {
                start: 5,
                end: 9,
                size: 3,
            },
            &Scope::Path,
        );
        assert_eq!(range.status, StatusCode::RANGE_NOT_SATISFIABLE);
    }
}
