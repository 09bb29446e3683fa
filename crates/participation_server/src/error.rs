use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use participation_core::ParticipantServiceError;
use serde_json::json;
use thiserror::Error;

/// Participant route being served, used to pick the generic 500 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Get,
    Update,
    Delete,
}

impl Operation {
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::List => "Failed to fetch participants",
            Self::Create => "Failed to create participant",
            Self::Get => "Failed to fetch participant",
            Self::Update => "Failed to update participant",
            Self::Delete => "Failed to delete participant",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("malformed request body")]
    MalformedBody,

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Rule(String),

    #[error("participant not found")]
    NotFound,

    #[error("{error}: {message}")]
    Unauthorized {
        error: &'static str,
        message: &'static str,
    },

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{public}: {detail}")]
    Internal { public: &'static str, detail: String },
}

impl ApiError {
    pub fn from_service(operation: Operation, err: ParticipantServiceError) -> Self {
        match err {
            ParticipantServiceError::InvalidFields(fields) => Self::Validation(fields.messages()),
            ParticipantServiceError::TotalExceeded(_)
            | ParticipantServiceError::DuplicateName { .. } => Self::Rule(err.to_string()),
            ParticipantServiceError::NotFound(_) => Self::NotFound,
            other => Self::Internal {
                public: operation.failure_message(),
                detail: other.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody | Self::Validation(_) | Self::Rule(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::MalformedBody => json!({ "error": "Invalid JSON body" }),
            Self::Validation(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            Self::Rule(message) => json!({ "error": message }),
            Self::NotFound => json!({ "error": "Participant not found" }),
            Self::Unauthorized { error, message } => json!({
                "error": error,
                "message": message,
            }),
            Self::Forbidden(message) => json!({ "error": message }),
            Self::Internal { public, detail } => {
                error!("event=request_failed module=api status=error message={public} error={detail}");
                json!({ "error": public })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, Operation};
    use axum::http::StatusCode;
    use participation_core::{ParticipantServiceError, RepoError};
    use uuid::Uuid;

    #[test]
    fn service_errors_map_to_status_codes() {
        let not_found =
            ApiError::from_service(Operation::Get, ParticipantServiceError::NotFound(Uuid::nil()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let duplicate = ApiError::from_service(
            Operation::Create,
            ParticipantServiceError::DuplicateName {
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
            },
        );
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            duplicate.to_string(),
            "A participant with the name \"John Doe\" already exists."
        );
    }

    #[test]
    fn unclassified_errors_hide_details() {
        let err = ApiError::from_service(
            Operation::Delete,
            ParticipantServiceError::Repo(RepoError::InvalidData("bad row".to_string())),
        );
        match err {
            ApiError::Internal { public, .. } => assert_eq!(public, "Failed to delete participant"),
            other => panic!("expected internal error, got {other:?}"),
        }
    }
}
