use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use participation_core::{core_version, Participant, ParticipantId};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    config::Environment,
    error::{ApiError, Operation},
    middleware::auth::header_str,
    state::AppState,
};

/// Public participant shape; storage timestamps stay internal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: ParticipantId,
    pub first_name: String,
    pub last_name: String,
    pub participation: f64,
}

impl From<Participant> for ParticipantResponse {
    fn from(participant: Participant) -> Self {
        Self {
            id: participant.id,
            first_name: participant.first_name,
            last_name: participant.last_name,
            participation: participant.participation,
        }
    }
}

pub async fn list_participants(
    State(state): State<AppState>,
) -> Result<Json<Vec<ParticipantResponse>>, ApiError> {
    let participants = state
        .run(Operation::List, |service| service.list_participants())
        .await?;
    Ok(Json(participants.into_iter().map(Into::into).collect()))
}

pub async fn create_participant(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload = parse_body(&body)?;
    let created = state
        .run(Operation::Create, move |service| {
            service.create_participant(&payload)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ParticipantResponse::from(created))))
}

pub async fn get_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let id = parse_id(&id)?;
    let participant = state
        .run(Operation::Get, move |service| service.get_participant(id))
        .await?;
    Ok(Json(participant.into()))
}

pub async fn update_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let id = parse_id(&id)?;
    let payload = parse_body(&body)?;
    let updated = state
        .run(Operation::Update, move |service| {
            service.update_participant(id, &payload)
        })
        .await?;
    Ok(Json(updated.into()))
}

pub async fn delete_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    state
        .run(Operation::Delete, move |service| service.delete_participant(id))
        .await?;
    Ok(Json(json!({ "message": "Participant deleted successfully" })))
}

/// Hands the first configured key to the trusted frontend in production.
pub async fn auth_key(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if state.config.environment != Environment::Production {
        return Err(ApiError::Forbidden("Not available in development"));
    }

    let auth = &state.config.auth;
    let origin = header_str(&headers, header::ORIGIN.as_str());
    let referer = header_str(&headers, header::REFERER.as_str());
    if !auth.is_trusted_origin(origin, referer) {
        return Err(ApiError::Forbidden("Unauthorized origin"));
    }

    let Some(key) = auth.allowed_keys.first() else {
        return Err(ApiError::Internal {
            public: "API keys not configured",
            detail: "API_KEYS is empty".to_string(),
        });
    };

    Ok(Json(json!({ "apiKey": key })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": core_version() }))
}

pub async fn route_not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" })))
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::MalformedBody)
}

fn parse_id(raw: &str) -> Result<ParticipantId, ApiError> {
    ParticipantId::parse_str(raw).map_err(|_| ApiError::NotFound)
}
