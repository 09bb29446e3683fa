//! Participant use-case service.
//!
//! # Responsibility
//! - Provide create/update/get/list/delete entry points for outer surfaces.
//! - Run field validation, business rules and the write in a fixed order.
//!
//! # Invariants
//! - Business rules and the write they guard share one atomic write scope, so
//!   concurrent writers cannot push the total above 100% or duplicate a name.
//! - Field validation runs before any storage access.
//! - Service layer remains storage-agnostic.

use crate::model::draft::{validate_fields, FieldRules, FieldValidationError};
use crate::model::participant::{Participant, ParticipantFields, ParticipantId};
use crate::repo::participant_repo::{ParticipantRepository, RepoError};
use crate::service::participation_rules::{
    duplicate_name_message, validate_total, validate_unique, TotalCheck,
};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Service error for participant use-cases.
#[derive(Debug)]
pub enum ParticipantServiceError {
    /// Payload failed field-level rules.
    InvalidFields(FieldValidationError),
    /// Write would push the participation total above 100%.
    TotalExceeded(TotalCheck),
    /// Another participant already uses this name.
    DuplicateName {
        first_name: String,
        last_name: String,
    },
    /// Target participant does not exist.
    NotFound(ParticipantId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ParticipantServiceError {
    /// Returns true for failures caused by the request content.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidFields(_) | Self::TotalExceeded(_) | Self::DuplicateName { .. }
        )
    }
}

impl Display for ParticipantServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFields(err) => write!(f, "{err}"),
            Self::TotalExceeded(check) => write!(
                f,
                "{}",
                check
                    .error
                    .as_deref()
                    .unwrap_or("total participation exceeds 100%")
            ),
            Self::DuplicateName {
                first_name,
                last_name,
            } => write!(f, "{}", duplicate_name_message(first_name, last_name)),
            Self::NotFound(id) => write!(f, "participant not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ParticipantServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFields(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ParticipantServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<FieldValidationError> for ParticipantServiceError {
    fn from(value: FieldValidationError) -> Self {
        Self::InvalidFields(value)
    }
}

/// Participant service facade over repository implementations.
pub struct ParticipantService<R: ParticipantRepository> {
    repo: R,
}

impl<R: ParticipantRepository> ParticipantService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates a create payload and stores a new participant.
    ///
    /// # Contract
    /// - Field rules use `FieldRules::CREATE`.
    /// - Total and uniqueness are checked against all stored participants.
    pub fn create_participant(
        &self,
        payload: &Value,
    ) -> Result<Participant, ParticipantServiceError> {
        let fields = validate_fields(payload, FieldRules::CREATE)?;

        let participant = self.repo.write_atomically(|repo| {
            ensure_rules(repo, &fields, None)?;
            let participant = Participant::new(fields.clone(), now_epoch_ms());
            repo.insert_participant(&participant)
                .map_err(|err| map_write_error(err, &fields))?;
            Ok::<_, ParticipantServiceError>(participant)
        });

        match &participant {
            Ok(created) => info!(
                "event=participant_create module=service status=ok participant_id={}",
                created.id
            ),
            Err(err) if err.is_rejection() => info!(
                "event=participant_create module=service status=rejected reason={}",
                rejection_code(err)
            ),
            Err(err) => warn!("event=participant_create module=service status=error error={err}"),
        }

        participant
    }

    /// Validates an update payload and fully replaces the participant fields.
    ///
    /// # Contract
    /// - Field rules use `FieldRules::UPDATE`.
    /// - The edited record is excluded from total and uniqueness checks.
    /// - Missing participants return `NotFound` before any rule runs.
    pub fn update_participant(
        &self,
        id: ParticipantId,
        payload: &Value,
    ) -> Result<Participant, ParticipantServiceError> {
        let fields = validate_fields(payload, FieldRules::UPDATE)?;

        let updated = self.repo.write_atomically(|repo| {
            let mut participant = repo
                .get_participant(id)?
                .ok_or(ParticipantServiceError::NotFound(id))?;
            ensure_rules(repo, &fields, Some(id))?;
            participant.apply(fields.clone(), now_epoch_ms());
            repo.update_participant(&participant)
                .map_err(|err| map_write_error(err, &fields))?;
            Ok::<_, ParticipantServiceError>(participant)
        });

        match &updated {
            Ok(_) => info!(
                "event=participant_update module=service status=ok participant_id={id}"
            ),
            Err(err) if err.is_rejection() => info!(
                "event=participant_update module=service status=rejected participant_id={} reason={}",
                id,
                rejection_code(err)
            ),
            Err(ParticipantServiceError::NotFound(_)) => info!(
                "event=participant_update module=service status=not_found participant_id={id}"
            ),
            Err(err) => warn!(
                "event=participant_update module=service status=error participant_id={id} error={err}"
            ),
        }

        updated
    }

    /// Gets one participant by id.
    pub fn get_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Participant, ParticipantServiceError> {
        self.repo
            .get_participant(id)?
            .ok_or(ParticipantServiceError::NotFound(id))
    }

    /// Lists participants, newest-created first.
    pub fn list_participants(&self) -> Result<Vec<Participant>, ParticipantServiceError> {
        Ok(self.repo.list_participants()?)
    }

    /// Hard-deletes a participant by id.
    pub fn delete_participant(&self, id: ParticipantId) -> Result<(), ParticipantServiceError> {
        self.repo.delete_participant(id)?;
        info!("event=participant_delete module=service status=ok participant_id={id}");
        Ok(())
    }

    /// Read-only total check, as exposed to callers previewing a value.
    pub fn check_total(
        &self,
        candidate: f64,
        exclude: Option<ParticipantId>,
    ) -> Result<TotalCheck, ParticipantServiceError> {
        Ok(validate_total(&self.repo, candidate, exclude)?)
    }
}

fn ensure_rules<R: ParticipantRepository>(
    repo: &R,
    fields: &ParticipantFields,
    exclude: Option<ParticipantId>,
) -> Result<(), ParticipantServiceError> {
    let total = validate_total(repo, fields.participation, exclude)?;
    if !total.valid {
        return Err(ParticipantServiceError::TotalExceeded(total));
    }

    let unique = validate_unique(repo, &fields.first_name, &fields.last_name, exclude)?;
    if !unique.valid {
        return Err(ParticipantServiceError::DuplicateName {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
        });
    }

    Ok(())
}

fn map_write_error(err: RepoError, fields: &ParticipantFields) -> ParticipantServiceError {
    match err {
        RepoError::DuplicateName => ParticipantServiceError::DuplicateName {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
        },
        other => other.into(),
    }
}

fn rejection_code(err: &ParticipantServiceError) -> &'static str {
    match err {
        ParticipantServiceError::InvalidFields(_) => "invalid_fields",
        ParticipantServiceError::TotalExceeded(_) => "total_exceeded",
        ParticipantServiceError::DuplicateName { .. } => "duplicate_name",
        _ => "other",
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
