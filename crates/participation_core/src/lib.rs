//! Participants, their percentage shares, and the rules that keep the
//! shares of all participants at or below 100%.
//!
//! HTTP and CLI crates call [`ParticipantService`]; nothing outside this
//! crate touches SQL.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LogSink};
pub use model::draft::{
    validate_fields, Constraint, Field, FieldRules, FieldValidationError, FieldViolation,
};
pub use model::participant::{Participant, ParticipantFields, ParticipantId};
pub use repo::participant_repo::{
    ParticipantRepository, RepoError, RepoResult, SqliteParticipantRepository,
};
pub use service::participant_service::{ParticipantService, ParticipantServiceError};
pub use service::participation_rules::{
    evaluate_total, format_percent, validate_total, validate_unique, TotalCheck, UniqueCheck,
};

/// Linkage check used by `participation_cli ping`.
pub fn ping() -> &'static str {
    "pong"
}

/// Crate version reported by `/api/health`.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
