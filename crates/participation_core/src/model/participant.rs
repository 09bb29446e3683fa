//! Participant domain model.
//!
//! # Responsibility
//! - Define the canonical participant record and its editable fields.
//! - Own the participation bounds shared by validation and storage.
//!
//! # Invariants
//! - `id` is stable and never reused for another participant.
//! - `participation` stays within `PARTICIPATION_MIN..=PARTICIPATION_MAX`.
//! - The sum of all stored `participation` values never exceeds
//!   `PARTICIPATION_MAX`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a participant.
pub type ParticipantId = Uuid;

/// Lowest participation percentage a single participant may hold.
pub const PARTICIPATION_MIN: f64 = 0.0;

/// Highest participation percentage, for one participant and for the total.
pub const PARTICIPATION_MAX: f64 = 100.0;

/// Editable participant fields, already checked by field validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantFields {
    pub first_name: String,
    pub last_name: String,
    /// Percentage in `0..=100`; decimals are allowed.
    pub participation: f64,
}

impl ParticipantFields {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        participation: f64,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            participation,
        }
    }
}

/// Canonical stored participant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub first_name: String,
    pub last_name: String,
    pub participation: f64,
    /// Unix epoch milliseconds, set once on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every full replace.
    pub updated_at: i64,
}

impl Participant {
    /// Builds a new record with a generated id and both timestamps at `now_ms`.
    pub fn new(fields: ParticipantFields, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            participation: fields.participation,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Full replace of the editable fields.
    pub fn apply(&mut self, fields: ParticipantFields, now_ms: i64) {
        self.first_name = fields.first_name;
        self.last_name = fields.last_name;
        self.participation = fields.participation;
        self.updated_at = now_ms;
    }

    pub fn fields(&self) -> ParticipantFields {
        ParticipantFields::new(
            self.first_name.clone(),
            self.last_name.clone(),
            self.participation,
        )
    }
}

/// Returns true when `value` is a finite percentage within bounds.
pub fn participation_in_bounds(value: f64) -> bool {
    value.is_finite() && (PARTICIPATION_MIN..=PARTICIPATION_MAX).contains(&value)
}
