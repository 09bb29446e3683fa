//! Participant domain model and inbound payload rules.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Validate untyped request payloads before they reach services.
//!
//! # Invariants
//! - Every participant is identified by a stable `ParticipantId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod draft;
pub mod participant;
