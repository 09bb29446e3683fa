//! Core use-case services and business rules.
//!
//! # Responsibility
//! - Orchestrate field validation, business rules and repository calls.
//! - Keep HTTP/CLI layers decoupled from storage details.

pub mod participant_service;
pub mod participation_rules;
