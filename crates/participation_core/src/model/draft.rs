//! Inbound participant payload validation.
//!
//! # Responsibility
//! - Check untyped request bodies against declarative field rules.
//! - Report every violated constraint so callers can show all problems at once.
//!
//! # Invariants
//! - A body that passes validation always yields in-bounds `ParticipantFields`.
//! - Violations are reported in field order, then constraint order.

use crate::model::participant::{ParticipantFields, PARTICIPATION_MAX, PARTICIPATION_MIN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

static NAME_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s]+$").expect("valid name charset regex"));

const FIRST_NAME_KEY: &str = "firstName";
const LAST_NAME_KEY: &str = "lastName";
const PARTICIPATION_KEY: &str = "participation";

/// Inbound field names, in external (camelCase) naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FirstName,
    LastName,
    Participation,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Self::FirstName => FIRST_NAME_KEY,
            Self::LastName => LAST_NAME_KEY,
            Self::Participation => PARTICIPATION_KEY,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Participation => "Participation",
        }
    }
}

/// Constraint kinds a field can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    IsString,
    IsNotEmpty,
    MinLength,
    MaxLength,
    Matches,
    IsNumber,
    Min,
    Max,
    /// The body itself is not an object.
    Format,
}

/// One violated constraint with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// `None` for body-level violations.
    pub field: Option<Field>,
    pub constraint: Constraint,
    pub message: String,
}

/// Name length bounds for one write path.
///
/// Create and update intentionally carry different maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    pub name_min_chars: usize,
    pub name_max_chars: usize,
}

impl FieldRules {
    pub const CREATE: Self = Self {
        name_min_chars: 2,
        name_max_chars: 50,
    };

    pub const UPDATE: Self = Self {
        name_min_chars: 2,
        name_max_chars: 32,
    };
}

/// Full list of violations for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    violations: Vec<FieldViolation>,
}

impl FieldValidationError {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Messages in report order.
    pub fn messages(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|violation| violation.message.clone())
            .collect()
    }

    /// Returns true when `field` has at least one violation of `constraint`.
    pub fn has(&self, field: Field, constraint: Constraint) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.field == Some(field) && violation.constraint == constraint)
    }

    /// Distinct fields with violations, in report order.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        for field in self.violations.iter().filter_map(|violation| violation.field) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

impl Display for FieldValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl Error for FieldValidationError {}

/// Validates an untyped payload and extracts participant fields.
///
/// # Errors
/// - Returns every violated constraint across all three fields.
/// - Returns a single `Format` violation when `body` is not a JSON object.
pub fn validate_fields(
    body: &Value,
    rules: FieldRules,
) -> Result<ParticipantFields, FieldValidationError> {
    let Some(object) = body.as_object() else {
        return Err(FieldValidationError {
            violations: vec![FieldViolation {
                field: None,
                constraint: Constraint::Format,
                message: "Invalid data format".to_string(),
            }],
        });
    };

    let mut violations = Vec::new();
    let first_name = check_name(object, Field::FirstName, rules, &mut violations);
    let last_name = check_name(object, Field::LastName, rules, &mut violations);
    let participation = check_participation(object, &mut violations);

    match (first_name, last_name, participation) {
        (Some(first_name), Some(last_name), Some(participation)) if violations.is_empty() => Ok(
            ParticipantFields::new(first_name, last_name, participation),
        ),
        _ => Err(FieldValidationError { violations }),
    }
}

/// Runs every name constraint; a missing or non-string value fails the
/// length and charset constraints as well as the type check.
fn check_name(
    object: &Map<String, Value>,
    field: Field,
    rules: FieldRules,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let label = field.label();
    let before = violations.len();

    let raw = object.get(field.key());
    let text = match raw {
        Some(Value::String(text)) => Some(text.as_str()),
        _ => None,
    };
    let chars = text.map(|text| text.chars().count());

    if text.is_none() {
        push(violations, field, Constraint::IsString, format!("{label} must be a string"));
    }
    if matches!(raw, None | Some(Value::Null)) || text == Some("") {
        push(violations, field, Constraint::IsNotEmpty, format!("{label} is required"));
    }
    if chars.map_or(true, |count| count < rules.name_min_chars) {
        push(
            violations,
            field,
            Constraint::MinLength,
            format!(
                "{label} must be at least {} characters long",
                rules.name_min_chars
            ),
        );
    }
    if chars.map_or(true, |count| count > rules.name_max_chars) {
        push(
            violations,
            field,
            Constraint::MaxLength,
            format!("{label} must be less than {} characters", rules.name_max_chars),
        );
    }
    if !text.is_some_and(|text| NAME_CHARSET_RE.is_match(text)) {
        push(
            violations,
            field,
            Constraint::Matches,
            format!("{label} can only contain letters and spaces"),
        );
    }

    text.filter(|_| violations.len() == before)
        .map(str::to_string)
}

/// Non-numeric values fail the bounds as well as the type check.
fn check_participation(
    object: &Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    let field = Field::Participation;
    let before = violations.len();
    let value = object.get(field.key()).and_then(Value::as_f64);

    if value.is_none() {
        push(
            violations,
            field,
            Constraint::IsNumber,
            "Participation must be a number".to_string(),
        );
    }
    if value.map_or(true, |value| value < PARTICIPATION_MIN) {
        push(
            violations,
            field,
            Constraint::Min,
            "Participation must be at least 0%".to_string(),
        );
    }
    if value.map_or(true, |value| value > PARTICIPATION_MAX) {
        push(
            violations,
            field,
            Constraint::Max,
            "Participation cannot exceed 100%".to_string(),
        );
    }

    value.filter(|_| violations.len() == before)
}

fn push(
    violations: &mut Vec<FieldViolation>,
    field: Field,
    constraint: Constraint,
    message: String,
) {
    violations.push(FieldViolation {
        field: Some(field),
        constraint,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::{validate_fields, Constraint, Field, FieldRules};
    use serde_json::{json, Value};

    #[test]
    fn accepts_boundary_values() {
        let fields = validate_fields(
            &json!({"firstName": "Jo", "lastName": "Do", "participation": 0}),
            FieldRules::CREATE,
        )
        .unwrap();
        assert_eq!(fields.first_name, "Jo");
        assert_eq!(fields.participation, 0.0);

        let long = "A".repeat(50);
        let fields = validate_fields(
            &json!({"firstName": long, "lastName": "B".repeat(50), "participation": 100}),
            FieldRules::CREATE,
        )
        .unwrap();
        assert_eq!(fields.participation, 100.0);
    }

    #[test]
    fn accepts_spaces_and_decimals() {
        let fields = validate_fields(
            &json!({"firstName": "John Paul", "lastName": "Doe", "participation": 50.5}),
            FieldRules::CREATE,
        )
        .unwrap();
        assert_eq!(fields.first_name, "John Paul");
        assert_eq!(fields.participation, 50.5);
    }

    #[test]
    fn empty_name_reports_required_and_related_constraints() {
        let err = validate_fields(
            &json!({"firstName": "", "lastName": "Doe", "participation": 50}),
            FieldRules::CREATE,
        )
        .unwrap_err();

        assert_eq!(err.fields(), vec![Field::FirstName]);
        assert!(err.has(Field::FirstName, Constraint::IsNotEmpty));
        assert!(err.messages().contains(&"First name is required".to_string()));
    }

    #[test]
    fn single_bound_violations_name_their_field() {
        let named = |first: Value, last: Value, participation: Value| {
            json!({"firstName": first, "lastName": last, "participation": participation})
        };
        let cases = [
            (
                named(json!("J"), json!("Doe"), json!(50)),
                Field::FirstName,
                Constraint::MinLength,
            ),
            (
                named(json!("A".repeat(51)), json!("Doe"), json!(50)),
                Field::FirstName,
                Constraint::MaxLength,
            ),
            (
                named(json!("John123"), json!("Doe"), json!(50)),
                Field::FirstName,
                Constraint::Matches,
            ),
            (
                named(json!("John"), json!("D"), json!(50)),
                Field::LastName,
                Constraint::MinLength,
            ),
            (
                named(json!("John"), json!("Doe123"), json!(50)),
                Field::LastName,
                Constraint::Matches,
            ),
            (
                named(json!("John"), json!("Doe"), json!(-1)),
                Field::Participation,
                Constraint::Min,
            ),
            (
                named(json!("John"), json!("Doe"), json!(101)),
                Field::Participation,
                Constraint::Max,
            ),
            (
                named(json!("John"), json!("Doe"), json!("not a number")),
                Field::Participation,
                Constraint::IsNumber,
            ),
        ];

        for (body, field, constraint) in cases {
            let err = validate_fields(&body, FieldRules::CREATE).unwrap_err();
            assert_eq!(err.fields(), vec![field], "body: {body}");
            assert!(err.has(field, constraint), "body: {body}");
        }
    }

    #[test]
    fn reports_all_fields_at_once() {
        let err = validate_fields(
            &json!({"firstName": "", "lastName": "", "participation": -1}),
            FieldRules::CREATE,
        )
        .unwrap_err();

        assert_eq!(
            err.fields(),
            vec![Field::FirstName, Field::LastName, Field::Participation]
        );
    }

    #[test]
    fn missing_fields_fail_every_constraint() {
        let err = validate_fields(&json!({}), FieldRules::CREATE).unwrap_err();

        assert_eq!(
            err.messages(),
            vec![
                "First name must be a string",
                "First name is required",
                "First name must be at least 2 characters long",
                "First name must be less than 50 characters",
                "First name can only contain letters and spaces",
                "Last name must be a string",
                "Last name is required",
                "Last name must be at least 2 characters long",
                "Last name must be less than 50 characters",
                "Last name can only contain letters and spaces",
                "Participation must be a number",
                "Participation must be at least 0%",
                "Participation cannot exceed 100%",
            ]
        );
    }

    #[test]
    fn wrongly_typed_name_fails_length_and_charset_but_not_required() {
        let err = validate_fields(
            &json!({"firstName": 12, "lastName": "Doe", "participation": 50}),
            FieldRules::CREATE,
        )
        .unwrap_err();

        assert_eq!(
            err.messages(),
            vec![
                "First name must be a string",
                "First name must be at least 2 characters long",
                "First name must be less than 50 characters",
                "First name can only contain letters and spaces",
            ]
        );
        assert!(!err.has(Field::FirstName, Constraint::IsNotEmpty));
    }

    #[test]
    fn string_participation_fails_type_and_both_bounds() {
        let err = validate_fields(
            &json!({"firstName": "John", "lastName": "Doe", "participation": "50"}),
            FieldRules::UPDATE,
        )
        .unwrap_err();

        assert_eq!(
            err.messages(),
            vec![
                "Participation must be a number",
                "Participation must be at least 0%",
                "Participation cannot exceed 100%",
            ]
        );
    }

    #[test]
    fn update_rules_cap_names_at_thirty_two() {
        let body = json!({"firstName": "A".repeat(33), "lastName": "Smith", "participation": 75});

        assert!(validate_fields(&body, FieldRules::CREATE).is_ok());
        let err = validate_fields(&body, FieldRules::UPDATE).unwrap_err();
        assert!(err
            .messages()
            .contains(&"First name must be less than 32 characters".to_string()));
    }

    #[test]
    fn non_object_body_is_invalid_format() {
        let err = validate_fields(&json!(null), FieldRules::CREATE).unwrap_err();
        assert_eq!(err.messages(), vec!["Invalid data format".to_string()]);
        assert!(err.fields().is_empty());
    }
}
