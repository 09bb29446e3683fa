use participation_core::db::open_db_in_memory;
use participation_core::{
    validate_total, validate_unique, Participant, ParticipantFields, ParticipantRepository,
    SqliteParticipantRepository,
};

fn seed(
    repo: &SqliteParticipantRepository<'_>,
    first: &str,
    last: &str,
    value: f64,
) -> Participant {
    let participant = Participant::new(ParticipantFields::new(first, last, value), 1);
    repo.insert_participant(&participant).unwrap();
    participant
}

#[test]
fn total_is_valid_iff_sum_plus_candidate_within_hundred() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParticipantRepository::new(&conn);
    seed(&repo, "Ann", "Lee", 30.0);
    seed(&repo, "Bob", "Ray", 20.0);

    let cases = [
        (0.0, true),
        (49.5, true),
        (50.0, true),
        (50.5, false),
        (51.0, false),
    ];
    for (candidate, expected) in cases {
        let check = validate_total(&repo, candidate, None).unwrap();
        assert_eq!(check.valid, expected, "candidate {candidate}");
        assert_eq!(check.current_total, 50.0);
        assert_eq!(check.new_total, 50.0 + candidate);
        assert_eq!(check.error.is_some(), !expected);
    }
}

#[test]
fn total_rejection_message_reports_all_numbers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParticipantRepository::new(&conn);
    seed(&repo, "Ann", "Lee", 30.0);
    seed(&repo, "Bob", "Ray", 20.0);

    let check = validate_total(&repo, 51.0, None).unwrap();
    assert_eq!(
        check.error.as_deref(),
        Some("Total participation would be 101%, which exceeds 100%. Current total is 50%, so the maximum allowed participation is 50%.")
    );
}

#[test]
fn total_excludes_record_under_edit() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParticipantRepository::new(&conn);
    let edited = seed(&repo, "Ann", "Lee", 80.0);
    seed(&repo, "Bob", "Ray", 20.0);

    assert!(!validate_total(&repo, 90.0, None).unwrap().valid);
    let check = validate_total(&repo, 80.0, Some(edited.id)).unwrap();
    assert!(check.valid);
    assert_eq!(check.current_total, 20.0);
}

#[test]
fn unique_is_invalid_iff_other_record_shares_name() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParticipantRepository::new(&conn);
    let john = seed(&repo, "John", "Doe", 10.0);

    let check = validate_unique(&repo, "John", "Doe", None).unwrap();
    assert!(!check.valid);
    assert_eq!(
        check.error.as_deref(),
        Some("A participant with the name \"John Doe\" already exists.")
    );

    assert!(!validate_unique(&repo, "john", "doe", None).unwrap().valid);
    assert!(validate_unique(&repo, "John", "Doe", Some(john.id)).unwrap().valid);
    assert!(validate_unique(&repo, "John", "Smith", None).unwrap().valid);
}
