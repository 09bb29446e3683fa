//! Participant repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `participants` storage.
//! - Provide the aggregate reads business rules depend on (total, name lookup).
//! - Offer an atomic write scope so rule checks and writes share one transaction.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Name lookups are case-insensitive, matching the unique index.
//! - List order is newest-created first.

use crate::db::DbError;
use crate::model::participant::{participation_in_bounds, Participant, ParticipantId};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PARTICIPANT_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    participation,
    created_at,
    updated_at
FROM participants";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for participant persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(ParticipantId),
    /// The store's unique name index rejected a write.
    DuplicateName,
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "participant not found: {id}"),
            Self::DuplicateName => write!(f, "participant name already exists"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted participant data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::DuplicateName | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::DuplicateName;
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for participant operations.
pub trait ParticipantRepository {
    fn insert_participant(&self, participant: &Participant) -> RepoResult<ParticipantId>;
    /// Full replace of name/participation fields and `updated_at`.
    fn update_participant(&self, participant: &Participant) -> RepoResult<()>;
    fn get_participant(&self, id: ParticipantId) -> RepoResult<Option<Participant>>;
    /// Lists every participant, newest-created first.
    fn list_participants(&self) -> RepoResult<Vec<Participant>>;
    fn delete_participant(&self, id: ParticipantId) -> RepoResult<()>;
    /// Sums `participation` over all rows, optionally skipping one record.
    fn participation_total(&self, exclude: Option<ParticipantId>) -> RepoResult<f64>;
    /// Finds a participant with the same name, ignoring ASCII case.
    fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
        exclude: Option<ParticipantId>,
    ) -> RepoResult<Option<Participant>>;
    /// Runs `scope` so that its reads and writes commit or roll back together.
    ///
    /// The scope's error rolls the whole write back.
    fn write_atomically<T, E, F>(&self, scope: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed participant repository.
pub struct SqliteParticipantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParticipantRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ParticipantRepository for SqliteParticipantRepository<'_> {
    fn insert_participant(&self, participant: &Participant) -> RepoResult<ParticipantId> {
        ensure_storable(participant)?;

        self.conn.execute(
            "INSERT INTO participants (
                id,
                first_name,
                last_name,
                participation,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                participant.id.to_string(),
                participant.first_name.as_str(),
                participant.last_name.as_str(),
                participant.participation,
                participant.created_at,
                participant.updated_at,
            ],
        )?;

        Ok(participant.id)
    }

    fn update_participant(&self, participant: &Participant) -> RepoResult<()> {
        ensure_storable(participant)?;

        let changed = self.conn.execute(
            "UPDATE participants
             SET
                first_name = ?1,
                last_name = ?2,
                participation = ?3,
                updated_at = ?4
             WHERE id = ?5;",
            params![
                participant.first_name.as_str(),
                participant.last_name.as_str(),
                participant.participation,
                participant.updated_at,
                participant.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(participant.id));
        }

        Ok(())
    }

    fn get_participant(&self, id: ParticipantId) -> RepoResult<Option<Participant>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARTICIPANT_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_participant_row(row)?));
        }

        Ok(None)
    }

    fn list_participants(&self) -> RepoResult<Vec<Participant>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTICIPANT_SELECT_SQL} ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut participants = Vec::new();

        while let Some(row) = rows.next()? {
            participants.push(parse_participant_row(row)?);
        }

        Ok(participants)
    }

    fn delete_participant(&self, id: ParticipantId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM participants WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn participation_total(&self, exclude: Option<ParticipantId>) -> RepoResult<f64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(participation), 0.0)
             FROM participants
             WHERE (?1 IS NULL OR id <> ?1);",
            [exclude.map(|id| id.to_string())],
            |row| row.get::<_, f64>(0),
        )?;
        Ok(total)
    }

    fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
        exclude: Option<ParticipantId>,
    ) -> RepoResult<Option<Participant>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTICIPANT_SELECT_SQL}
             WHERE first_name = ?1 COLLATE NOCASE
               AND last_name = ?2 COLLATE NOCASE
               AND (?3 IS NULL OR id <> ?3)
             LIMIT 1;"
        ))?;

        let row = stmt
            .query_row(
                params![first_name, last_name, exclude.map(|id| id.to_string())],
                |row| Ok(parse_participant_row(row)),
            )
            .optional()?;

        row.transpose()
    }

    fn write_atomically<T, E, F>(&self, scope: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        // IMMEDIATE takes the write lock before the scope's first read.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = scope(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn ensure_storable(participant: &Participant) -> RepoResult<()> {
    if !participation_in_bounds(participant.participation) {
        return Err(RepoError::InvalidData(format!(
            "participation `{}` is outside 0..=100",
            participant.participation
        )));
    }
    Ok(())
}

fn parse_participant_row(row: &Row<'_>) -> RepoResult<Participant> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in participants.id"))
    })?;

    let participation: f64 = row.get("participation")?;
    if !participation_in_bounds(participation) {
        return Err(RepoError::InvalidData(format!(
            "invalid participation `{participation}` in participants.participation"
        )));
    }

    Ok(Participant {
        id,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        participation,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == ErrorCode::ConstraintViolation
                && inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
