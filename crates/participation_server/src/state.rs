use std::sync::{Arc, Mutex};

use participation_core::{
    db::{open_db_url, DbError},
    ParticipantService, ParticipantServiceError, SqliteParticipantRepository,
};
use rusqlite::Connection;

use crate::{
    config::Config,
    error::{ApiError, Operation},
    middleware::rate_limit::FixedWindowLimiter,
};

pub type Service<'conn> = ParticipantService<SqliteParticipantRepository<'conn>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Mutex<Connection>>,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    /// Opens and migrates the configured database.
    pub fn new(config: Config) -> Result<Self, DbError> {
        let conn = open_db_url(&config.database_url)?;
        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(conn)),
            limiter: Arc::new(FixedWindowLimiter::new()),
        })
    }

    /// Runs a service call on the blocking pool against the shared connection.
    pub async fn run<T, F>(&self, operation: Operation, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Service<'_>) -> Result<T, ParticipantServiceError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let joined = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| ApiError::Internal {
                public: operation.failure_message(),
                detail: "database mutex poisoned".to_string(),
            })?;
            let service = ParticipantService::new(SqliteParticipantRepository::new(&conn));
            work(&service).map_err(|err| ApiError::from_service(operation, err))
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(err) => Err(ApiError::Internal {
                public: operation.failure_message(),
                detail: format!("{} task failed: {err}", operation.name()),
            }),
        }
    }
}
