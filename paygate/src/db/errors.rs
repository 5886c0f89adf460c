use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// A failure that may succeed on retry: lost connections, resource exhaustion, operator
    /// intervention, serialization failures and deadlocks
    #[error("Transient database error (sqlstate {code:?}): {source}")]
    Transient {
        code: Option<String>,
        #[source]
        source: sqlx::Error,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Whether retrying the statement may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Transient { .. })
    }
}

/// Whether a Postgres SQLSTATE marks a retryable failure.
///
/// - `08xxx` connection exceptions
/// - `53xxx` insufficient resources
/// - `57Pxx` operator intervention (admin shutdown, crash shutdown, cannot connect now)
/// - `40001` serialization failure, `40P01` deadlock detected
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("53") || code.starts_with("57P") || code == "40001" || code == "40P01"
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DbError::Transient { code: None, source: err },
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                if code.as_deref().is_some_and(is_transient_sqlstate) {
                    DbError::Transient { code, source: err }
                } else if db_err.is_unique_violation() {
                    DbError::UniqueViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
