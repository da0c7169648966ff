use crate::application::repos::RepoError;

/// Postgres SQLSTATE codes the repositories distinguish.
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const INTEGRITY_CLASS: &str = "23";
    pub const QUERY_CANCELED: &str = "57014";
}

/// Translate driver errors into [`RepoError`]. Unique violations keep their
/// constraint name so callers can tell a dedupe collision from other conflicts.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            match code.as_str() {
                sqlstate::UNIQUE_VIOLATION => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                sqlstate::FOREIGN_KEY_VIOLATION | sqlstate::INVALID_TEXT_REPRESENTATION => {
                    RepoError::InvalidInput {
                        message: db.message().to_string(),
                    }
                }
                sqlstate::QUERY_CANCELED => RepoError::Timeout,
                other if other.starts_with(sqlstate::INTEGRITY_CLASS) => RepoError::Integrity {
                    message: db.message().to_string(),
                },
                _ => RepoError::from_persistence(db),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
