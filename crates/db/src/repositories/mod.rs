use thiserror::Error;

use repairdesk_core::ports::PortError;

pub mod customer;
pub mod event;
pub mod memory;
pub mod settings;
pub mod work_order;

pub use customer::SqlCustomerRepository;
pub use event::SqlWorkOrderEventLog;
pub use memory::{
    InMemoryCustomerDirectory, InMemoryFileStore, InMemorySettingsSource, InMemoryWorkOrderEventLog,
    InMemoryWorkOrderStore,
};
pub use settings::{SqlSettingsSource, GLOBAL_SETTINGS_KEY, WIZARD_CONFIG_KEY};
pub use work_order::SqlWorkOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for PortError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => PortError::Storage(error.to_string()),
            RepositoryError::Decode(message) => PortError::InvalidPayload(message),
        }
    }
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

#[cfg(test)]
pub(crate) async fn migrated_pool() -> crate::DbPool {
    let pool = crate::connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    crate::migrations::run_pending(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use repairdesk_core::ports::PortError;

    use super::RepositoryError;

    #[test]
    fn repository_errors_map_to_port_errors() {
        let decode = PortError::from(RepositoryError::Decode("bad json".to_string()));
        assert_eq!(decode, PortError::InvalidPayload("bad json".to_string()));

        let database = PortError::from(RepositoryError::Database(sqlx::Error::RowNotFound));
        assert!(matches!(database, PortError::Storage(_)));
    }
}
