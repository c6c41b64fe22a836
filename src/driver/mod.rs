use crate::migrate::history::HistoryGateway;
use crate::{ConnectionOptions, DatabaseType, Error, Result};

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Connects to the database described by `connection_options` and returns
/// the history gateway of its engine.
pub async fn create_gateway(
    connection_options: &ConnectionOptions,
) -> Result<Box<dyn HistoryGateway>> {
    let gateway = match connection_options.database_type {
        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => {
            Box::new(mysql::Driver::create(connection_options).await?) as Box<dyn HistoryGateway>
        }
        #[cfg(feature = "postgres")]
        DatabaseType::PostgreSQL => Box::new(postgres::Driver::create(connection_options).await?)
            as Box<dyn HistoryGateway>,
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => {
            Box::new(sqlite::Driver::create(connection_options)?) as Box<dyn HistoryGateway>
        }
        #[allow(unreachable_patterns)]
        database_type => return Err(Error::unknown_driver(&database_type.to_string())),
    };

    Ok(gateway)
}

pub async fn create_gateway_from_dsn(dsn: &str) -> Result<Box<dyn HistoryGateway>> {
    create_gateway(&ConnectionOptions::try_from(dsn)?).await
}

#[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
pub(crate) fn quote_identifier(identifier: &str, quote: char) -> String {
    let escaped = identifier.replace(quote, &format!("{}{}", quote, quote));
    format!("{}{}{}", quote, escaped, quote)
}

#[cfg(test)]
mod tests {
    #[cfg(any(feature = "mysql", feature = "postgres", feature = "sqlite"))]
    #[test]
    fn can_quote_identifiers() {
        use super::quote_identifier;

        assert_eq!(quote_identifier("migration_history", '"'), "\"migration_history\"");
        assert_eq!(quote_identifier("odd\"name", '"'), "\"odd\"\"name\"");
        assert_eq!(quote_identifier("history", '`'), "`history`");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn can_create_sqlite_gateway() {
        let gateway = super::create_gateway_from_dsn("sqlite://:memory:").await;
        assert!(gateway.is_ok());
    }
}
