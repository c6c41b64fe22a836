mod configuration;
mod connection_options;
pub mod driver;
pub mod error;
pub mod migrate;
mod result;
mod sync;

#[cfg(test)]
mod tests;

pub use configuration::{
    Configuration, DEFAULT_MIGRATIONS_DIRECTORY, DEFAULT_ROLLBACKS_DIRECTORY,
};
pub use connection_options::{ConnectionOptions, DatabaseType, DEFAULT_HISTORY_TABLE};
pub use error::Error;
pub use migrate::history::{HistoryGateway, RanMigration};
pub use migrate::{Direction, ExecutionResult, Migration, Migrator, Rollback};
pub use result::{AsyncResult, Result};
