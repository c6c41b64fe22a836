mod ran_migration;

use crate::AsyncResult;
use crate::migrate::Migration;
pub use ran_migration::{RanMigration, RanMigrationList};

/// Database-side collaborator of the [`Migrator`](crate::migrate::Migrator):
/// owns the connection, the transaction and the migration history table.
///
/// Implementations must accept [`HistoryGateway::rollback_transaction`] when
/// no transaction is open (never begun, or already committed or rolled back)
/// and treat it as a no-op: the migrator always issues it when releasing a
/// transaction.
pub trait HistoryGateway {
    fn begin_transaction(&self) -> AsyncResult<'_, ()>;
    fn commit_transaction(&self) -> AsyncResult<'_, ()>;
    fn rollback_transaction(&self) -> AsyncResult<'_, ()>;

    /// Probes for the history table without creating it.
    fn history_table_exists(&self) -> AsyncResult<'_, bool>;
    /// Creates the history table if missing. Returns `true` if it had to be created.
    fn try_create_history_table(&self) -> AsyncResult<'_, bool>;
    fn ran_migrations(&self) -> AsyncResult<'_, Vec<RanMigration>>;

    fn run_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()>;
    /// Executes the undo script paired with `migration`.
    fn rollback_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()>;

    fn write_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()>;
    fn remove_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()>;
}
