mod execution_result;
pub mod history;
pub mod resolver;
mod transaction;

use crate::configuration::Configuration;
use crate::migrate::history::{HistoryGateway, RanMigrationList};
use crate::migrate::transaction::Transaction;
use crate::{Error, Result};
pub use execution_result::ExecutionResult;
use log::{debug, error, info};
use std::fmt::{Debug, Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Up => "up",
                Self::Down => "down",
            }
        )
    }
}

/// The undo script of a [`Migration`].
#[derive(Clone, Eq, PartialEq)]
pub struct Rollback {
    file_name: String,
    contents: Vec<u8>,
}

impl Rollback {
    pub fn new<S: Into<String>>(file_name: S, contents: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn script(&self) -> Result<&str> {
        script_text(&self.file_name, &self.contents)
    }
}

/// A change script together with the undo script that reverses it.
#[derive(Clone, Eq, PartialEq)]
pub struct Migration {
    id: i64,
    file_name: String,
    contents: Vec<u8>,
    rollback: Rollback,
}

impl Migration {
    pub fn new<S: Into<String>>(id: i64, file_name: S, contents: Vec<u8>, rollback: Rollback) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            contents,
            rollback,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn rollback(&self) -> &Rollback {
        &self.rollback
    }

    pub fn script(&self) -> Result<&str> {
        script_text(&self.file_name, &self.contents)
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("rollback", &self.rollback.file_name)
            .finish_non_exhaustive()
    }
}

impl Debug for Rollback {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollback")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

fn script_text<'a>(file_name: &str, contents: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(contents).map_err(|e| Error::invalid_script(file_name, e))
}

/// Applies pending migrations in identifier order, or reverts the latest one.
///
/// One migrator must run at a time against a given database: there is no
/// locking between processes.
pub struct Migrator {
    configuration: Configuration,
    history_gateway: Option<Box<dyn HistoryGateway>>,
}

impl Migrator {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            history_gateway: None,
        }
    }

    pub fn with_history_gateway(mut self, history_gateway: Box<dyn HistoryGateway>) -> Self {
        let _ = self.history_gateway.insert(history_gateway);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Runs every discovered migration not yet recorded in the history table,
    /// in ascending identifier order, inside a single transaction.
    pub async fn migrate(&self) -> Result<ExecutionResult> {
        let gateway = self.get_history_gateway()?;
        let (migrations, ran_migrations) = self.load(gateway).await?;

        let pending = pending_migrations(&migrations, &ran_migrations);
        let skipped = migrations.len() - pending.len();
        match migrations.last() {
            Some(last) => {
                info!(target: "creed::migrate", "Migrating {} to {}", Direction::Up, last.id())
            }
            None => info!(target: "creed::migrate", "No migration found."),
        }

        let global_start = chrono::Utc::now();
        let transaction = Transaction::begin(gateway).await?;
        let executed = transaction
            .run(async {
                let mut executed = vec![];
                for migration in pending {
                    info!(target: "creed::migrate", "++ migrating {} ({})", migration.id(), migration.file_name());

                    let applied = match gateway.run_migration(migration).await {
                        Ok(_) => gateway.write_migration_history(migration).await,
                        Err(e) => Err(e),
                    };

                    if let Err(e) = applied {
                        error!(target: "creed::migrate", "Error while executing migration {}: {}", migration.file_name(), e);
                        return Err(Error::executing_migration(migration.file_name(), e));
                    }

                    executed.push(migration.id());
                }

                gateway
                    .commit_transaction()
                    .await
                    .map_err(Error::committing_transaction)?;

                Ok(executed)
            })
            .await?;

        let total_time = chrono::Utc::now() - global_start;
        if executed.is_empty() {
            info!(target: "creed::migrate", "No migration to execute.");
        } else {
            info!(target: "creed::migrate", "Migrated database in {}ms, {} migrations executed, {} skipped", total_time.num_milliseconds(), executed.len(), skipped);
        }

        Ok(ExecutionResult {
            direction: Direction::Up,
            executed,
            skipped,
            execution_time: total_time.num_milliseconds(),
        })
    }

    /// Reverts the migration whose change script is named `file_name`.
    ///
    /// Only the latest ran migration (highest identifier in the history
    /// table) can be reverted: rolling back several migrations means calling
    /// this once per migration, newest first.
    pub async fn rollback(&self, file_name: &str) -> Result<ExecutionResult> {
        let gateway = self.get_history_gateway()?;
        let (migrations, ran_migrations) = self.load(gateway).await?;

        let migration = migrations
            .iter()
            .find(|m| m.file_name() == file_name)
            .ok_or_else(|| Error::migration_not_found(file_name))?;

        let latest = ran_migrations.latest_id();
        if latest != Some(migration.id()) {
            return Err(Error::not_latest_migration(file_name, latest));
        }

        info!(target: "creed::migrate", "Migrating {} to {}", Direction::Down, migration.id());

        let global_start = chrono::Utc::now();
        let transaction = Transaction::begin(gateway).await?;
        transaction
            .run(async {
                info!(target: "creed::migrate", "-- reverting {} ({})", migration.id(), migration.rollback().file_name());

                let reverted = match gateway.rollback_migration(migration).await {
                    Ok(_) => gateway.remove_migration_history(migration).await,
                    Err(e) => Err(e),
                };

                if let Err(e) = reverted {
                    error!(target: "creed::migrate", "Error while rolling back migration {}: {}", migration.file_name(), e);
                    return Err(Error::executing_rollback(migration.file_name(), e));
                }

                gateway
                    .commit_transaction()
                    .await
                    .map_err(Error::committing_transaction)
            })
            .await?;

        let total_time = chrono::Utc::now() - global_start;
        info!(target: "creed::migrate", "Reverted migration {} in {}ms", migration.id(), total_time.num_milliseconds());

        Ok(ExecutionResult {
            direction: Direction::Down,
            executed: vec![migration.id()],
            skipped: 0,
            execution_time: total_time.num_milliseconds(),
        })
    }

    /// Migrations that [`Migrator::migrate`] would run, in execution order.
    ///
    /// Writes nothing: no transaction is opened and a missing history table
    /// is read as an empty ledger instead of being created.
    pub async fn pending(&self) -> Result<Vec<Migration>> {
        let gateway = self.get_history_gateway()?;
        let has_history = gateway
            .history_table_exists()
            .await
            .map_err(Error::retrieving_ledger)?;

        let migrations = self.discover().await?;
        let ran_migrations = if has_history {
            read_ledger(gateway).await?
        } else {
            RanMigrationList::default()
        };

        Ok(pending_migrations(&migrations, &ran_migrations)
            .into_iter()
            .cloned()
            .collect())
    }

    fn get_history_gateway(&self) -> Result<&dyn HistoryGateway> {
        self.configuration.validate()?;
        self.history_gateway
            .as_deref()
            .ok_or_else(Error::servicer_not_initialised)
    }

    /// Ensures the history table, discovers the migrations and reads the
    /// ledger. Returned migrations are sorted by identifier.
    async fn load(&self, gateway: &dyn HistoryGateway) -> Result<(Vec<Migration>, RanMigrationList)> {
        if gateway
            .try_create_history_table()
            .await
            .map_err(Error::creating_history_table)?
        {
            info!(target: "creed::migrate", "Created migration history table");
        }

        let migrations = self.discover().await?;
        let ran_migrations = read_ledger(gateway).await?;

        Ok((migrations, ran_migrations))
    }

    async fn discover(&self) -> Result<Vec<Migration>> {
        let mut migrations = resolver::discover(
            self.configuration.migrations_directory(),
            self.configuration.rollbacks_directory(),
        )
        .await?;

        migrations.sort_by_key(|m| m.id());
        Ok(migrations)
    }
}

async fn read_ledger(gateway: &dyn HistoryGateway) -> Result<RanMigrationList> {
    let ran_migrations = gateway
        .ran_migrations()
        .await
        .map_err(Error::retrieving_ledger)?;

    Ok(RanMigrationList::from(ran_migrations))
}

fn pending_migrations<'m>(
    migrations: &'m [Migration],
    ran_migrations: &RanMigrationList,
) -> Vec<&'m Migration> {
    migrations
        .iter()
        .filter(|m| {
            let has_ran = ran_migrations.has_file(m.file_name());
            if has_ran {
                debug!(target: "creed::migrate", "Skipping {}: already ran", m.file_name());
            }

            !has_ran
        })
        .collect()
}
