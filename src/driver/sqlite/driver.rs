use crate::driver::quote_identifier;
use crate::migrate::history::{HistoryGateway, RanMigration};
use crate::sync::Mutex;
use crate::{AsyncResult, ConnectionOptions, DEFAULT_HISTORY_TABLE, Migration, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::fmt::{Debug, Formatter};

pub struct Driver {
    connection: Mutex<Connection>,
    table_name: String,
}

impl Debug for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver (SQLite)")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn create(options: &ConnectionOptions) -> Result<Self> {
        let connection = match options.file_path.as_deref() {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }?;

        Ok(Self::with_connection(connection).with_table_name(&options.history_table))
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(connection),
            table_name: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }

    pub fn with_table_name(mut self, table_name: &str) -> Self {
        self.table_name = table_name.to_string();
        self
    }

    fn table(&self) -> String {
        quote_identifier(&self.table_name, '"')
    }

    fn table_exists(&self, connection: &Connection) -> Result<bool> {
        let count = connection.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table_name],
            |row| row.get::<_, i64>(0),
        )?;

        Ok(count > 0)
    }

    fn fetch_ran_migrations(&self, connection: &Connection) -> Result<Vec<RanMigration>> {
        let mut statement =
            connection.prepare(&format!("SELECT id, file_name, ran FROM {}", self.table()))?;
        let rows = statement.query_map([], |row| {
            Ok(RanMigration::new(
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, DateTime<Utc>>(2)?,
            ))
        })?;

        let mut migrations = vec![];
        for row in rows {
            migrations.push(row?);
        }

        Ok(migrations)
    }
}

impl HistoryGateway for Driver {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            connection.execute_batch("BEGIN")?;

            Ok(())
        })
    }

    fn commit_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            connection.execute_batch("COMMIT")?;

            Ok(())
        })
    }

    fn rollback_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            if connection.is_autocommit() {
                // No open transaction.
                return Ok(());
            }

            connection.execute_batch("ROLLBACK")?;

            Ok(())
        })
    }

    fn history_table_exists(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            self.table_exists(&connection)
        })
    }

    fn try_create_history_table(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            if self.table_exists(&connection)? {
                return Ok(false);
            }

            connection.execute_batch(&format!(
                "CREATE TABLE {} (id BIGINT NOT NULL PRIMARY KEY, file_name VARCHAR(255) NOT NULL, ran TIMESTAMP NOT NULL)",
                self.table()
            ))?;

            Ok(true)
        })
    }

    fn ran_migrations(&self) -> AsyncResult<'_, Vec<RanMigration>> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            self.fetch_ran_migrations(&connection)
        })
    }

    fn run_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let script = migration.script()?;
            let connection = self.connection.lock().await;
            connection.execute_batch(script)?;

            Ok(())
        })
    }

    fn rollback_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let script = migration.rollback().script()?;
            let connection = self.connection.lock().await;
            connection.execute_batch(script)?;

            Ok(())
        })
    }

    fn write_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            connection.execute(
                &format!(
                    "INSERT INTO {} (id, file_name, ran) VALUES (?1, ?2, ?3)",
                    self.table()
                ),
                params![migration.id(), migration.file_name(), Utc::now()],
            )?;

            Ok(())
        })
    }

    fn remove_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let connection = self.connection.lock().await;
            connection.execute(
                &format!("DELETE FROM {} WHERE id = ?1", self.table()),
                params![migration.id()],
            )?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Driver;
    use crate::migrate::history::HistoryGateway;
    use crate::{ConnectionOptions, Migration, Rollback};
    use tokio_test::{assert_err, assert_ok};

    fn gateway() -> Driver {
        Driver::create(&ConnectionOptions::try_from("sqlite://:memory:").unwrap()).unwrap()
    }

    fn migration(id: i64, up: &str, down: &str) -> Migration {
        Migration::new(
            id,
            format!("{}_test_up.sql", id),
            up.as_bytes().to_vec(),
            Rollback::new(format!("{}_test_down.sql", id), down.as_bytes().to_vec()),
        )
    }

    #[tokio::test]
    async fn creates_history_table_once() {
        let gateway = gateway();

        assert!(!gateway.history_table_exists().await.unwrap());
        assert!(gateway.try_create_history_table().await.unwrap());
        assert!(gateway.history_table_exists().await.unwrap());
        assert!(!gateway.try_create_history_table().await.unwrap());
        assert!(gateway.ran_migrations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn can_use_custom_table_name() {
        let gateway = gateway().with_table_name("schema history");
        gateway.try_create_history_table().await.unwrap();

        let m = migration(1, "SELECT 1;", "SELECT 1;");
        gateway.write_migration_history(&m).await.unwrap();

        let ran = gateway.ran_migrations().await.unwrap();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].file_name, "1_test_up.sql");
    }

    #[tokio::test]
    async fn committed_work_survives_release() {
        let gateway = gateway();
        gateway.try_create_history_table().await.unwrap();
        let m = migration(1, "CREATE TABLE t (id INTEGER);", "DROP TABLE t;");

        gateway.begin_transaction().await.unwrap();
        gateway.run_migration(&m).await.unwrap();
        gateway.write_migration_history(&m).await.unwrap();
        gateway.commit_transaction().await.unwrap();
        gateway.rollback_transaction().await.unwrap();

        let ran = gateway.ran_migrations().await.unwrap();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].id, 1);
    }

    #[tokio::test]
    async fn rollback_discards_uncommitted_work() {
        let gateway = gateway();
        gateway.try_create_history_table().await.unwrap();
        let m = migration(1, "CREATE TABLE t (id INTEGER);", "DROP TABLE t;");

        gateway.begin_transaction().await.unwrap();
        gateway.run_migration(&m).await.unwrap();
        gateway.write_migration_history(&m).await.unwrap();
        gateway.rollback_transaction().await.unwrap();

        assert!(gateway.ran_migrations().await.unwrap().is_empty());

        // Table `t` was never created: its rollback script cannot run.
        assert_err!(gateway.rollback_migration(&m).await);
    }

    #[tokio::test]
    async fn rollback_without_transaction_is_a_noop() {
        let gateway = gateway();
        assert_ok!(gateway.rollback_transaction().await);
    }

    #[tokio::test]
    async fn removes_history_rows() {
        let gateway = gateway();
        gateway.try_create_history_table().await.unwrap();
        let first = migration(1, "SELECT 1;", "SELECT 1;");
        let second = migration(2, "SELECT 1;", "SELECT 1;");

        gateway.write_migration_history(&first).await.unwrap();
        gateway.write_migration_history(&second).await.unwrap();
        gateway.remove_migration_history(&second).await.unwrap();

        let ran = gateway.ran_migrations().await.unwrap();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].id, 1);
    }

    #[tokio::test]
    async fn invalid_utf8_script_is_rejected() {
        let gateway = gateway();
        let m = Migration::new(
            1,
            "1_binary_up.sql",
            vec![0xff, 0xfe],
            Rollback::new("1_binary_down.sql", vec![]),
        );

        let error = gateway.run_migration(&m).await.unwrap_err();
        assert_eq!(error.kind, crate::error::ErrorKind::InvalidScript);
    }
}
