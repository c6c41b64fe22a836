use crate::driver::quote_identifier;
use crate::migrate::history::{HistoryGateway, RanMigration};
use crate::sync::Mutex;
use crate::{AsyncResult, ConnectionOptions, Migration, Result};
use chrono::NaiveDateTime;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

const RAN_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// MySQL / MariaDB history gateway.
///
/// DDL statements cause an implicit commit on these engines: a failing batch
/// can leave the schema changes of earlier scripts in place even though
/// their history rows are rolled back.
pub struct Driver {
    connection: Mutex<Conn>,
    in_transaction: AtomicBool,
    table_name: String,
}

impl Debug for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver (MySQL)")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub async fn create(options: &ConnectionOptions) -> Result<Self> {
        let opts_builder = OptsBuilder::default()
            .user(Some(options.username.as_deref().unwrap_or("root")))
            .pass(options.password.clone())
            .ip_or_hostname(options.host.as_deref().unwrap_or("localhost"))
            .tcp_port(options.port.unwrap_or(3306))
            .db_name(options.database_name.clone());

        Ok(Self {
            connection: Mutex::new(Conn::new(Opts::from(opts_builder)).await?),
            in_transaction: AtomicBool::new(false),
            table_name: options.history_table.clone(),
        })
    }

    pub fn with_table_name(mut self, table_name: &str) -> Self {
        self.table_name = table_name.to_string();
        self
    }

    fn table(&self) -> String {
        quote_identifier(&self.table_name, '`')
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut connection = self.connection.lock().await;
        connection.query_drop(sql).await?;

        Ok(())
    }
}

impl HistoryGateway for Driver {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            self.execute("START TRANSACTION").await?;
            self.in_transaction.store(true, Ordering::SeqCst);

            Ok(())
        })
    }

    fn commit_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            self.execute("COMMIT").await?;
            self.in_transaction.store(false, Ordering::SeqCst);

            Ok(())
        })
    }

    fn rollback_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            if !self.in_transaction.swap(false, Ordering::SeqCst) {
                return Ok(());
            }

            self.execute("ROLLBACK").await
        })
    }

    fn history_table_exists(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            let mut connection = self.connection.lock().await;
            let count: Option<i64> = connection
                .exec_first(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
                    (self.table_name.as_str(),),
                )
                .await?;

            Ok(count.unwrap_or(0) > 0)
        })
    }

    fn try_create_history_table(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            if self.history_table_exists().await? {
                return Ok(false);
            }

            let sql = format!(
                "CREATE TABLE {} (id BIGINT NOT NULL PRIMARY KEY, file_name VARCHAR(255) NOT NULL, ran DATETIME(6) NOT NULL)",
                self.table()
            );
            self.execute(&sql).await?;

            Ok(true)
        })
    }

    fn ran_migrations(&self) -> AsyncResult<'_, Vec<RanMigration>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT id, file_name, DATE_FORMAT(ran, '%Y-%m-%d %H:%i:%s.%f') FROM {}",
                self.table()
            );
            let rows: Vec<(i64, String, String)> = {
                let mut connection = self.connection.lock().await;
                connection.query(sql.as_str()).await?
            };

            let mut migrations = vec![];
            for (id, file_name, ran) in rows {
                let ran = NaiveDateTime::parse_from_str(&ran, RAN_FORMAT)?.and_utc();
                migrations.push(RanMigration::new(id, file_name, ran));
            }

            Ok(migrations)
        })
    }

    fn run_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move { self.execute(migration.script()?).await })
    }

    fn rollback_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move { self.execute(migration.rollback().script()?).await })
    }

    fn write_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO {} (id, file_name, ran) VALUES (?, ?, UTC_TIMESTAMP(6))",
                self.table()
            );
            let mut connection = self.connection.lock().await;
            connection
                .exec_drop(sql.as_str(), (migration.id(), migration.file_name()))
                .await?;

            Ok(())
        })
    }

    fn remove_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let sql = format!("DELETE FROM {} WHERE id = ?", self.table());
            let mut connection = self.connection.lock().await;
            connection
                .exec_drop(sql.as_str(), (migration.id(),))
                .await?;

            Ok(())
        })
    }
}
