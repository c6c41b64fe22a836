use crate::migrate::history::{HistoryGateway, RanMigration};
use crate::{AsyncResult, Error, Migration, Result};
use chrono::Utc;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    journal: Vec<String>,
    ledger: Vec<RanMigration>,
    history_table_exists: bool,
    // Ledger as it was when the open transaction began.
    snapshot: Option<Vec<RanMigration>>,
    failures: Vec<(String, Option<String>)>,
}

impl MockState {
    fn record(&mut self, operation: &str, file_name: Option<&str>) -> Result<()> {
        let entry = match file_name {
            Some(file_name) => format!("{}:{}", operation, file_name),
            None => operation.to_string(),
        };
        self.journal.push(entry.clone());

        let failing = self.failures.iter().any(|(op, file)| {
            op == operation && (file.is_none() || file.as_deref() == file_name)
        });
        if failing {
            return Err(Error::from(format!("{} failed", entry)));
        }

        Ok(())
    }
}

/// In-memory gateway recording every call it receives.
///
/// Clones share the same state, so a test can keep one handle while the
/// migrator owns the other.
#[derive(Clone, Default)]
pub struct MockHistoryGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockHistoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the history table.
    pub fn with_ledger(self, rows: &[(i64, &str)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.history_table_exists = true;
            state.ledger = rows
                .iter()
                .map(|(id, file_name)| RanMigration::new(*id, *file_name, Utc::now()))
                .collect();
        }

        self
    }

    /// Makes `operation` fail, for any migration or only for `file_name`.
    pub fn with_failure(self, operation: &str, file_name: Option<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((operation.to_string(), file_name.map(String::from)));

        self
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Journal entries that touched migrations or the history rows.
    pub fn writes(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|entry| entry.contains(':'))
            .collect()
    }

    /// Ledger rows as `(id, file_name)`, sorted by id.
    pub fn ledger(&self) -> Vec<(i64, String)> {
        let mut ledger: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .ledger
            .iter()
            .map(|m| (m.id, m.file_name.clone()))
            .collect();
        ledger.sort();

        ledger
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().unwrap().snapshot.is_some()
    }
}

impl HistoryGateway for MockHistoryGateway {
    fn begin_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("begin_transaction", None)?;
            state.snapshot = Some(state.ledger.clone());

            Ok(())
        })
    }

    fn commit_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("commit_transaction", None)?;
            state.snapshot = None;

            Ok(())
        })
    }

    fn rollback_transaction(&self) -> AsyncResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("rollback_transaction", None)?;
            if let Some(snapshot) = state.snapshot.take() {
                state.ledger = snapshot;
            }

            Ok(())
        })
    }

    fn history_table_exists(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("history_table_exists", None)?;

            Ok(state.history_table_exists)
        })
    }

    fn try_create_history_table(&self) -> AsyncResult<'_, bool> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("try_create_history_table", None)?;
            let created = !state.history_table_exists;
            state.history_table_exists = true;

            Ok(created)
        })
    }

    fn ran_migrations(&self) -> AsyncResult<'_, Vec<RanMigration>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("ran_migrations", None)?;

            Ok(state.ledger.clone())
        })
    }

    fn run_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("run_migration", Some(migration.file_name()))?;
            migration.script()?;

            Ok(())
        })
    }

    fn rollback_migration<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("rollback_migration", Some(migration.file_name()))?;
            migration.rollback().script()?;

            Ok(())
        })
    }

    fn write_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("write_migration_history", Some(migration.file_name()))?;
            state.ledger.push(RanMigration::new(
                migration.id(),
                migration.file_name(),
                Utc::now(),
            ));

            Ok(())
        })
    }

    fn remove_migration_history<'a>(&'a self, migration: &'a Migration) -> AsyncResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.record("remove_migration_history", Some(migration.file_name()))?;
            state.ledger.retain(|m| m.id != migration.id());

            Ok(())
        })
    }
}
