use crate::{Error, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_MIGRATIONS_DIRECTORY: &str = "migrations/up";
pub const DEFAULT_ROLLBACKS_DIRECTORY: &str = "migrations/down";

/// Where the migrations are read from and which database they run against.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Configuration {
    database_connection_string: String,
    migrations_directory: PathBuf,
    rollbacks_directory: PathBuf,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from the `DATABASE_DSN`, `MIGRATIONS_DIR` and
    /// `ROLLBACKS_DIR` environment variables. Directories fall back to
    /// `migrations/up` and `migrations/down`; a missing DSN is left empty
    /// and reported by [`Configuration::validate`].
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        Self::new()
            .with_database_connection_string(var("DATABASE_DSN", ""))
            .with_migrations_directory(var("MIGRATIONS_DIR", DEFAULT_MIGRATIONS_DIRECTORY))
            .with_rollbacks_directory(var("ROLLBACKS_DIR", DEFAULT_ROLLBACKS_DIRECTORY))
    }

    pub fn with_database_connection_string<S: Into<String>>(mut self, dsn: S) -> Self {
        self.database_connection_string = dsn.into();
        self
    }

    pub fn with_migrations_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.migrations_directory = path.into();
        self
    }

    pub fn with_rollbacks_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rollbacks_directory = path.into();
        self
    }

    pub fn database_connection_string(&self) -> &str {
        &self.database_connection_string
    }

    pub fn migrations_directory(&self) -> &Path {
        &self.migrations_directory
    }

    pub fn rollbacks_directory(&self) -> &Path {
        &self.rollbacks_directory
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_connection_string.is_empty()
            || self.migrations_directory.as_os_str().is_empty()
            || self.rollbacks_directory.as_os_str().is_empty()
        {
            return Err(Error::configuration_invalid());
        }

        Ok(())
    }
}
