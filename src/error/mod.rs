use std::backtrace::Backtrace;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    ConfigurationInvalid = 1,
    ServicerNotInitialised = 2,
    UnknownDriver = 3,

    SearchingDirectory = 101,
    NoMigrationsFound = 102,
    NoRollbacksFound = 103,
    MissingRollbackFile = 104,
    InvalidMigrationIdentifier = 105,
    DuplicateMigrationIdentifier = 106,
    ReadingFile = 107,

    CreatingHistoryTable = 201,
    RetrievingLedger = 202,
    CreatingTransaction = 203,
    ExecutingMigration = 204,
    CommittingTransaction = 205,
    MigrationNotFound = 206,
    NotLatestMigration = 207,
    ExecutingRollback = 208,
    InvalidScript = 209,

    UnknownError = -1,
}

pub struct Error {
    pub kind: ErrorKind,
    subject: Option<String>,
    inner: Box<dyn std::error::Error + Send + Sync>,
    backtrace: Backtrace,
}

/// Adapter exposing an [`Error`] through the standard error trait, so it can
/// be carried as the cause of another error.
pub struct StdError(Error);

impl Display for StdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for StdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for StdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.inner.as_ref())
    }
}

impl From<Error> for StdError {
    fn from(e: Error) -> Self {
        StdError(e)
    }
}

impl Error {
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error {
            kind,
            subject: None,
            inner: error.into(),
            backtrace: Backtrace::capture(),
        }
    }

    fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    fn wrap(kind: ErrorKind, message: String, cause: Error) -> Self {
        Error {
            kind,
            subject: cause.subject.clone(),
            inner: Box::new(Wrapped {
                message,
                cause: StdError(cause),
            }),
            backtrace: Backtrace::capture(),
        }
    }

    /// The path, file name or pairing key this error refers to, if any.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn configuration_invalid() -> Self {
        Self::new(
            ErrorKind::ConfigurationInvalid,
            "Configuration of the migrator is invalid: connection string, migrations directory and rollbacks directory are required",
        )
    }

    pub fn servicer_not_initialised() -> Self {
        Self::new(
            ErrorKind::ServicerNotInitialised,
            "No history gateway has been set on the migrator",
        )
    }

    pub fn unknown_driver(scheme: &str) -> Self {
        Self::new(
            ErrorKind::UnknownDriver,
            format!("Unknown database driver \"{}\"", scheme),
        )
        .with_subject(scheme)
    }

    pub fn searching_directory<E>(path: &Path, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let path = path.display().to_string();
        Self::new(
            ErrorKind::SearchingDirectory,
            format!("Error while searching directory \"{}\": {}", path, error),
        )
        .with_subject(path)
    }

    pub fn no_migrations_found() -> Self {
        Self::new(
            ErrorKind::NoMigrationsFound,
            "No migrations found in the migrations directory",
        )
    }

    pub fn no_rollbacks_found() -> Self {
        Self::new(
            ErrorKind::NoRollbacksFound,
            "No rollbacks found in the rollbacks directory",
        )
    }

    pub fn missing_rollback_file(pairing_key: &str) -> Self {
        Self::new(
            ErrorKind::MissingRollbackFile,
            format!("No rollback file found for migration \"{}\"", pairing_key),
        )
        .with_subject(pairing_key)
    }

    pub fn invalid_migration_identifier<E>(file_name: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(
            ErrorKind::InvalidMigrationIdentifier,
            format!(
                "Migration \"{}\" has an invalid identifier: {}",
                file_name, error
            ),
        )
        .with_subject(file_name)
    }

    pub fn duplicate_migration_identifier(id: i64, file_name: &str, other: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateMigrationIdentifier,
            format!(
                "Migration identifier {} is used by both \"{}\" and \"{}\"",
                id, other, file_name
            ),
        )
        .with_subject(file_name)
    }

    pub fn reading_file<E>(file_name: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(
            ErrorKind::ReadingFile,
            format!("Error while reading file \"{}\": {}", file_name, error),
        )
        .with_subject(file_name)
    }

    pub fn creating_history_table(cause: Error) -> Self {
        Self::wrap(
            ErrorKind::CreatingHistoryTable,
            "Error while creating the migration history table".to_string(),
            cause,
        )
    }

    pub fn retrieving_ledger(cause: Error) -> Self {
        Self::wrap(
            ErrorKind::RetrievingLedger,
            "Error while retrieving ran migrations".to_string(),
            cause,
        )
    }

    pub fn creating_transaction(cause: Error) -> Self {
        Self::wrap(
            ErrorKind::CreatingTransaction,
            "Error while creating a transaction".to_string(),
            cause,
        )
    }

    pub fn executing_migration(file_name: &str, cause: Error) -> Self {
        Self::wrap(
            ErrorKind::ExecutingMigration,
            format!("Error while executing migration \"{}\"", file_name),
            cause,
        )
        .with_subject(file_name)
    }

    pub fn committing_transaction(cause: Error) -> Self {
        Self::wrap(
            ErrorKind::CommittingTransaction,
            "Error while committing the transaction".to_string(),
            cause,
        )
    }

    pub fn migration_not_found(file_name: &str) -> Self {
        Self::new(
            ErrorKind::MigrationNotFound,
            format!("Migration \"{}\" could not be found", file_name),
        )
        .with_subject(file_name)
    }

    pub fn not_latest_migration(file_name: &str, latest: Option<i64>) -> Self {
        let message = match latest {
            Some(latest) => format!(
                "Migration \"{}\" is not the latest ran migration (latest is {})",
                file_name, latest
            ),
            None => format!(
                "Migration \"{}\" cannot be rolled back: no migration has been ran",
                file_name
            ),
        };

        Self::new(ErrorKind::NotLatestMigration, message).with_subject(file_name)
    }

    pub fn executing_rollback(file_name: &str, cause: Error) -> Self {
        Self::wrap(
            ErrorKind::ExecutingRollback,
            format!("Error while rolling back migration \"{}\"", file_name),
            cause,
        )
        .with_subject(file_name)
    }

    pub fn invalid_script<E>(file_name: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(
            ErrorKind::InvalidScript,
            format!("Script \"{}\" is not valid UTF-8: {}", file_name, error),
        )
        .with_subject(file_name)
    }
}

struct Wrapped {
    message: String,
    cause: StdError,
}

impl Display for Wrapped {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message, self.cause)
    }
}

impl Debug for Wrapped {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Wrapped {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: {}\nBacktrace:\n{}",
            self.kind, self.inner, self.backtrace
        )
    }
}

impl<T> From<T> for Error
where
    T: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn from(err: T) -> Self {
        Error::new(ErrorKind::UnknownError, err)
    }
}
