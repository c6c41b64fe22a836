use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use url::Url;

pub const DEFAULT_HISTORY_TABLE: &str = "migration_history";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatabaseType {
    MySQL,
    PostgreSQL,
    SQLite,
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::MySQL => "mysql",
                Self::PostgreSQL => "psql",
                Self::SQLite => "sqlite",
            }
        )
    }
}

#[derive(Clone)]
pub struct ConnectionOptions {
    pub database_type: DatabaseType,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// SQLite only: `None` opens an in-memory database.
    pub file_path: Option<String>,
    pub database_name: Option<String>,
    pub application_name: Option<String>,
    pub history_table: String,
}

impl ConnectionOptions {
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            username: None,
            password: None,
            host: None,
            port: None,
            file_path: None,
            database_name: None,
            application_name: None,
            history_table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_file_path(mut self, file_path: Option<String>) -> Self {
        self.file_path = file_path;
        self
    }

    pub fn with_database_name(mut self, database_name: Option<String>) -> Self {
        self.database_name = database_name;
        self
    }

    pub fn with_application_name(mut self, application_name: Option<String>) -> Self {
        self.application_name = application_name;
        self
    }

    pub fn with_history_table<S: Into<String>>(mut self, history_table: S) -> Self {
        self.history_table = history_table.into();
        self
    }
}

impl TryFrom<&str> for ConnectionOptions {
    type Error = Error;

    fn try_from(dsn: &str) -> Result<Self> {
        if dsn.eq("sqlite://:memory:") || dsn.eq("sqlite::memory:") {
            return Ok(Self::new(DatabaseType::SQLite));
        }

        let url = Url::parse(dsn)?;
        let query_params: HashMap<Cow<str>, Cow<str>> = url.query_pairs().collect();
        let username = url.username();
        let db_name = url.path().trim_start_matches('/');

        let options = match url.scheme() {
            "mysql" | "mariadb" => Self::new(DatabaseType::MySQL)
                .with_username(Some(
                    if username.is_empty() { "root" } else { username }.to_string(),
                ))
                .with_password(url.password().map(String::from))
                .with_host(url.host_str().map(String::from))
                .with_port(url.port().or(Some(3306)))
                .with_database_name(if db_name.is_empty() {
                    None
                } else {
                    Some(db_name.to_string())
                }),
            "pg" | "psql" | "postgres" | "postgresql" => Self::new(DatabaseType::PostgreSQL)
                .with_username(Some(
                    if username.is_empty() {
                        "postgres"
                    } else {
                        username
                    }
                    .to_string(),
                ))
                .with_password(url.password().map(String::from))
                .with_host(url.host_str().map(String::from))
                .with_port(url.port().or(Some(5432)))
                .with_database_name(Some(
                    if db_name.is_empty() {
                        "postgres"
                    } else {
                        db_name
                    }
                    .to_string(),
                ))
                .with_application_name(
                    query_params.get("application_name").map(|s| s.to_string()),
                ),
            "sqlite" => {
                // sqlite://relative/path.db keeps the first segment in the host part.
                let path = match url.host_str() {
                    Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
                    _ => url.path().to_string(),
                };

                Self::new(DatabaseType::SQLite).with_file_path(Some(path))
            }
            scheme => return Err(Error::unknown_driver(scheme)),
        };

        Ok(match query_params.get("history_table") {
            Some(table) if !table.is_empty() => options.with_history_table(table.to_string()),
            _ => options,
        })
    }
}

impl Debug for ConnectionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("database_type", &self.database_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("file_path", &self.file_path)
            .field("database_name", &self.database_name)
            .field("application_name", &self.application_name)
            .field("history_table", &self.history_table)
            .finish()
    }
}
