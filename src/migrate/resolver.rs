use crate::migrate::{Direction, Migration, Rollback};
use crate::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SEPARATOR: char = '_';

struct ScriptFile {
    file_name: String,
    path: PathBuf,
}

/// A file name split as `{id}_{name}_{direction}.{extension}`.
struct ScriptName<'a> {
    id: &'a str,
    name: &'a str,
    direction: Direction,
}

impl<'a> ScriptName<'a> {
    fn parse(file_name: &'a str) -> Option<Self> {
        let parts: Vec<&str> = file_name.split(SEPARATOR).collect();
        let &[id, name, direction] = parts.as_slice() else {
            return None;
        };

        let direction = direction
            .split_once('.')
            .map_or(direction, |(direction, _)| direction);
        let direction = if direction.eq_ignore_ascii_case("up") {
            Direction::Up
        } else if direction.eq_ignore_ascii_case("down") {
            Direction::Down
        } else {
            return None;
        };

        Some(Self {
            id,
            name,
            direction,
        })
    }

    fn pairing_key(&self) -> String {
        format!("{}{}{}", self.id, SEPARATOR, self.name)
    }
}

/// Scans both directories and pairs every change script with its undo script.
///
/// Fails as a whole on the first invalid identifier, missing rollback or
/// unreadable file: no partially resolved set is ever returned. The result
/// follows directory listing order (sorted by file name), not identifier
/// order.
pub async fn discover(migrations_path: &Path, rollbacks_path: &Path) -> Result<Vec<Migration>> {
    let Some(migration_files) = list_directory(migrations_path).await? else {
        return Err(Error::no_migrations_found());
    };

    let Some(rollback_files) = list_directory(rollbacks_path).await? else {
        return Err(Error::no_rollbacks_found());
    };

    let rollbacks = rollback_files
        .iter()
        .filter_map(|file| {
            let Some(script) = ScriptName::parse(&file.file_name) else {
                debug!(target: "creed::migrate", "Skipping \"{}\": not a rollback file name", file.file_name);
                return None;
            };

            if script.direction != Direction::Down {
                debug!(target: "creed::migrate", "Skipping \"{}\": not a down migration", file.file_name);
                return None;
            }

            Some((script.pairing_key().to_lowercase(), file))
        })
        .collect::<Vec<_>>();

    let mut migrations = vec![];
    let mut identifiers: HashMap<i64, &str> = HashMap::new();
    for file in &migration_files {
        let Some(script) = ScriptName::parse(&file.file_name) else {
            debug!(target: "creed::migrate", "Skipping \"{}\": not a migration file name", file.file_name);
            continue;
        };

        if script.direction != Direction::Up {
            debug!(target: "creed::migrate", "Skipping \"{}\": not an up migration", file.file_name);
            continue;
        }

        let id = script
            .id
            .parse::<i64>()
            .map_err(|e| Error::invalid_migration_identifier(&file.file_name, e))?;

        let pairing_key = script.pairing_key();
        let lowercase_key = pairing_key.to_lowercase();
        let rollback_file = rollbacks
            .iter()
            .find(|(key, _)| *key == lowercase_key)
            .map(|(_, file)| *file)
            .ok_or_else(|| Error::missing_rollback_file(&pairing_key))?;

        if let Some(other) = identifiers.insert(id, &file.file_name) {
            return Err(Error::duplicate_migration_identifier(
                id,
                &file.file_name,
                other,
            ));
        }

        let rollback = Rollback::new(
            rollback_file.file_name.clone(),
            read_file(rollback_file).await?,
        );
        migrations.push(Migration::new(
            id,
            file.file_name.clone(),
            read_file(file).await?,
            rollback,
        ));
    }

    Ok(migrations)
}

/// Lists the files of `path`, sorted by name, or `None` if the directory has
/// no entry at all. Subdirectories and entries whose name is not valid UTF-8
/// are left out, but still make the directory non-empty.
async fn list_directory(path: &Path) -> Result<Option<Vec<ScriptFile>>> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| Error::searching_directory(path, e))?;

    let mut count = 0_usize;
    let mut files = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::searching_directory(path, e))?
    {
        count += 1;
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::searching_directory(path, e))?;
        if file_type.is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(file_name) => files.push(ScriptFile {
                file_name,
                path: entry.path(),
            }),
            Err(name) => {
                debug!(target: "creed::migrate", "Skipping {:?}: file name is not valid UTF-8", name)
            }
        }
    }

    if count == 0 {
        return Ok(None);
    }

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(Some(files))
}

async fn read_file(file: &ScriptFile) -> Result<Vec<u8>> {
    tokio::fs::read(&file.path)
        .await
        .map_err(|e| Error::reading_file(&file.file_name, e))
}
