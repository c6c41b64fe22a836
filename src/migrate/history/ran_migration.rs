use chrono::{DateTime, Utc};

/// A row of the migration history table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RanMigration {
    pub id: i64,
    pub file_name: String,
    pub ran: DateTime<Utc>,
}

impl RanMigration {
    pub fn new<S: Into<String>>(id: i64, file_name: S, ran: DateTime<Utc>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            ran,
        }
    }
}

/// The ledger of migrations already applied to the database. Rows carry no
/// meaningful order.
#[derive(Clone, Debug, Default)]
pub struct RanMigrationList {
    pub(crate) items: Vec<RanMigration>,
}

impl RanMigrationList {
    pub fn new(items: Vec<RanMigration>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_file(&self, file_name: &str) -> bool {
        self.items.iter().any(|m| m.file_name == file_name)
    }

    /// Highest identifier recorded in the ledger.
    pub fn latest_id(&self) -> Option<i64> {
        self.items.iter().map(|m| m.id).max()
    }
}

impl From<Vec<RanMigration>> for RanMigrationList {
    fn from(items: Vec<RanMigration>) -> Self {
        Self::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::{RanMigration, RanMigrationList};
    use chrono::Utc;

    #[test]
    fn latest_id_ignores_row_order() {
        let now = Utc::now();
        let list = RanMigrationList::from(vec![
            RanMigration::new(3, "3_third_up.sql", now),
            RanMigration::new(10, "10_tenth_up.sql", now),
            RanMigration::new(7, "7_seventh_up.sql", now),
        ]);

        assert_eq!(list.latest_id(), Some(10));
        assert!(list.has_file("7_seventh_up.sql"));
        assert!(!list.has_file("7_SEVENTH_up.sql"));
    }

    #[test]
    fn empty_ledger_has_no_latest() {
        let list = RanMigrationList::default();

        assert!(list.is_empty());
        assert_eq!(list.latest_id(), None);
    }
}
