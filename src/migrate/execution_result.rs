use crate::migrate::Direction;

/// Outcome of a successful [`Migrator`](crate::migrate::Migrator) run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionResult {
    pub direction: Direction,
    /// Identifiers of the executed migrations, in execution order.
    pub executed: Vec<i64>,
    /// Migrations left out because they were already recorded as ran.
    pub skipped: usize,
    pub execution_time: i64,
}
