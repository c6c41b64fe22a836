mod history_gateway;

pub use fixtures::MigrationDirs;
pub use history_gateway::MockHistoryGateway;
