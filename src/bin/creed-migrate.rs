//! Command-line front-end of the migrator.

use clap::{Args, Parser, Subcommand};
use creed_migrate::driver::create_gateway;
use creed_migrate::{Configuration, ConnectionOptions, Migrator, Result};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "creed-migrate")]
#[command(about = "A super simple tool to run database migrations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run migrations that don't exist in the database
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,

        /// List the pending migrations without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Roll back the latest ran migration
    Rollback {
        #[command(flatten)]
        database: DatabaseArgs,

        /// The migration to roll back (i.e. 1_test_up.sql)
        #[arg(long = "migration-to-rollback", alias = "migration")]
        migration: String,
    },
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    /// The connection string of the database to run the migrations on [env: DATABASE_DSN]
    #[arg(long)]
    connection_string: Option<String>,

    /// The directory where the UP migration scripts are stored [env: MIGRATIONS_DIR] [default: migrations/up]
    #[arg(long = "migration-dir")]
    migration_dir: Option<PathBuf>,

    /// The directory where the DOWN migration scripts are stored [env: ROLLBACKS_DIR] [default: migrations/down]
    #[arg(long = "rollback-dir")]
    rollback_dir: Option<PathBuf>,

    /// The name of the migration history table, overriding the `history_table` DSN parameter
    #[arg(long)]
    history_table: Option<String>,
}

impl DatabaseArgs {
    /// Environment configuration with the command-line options on top.
    fn configuration(&self) -> Configuration {
        let mut configuration = Configuration::from_env();
        if let Some(dsn) = &self.connection_string {
            configuration = configuration.with_database_connection_string(dsn.as_str());
        }
        if let Some(path) = &self.migration_dir {
            configuration = configuration.with_migrations_directory(path);
        }
        if let Some(path) = &self.rollback_dir {
            configuration = configuration.with_rollbacks_directory(path);
        }

        configuration
    }

    async fn create_migrator(&self) -> Result<Migrator> {
        let configuration = self.configuration();
        configuration.validate()?;

        let mut options = ConnectionOptions::try_from(configuration.database_connection_string())?;
        if let Some(history_table) = &self.history_table {
            options = options.with_history_table(history_table.as_str());
        }
        let gateway = create_gateway(&options).await?;

        Ok(Migrator::new(configuration).with_history_gateway(gateway))
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate { database, dry_run } => {
            let migrator = database.create_migrator().await?;
            if dry_run {
                let pending = migrator.pending().await?;
                if pending.is_empty() {
                    info!(target: "creed::migrate", "No migration to execute.");
                }

                for migration in pending {
                    info!(target: "creed::migrate", "pending: {} ({})", migration.id(), migration.file_name());
                }
            } else {
                migrator.migrate().await?;
            }
        }
        Commands::Rollback {
            database,
            migration,
        } => {
            let migrator = database.create_migrator().await?;
            migrator.rollback(&migration).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("[Migrator] error during migration run: {}", e);
        std::process::exit(1);
    }
}
