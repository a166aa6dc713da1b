//! CLI command definitions and dispatch.

pub mod migrate;
pub mod session;
pub mod token;
pub mod user;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use tokenward_auth::{SystemClock, TokenLifecycleManager};
use tokenward_cache::CacheManager;
use tokenward_core::config::AppConfig;
use tokenward_core::error::AppError;
use tokenward_database::DatabasePool;

use crate::output::{self, OutputFormat};

/// Tokenward: session and token lifecycle administration
#[derive(Debug, Parser)]
#[command(name = "tokenward", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay (`config/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Session inspection and revocation
    Session(session::SessionArgs),
    /// Token inspection
    Token(token::TokenArgs),
    /// Per-user token administration
    User(user::UserArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, self).await,
            Commands::Session(args) => session::execute(args, self).await,
            Commands::Token(args) => token::execute(args, self.format),
            Commands::User(args) => user::execute(args, self).await,
        }
    }
}

/// Stores and the lifecycle manager, connected per configuration.
pub struct Context {
    /// Loaded configuration.
    pub config: AppConfig,
    /// Database pool.
    pub db: DatabasePool,
    /// Lifecycle manager over the configured stores.
    pub manager: TokenLifecycleManager,
}

/// Helper: load configuration
pub fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    AppConfig::load_from(&cli.config, &cli.env)
}

/// Helper: connect only the database
pub async fn connect_database(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: connect every store and build the lifecycle manager
pub async fn connect(cli: &Cli) -> Result<Context, AppError> {
    let config = load_config(cli)?;
    let db = connect_database(&config).await?;
    let cache = CacheManager::new(&config.cache).await?;

    if config.cache.provider == "memory" {
        output::print_warning(
            "cache.provider is 'memory': revocation markers written here are not seen by the server",
        );
    }
    debug!(provider = %config.cache.provider, "Connected stores");

    let manager = TokenLifecycleManager::new(
        &config.auth,
        &config.session,
        cache.provider(),
        Arc::new(db.sessions()),
        Arc::new(db.identities()),
        Arc::new(SystemClock),
    );

    Ok(Context {
        config,
        db,
        manager,
    })
}
