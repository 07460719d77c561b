use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::db::DatabaseConfig;

/// Products API on Azure Database for PostgreSQL
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Postgres server host name
    #[arg(long, env = "PGHOST", global = true)]
    pub pg_host: Option<String>,

    /// Database name
    #[arg(long, env = "PGDATABASE", global = true)]
    pub pg_database: Option<String>,

    /// Database user (the Entra ID principal name when using tokens)
    #[arg(long, env = "PGUSER", global = true)]
    pub pg_user: Option<String>,

    /// Static password, only used by `connection-string`
    #[arg(long, env = "PGPASSWORD", global = true, hide_env_values = true)]
    pub pg_password: Option<String>,

    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0", global = true)]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8080", global = true)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format (json, text)
    #[arg(long, env = "LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print a connection string built from PGPASSWORD
    ConnectionString,
    /// Print an Azure AD access token for the database
    Token,
    /// Run the HTTP server
    Serve,
    /// Check that the database accepts a token-authenticated connection
    Ping,
    /// List tables in the public schema
    Tables,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub command: Command,

    // Database
    pub database: DatabaseConfig,

    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_args(CliArgs::parse()))
    }

    /// Unset database values become empty strings and are rejected when a
    /// connection is requested, not here
    pub fn from_args(args: CliArgs) -> Self {
        let mut database = DatabaseConfig::new(
            args.pg_host.unwrap_or_default(),
            args.pg_database.unwrap_or_default(),
            args.pg_user.unwrap_or_default(),
        );
        if let Some(password) = args.pg_password {
            database = database.with_password(password);
        }

        Config {
            command: args.command,
            database,
            server_host: args.host,
            server_port: args.port,
            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "text" | "pretty" => LogFormat::Text,
        _ => LogFormat::Json,
    }
}
