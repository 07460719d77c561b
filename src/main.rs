use anyhow::{Context, Result};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use azure_pg_app::auth::{DefaultAzureCredential, TokenCredential};
use azure_pg_app::config::{Command, Config, LogFormat};
use azure_pg_app::db::{self, ConnectionProvider, DATABASE_SCOPE};
use azure_pg_app::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config);

    let credential: Arc<dyn TokenCredential> =
        Arc::new(DefaultAzureCredential::new().context("Failed to create Azure credential")?);
    let provider = Arc::new(ConnectionProvider::new(config.database.clone(), credential.clone()));

    match config.command {
        Command::ConnectionString => print_connection_string(&provider),
        Command::Token => print_token(credential.as_ref()).await,
        Command::Serve => serve(&config, provider).await,
        Command::Ping => ping(&provider).await,
        Command::Tables => print_tables(&provider).await,
    }
}

/// Initialize logging with the configured level and format
///
/// The server logs to stdout; the other commands print their result there,
/// so their logs go to stderr.
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let writer = if config.command == Command::Serve {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_file(true).with_line_number(true).init(),
    }
}

/// Static-password connection string, without a trailing newline
fn print_connection_string(provider: &ConnectionProvider) -> Result<()> {
    let params = provider.connection_string_from_password()?;
    print!("{}", params);
    std::io::stdout().flush()?;
    Ok(())
}

async fn print_token(credential: &dyn TokenCredential) -> Result<()> {
    let token = credential.get_token(&[DATABASE_SCOPE]).await?;
    tracing::debug!("Token expires: {}", token.expires_at.to_rfc3339());
    print!("{}", token.value);
    std::io::stdout().flush()?;
    Ok(())
}

async fn ping(provider: &ConnectionProvider) -> Result<()> {
    let mut conn = provider.open().await?;
    let result = db::ping(&mut conn).await;
    db::close(conn).await;
    result?;

    println!("Connection successful!");
    Ok(())
}

async fn print_tables(provider: &ConnectionProvider) -> Result<()> {
    let mut conn = provider.open().await?;
    let result = db::list_tables(&mut conn).await;
    db::close(conn).await;

    for table in result? {
        println!("{}", table);
    }
    Ok(())
}

async fn serve(config: &Config, provider: Arc<ConnectionProvider>) -> Result<()> {
    tracing::info!(
        "Database configured: host={}, dbname={}, user={}",
        provider.config().host,
        provider.config().database,
        provider.config().user
    );

    let app = routes::build_app(AppState { provider });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
