// Connection parameters and their rendering

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;

use crate::error::ConnectionError;

/// Postgres port; Azure Database for PostgreSQL always listens here
pub const POSTGRES_PORT: u16 = 5432;

/// TLS is mandatory for Azure-hosted servers
pub const SSL_MODE_REQUIRE: &str = "require";

/// Recognized database settings, resolved once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    /// Static password, only used when not authenticating with a token
    pub password: Option<String>,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: None,
            ssl_mode: SSL_MODE_REQUIRE.to_string(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Assemble validated parameters around the given password
    pub fn parameters(&self, password: &str) -> Result<ConnectionParameters, ConnectionError> {
        let params = ConnectionParameters {
            host: self.host.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: password.to_string(),
            ssl_mode: self.ssl_mode.clone(),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Fully resolved parameters for a single connection attempt
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
}

impl ConnectionParameters {
    /// Reject the first empty field, checked in a fixed order
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let fields = [
            ("PGHOST", &self.host),
            ("PGDATABASE", &self.database),
            ("PGUSER", &self.user),
            ("PGPASSWORD", &self.password),
            ("PGSSLMODE", &self.ssl_mode),
        ];

        for (name, value) in fields {
            if value.is_empty() {
                return Err(ConnectionError::MissingField(name));
            }
        }
        Ok(())
    }

    /// Driver options equivalent to the rendered connection string
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConnectionError> {
        let ssl_mode: PgSslMode = self.ssl_mode.parse()?;

        Ok(PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(POSTGRES_PORT)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode))
    }
}

impl fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} port={} dbname={} user={} password={} sslmode={}",
            self.host, POSTGRES_PORT, self.database, self.user, self.password, self.ssl_mode
        )
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("db.example.com", "shop", "admin")
    }

    #[test]
    fn test_render_connection_string() {
        let params = config().parameters("abc123").unwrap();
        assert_eq!(
            params.to_string(),
            "host=db.example.com port=5432 dbname=shop user=admin password=abc123 sslmode=require"
        );
    }

    #[test]
    fn test_missing_host_reported_first() {
        let config = DatabaseConfig::new("", "", "");
        let err = config.parameters("").unwrap_err();
        assert!(matches!(err, ConnectionError::MissingField("PGHOST")));
    }

    #[test]
    fn test_missing_password() {
        let err = config().parameters("").unwrap_err();
        assert!(matches!(err, ConnectionError::MissingField("PGPASSWORD")));
    }

    #[test]
    fn test_missing_ssl_mode() {
        let mut config = config();
        config.ssl_mode.clear();
        let err = config.parameters("pw").unwrap_err();
        assert!(matches!(err, ConnectionError::MissingField("PGSSLMODE")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = config().parameters("hunter2").unwrap();
        let rendered = format!("{:?}", params);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_connect_options() {
        let options = config().parameters("abc123").unwrap().connect_options().unwrap();
        assert_eq!(options.get_host(), "db.example.com");
        assert_eq!(options.get_port(), POSTGRES_PORT);
        assert_eq!(options.get_database(), Some("shop"));
        assert_eq!(options.get_username(), "admin");
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_invalid_ssl_mode_is_driver_error() {
        let mut config = config();
        config.ssl_mode = "sometimes".to_string();
        let err = config.parameters("pw").unwrap().connect_options().unwrap_err();
        assert!(matches!(err, ConnectionError::Database(_)));
    }

    fn field() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[a-z][a-z0-9.]{0,15}"]
    }

    proptest! {
        #[test]
        fn prop_first_empty_field_is_reported(
            host in field(),
            database in field(),
            user in field(),
            password in field(),
        ) {
            let config = DatabaseConfig::new(host.clone(), database.clone(), user.clone());
            let expected = [
                ("PGHOST", &host),
                ("PGDATABASE", &database),
                ("PGUSER", &user),
                ("PGPASSWORD", &password),
            ]
            .into_iter()
            .find(|(_, v)| v.is_empty())
            .map(|(name, _)| name);

            match (config.parameters(&password), expected) {
                (Ok(params), None) => prop_assert!(params.to_string().ends_with("sslmode=require")),
                (Err(ConnectionError::MissingField(name)), Some(expected)) => prop_assert_eq!(name, expected),
                (other, expected) => prop_assert!(false, "got {:?}, expected {:?}", other, expected),
            }
        }

        #[test]
        fn prop_rendered_string_requires_ssl(
            host in "[a-z]{1,12}",
            database in "[a-z]{1,12}",
            user in "[a-z]{1,12}",
            password in "[A-Za-z0-9]{1,32}",
        ) {
            let params = DatabaseConfig::new(host, database, user).parameters(&password).unwrap();
            prop_assert!(params.to_string().contains("sslmode=require"));
            prop_assert!(params.to_string().contains("port=5432"));
        }
    }
}
