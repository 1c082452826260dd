pub mod currency;
pub mod domain;
pub mod ingest;
pub mod profile;
pub mod query;
pub mod scoring;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use sqlx::postgres::{PgConnectOptions, PgSslMode};
    use std::str::FromStr;
    use std::time::Duration;

    const DEFAULT_DB_PORT: u16 = 26257;
    const DEFAULT_PORT: u16 = 8080;
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub db_user: Option<String>,
        pub db_password: Option<String>,
        pub db_host: Option<String>,
        pub db_port: Option<u16>,
        pub db_name: Option<String>,
        pub db_sslmode: Option<String>,
        pub db_max_connections: u32,
        pub api_url: Option<String>,
        pub auth_header: Option<String>,
        pub ingest_timeout: Option<Duration>,
        pub profile_url_template: Option<String>,
        pub profile_api_key: Option<String>,
        pub cors_allowed_origin: Option<String>,
        pub sentry_dsn: Option<String>,
        pub port: u16,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: var("DATABASE_URL"),
                db_user: var("DB_USER"),
                db_password: var("DB_PASSWORD"),
                db_host: var("DB_HOST"),
                db_port: parse_var("DB_PORT")?,
                db_name: var("DB_NAME"),
                db_sslmode: var("DB_SSLMODE"),
                db_max_connections: parse_var("DB_MAX_CONNECTIONS")?
                    .unwrap_or(DEFAULT_MAX_CONNECTIONS),
                api_url: var("API_URL"),
                auth_header: var("AUTH_HEADER"),
                ingest_timeout: parse_var("INGEST_TIMEOUT_SECS")?.map(Duration::from_secs),
                profile_url_template: var("PROFILE_URL").or_else(|| var("FINNHUB_URL")),
                profile_api_key: var("PROFILE_API_KEY").or_else(|| var("FINNHUB_APIKEY")),
                cors_allowed_origin: var("CORS_ALLOWED_ORIGIN"),
                sentry_dsn: var("SENTRY_DSN"),
                // A malformed PORT falls back to the default rather than aborting startup.
                port: var("PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PORT),
            })
        }

        /// Connection options for the ratings database.
        ///
        /// `DATABASE_URL` wins when present; otherwise the options are assembled from the
        /// individual `DB_*` variables so that passwords never need manual URL escaping.
        pub fn pg_connect_options(&self) -> anyhow::Result<PgConnectOptions> {
            if let Some(url) = self.database_url.as_deref() {
                return PgConnectOptions::from_str(url).context("DATABASE_URL is not a valid postgres URL");
            }

            let host = self
                .db_host
                .as_deref()
                .context("DATABASE_URL or DB_HOST is required")?;
            let user = self.db_user.as_deref().context("DB_USER is required")?;
            let name = self.db_name.as_deref().context("DB_NAME is required")?;
            let sslmode = self.db_sslmode.as_deref().unwrap_or("verify-full");
            let ssl_mode = PgSslMode::from_str(sslmode)
                .with_context(|| format!("DB_SSLMODE is invalid: {sslmode}"))?;

            let mut opts = PgConnectOptions::new()
                .host(host)
                .port(self.db_port.unwrap_or(DEFAULT_DB_PORT))
                .username(user)
                .database(name)
                .ssl_mode(ssl_mode);
            if let Some(password) = self.db_password.as_deref() {
                opts = opts.password(password);
            }
            Ok(opts)
        }

        pub fn require_api_url(&self) -> anyhow::Result<&str> {
            self.api_url.as_deref().context("API_URL is required")
        }

        pub fn require_auth_header(&self) -> anyhow::Result<&str> {
            self.auth_header
                .as_deref()
                .context("AUTH_HEADER is required")
        }
    }

    fn var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        var(key)
            .map(|v| v.trim().parse::<T>().with_context(|| format!("{key} is invalid: {v}")))
            .transpose()
    }

    /// Settings with every optional value unset.
    #[cfg(test)]
    pub(crate) fn empty() -> Settings {
        Settings {
            database_url: None,
            db_user: None,
            db_password: None,
            db_host: None,
            db_port: None,
            db_name: None,
            db_sslmode: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            api_url: None,
            auth_header: None,
            ingest_timeout: None,
            profile_url_template: None,
            profile_api_key: None,
            cors_allowed_origin: None,
            sentry_dsn: None,
            port: DEFAULT_PORT,
        }
    }

}
