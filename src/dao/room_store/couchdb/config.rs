use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "quiz_rooms";

/// Connection settings for the CouchDB room store.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Target `database` on the server reachable at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Authenticate every request with basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` (defaults to `quiz_rooms`)
    /// and the optional `COUCH_USERNAME` / `COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database = std::env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        let config = Self::new(base_url, database);

        Ok(
            match (
                std::env::var("COUCH_USERNAME").ok(),
                std::env::var("COUCH_PASSWORD").ok(),
            ) {
                (Some(username), Some(password)) => config.with_credentials(username, password),
                _ => config,
            },
        )
    }
}
