use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "killer_rounds";

/// Runtime configuration describing how to connect to CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Read `COUCH_BASE_URL`, the optional `COUCH_DB`, and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database =
            std::env::var("COUCH_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_owned());

        let mut config = Self::new(base_url, database);
        config.credentials = std::env::var("COUCH_USERNAME")
            .ok()
            .zip(std::env::var("COUCH_PASSWORD").ok());

        Ok(config)
    }
}
