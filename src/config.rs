use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::io::Letterhead;

pub const DEFAULT_DATABASE: &str = "fleetbook.db";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_LOG_FILTER: &str = "fleetbook=info,tower_http=info";

/// Runtime settings resolved from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path of the SQLite file, or a full `sqlite:` URL.
    pub database: String,
    pub bind_address: String,
    pub letterhead: Letterhead,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            letterhead: Letterhead::default(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read `FLEETBOOK_*` variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            database: non_empty("FLEETBOOK_DATABASE").unwrap_or(defaults.database),
            bind_address: non_empty("FLEETBOOK_BIND").unwrap_or(defaults.bind_address),
            letterhead: Letterhead {
                name: non_empty("FLEETBOOK_COMPANY_NAME").unwrap_or(defaults.letterhead.name),
                tagline: non_empty("FLEETBOOK_COMPANY_TAGLINE"),
                contact: non_empty("FLEETBOOK_COMPANY_CONTACT"),
            },
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    /// The sqlx connection URL for `database`. Plain paths are opened in
    /// create-if-missing mode.
    pub fn database_url(&self) -> String {
        if self.database.starts_with("sqlite:") {
            self.database.clone()
        } else {
            format!("sqlite:{}?mode=rwc", self.database)
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "fleetbook=debug,tower_http=debug"
    } else {
        DEFAULT_LOG_FILTER
    };

    // A second call (tests, embedded use) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
