use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::eligibility::ExpirationPolicy;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub backend_base_url: Url,
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
    pub timezone: Tz,
    pub studio_name: String,
    pub enforce_expiration: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_BACKEND_BASE_URL, APP_ENFORCE_EXPIRATION, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("backend_base_url", "http://localhost:3000")?
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("timezone", "America/Argentina/Buenos_Aires")?
            .set_default("studio_name", "Yoga Studio")?
            .set_default("enforce_expiration", false)?
            .build()?;

        config.try_deserialize()
    }

    pub fn expiration_policy(&self) -> ExpirationPolicy {
        if self.enforce_expiration {
            ExpirationPolicy::Enforce
        } else {
            ExpirationPolicy::DisplayOnly
        }
    }

    /// Current calendar day at the studio.
    pub fn today(&self) -> chrono::NaiveDate {
        chrono::Utc::now().with_timezone(&self.timezone).date_naive()
    }
}
