pub mod http;
#[cfg(test)]
pub mod scripted;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::TurnServiceBox;

pub struct TurnServiceManager {}

impl TurnServiceManager {
    pub fn get() -> Result<TurnServiceBox> {
        return TurnServiceManager::from_parts(
            &Config::get(ConfigKey::ApiURL),
            &Config::get(ConfigKey::RequestTimeout),
        );
    }

    fn from_parts(url: &str, timeout: &str) -> Result<TurnServiceBox> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!(format!(
                "{} must be an http or https URL, got '{url}'",
                ConfigKey::ApiURL
            ));
        }

        if timeout.parse::<u64>().is_err() {
            bail!(format!(
                "{} must be a number of milliseconds, got '{timeout}'",
                ConfigKey::RequestTimeout
            ));
        }

        return Ok(Arc::new(http::HttpTurnService::new(url, timeout)));
    }
}
