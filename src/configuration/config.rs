#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiURL,
    ConfigFile,
    OpeningPrompt,
    Prefetch,
    RequestTimeout,
}

pub struct Config {}

fn config_dir() -> path::PathBuf {
    #[cfg(not(target_os = "macos"))]
    let dir = dirs::config_dir().unwrap_or_else(|| return path::PathBuf::from("."));
    #[cfg(target_os = "macos")]
    let dir = std::env::var("HOME")
        .map(|home| return path::PathBuf::from(home).join(".config"))
        .unwrap_or_else(|_| return path::PathBuf::from("."));

    return dir.join("foresight");
}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return Config::default(key);
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = config_dir()
            .join("config.toml")
            .to_string_lossy()
            .to_string();

        let res = match key {
            ConfigKey::ApiURL => "http://localhost:3000",
            ConfigKey::OpeningPrompt => "I want to start a dungeon adventure.",
            ConfigKey::Prefetch => "true",
            ConfigKey::RequestTimeout => "60000",

            // Special
            ConfigKey::ConfigFile => &config_path,
        };

        return res.to_string();
    }

    /// Reads `config-file` from the first matches that carry it, falling back
    /// to `FORESIGHT_CONFIG_FILE` through clap's env support.
    fn config_file(clap_arg_matches: &[&ArgMatches]) -> String {
        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        return config_file;
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let config_file = Config::config_file(&clap_arg_matches);
        let config_path = path::PathBuf::from(&config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if key == ConfigKey::ConfigFile {
                    continue;
                }

                let val = match doc.get(&key.to_string()) {
                    Some(val) => val,
                    None => continue,
                };

                // Use clap value parsers to do validation.
                let possible_values = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                    .map(|arg| {
                        return arg
                            .get_possible_values()
                            .iter()
                            .map(|e| return e.get_name().to_string())
                            .collect::<Vec<String>>();
                    })
                    .unwrap_or_default();

                let val_str = if let Some(val_int) = val.as_integer() {
                    val_int.to_string()
                } else if let Some(val_bool) = val.as_bool() {
                    val_bool.to_string()
                } else if let Some(val_str) = val.as_str() {
                    val_str.to_string()
                } else {
                    bail!(format!(
                        "{config_file} has an unsupported value type for key '{key}'"
                    ));
                };

                if val_str.is_empty() {
                    continue;
                }
                if !possible_values.is_empty() && !possible_values.contains(&val_str) {
                    bail!(format!(
                        "{config_file} has an invalid value for key '{key}': {val_str}\nPossible values are: {}",
                        possible_values.join(", ")
                    ));
                }
                if key == ConfigKey::RequestTimeout && val_str.parse::<u64>().is_err() {
                    bail!(format!(
                        "{config_file} has an invalid value for key '{key}': {val_str}\nExpected a number of milliseconds"
                    ));
                }

                Config::set(key, &val_str);
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }
        Config::set(ConfigKey::ConfigFile, &config_file);

        tracing::debug!(
            api_url = Config::get(ConfigKey::ApiURL).as_str(),
            config_file = config_file.as_str(),
            prefetch = Config::get(ConfigKey::Prefetch).as_str(),
            request_timeout = Config::get(ConfigKey::RequestTimeout).as_str(),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> Result<String> {
        let mut entries = vec![];
        for key in ConfigKey::iter() {
            if key == ConfigKey::ConfigFile {
                continue;
            }

            let arg = match cmd
                .get_arguments()
                .find(|e| return e.get_long() == Some(key.to_string().as_str()))
            {
                Some(arg) => arg,
                None => bail!(format!("No CLI argument registered for config key '{key}'")),
            };

            let mut description = arg
                .get_help()
                .map(|help| return help.to_string())
                .unwrap_or_default();
            description = description
                .split("[default:")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();

            if !arg.get_possible_values().is_empty() {
                let possible_values = arg
                    .get_possible_values()
                    .iter()
                    .map(|e| return e.get_name())
                    .collect::<Vec<_>>()
                    .join(", ");
                description = format!("{description} [possible values: {}]", possible_values);
            }

            let mut val = Config::default(key);
            if val.is_empty() {
                val = format!("# {key} = \"\"");
            } else if val.parse::<u64>().is_ok() || val.parse::<bool>().is_ok() {
                val = format!("{key} = {val}");
            } else {
                val = format!("{key} = \"{val}\"");
            }

            entries.push(format!("# {description}\n{val}"));
        }

        return Ok(entries.join("\n\n"));
    }
}
