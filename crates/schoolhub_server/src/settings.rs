//! Layered server settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file (`schoolhub.toml`, or the path in `SCHOOLHUB_CONFIG`), then
//! `SCHOOLHUB__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File, FileFormat};
use schoolhub_core::{default_log_level, StudentScrubPolicy};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "SCHOOLHUB_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "schoolhub.toml";
const ENV_PREFIX: &str = "SCHOOLHUB";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CascadeSettings {
    pub bulk_student_scrub: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub cascade: CascadeSettings,
}

#[derive(Debug)]
pub enum SettingsError {
    Config(ConfigError),
    CurrentDir(std::io::Error),
    UnknownScrubPolicy(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::CurrentDir(err) => write!(f, "cannot resolve working directory: {err}"),
            Self::UnknownScrubPolicy(value) => write!(
                f,
                "cascade.bulk_student_scrub must be `matching_entries` or `reset_all`, got `{value}`"
            ),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::CurrentDir(err) => Some(err),
            Self::UnknownScrubPolicy(_) => None,
        }
    }
}

impl From<ConfigError> for SettingsError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl Settings {
    /// Loads settings from the process environment and working directory.
    pub fn load() -> Result<Self, SettingsError> {
        let file = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(Some(&file), Environment::default())
    }

    /// Loads settings from an optional file and an environment source.
    ///
    /// `env` is re-prefixed here, so callers may pass
    /// `Environment::default().source(Some(map))` to inject variables.
    pub fn load_from(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let cwd = std::env::current_dir().map_err(SettingsError::CurrentDir)?;

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.path", "schoolhub.sqlite3")?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.dir", cwd.join("logs").display().to_string())?
            .set_default(
                "cascade.bulk_student_scrub",
                StudentScrubPolicy::default().as_str(),
            )?;

        if let Some(file) = file {
            builder = builder.add_source(
                File::from(file.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let mut settings: Settings = builder
            .add_source(
                env.prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        let dir = Path::new(settings.logging.dir.trim());
        if !dir.is_absolute() {
            settings.logging.dir = cwd.join(dir).display().to_string();
        }
        settings.bulk_policy()?;
        Ok(settings)
    }

    pub fn bulk_policy(&self) -> Result<StudentScrubPolicy, SettingsError> {
        StudentScrubPolicy::parse(&self.cascade.bulk_student_scrub).ok_or_else(|| {
            SettingsError::UnknownScrubPolicy(self.cascade.bulk_student_scrub.clone())
        })
    }
}
