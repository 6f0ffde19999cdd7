//! Configuration management

use clap::{Parser, Subcommand};
use config::{Config as ConfigBuilder, ConfigError as BuilderError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix for environment overrides, e.g. `MIXEDDRINKS_DATABASE__URL`
const ENV_PREFIX: &str = "MIXEDDRINKS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = with_defaults(ConfigBuilder::builder())?;

        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(
                    config_path.display().to_string(),
                ));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli_args.database {
            builder = builder.set_override("database.url", url.clone())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(builder
        .set_default("database.url", "sqlite://./data/mixeddrinks.db")?
        .set_default("database.connection_pool_size", 4)?
        .set_default("database.busy_timeout", 5000)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")?
        .set_default("logging.rotation", "never")?)
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "mixeddrinks")]
#[command(about = "Drinks, ingredients and what goes into what", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Database connection string (sqlite://path, sqlite::memory: or a file path)
    #[arg(short, long, value_name = "URI", global = true)]
    pub database: Option<String>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the schema if it does not exist yet
    Init,

    /// Drop every table and create the schema again
    Reset,

    /// Create a drink, optionally with its ingredients
    AddDrink {
        name: String,

        /// Ingredient to put in the drink; created when no ingredient has this name
        #[arg(short, long = "ingredient", value_name = "NAME")]
        ingredients: Vec<String>,
    },

    /// Create an ingredient
    AddIngredient { name: String },

    /// Record that a drink contains an ingredient
    Attach { drink_id: i64, ingredient_id: i64 },

    /// Show the ingredients of a drink
    Components { drink_id: i64 },

    /// Show the drinks containing an ingredient
    Libations { ingredient_id: i64 },

    /// Show every drink with its ingredients
    List,

    /// Walk through the margarita and tequila sunrise example on a fresh schema
    Demo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub connection_pool_size: u32,
    pub busy_timeout: u64, // milliseconds
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::InvalidDatabase("url cannot be empty".to_string()));
        }

        if self.connection_pool_size == 0 {
            return Err(ConfigError::InvalidDatabase(
                "connection_pool_size must be greater than 0".to_string(),
            ));
        }

        if self.busy_timeout == 0 {
            return Err(ConfigError::InvalidDatabase(
                "busy_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
    pub rotation: String,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "level must be one of: {:?}",
                valid_levels
            )));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        let valid_outputs = ["stderr", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        let valid_rotations = ["never", "hourly", "daily"];
        if !valid_rotations.contains(&self.rotation.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "rotation must be one of: {:?}",
                valid_rotations
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["mixeddrinks"];
        argv.extend_from_slice(extra);
        argv.push("init");
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = Config::load(&args(&[])).unwrap();
        assert_eq!(config.database.connection_pool_size, 4);
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.logging.rotation, "never");
    }

    #[test]
    fn test_cli_overrides() {
        let config =
            Config::load(&args(&["--database", "sqlite::memory:", "--log-level", "debug"]))
                .unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Config::load(&args(&["--log-level", "loud"]));
        assert!(matches!(result, Err(ConfigError::InvalidLogging(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load(&args(&["--config", "/definitely/not/here.toml"]));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_config_file_layered_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"sqlite:///tmp/bar.db\"\nconnection_pool_size = 2\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let config = Config::load(&args(&["--config", &path])).unwrap();
        assert_eq!(config.database.url, "sqlite:///tmp/bar.db");
        assert_eq!(config.database.connection_pool_size, 2);
        assert_eq!(config.database.busy_timeout, 5000);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_file_output_requires_log_file() {
        let logging = LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            output: "file".to_string(),
            log_file: None,
            rotation: "daily".to_string(),
        };
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_database_validation() {
        let database = DatabaseConfig {
            url: " ".to_string(),
            connection_pool_size: 1,
            busy_timeout: 1,
        };
        assert!(matches!(
            database.validate(),
            Err(ConfigError::InvalidDatabase(_))
        ));
    }
}
