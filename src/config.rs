// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Wishbox-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Wishbox and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::mcp::WidgetUrls;
use crate::store::WriteDurability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("PUBLIC_BASE_URL is required in production")]
    MissingPublicBaseUrl,
    #[error("SESSION_MAX_AGE must be greater than zero")]
    ZeroSessionMaxAge,
}

/// Server settings. Every flag can also be given as an environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "wishbox", version, about = "Winter Fairy Wishbox MCP server")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Selects widget URL resolution and log format.
    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    environment: Environment,

    /// Log filter, e.g. `info` or `wishbox=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Session lifetime in milliseconds; also the sweep interval.
    #[arg(long = "session-max-age-ms", env = "SESSION_MAX_AGE", default_value_t = 3_600_000)]
    session_max_age_ms: u64,

    /// Port of the local widget dev server (development only).
    #[arg(long, env = "WIDGET_PORT", default_value_t = 4444)]
    widget_port: u16,

    /// Public origin serving the widget pages (required in production).
    #[arg(long, env = "PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Snapshot file for wishes; persistence is off without it.
    #[arg(long, env = "WISHES_FILE")]
    wishes_file: Option<PathBuf>,

    /// fsync snapshot writes.
    #[arg(long, env = "DURABLE_WRITES")]
    durable_writes: bool,
}

impl Config {
    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_max_age_ms == 0 {
            return Err(ConfigError::ZeroSessionMaxAge);
        }
        if self.environment == Environment::Production && self.public_base_url().is_none() {
            return Err(ConfigError::MissingPublicBaseUrl);
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_millis(self.session_max_age_ms)
    }

    fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn wishes_file(&self) -> Option<&Path> {
        self.wishes_file.as_deref()
    }

    pub fn write_durability(&self) -> WriteDurability {
        if self.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        }
    }

    /// Development serves widgets from the local dev server; production from the public URL.
    pub fn widget_urls(&self) -> WidgetUrls {
        match (self.environment, self.public_base_url()) {
            (Environment::Production, Some(url)) => WidgetUrls::new(url),
            _ => WidgetUrls::new(format!("http://localhost:{}", self.widget_port)),
        }
    }
}

/// Loads `KEY=value` lines from an env file into the process environment. Variables that are
/// already set keep their value. Returns `false` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("wishbox").chain(args.iter().copied()))
            .expect("parse config")
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.environment(), Environment::Development);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.session_max_age(), Duration::from_secs(3600));
        assert_eq!(config.wishes_file(), None);
        assert_eq!(config.write_durability(), WriteDurability::BestEffort);
        assert_eq!(config.widget_urls().base_url(), "http://localhost:4444");
        config.validate().expect("valid");
    }

    #[test]
    fn production_requires_public_base_url() {
        let config = parse(&["--env", "production"]);
        assert_eq!(config.validate(), Err(ConfigError::MissingPublicBaseUrl));

        let config = parse(&["--env", "production", "--public-base-url", "   "]);
        assert_eq!(config.validate(), Err(ConfigError::MissingPublicBaseUrl));
    }

    #[test]
    fn production_widgets_use_public_base_url() {
        let config = parse(&[
            "--env",
            "production",
            "--public-base-url",
            "https://wishes.example.com/",
            "--widget-port",
            "5555",
        ]);
        config.validate().expect("valid");
        assert_eq!(config.widget_urls().base_url(), "https://wishes.example.com");
    }

    #[test]
    fn development_ignores_public_base_url() {
        let config =
            parse(&["--public-base-url", "https://wishes.example.com", "--widget-port", "5555"]);
        assert_eq!(config.widget_urls().base_url(), "http://localhost:5555");
    }

    #[test]
    fn zero_max_age_is_rejected() {
        let config = parse(&["--session-max-age-ms", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroSessionMaxAge));
    }

    #[test]
    fn persistence_flags() {
        let config = parse(&["--wishes-file", "/tmp/wishes.json", "--durable-writes"]);
        assert_eq!(config.wishes_file(), Some(Path::new("/tmp/wishes.json")));
        assert_eq!(config.write_durability(), WriteDurability::Durable);
    }

    #[test]
    fn rejects_unknown_environment() {
        Config::try_parse_from(["wishbox", "--env", "staging"]).unwrap_err();
    }

    #[test]
    fn env_file_fills_unset_variables_only() {
        let path = std::env::temp_dir().join(format!("wishbox-{}.env", std::process::id()));
        std::fs::write(
            &path,
            "WISHBOX_ENV_FILE_UNSET=from-file\nWISHBOX_ENV_FILE_PRESET=from-file\n",
        )
        .expect("write env file");
        std::env::set_var("WISHBOX_ENV_FILE_PRESET", "from-process");

        let loaded = load_env_file(&path);
        let _ = std::fs::remove_file(&path);

        assert!(loaded.expect("load env file"));
        assert_eq!(std::env::var("WISHBOX_ENV_FILE_UNSET").as_deref(), Ok("from-file"));
        assert_eq!(std::env::var("WISHBOX_ENV_FILE_PRESET").as_deref(), Ok("from-process"));
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let path = std::env::temp_dir().join("wishbox-missing-dir").join(".env");
        assert!(!load_env_file(&path).expect("missing file is fine"));
    }
}
