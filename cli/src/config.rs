//! Host profile for the mirror CLI.
//!
//! Values come from an optional TOML file layered with `MIRROR_*`
//! environment variables; command-line flags are applied on top by the
//! caller.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Profile read when no `--config` is given. Missing is not an error.
pub const DEFAULT_PROFILE: &str = "mirror";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Profile {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    /// Private key tried before the agent and password
    pub identity_file: Option<PathBuf>,
    pub password: Option<String>,
    pub use_agent: bool,
    pub connect_timeout_secs: u64,
    /// Shell used to wrap `exec` commands
    pub shell: String,
    /// Upload into remote directories that already exist
    pub merge_existing_dirs: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            host: None,
            port: 22,
            username: None,
            identity_file: None,
            password: None,
            use_agent: true,
            connect_timeout_secs: 30,
            shell: "bash".to_string(),
            merge_existing_dirs: false,
        }
    }
}

impl Profile {
    /// Load the profile from `path` (required) or from `mirror.toml` in the
    /// working directory (optional), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_PROFILE).required(false),
        };

        let profile: Profile = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("MIRROR").try_parsing(true))
            .build()?
            .try_deserialize()?;
        profile.validate()?;
        Ok(profile)
    }

    /// Checks that hold regardless of which subcommand runs.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "connect_timeout_secs must be at least 1".into(),
            ));
        }
        if self.shell.trim().is_empty() {
            return Err(config::ConfigError::Message("shell cannot be empty".into()));
        }
        Ok(())
    }

    /// Checks needed before a connection can be attempted.
    pub fn require_target(&self) -> Result<(&str, &str), String> {
        let host = match self.host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => return Err("No host given (use --host or set host in the profile)".to_string()),
        };
        let username = match self.username.as_deref() {
            Some(user) if !user.is_empty() => user,
            _ => {
                return Err(
                    "No username given (use --user or set username in the profile)".to_string(),
                )
            }
        };
        if self.identity_file.is_none() && self.password.is_none() && !self.use_agent {
            return Err(
                "No authentication method: set identity_file, password or use_agent".to_string(),
            );
        }
        Ok((host, username))
    }
}
