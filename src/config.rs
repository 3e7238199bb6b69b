use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::FatalError;

/// Default Bluesky PDS used when nothing else is configured.
pub const DEFAULT_BLUESKY_SERVICE: &str = "https://bsky.social";

/// Default location of the transfer state file (relative to the working dir).
pub const DEFAULT_STATE_FILE: &str = ".mastodon-to-bluesky-state.json";

/// Contents of the optional JSON config file.
///
/// Every field is optional: the file only supplies defaults that
/// environment variables and CLI flags can override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub mastodon_instance: Option<String>,
    pub mastodon_token: Option<String>,
    pub bluesky_handle: Option<String>,
    pub bluesky_password: Option<String>,
    pub bluesky_service: Option<String>,
}

impl FileConfig {
    /// Read the config file at `path`.
    ///
    /// A missing file is not an error (yields the empty config). A file that
    /// exists but can't be read or parsed is a configuration error.
    pub fn load(path: &Path) -> Result<Self, FatalError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FatalError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| FatalError::Config(format!("invalid JSON in {}: {e}", path.display())))
    }
}

/// Returns the default config file path:
/// `~/.config/mastodon-to-bluesky/config.json` on Linux.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mastodon-to-bluesky")
        .join("config.json")
}

/// Effective configuration after merging file, environment and CLI flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub mastodon_instance: Option<String>,
    pub mastodon_token: Option<String>,
    pub bluesky_handle: Option<String>,
    pub bluesky_password: Option<String>,
    pub bluesky_service: String,
}

/// Credential values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mastodon_instance: Option<String>,
    pub mastodon_token: Option<String>,
    pub bluesky_handle: Option<String>,
    pub bluesky_password: Option<String>,
}

/// Fully-populated credentials for both services.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub mastodon_instance: String,
    pub mastodon_token: String,
    pub bluesky_handle: String,
    pub bluesky_password: String,
    pub bluesky_service: String,
}

/// Merge the config file with environment variables. Env wins.
///
/// Pure: the caller snapshots the environment once at startup
/// (`std::env::vars().collect()`) and passes it in.
pub fn resolve_config(file: FileConfig, env: &HashMap<String, String>) -> Config {
    let pick = |key: &str, fallback: Option<String>| {
        env.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or(fallback)
    };

    Config {
        mastodon_instance: pick("MASTODON_INSTANCE", file.mastodon_instance),
        mastodon_token: pick("MASTODON_TOKEN", file.mastodon_token),
        bluesky_handle: pick("BLUESKY_HANDLE", file.bluesky_handle),
        bluesky_password: pick("BLUESKY_PASSWORD", file.bluesky_password),
        bluesky_service: pick("BLUESKY_SERVICE", file.bluesky_service)
            .unwrap_or_else(|| DEFAULT_BLUESKY_SERVICE.to_string()),
    }
}

impl Config {
    /// Apply command-line values on top. CLI wins over env and file.
    pub fn with_overrides(mut self, cli: Overrides) -> Self {
        fn apply(slot: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                *slot = Some(v);
            }
        }
        apply(&mut self.mastodon_instance, cli.mastodon_instance);
        apply(&mut self.mastodon_token, cli.mastodon_token);
        apply(&mut self.bluesky_handle, cli.bluesky_handle);
        apply(&mut self.bluesky_password, cli.bluesky_password);
        self
    }

    /// Check that every credential is present.
    /// Call this before constructing either client.
    pub fn require_credentials(&self) -> Result<Credentials, FatalError> {
        let fields = [
            ("mastodon instance (MASTODON_INSTANCE)", &self.mastodon_instance),
            ("mastodon token (MASTODON_TOKEN)", &self.mastodon_token),
            ("bluesky handle (BLUESKY_HANDLE)", &self.bluesky_handle),
            ("bluesky password (BLUESKY_PASSWORD)", &self.bluesky_password),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(FatalError::Config(format!(
                "missing required credentials: {}.\n\
                 Provide them as options, environment variables or in the config file.",
                missing.join(", ")
            )));
        }

        Ok(Credentials {
            mastodon_instance: self.mastodon_instance.clone().unwrap_or_default(),
            mastodon_token: self.mastodon_token.clone().unwrap_or_default(),
            bluesky_handle: self.bluesky_handle.clone().unwrap_or_default(),
            bluesky_password: self.bluesky_password.clone().unwrap_or_default(),
            bluesky_service: self.bluesky_service.clone(),
        })
    }
}
