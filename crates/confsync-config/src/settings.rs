//! Store settings and their loading.
//!
//! The main entry point is [`StoreSettings`]. Settings are layered, later
//! sources winning:
//!
//! 1. built-in defaults (serde defaults on every field),
//! 2. `<base_dir>/confsync.yaml`, if present,
//! 3. `CONFSYNC_*` environment variables,
//! 4. explicit overrides from the caller (e.g. CLI flags).
//!
//! String-valued environment variables are taken verbatim rather than
//! parsed, so a token such as `0123` or a branch such as `1.10` survives
//! intact.

use confsync_core::{Credential, TrackedKey};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::base_dir::default_base_dir;

/// Prefix shared by every environment variable the store reads.
pub const ENV_PREFIX: &str = "CONFSYNC_";

/// Name of the optional settings file inside the base directory.
pub const SETTINGS_FILE_NAME: &str = "confsync.yaml";

/// Settings keys whose environment values are used verbatim.
const RAW_ENV_KEYS: &[&str] = &[
    "remote_url",
    "username",
    "token",
    "branch",
    "base_dir",
    "working_dir",
    "clone_dir_name",
    "author_email",
];

/// Settings keys whose environment values are parsed (numbers).
const PARSED_ENV_KEYS: &[&str] = &["push_attempts", "push_retry_delay_ms"];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A filesystem operation failed.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A provider produced data that does not fit [`StoreSettings`].
    #[error("failed to load settings: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A setting has an unusable value.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The offending settings key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Remote settings
// ---------------------------------------------------------------------------

/// Everything needed to talk to the remote: present only when the URL,
/// username and token are all configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub branch: String,
    pub credential: Credential,
}

// ---------------------------------------------------------------------------
// StoreSettings
// ---------------------------------------------------------------------------

/// Settings for one configuration store.
///
/// All fields use `serde` defaults so that partial YAML and sparse
/// environments deserialize with sensible values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// URL of the remote repository (`CONFSYNC_REMOTE_URL`).
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Username answered to credential prompts (`CONFSYNC_USERNAME`).
    #[serde(default)]
    pub username: Option<String>,

    /// Token answered to password prompts (`CONFSYNC_TOKEN`).
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Branch the store commits to (`CONFSYNC_BRANCH`).
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Base directory; defaults to the platform data directory.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Directory working-tier paths are relative to; defaults to the
    /// process current directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Name of the remote clone's directory inside the base directory.
    #[serde(default = "default_clone_dir_name")]
    pub clone_dir_name: String,

    /// How many times a push is attempted before the write is reported
    /// as degraded.
    #[serde(default = "default_push_attempts")]
    pub push_attempts: u32,

    /// Fixed delay between push attempts, in milliseconds.
    #[serde(default = "default_push_retry_delay_ms")]
    pub push_retry_delay_ms: u64,

    /// Committer e-mail; the committer name is the username.
    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Keys tracked from the first operation on.
    #[serde(default = "default_tracked_keys")]
    pub tracked_keys: Vec<TrackedKey>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_clone_dir_name() -> String {
    "repo".to_string()
}

fn default_push_attempts() -> u32 {
    3
}

fn default_push_retry_delay_ms() -> u64 {
    3_000
}

fn default_author_email() -> String {
    "confsync@localhost".to_string()
}

fn default_tracked_keys() -> Vec<TrackedKey> {
    ["config.json", "pools.json", "working-state.md", "configs"]
        .into_iter()
        .filter_map(|key| TrackedKey::new(key).ok())
        .collect()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            username: None,
            token: None,
            branch: default_branch(),
            base_dir: None,
            working_dir: None,
            clone_dir_name: default_clone_dir_name(),
            push_attempts: default_push_attempts(),
            push_retry_delay_ms: default_push_retry_delay_ms(),
            author_email: default_author_email(),
            tracked_keys: default_tracked_keys(),
        }
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("remote_url", &self.remote_url)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("base_dir", &self.base_dir)
            .field("working_dir", &self.working_dir)
            .field("clone_dir_name", &self.clone_dir_name)
            .field("push_attempts", &self.push_attempts)
            .field("push_retry_delay_ms", &self.push_retry_delay_ms)
            .field("author_email", &self.author_email)
            .field("tracked_keys", &self.tracked_keys)
            .finish()
    }
}

impl StoreSettings {
    // -- Loading -------------------------------------------------------------

    /// Load settings from the default layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a layer is malformed, or
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load settings, forcing the base directory when `base_dir` is given.
    ///
    /// The base directory is resolved first (override, then environment,
    /// then default) because it decides which `confsync.yaml` is read.
    ///
    /// # Errors
    ///
    /// See [`StoreSettings::load`].
    pub fn load_with(base_dir: Option<&Path>) -> Result<Self> {
        let mut located = env_figment();
        if let Some(dir) = base_dir {
            located = located.merge(Serialized::default("base_dir", dir));
        }
        let located: Self = located.extract().map_err(Box::new)?;
        let settings_file = located.base_dir().join(SETTINGS_FILE_NAME);

        let mut figment = Figment::new()
            .merge(Yaml::file(settings_file))
            .merge(env_figment());
        if let Some(dir) = base_dir {
            figment = figment.merge(Serialized::default("base_dir", dir));
        }
        Self::from_figment(figment)
    }

    /// Extract and validate settings from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// See [`StoreSettings::load`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<()> {
        if self.branch.trim().is_empty() {
            return Err(invalid("branch", "must not be empty"));
        }
        if self.push_attempts == 0 {
            return Err(invalid("push_attempts", "must be at least 1"));
        }

        let mut components = Path::new(&self.clone_dir_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(invalid(
                    "clone_dir_name",
                    "must be a single directory name",
                ));
            }
        }

        if let Some(key) = self
            .tracked_keys
            .iter()
            .find(|key| key.root_component().as_deref() == Some(self.clone_dir_name.as_str()))
        {
            return Err(invalid(
                "tracked_keys",
                &format!("'{key}' collides with the clone directory"),
            ));
        }

        Ok(())
    }

    // -- Accessors -----------------------------------------------------------

    /// The remote, if URL, username and token are all set and non-empty.
    pub fn remote(&self) -> Option<RemoteSettings> {
        let url = non_empty(&self.remote_url)?;
        let username = non_empty(&self.username)?;
        let token = non_empty(&self.token)?;
        Some(RemoteSettings {
            url: url.to_string(),
            branch: self.branch.clone(),
            credential: Credential::new(username, token),
        })
    }

    /// Environment variable names of the missing remote settings, in a
    /// stable order. Empty when [`remote`](Self::remote) is `Some`.
    pub fn missing_remote_env(&self) -> Vec<String> {
        [
            ("remote_url", &self.remote_url),
            ("username", &self.username),
            ("token", &self.token),
        ]
        .into_iter()
        .filter(|(_, value)| non_empty(value).is_none())
        .map(|(key, _)| env_var_name(key))
        .collect()
    }

    /// The base directory, falling back to [`default_base_dir`].
    pub fn base_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(default_base_dir)
    }

    /// The working directory, falling back to the process current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the current directory is unavailable.
    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Fixed delay between push attempts.
    pub fn push_retry_delay(&self) -> Duration {
        Duration::from_millis(self.push_retry_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// The environment layer: verbatim strings plus parsed numbers.
fn env_figment() -> Figment {
    let mut figment = Figment::from(Env::prefixed(ENV_PREFIX).only(PARSED_ENV_KEYS));
    for key in RAW_ENV_KEYS {
        if let Ok(value) = std::env::var(env_var_name(key)) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }
    figment
}

fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_ascii_uppercase())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
