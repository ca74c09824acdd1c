/// Configuration schema and defaults for snowdash.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[backend]`, `[access]`, `[views]`, `[storage]` and `[logging]`.
///
/// Every field has a built-in default, so a config file only needs the keys a
/// user wants to change.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level snowdash configuration.
///
/// Maps directly to `~/.snowdash/config.toml` and `.snowdash.toml`. Missing
/// sections and fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub backend: BackendConfig,
    pub access: AccessConfig,
    pub views: ViewsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the helper backend lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Request timeout in seconds. `0` means no timeout.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// [access]
// ---------------------------------------------------------------------------

/// Account-level permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// The one account allowed to stop any user's running query.
    pub privileged_account: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            privileged_account: "SEDCADMIN".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [views]
// ---------------------------------------------------------------------------

/// View defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Initial query interval in minutes. Must be one of the selector values
    /// (15, 30, 60, 120, 240, 480, 720, 1440); anything else falls back to 30.
    pub default_interval_minutes: u32,
    /// Route shown after login and when `/login` is requested while signed in.
    pub landing: String,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: 30,
            landing: "/usage".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [storage]
// ---------------------------------------------------------------------------

/// Persisted session storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the session storage file. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.snowdash/session.json".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Activity log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether activity logging is enabled.
    pub enabled: bool,
    /// Path to the activity log. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.snowdash/activity.log".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML
// ---------------------------------------------------------------------------

impl DashConfig {
    /// Annotated default configuration written by `snowdash config init`.
    pub fn default_toml() -> &'static str {
        r#"# snowdash configuration
#
# Layers (highest priority last): built-in defaults, this file,
# .snowdash.toml in the working directory, SNOWDASH_* environment variables.

[backend]
# Base URL of the warehouse helper backend.
base_url = "http://localhost:5000"
# Request timeout in seconds (0 = wait forever).
timeout_secs = 0

[access]
# Account allowed to stop any user's running query.
privileged_account = "SEDCADMIN"

[views]
# Initial query interval: 15, 30, 60, 120, 240, 480, 720 or 1440 minutes.
default_interval_minutes = 30
# Route shown after login.
landing = "/usage"

[storage]
path = "~/.snowdash/session.json"

[logging]
enabled = true
path = "~/.snowdash/activity.log"
"#
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Option<std::path::PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else if path == "~" {
        dirs::home_dir()
    } else {
        Some(std::path::PathBuf::from(path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
