/// Configuration system for snowdash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: [`schema::DashConfig::default()`]
/// 2. **User global config**: `~/.snowdash/config.toml`
/// 3. **Project local config**: `.snowdash.toml` in the current directory
/// 4. **Environment variables**: `SNOWDASH_*` overrides (highest precedence)
///
/// Files are deep-merged: a layer only overrides the keys it sets, and keys no
/// layer sets keep their defaults.
///
/// # Usage
///
/// ```rust,ignore
/// use snowdash::config;
///
/// let cfg = config::load();
/// let client = ApiClient::from_config(&cfg.backend, ActivityLog::from_config(&cfg.logging));
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::DashConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved snowdash configuration.
///
/// Merges defaults → global TOML → project TOML → env vars.
pub fn load() -> DashConfig {
    let mut config = resolve_layers([global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config);
    config
}

/// Deep-merge the TOML layers at `paths` (later wins) over the defaults.
///
/// Each layer only overrides the keys it sets.
fn resolve_layers(paths: impl IntoIterator<Item = Option<PathBuf>>) -> DashConfig {
    let mut merged = toml::Value::Table(toml::Table::new());
    for layer in paths.into_iter().filter_map(load_toml_file) {
        merge_config(&mut merged, layer);
    }
    merged.try_into().unwrap_or_default()
}

/// Load a TOML config file from the given path (if it exists).
///
/// Malformed files, and files whose values do not fit the schema, are
/// ignored so a broken config never locks a user out of
/// `snowdash config reset`.
fn load_toml_file(path: Option<PathBuf>) -> Option<toml::Value> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    let value: toml::Value = toml::from_str(&content).ok()?;
    let _: DashConfig = value.clone().try_into().ok()?;
    Some(value)
}

/// Merge `overlay` into `base`: tables merge key by key, anything else
/// replaces.
fn merge_config(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_config(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.snowdash/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".snowdash").join("config.toml"))
}

/// Path to the project local config: `.snowdash.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".snowdash.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `SNOWDASH_BASE_URL`: backend base URL
/// - `SNOWDASH_PRIVILEGED_ACCOUNT`: account allowed to stop any query
/// - `SNOWDASH_DEFAULT_INTERVAL`: initial query interval in minutes
/// - `SNOWDASH_LANDING`: route shown after login
/// - `SNOWDASH_LOG`: activity log switch (`1`/`true`/`yes`/`on`)
pub fn apply_env_overrides(config: &mut DashConfig) {
    if let Ok(val) = std::env::var("SNOWDASH_BASE_URL")
        && !val.is_empty()
    {
        config.backend.base_url = val;
    }
    if let Ok(val) = std::env::var("SNOWDASH_PRIVILEGED_ACCOUNT")
        && !val.is_empty()
    {
        config.access.privileged_account = val;
    }
    if let Ok(val) = std::env::var("SNOWDASH_DEFAULT_INTERVAL")
        && let Ok(minutes) = val.parse::<u32>()
    {
        config.views.default_interval_minutes = minutes;
    }
    if let Ok(val) = std::env::var("SNOWDASH_LANDING")
        && val.starts_with('/')
    {
        config.views.landing = val;
    }
    if let Ok(val) = std::env::var("SNOWDASH_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.snowdash/config.toml`.
///
/// Returns an error if the file already exists and `force` is false.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.snowdash/ directory")?;
    }

    fs::write(&path, DashConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Supports dotted keys like `backend.base_url`. When no file exists yet the
/// defaults are written first.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&DashConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    let output = toml::to_string_pretty(&root).context("failed to serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// The existing value's type decides how `raw_value` is parsed.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key: '{key}'"),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
