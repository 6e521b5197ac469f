//! Configuration file management.
//!
//! Handles loading the host TOML configuration and writing the default one.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# React Native IDE host configuration
# Auto-generated - edit as needed

[build]
# Webview entry point, relative to the workspace root
entry = "src/webview/index.jsx"

# Output directory, relative to the workspace root (never cleaned)
out_dir = "dist"

# Port of the development server started by `rn-ide serve` (localhost only)
dev_port = 2137

[launch]
# Seconds to wait for the app when preview.waitForAppLaunch is on
timeout_secs = 120

# Arguments may use {app_root}, {scheme}, {configuration} and {variant}.
# An argument whose value is not set is left out.
[launch.ios]
program = "npx"
args = ["react-native", "run-ios", "--scheme={scheme}", "--mode={configuration}"]
launched_marker = "Successfully launched"

[launch.android]
program = "npx"
args = ["react-native", "run-android", "--mode={variant}"]
launched_marker = "Successfully launched"

[launch.web]
program = "npx"
args = ["expo", "start", "--web"]
launched_marker = "Web is waiting on"
"#;

/// Load configuration from `path`, the default location, or built-in defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed, or if an
/// explicitly given file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::default_config_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns whether a file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}
