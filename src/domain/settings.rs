//! Host settings.
//!
//! Everything the host needs that does not come from the editor's launch
//! configuration: where the webview sources live, where the bundle goes, and
//! how each platform's app is started.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::launch::Platform;

/// Webview bundling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Webview entry point, relative to the workspace root.
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    /// Output directory, relative to the workspace root.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Local port of the development server (`rn-ide serve`).
    #[serde(default = "default_dev_port")]
    pub dev_port: u16,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            out_dir: default_out_dir(),
            dev_port: default_dev_port(),
        }
    }
}

const fn default_dev_port() -> u16 {
    2137
}

fn default_entry() -> PathBuf {
    PathBuf::from("src/webview/index.jsx")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

/// How to start the app for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTemplate {
    /// Executable to spawn.
    pub program: String,

    /// Arguments; may reference `{app_root}`, `{scheme}`, `{configuration}`, `{variant}`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Output line fragment that means the app is up.
    #[serde(default)]
    pub launched_marker: Option<String>,
}

impl LaunchTemplate {
    fn npx(args: &[&str], marker: &str) -> Self {
        Self {
            program: "npx".into(),
            args: args.iter().map(ToString::to_string).collect(),
            launched_marker: Some(marker.into()),
        }
    }

    fn default_ios() -> Self {
        Self::npx(
            &[
                "react-native",
                "run-ios",
                "--scheme={scheme}",
                "--mode={configuration}",
            ],
            "Successfully launched",
        )
    }

    fn default_android() -> Self {
        Self::npx(
            &["react-native", "run-android", "--mode={variant}"],
            "Successfully launched",
        )
    }

    fn default_web() -> Self {
        Self::npx(&["expo", "start", "--web"], "Web is waiting on")
    }
}

/// App launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    /// Upper bound on waiting for the app to report itself, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "LaunchTemplate::default_ios")]
    pub ios: LaunchTemplate,

    #[serde(default = "LaunchTemplate::default_android")]
    pub android: LaunchTemplate,

    #[serde(default = "LaunchTemplate::default_web")]
    pub web: LaunchTemplate,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            ios: LaunchTemplate::default_ios(),
            android: LaunchTemplate::default_android(),
            web: LaunchTemplate::default_web(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    120
}

impl LaunchSettings {
    /// Command template for a platform.
    #[must_use]
    pub const fn template(&self, platform: Platform) -> &LaunchTemplate {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
            Platform::Web => &self.web,
        }
    }

    /// Launch wait bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub launch: LaunchSettings,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".react-native-ide")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Absolute webview entry for a workspace.
    #[must_use]
    pub fn entry_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.build.entry)
    }

    /// Absolute output directory for a workspace.
    #[must_use]
    pub fn out_dir(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.build.out_dir)
    }
}
