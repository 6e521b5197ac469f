//! Launch configuration models.
//!
//! `RawLaunchSettings` mirrors an entry of the editor's `launch.configurations`
//! list exactly as found (every field optional and untyped). `LaunchConfig` is
//! the resolved, typed view of the entry selected for this tool. `LaunchPlan`
//! applies platform defaults on top of it for one concrete launch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::settings::LaunchTemplate;

/// Discriminator value of the launch entries owned by this tool.
pub const LAUNCH_CONFIG_TYPE: &str = "react-native-ide";

/// Keys of a launch entry that are consumed or ignored rather than kept in `extra`.
pub(crate) const RESERVED_KEYS: &[&str] = &["type", "request"];

/// One launch entry as stored by the editor, before any typing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLaunchSettings {
    #[serde(rename = "type", default)]
    pub kind: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub app_root: Option<Value>,
    #[serde(default)]
    pub env: Option<Value>,
    #[serde(default)]
    pub ios: Option<Value>,
    #[serde(default)]
    pub android: Option<Value>,
    #[serde(default)]
    pub preview: Option<Value>,
    /// Everything else in the entry.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// iOS build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

/// Android build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Preview panel behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_app_launch: Option<bool>,
}

/// Resolved launch configuration.
///
/// Absent stays absent: an empty string or `false` here means the user wrote
/// exactly that. `Default` is the all-absent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<IosSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewSettings>,
    /// Keys this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LaunchConfig {
    /// True when no field at all was resolved.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self == &Self::default()
    }

    /// The `preview.waitForAppLaunch` flag as written, if any.
    #[must_use]
    pub fn wait_for_app_launch(&self) -> Option<bool> {
        self.preview.as_ref().and_then(|p| p.wait_for_app_launch)
    }
}

/// Target platform of a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ios => write!(f, "ios"),
            Self::Android => write!(f, "android"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// What the platform launch mechanism reports about one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchSignal {
    /// The launch process is running.
    Spawned,
    /// The app itself is up.
    AppLaunched,
    /// The launch process ended.
    Exited { code: Option<i32> },
    /// The launch process could not be started or supervised.
    Failed { message: String },
}

const DEFAULT_IOS_CONFIGURATION: &str = "Debug";
const DEFAULT_ANDROID_VARIANT: &str = "debug";
const DEFAULT_WAIT_FOR_APP_LAUNCH: bool = true;

/// A launch configuration with platform defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    pub platform: Platform,
    pub app_root: PathBuf,
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub wait_for_app_launch: bool,
}

impl LaunchPlan {
    /// Apply defaults for `platform`. A relative `appRoot` is taken relative to
    /// the workspace root.
    #[must_use]
    pub fn new(config: &LaunchConfig, platform: Platform, workspace_root: &Path) -> Self {
        let app_root = match &config.app_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => workspace_root.join(root),
            None => workspace_root.to_path_buf(),
        };

        let ios = config.ios.clone().unwrap_or_default();
        let android = config.android.clone().unwrap_or_default();

        let (scheme, configuration, variant) = match platform {
            Platform::Ios => (
                ios.scheme,
                Some(
                    ios.configuration
                        .unwrap_or_else(|| DEFAULT_IOS_CONFIGURATION.to_string()),
                ),
                None,
            ),
            Platform::Android => (
                None,
                None,
                Some(
                    android
                        .variant
                        .unwrap_or_else(|| DEFAULT_ANDROID_VARIANT.to_string()),
                ),
            ),
            Platform::Web => (None, None, None),
        };

        Self {
            platform,
            app_root,
            env: config.env.clone().unwrap_or_default(),
            scheme,
            configuration,
            variant,
            wait_for_app_launch: config
                .wait_for_app_launch()
                .unwrap_or(DEFAULT_WAIT_FOR_APP_LAUNCH),
        }
    }

    fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "app_root" => Some(self.app_root.display().to_string()),
            "scheme" => self.scheme.clone(),
            "configuration" => self.configuration.clone(),
            "variant" => self.variant.clone(),
            _ => None,
        }
    }

    /// Expand a command template into program and arguments.
    ///
    /// Arguments referencing a placeholder without a value are left out.
    #[must_use]
    pub fn command(&self, template: &LaunchTemplate) -> (String, Vec<String>) {
        let args = template
            .args
            .iter()
            .filter_map(|arg| self.expand(arg))
            .collect();
        (template.program.clone(), args)
    }

    fn expand(&self, arg: &str) -> Option<String> {
        let mut out = String::with_capacity(arg.len());
        let mut rest = arg;

        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let name = &rest[start + 1..start + len];
            out.push_str(&self.placeholder(name)?);
            rest = &rest[start + len + 1..];
        }

        out.push_str(rest);
        Some(out)
    }
}
