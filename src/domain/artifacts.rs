//! Webview bundle output.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed name of the bundled script. The host's loader refers to it by name.
pub const SCRIPT_FILE_NAME: &str = "webview.js";

/// Fixed name of the bundled stylesheet.
pub const STYLESHEET_FILE_NAME: &str = "webview.css";

/// Subdirectory holding content-addressed assets.
pub const ASSETS_DIR: &str = "assets";

/// One content-addressed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Source path relative to the webview source root, `/`-separated.
    pub logical_name: String,
    /// Emitted path relative to the output directory, e.g. `assets/logo-1a2b3c4d.png`.
    pub file_name: String,
    /// Full hex SHA-256 of the content.
    pub digest: String,
    pub size_bytes: u64,
}

/// Result of one bundling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifactSet {
    pub out_dir: PathBuf,
    pub script: String,
    pub stylesheet: String,
    /// Sorted by logical name.
    pub assets: Vec<AssetEntry>,
}

impl BuildArtifactSet {
    /// Look up an asset by its logical name.
    #[must_use]
    pub fn asset(&self, logical_name: &str) -> Option<&AssetEntry> {
        self.assets
            .iter()
            .find(|a| a.logical_name == logical_name)
    }

    /// Absolute path of the script entry.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.out_dir.join(&self.script)
    }

    /// Absolute path of the stylesheet entry.
    #[must_use]
    pub fn stylesheet_path(&self) -> PathBuf {
        self.out_dir.join(&self.stylesheet)
    }

    /// Emitted asset paths relative to the output directory.
    #[must_use]
    pub fn asset_files(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.file_name.clone()).collect()
    }

    /// Total emitted asset bytes.
    #[must_use]
    pub fn asset_bytes(&self) -> u64 {
        self.assets.iter().map(|a| a.size_bytes).sum()
    }
}
