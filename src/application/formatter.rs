//! Output formatting for resolved configurations, launch plans and bundles.
//!
//! Supports two output formats: JSON and table view.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{BuildArtifactSet, LaunchConfig, LaunchPlan};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format for programmatic use.
    Json,
    /// Human-readable table.
    #[default]
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {s}. Use: json, table")),
        }
    }
}

/// A launch plan together with the command it expands to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView<'a> {
    #[serde(flatten)]
    pub plan: &'a LaunchPlan,
    pub program: &'a str,
    pub args: &'a [String],
}

/// Formats any serializable value as pretty JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Formats a resolved launch configuration as a field/value table.
pub fn format_config_table(config: &LaunchConfig) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);

    let ios = config.ios.as_ref();
    let android = config.android.as_ref();
    table.add_row(vec!["name".to_string(), or_absent(config.name.as_deref())]);
    table.add_row(vec![
        "appRoot".to_string(),
        or_absent(config.app_root.as_ref().map(|p| p.display().to_string()).as_deref()),
    ]);
    table.add_row(vec![
        "ios.scheme".to_string(),
        or_absent(ios.and_then(|i| i.scheme.as_deref())),
    ]);
    table.add_row(vec![
        "ios.configuration".to_string(),
        or_absent(ios.and_then(|i| i.configuration.as_deref())),
    ]);
    table.add_row(vec![
        "android.variant".to_string(),
        or_absent(android.and_then(|a| a.variant.as_deref())),
    ]);
    table.add_row(vec![
        "preview.waitForAppLaunch".to_string(),
        or_absent(config.wait_for_app_launch().map(|w| w.to_string()).as_deref()),
    ]);

    match &config.env {
        Some(env) if !env.is_empty() => {
            for (key, value) in env {
                table.add_row(vec![format!("env.{key}"), truncate(value, 40)]);
            }
        }
        Some(_) => {
            table.add_row(vec!["env".to_string(), "(empty)".to_string()]);
        }
        None => {
            table.add_row(vec!["env".to_string(), "-".to_string()]);
        }
    }

    for (key, value) in &config.extra {
        table.add_row(vec![key.clone(), truncate(&value.to_string(), 40)]);
    }

    table.to_string()
}

/// Formats a launch plan and its expanded command as a table.
pub fn format_plan_table(view: &PlanView<'_>) -> String {
    let plan = view.plan;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);

    table.add_row(vec!["platform".to_string(), plan.platform.to_string()]);
    table.add_row(vec!["appRoot".to_string(), plan.app_root.display().to_string()]);
    table.add_row(vec!["scheme".to_string(), or_absent(plan.scheme.as_deref())]);
    table.add_row(vec![
        "configuration".to_string(),
        or_absent(plan.configuration.as_deref()),
    ]);
    table.add_row(vec!["variant".to_string(), or_absent(plan.variant.as_deref())]);
    table.add_row(vec![
        "waitForAppLaunch".to_string(),
        plan.wait_for_app_launch.to_string(),
    ]);
    table.add_row(vec!["env".to_string(), plan.env.len().to_string()]);
    table.add_row(vec![
        "command".to_string(),
        std::iter::once(view.program)
            .chain(view.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" "),
    ]);

    table.to_string()
}

/// Formats the assets of a bundle as a table.
pub fn format_artifacts_table(artifacts: &BuildArtifactSet) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Source", "Emitted", "Size", "Digest"]);

    for asset in &artifacts.assets {
        table.add_row(vec![
            truncate(&asset.logical_name, 40),
            asset.file_name.clone(),
            format_size(asset.size_bytes),
            asset.digest.chars().take(12).collect(),
        ]);
    }

    table.to_string()
}

/// Formats a bundle summary for display.
pub fn format_build_summary(artifacts: &BuildArtifactSet) -> String {
    format!(
        "{}\n  Output: {}\n  Script: {}\n  Stylesheet: {}\n  Assets: {} ({})",
        "📦 Webview bundle".bold(),
        artifacts.out_dir.display().to_string().cyan(),
        artifacts.script.green(),
        artifacts.stylesheet.green(),
        artifacts.assets.len().to_string().yellow(),
        format_size(artifacts.asset_bytes())
    )
}

fn or_absent(value: Option<&str>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:?}"))
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetEntry, IosSettings, Platform};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_config_table_distinguishes_absent_and_empty() {
        let config = LaunchConfig {
            ios: Some(IosSettings {
                scheme: Some(String::new()),
                configuration: None,
            }),
            env: Some(BTreeMap::new()),
            ..LaunchConfig::default()
        };
        let out = format_config_table(&config);
        assert!(out.contains("\"\""));
        assert!(out.contains("(empty)"));
    }

    #[test]
    fn test_plan_view_json_includes_command() {
        let plan = LaunchPlan::new(&LaunchConfig::default(), Platform::Android, Path::new("/ws"));
        let args = vec!["run-android".to_string(), "--mode=debug".to_string()];
        let view = PlanView {
            plan: &plan,
            program: "npx",
            args: &args,
        };

        let json: serde_json::Value = serde_json::from_str(&format_json(&view).unwrap()).unwrap();
        assert_eq!(json["platform"], "android");
        assert_eq!(json["variant"], "debug");
        assert_eq!(json["program"], "npx");
        assert_eq!(json["args"][1], "--mode=debug");
        assert!(format_plan_table(&view).contains("npx run-android --mode=debug"));
    }

    #[test]
    fn test_artifacts_table_lists_assets() {
        let artifacts = BuildArtifactSet {
            out_dir: PathBuf::from("/ws/dist"),
            script: "webview.js".into(),
            stylesheet: "webview.css".into(),
            assets: vec![AssetEntry {
                logical_name: "img/logo.png".into(),
                file_name: "assets/logo-0123abcd.png".into(),
                digest: "0123abcd".repeat(8),
                size_bytes: 4096,
            }],
        };
        let out = format_artifacts_table(&artifacts);
        assert!(out.contains("img/logo.png"));
        assert!(out.contains("assets/logo-0123abcd.png"));
        assert!(out.contains("4.0 KB"));
    }
}
