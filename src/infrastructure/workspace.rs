//! Workspace launch configuration discovery.
//!
//! Reads the editor's launch configuration list from a workspace folder. The
//! files are JSON with comments, as the editor writes them.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::{AppError, Result};

/// Editor settings directory inside a workspace folder.
const EDITOR_DIR: &str = ".vscode";
const LAUNCH_FILE: &str = "launch.json";
const SETTINGS_FILE: &str = "settings.json";

/// Read-only view of the editor's launch configuration store.
pub trait ConfigSource {
    /// Every launch entry currently in the store, in store order.
    ///
    /// Never fails: an unreadable store is an empty one.
    fn launch_configurations(&self) -> Vec<Value>;
}

/// Launch entries of a workspace folder, re-read on every query.
#[derive(Debug, Clone)]
pub struct WorkspaceConfigSource {
    root: PathBuf,
}

impl WorkspaceConfigSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the workspace's `launch.json`.
    #[must_use]
    pub fn launch_file(&self) -> PathBuf {
        self.root.join(EDITOR_DIR).join(LAUNCH_FILE)
    }

    /// Path of the workspace's `settings.json`.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(EDITOR_DIR).join(SETTINGS_FILE)
    }
}

impl ConfigSource for WorkspaceConfigSource {
    /// `launch.json` replaces the `launch` key of `settings.json` as a whole
    /// when it defines `configurations`; the two lists are never merged.
    fn launch_configurations(&self) -> Vec<Value> {
        let launch_file = read_jsonc_file(&self.launch_file())
            .filter(|doc| doc.get("configurations").is_some());

        let (origin, entries) = match launch_file {
            Some(doc) => (LAUNCH_FILE, configurations_of(&doc)),
            None => (
                SETTINGS_FILE,
                read_jsonc_file(&self.settings_file())
                    .and_then(|doc| doc.get("launch").map(configurations_of))
                    .unwrap_or_default(),
            ),
        };

        tracing::debug!(
            root = %self.root.display(),
            origin,
            entries = entries.len(),
            "Read launch configurations"
        );
        entries
    }
}

/// A fixed list of launch entries.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    entries: Vec<Value>,
}

impl StaticConfigSource {
    #[must_use]
    pub const fn new(entries: Vec<Value>) -> Self {
        Self { entries }
    }
}

impl ConfigSource for StaticConfigSource {
    fn launch_configurations(&self) -> Vec<Value> {
        self.entries.clone()
    }
}

/// Nearest ancestor of `start` (inclusive) holding editor settings, or
/// `start` itself when there is none.
#[must_use]
pub fn find_workspace_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(EDITOR_DIR).is_dir())
        .map_or_else(|| start.to_path_buf(), Path::to_path_buf)
}

fn configurations_of(doc: &Value) -> Vec<Value> {
    match doc.get("configurations") {
        Some(Value::Array(entries)) => entries.clone(),
        Some(other) => {
            tracing::warn!(found = %other, "Ignoring non-array launch configurations");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn read_jsonc_file(path: &Path) -> Option<Value> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "No editor settings file");
        return None;
    }

    match fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))
        .and_then(|content| parse_jsonc(&content))
    {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable editor settings");
            None
        }
    }
}

/// Parse JSON that may contain `//` and `/* */` comments and trailing commas.
///
/// # Errors
/// Returns error if the remaining text is not valid JSON.
pub fn parse_jsonc(content: &str) -> Result<Value> {
    serde_json::from_str(&strip_trailing_commas(&strip_comments(content)))
        .map_err(AppError::json_parse)
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}' | ']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}
