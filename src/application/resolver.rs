//! Launch configuration resolution.
//!
//! Turns the editor's raw `launch.configurations` list into a [`LaunchConfig`].
//! Resolution is total: any input, including garbage, yields a configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::domain::launch::RESERVED_KEYS;
use crate::domain::{
    AndroidSettings, IosSettings, LaunchConfig, PreviewSettings, RawLaunchSettings,
    LAUNCH_CONFIG_TYPE,
};

/// Resolves the launch configuration from all entries of the store.
///
/// The first entry whose `type` is [`LAUNCH_CONFIG_TYPE`] wins. Without one,
/// the all-absent configuration is returned.
#[must_use]
pub fn resolve(entries: &[Value]) -> LaunchConfig {
    select(entries).map_or_else(
        || {
            tracing::debug!(
                entries = entries.len(),
                "No {LAUNCH_CONFIG_TYPE} launch entry, using empty configuration"
            );
            LaunchConfig::default()
        },
        project,
    )
}

/// Picks the first entry belonging to this tool. Entries that are not objects
/// never match.
#[must_use]
pub fn select(entries: &[Value]) -> Option<RawLaunchSettings> {
    entries
        .iter()
        .filter(|entry| entry.is_object())
        .filter_map(|entry| serde_json::from_value::<RawLaunchSettings>(entry.clone()).ok())
        .find(|raw| raw.kind.as_ref().and_then(Value::as_str) == Some(LAUNCH_CONFIG_TYPE))
}

/// Copies every recognised field through, typed. Fields with the wrong shape
/// become absent.
fn project(raw: RawLaunchSettings) -> LaunchConfig {
    let extra = raw
        .extra
        .into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .collect();

    LaunchConfig {
        name: string_field(raw.name.as_ref(), "name"),
        app_root: string_field(raw.app_root.as_ref(), "appRoot").map(PathBuf::from),
        env: raw.env.as_ref().and_then(env_field),
        ios: object_field(raw.ios.as_ref(), "ios").map(|ios| IosSettings {
            scheme: string_field(ios.get("scheme"), "ios.scheme"),
            configuration: string_field(ios.get("configuration"), "ios.configuration"),
        }),
        android: object_field(raw.android.as_ref(), "android").map(|android| AndroidSettings {
            variant: string_field(android.get("variant"), "android.variant"),
        }),
        preview: object_field(raw.preview.as_ref(), "preview").map(|preview| PreviewSettings {
            wait_for_app_launch: bool_field(
                preview.get("waitForAppLaunch"),
                "preview.waitForAppLaunch",
            ),
        }),
        extra,
    }
}

fn string_field(value: Option<&Value>, field: &str) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            tracing::warn!(field, found = %other, "Ignoring non-string launch setting");
            None
        }
    }
}

fn bool_field(value: Option<&Value>, field: &str) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        other => {
            tracing::warn!(field, found = %other, "Ignoring non-boolean launch setting");
            None
        }
    }
}

fn object_field<'a>(value: Option<&'a Value>, field: &str) -> Option<&'a Map<String, Value>> {
    match value? {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            tracing::warn!(field, found = %other, "Ignoring non-object launch setting");
            None
        }
    }
}

fn env_field(value: &Value) -> Option<BTreeMap<String, String>> {
    let map = object_field(Some(value), "env")?;
    Some(
        map.iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key.clone(), s.clone())),
                other => {
                    tracing::warn!(key, found = %other, "Dropping non-string env value");
                    None
                }
            })
            .collect(),
    )
}
