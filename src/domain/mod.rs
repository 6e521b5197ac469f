//! Domain layer - core types and the bridge protocol.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (filesystem, processes, etc.).

pub mod artifacts;
pub mod error;
pub mod launch;
pub mod message;
pub mod settings;

pub use artifacts::{AssetEntry, BuildArtifactSet, ASSETS_DIR, SCRIPT_FILE_NAME, STYLESHEET_FILE_NAME};
pub use error::{AppError, FailureKind, Result};
pub use launch::{
    AndroidSettings, IosSettings, LaunchConfig, LaunchPlan, LaunchSignal, Platform,
    PreviewSettings, RawLaunchSettings, LAUNCH_CONFIG_TYPE,
};
pub use message::{
    AttemptToken, HostMessage, PreviewState, UserAction, WebviewMessage, PROTOCOL_VERSION,
};
pub use settings::{AppConfig, LaunchSettings, LaunchTemplate};
