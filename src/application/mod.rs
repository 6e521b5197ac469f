//! Application layer - use cases and orchestration.
//!
//! This layer resolves launch configurations, bundles the webview, carries
//! the host/webview protocol and drives the preview launch lifecycle.

pub mod bridge;
pub mod bundler;
pub mod dev;
pub mod formatter;
pub mod orchestrator;
pub mod resolver;
pub mod session;

pub use bridge::{channel, HostWebviewBridge, Inbound, WebviewPort};
pub use bundler::{ArtifactBuilder, BundleBuilder};
pub use dev::{rebuild_on_change, DEFAULT_SETTLE};
pub use formatter::{
    format_artifacts_table, format_build_summary, format_config_table, format_json,
    format_plan_table, OutputFormat, PlanView,
};
pub use orchestrator::{Effect, Event, PreviewOrchestrator};
pub use resolver::resolve;
pub use session::PreviewSession;
