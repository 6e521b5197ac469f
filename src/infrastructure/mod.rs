//! Infrastructure layer - external adapters (editor settings, filesystem, processes, dev server).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod dev_server;
pub mod launcher;
pub mod watcher;
pub mod workspace;

pub use config::{ensure_config_exists, load_config};
pub use dev_server::DevServer;
pub use launcher::{AppLauncher, CommandLauncher};
pub use watcher::SourceWatcher;
pub use workspace::{find_workspace_root, ConfigSource, StaticConfigSource, WorkspaceConfigSource};
