//! Source tree watching for development mode.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::domain::{AppError, Result};

/// Watches a directory tree and reports changed paths. Watching stops when
/// this is dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `root` recursively. Only paths for which `relevant`
    /// holds are reported.
    ///
    /// # Errors
    /// Returns error if the platform watcher cannot be created or `root`
    /// cannot be watched.
    pub fn start<F>(root: &Path, relevant: F) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)>
    where
        F: Fn(&Path) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove() => {
                    for path in event.paths {
                        if relevant(&path) {
                            let _ = tx.send(path);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })
        .map_err(|e| watch_error(root, &e))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(root, &e))?;

        tracing::debug!(root = %root.display(), "Watching sources");
        Ok((Self { _watcher: watcher }, rx))
    }
}

fn watch_error(root: &Path, err: &notify::Error) -> AppError {
    AppError::Io {
        message: format!("failed to watch {}: {err}", root.display()),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reports_relevant_changes_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (_watcher, mut changes) =
            SourceWatcher::start(&root, |path| path.extension().is_some_and(|e| e == "jsx")).unwrap();

        std::fs::write(root.join("notes.txt"), "ignored").unwrap();
        std::fs::write(root.join("App.jsx"), "export {}").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "App.jsx");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SourceWatcher::start(&dir.path().join("missing"), |_| true).is_err());
    }
}
