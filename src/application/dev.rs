//! Development mode.
//!
//! Keeps the webview bundle current while its sources are edited. Every
//! successful rebuild replaces the published [`BuildArtifactSet`]; a failed
//! one leaves the previous bundle in place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::domain::{AppError, BuildArtifactSet};

use super::bundler::ArtifactBuilder;

/// Quiet period after a change before rebuilding, so an editor's burst of
/// writes turns into one build.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(150);

/// Build once, then rebuild after every batch of `changes` until the change
/// feed closes.
pub async fn rebuild_on_change<B: ArtifactBuilder>(
    builder: Arc<B>,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    latest: watch::Sender<Option<BuildArtifactSet>>,
    settle: Duration,
) {
    rebuild(&builder, &latest, 0).await;

    let mut generation = 0_u64;
    while let Some(first) = changes.recv().await {
        tokio::time::sleep(settle).await;
        let mut batch = vec![first];
        while let Ok(path) = changes.try_recv() {
            batch.push(path);
        }

        generation += 1;
        tracing::info!(generation, changed = batch.len(), first = %batch[0].display(), "Sources changed, rebuilding");
        rebuild(&builder, &latest, generation).await;
    }

    tracing::debug!("Change feed closed, development build loop ends");
}

async fn rebuild<B: ArtifactBuilder>(
    builder: &Arc<B>,
    latest: &watch::Sender<Option<BuildArtifactSet>>,
    generation: u64,
) {
    let builder = Arc::clone(builder);
    let result = tokio::task::spawn_blocking(move || builder.build())
        .await
        .unwrap_or_else(|e| Err(AppError::build(format!("build task failed: {e}"))));

    match result {
        Ok(artifacts) => {
            tracing::info!(generation, assets = artifacts.assets.len(), "Bundle updated");
            latest.send_replace(Some(artifacts));
        }
        Err(e) => {
            tracing::warn!(generation, error = %e, "Rebuild failed, keeping the previous bundle");
        }
    }
}
