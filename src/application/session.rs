//! Preview session runner.
//!
//! Owns everything with a lifetime: the bridge, the build and launch tasks,
//! and the timers. It feeds their completions into the
//! [`PreviewOrchestrator`] and carries out the effects it returns.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{AppError, AttemptToken, Platform, PreviewState, Result};
use crate::infrastructure::{AppLauncher, ConfigSource};

use super::bridge::HostWebviewBridge;
use super::bundler::ArtifactBuilder;
use super::orchestrator::{Effect, Event, PreviewOrchestrator};

/// One preview panel's launch lifecycle.
pub struct PreviewSession<S, B, L> {
    orchestrator: PreviewOrchestrator<S>,
    builder: Arc<B>,
    launcher: Arc<L>,
    bridge: HostWebviewBridge,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    tasks: Vec<(AttemptToken, JoinHandle<()>)>,
}

impl<S, B, L> PreviewSession<S, B, L>
where
    S: ConfigSource,
    B: ArtifactBuilder,
    L: AppLauncher,
{
    /// Wire a session to its bridge. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns error if the bridge is disposed or already has a handler.
    pub fn new(
        orchestrator: PreviewOrchestrator<S>,
        builder: B,
        launcher: L,
        mut bridge: HostWebviewBridge,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inbound_tx = events_tx.clone();
        bridge.on_message(move |inbound| {
            let _ = inbound_tx.send(Event::Webview(inbound));
        })?;

        Ok(Self {
            orchestrator,
            builder: Arc::new(builder),
            launcher: Arc::new(launcher),
            bridge,
            events_tx,
            events_rx,
            tasks: Vec::new(),
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PreviewState {
        self.orchestrator.state()
    }

    /// Sender for feeding events from outside (signals, editor commands).
    #[must_use]
    pub fn events(&self) -> mpsc::UnboundedSender<Event> {
        self.events_tx.clone()
    }

    /// Start a new launch attempt, cancelling any in flight.
    ///
    /// # Errors
    /// Returns `ChannelClosed` if the bridge is gone; nothing is started then.
    pub fn request_launch(&mut self, platform: Platform) -> Result<()> {
        if self.bridge.is_closed() || !self.orchestrator.bridge_open() {
            return Err(AppError::ChannelClosed);
        }
        self.dispatch(Event::LaunchRequested { platform });
        Ok(())
    }

    /// Tear the session down.
    pub fn stop(&mut self) {
        self.dispatch(Event::StopRequested);
    }

    /// Handle one event and carry out its effects.
    pub fn dispatch(&mut self, event: Event) {
        for effect in self.orchestrator.handle(event) {
            self.apply(effect);
        }
    }

    /// Wait for and handle the next event.
    pub async fn step(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.dispatch(event);
        }
    }

    /// Handle events until `done` holds for the state.
    pub async fn run_until(&mut self, done: impl Fn(PreviewState) -> bool) -> PreviewState {
        while !done(self.state()) {
            self.step().await;
        }
        self.state()
    }

    /// Handle events until the session is stopped or the webview is gone.
    pub async fn run(&mut self) -> PreviewState {
        while self.state() != PreviewState::Stopped && self.orchestrator.bridge_open() {
            self.step().await;
        }
        tracing::info!(state = %self.state(), "Preview session ended");
        self.state()
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Send(message) => {
                if let Err(e) = self.bridge.send(&message) {
                    tracing::warn!(error = %e, "Message for the webview dropped");
                }
            }
            Effect::StartBuild { attempt } => {
                let builder = Arc::clone(&self.builder);
                let events = self.events_tx.clone();
                self.track(
                    attempt,
                    tokio::spawn(async move {
                        let result = tokio::task::spawn_blocking(move || builder.build())
                            .await
                            .unwrap_or_else(|e| Err(AppError::build(format!("build task failed: {e}"))));
                        let _ = events.send(Event::BuildFinished { attempt, result });
                    }),
                );
            }
            Effect::StartLaunch { attempt, plan } => {
                let (signals_tx, mut signals_rx) = mpsc::unbounded_channel();
                let process = self.launcher.launch(plan, signals_tx);
                let events = self.events_tx.clone();
                self.track(attempt, process);
                self.track(
                    attempt,
                    tokio::spawn(async move {
                        while let Some(signal) = signals_rx.recv().await {
                            let _ = events.send(Event::Launch { attempt, signal });
                        }
                    }),
                );
            }
            Effect::StartTimer { attempt, after } => {
                let events = self.events_tx.clone();
                self.track(
                    attempt,
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = events.send(Event::LaunchTimedOut { attempt });
                    }),
                );
            }
            Effect::Cancel { attempt } => {
                // A build already running on the blocking pool is not stopped.
                // It finishes with atomic writes and its result carries the
                // old token, so the orchestrator drops it.
                self.tasks.retain(|(owner, task)| {
                    if *owner == attempt {
                        task.abort();
                        false
                    } else {
                        true
                    }
                });
            }
            Effect::DisposeBridge => self.bridge.dispose(),
        }
    }

    fn track(&mut self, attempt: AttemptToken, task: JoinHandle<()>) {
        self.tasks.retain(|(_, task)| !task.is_finished());
        self.tasks.push((attempt, task));
    }
}

impl<S, B, L> Drop for PreviewSession<S, B, L> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain(..) {
            task.abort();
        }
    }
}
