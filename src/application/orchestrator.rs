//! Preview launch state machine.
//!
//! `Idle → Resolving → Building → Launching → Attached`, with `Failed` on any
//! error and `Stopped` on teardown. The machine itself does no I/O: every
//! [`Event`] it handles returns the [`Effect`]s the session has to carry out.
//! Each attempt gets a fresh [`AttemptToken`]; completions carrying an older
//! token are dropped.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{
    AppError, AttemptToken, BuildArtifactSet, FailureKind, HostMessage, LaunchPlan, LaunchSignal,
    Platform, PreviewState, Result, UserAction, WebviewMessage,
};
use crate::infrastructure::ConfigSource;

use super::bridge::Inbound;
use super::resolver::resolve;

/// Input to the state machine.
#[derive(Debug)]
pub enum Event {
    LaunchRequested {
        platform: Platform,
    },
    BuildFinished {
        attempt: AttemptToken,
        result: Result<BuildArtifactSet>,
    },
    Launch {
        attempt: AttemptToken,
        signal: LaunchSignal,
    },
    LaunchTimedOut {
        attempt: AttemptToken,
    },
    Webview(Inbound),
    StopRequested,
}

/// Work the session must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(HostMessage),
    StartBuild {
        attempt: AttemptToken,
    },
    StartLaunch {
        attempt: AttemptToken,
        plan: LaunchPlan,
    },
    StartTimer {
        attempt: AttemptToken,
        after: Duration,
    },
    /// Stop all work belonging to the attempt.
    Cancel {
        attempt: AttemptToken,
    },
    DisposeBridge,
}

#[derive(Debug, Clone)]
struct ActiveAttempt {
    token: AttemptToken,
    plan: LaunchPlan,
}

/// The launch state machine for one preview session.
pub struct PreviewOrchestrator<S> {
    source: S,
    workspace_root: PathBuf,
    launch_timeout: Duration,
    state: PreviewState,
    last_attempt: AttemptToken,
    active: Option<ActiveAttempt>,
    bridge_open: bool,
}

impl<S: ConfigSource> PreviewOrchestrator<S> {
    /// Create an idle orchestrator.
    pub fn new(source: S, workspace_root: impl Into<PathBuf>, launch_timeout: Duration) -> Self {
        Self {
            source,
            workspace_root: workspace_root.into(),
            launch_timeout,
            state: PreviewState::Idle,
            last_attempt: AttemptToken::default(),
            active: None,
            bridge_open: true,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PreviewState {
        self.state
    }

    /// Token of the attempt currently driving the machine, if any.
    #[must_use]
    pub fn current_attempt(&self) -> Option<AttemptToken> {
        self.active.as_ref().map(|a| a.token)
    }

    /// Whether the machine can still talk to the webview.
    #[must_use]
    pub const fn bridge_open(&self) -> bool {
        self.bridge_open
    }

    /// Handle one event.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            Event::LaunchRequested { platform } => self.on_launch_requested(platform, &mut effects),
            Event::BuildFinished { attempt, result } => {
                self.on_build_finished(attempt, result, &mut effects);
            }
            Event::Launch { attempt, signal } => self.on_launch_signal(attempt, signal, &mut effects),
            Event::LaunchTimedOut { attempt } => {
                if self.is_current(attempt, PreviewState::Launching) {
                    let secs = self.launch_timeout.as_secs();
                    self.fail(&AppError::LaunchTimeout { secs }, &mut effects);
                } else {
                    tracing::debug!(%attempt, "Discarding stale launch timeout");
                }
            }
            Event::Webview(inbound) => self.on_webview(inbound, &mut effects),
            Event::StopRequested => self.on_stop(&mut effects),
        }

        effects
    }

    fn on_launch_requested(&mut self, platform: Platform, effects: &mut Vec<Effect>) {
        if self.state == PreviewState::Stopped {
            tracing::warn!("Launch requested on a stopped session, ignoring");
            return;
        }
        if !self.bridge_open {
            tracing::warn!("Launch requested but the bridge is closed, ignoring");
            return;
        }

        self.cancel_active(effects);

        let attempt = self.last_attempt.next();
        self.last_attempt = attempt;
        tracing::info!(%attempt, %platform, "Launch requested");

        self.transition(attempt, PreviewState::Resolving, effects);
        let config = resolve(&self.source.launch_configurations());
        let plan = LaunchPlan::new(&config, platform, &self.workspace_root);
        self.send(
            HostMessage::ConfigResolved {
                attempt,
                config,
            },
            effects,
        );
        self.active = Some(ActiveAttempt {
            token: attempt,
            plan,
        });

        self.transition(attempt, PreviewState::Building, effects);
        effects.push(Effect::StartBuild { attempt });
    }

    fn on_build_finished(
        &mut self,
        attempt: AttemptToken,
        result: Result<BuildArtifactSet>,
        effects: &mut Vec<Effect>,
    ) {
        if !self.is_current(attempt, PreviewState::Building) {
            tracing::debug!(%attempt, "Discarding stale build result");
            return;
        }

        let artifacts = match result {
            Ok(artifacts) => artifacts,
            Err(err) => {
                self.fail(&err, effects);
                return;
            }
        };

        let Some(plan) = self.active.as_ref().map(|a| a.plan.clone()) else {
            return;
        };

        self.send(
            HostMessage::BuildReady {
                attempt,
                script: artifacts.script.clone(),
                stylesheet: artifacts.stylesheet.clone(),
                assets: artifacts.asset_files(),
            },
            effects,
        );
        self.transition(attempt, PreviewState::Launching, effects);

        let wait = plan.wait_for_app_launch;
        effects.push(Effect::StartLaunch { attempt, plan });
        if wait {
            effects.push(Effect::StartTimer {
                attempt,
                after: self.launch_timeout,
            });
        }
    }

    fn on_launch_signal(
        &mut self,
        attempt: AttemptToken,
        signal: LaunchSignal,
        effects: &mut Vec<Effect>,
    ) {
        let Some(active) = self.active.as_ref().filter(|a| a.token == attempt) else {
            tracing::debug!(%attempt, ?signal, "Discarding stale launch signal");
            return;
        };
        let wait = active.plan.wait_for_app_launch;

        match (self.state, signal) {
            (PreviewState::Launching, LaunchSignal::Spawned) if !wait => {
                self.transition(attempt, PreviewState::Attached, effects);
            }
            (PreviewState::Launching, LaunchSignal::Spawned) => {
                tracing::debug!(%attempt, "Launch process running, waiting for the app");
            }
            (PreviewState::Launching, LaunchSignal::AppLaunched) => {
                self.transition(attempt, PreviewState::Attached, effects);
            }
            (PreviewState::Attached, LaunchSignal::Exited { code: Some(0) }) => {
                tracing::info!(%attempt, "Launch process finished, app stays attached");
            }
            (PreviewState::Launching | PreviewState::Attached, LaunchSignal::Exited { code }) => {
                let code = code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
                self.fail(
                    &AppError::launch(format!("launch process exited with {code}")),
                    effects,
                );
            }
            (PreviewState::Launching | PreviewState::Attached, LaunchSignal::Failed { message }) => {
                self.fail(&AppError::launch(message), effects);
            }
            (state, signal) => {
                tracing::debug!(%attempt, %state, ?signal, "Ignoring launch signal");
            }
        }
    }

    fn on_webview(&mut self, inbound: Inbound, effects: &mut Vec<Effect>) {
        match inbound {
            Inbound::Message(WebviewMessage::Ready) => {
                let attempt = self.current_attempt().unwrap_or(self.last_attempt);
                self.send(
                    HostMessage::LaunchStatus {
                        attempt,
                        status: self.state,
                    },
                    effects,
                );
            }
            Inbound::Message(WebviewMessage::UserAction { action }) => match action {
                UserAction::Launch { platform } => self.on_launch_requested(platform, effects),
                UserAction::Stop => self.on_stop(effects),
            },
            Inbound::Rejected(err) => {
                tracing::error!(error = %err, "Webview broke the protocol, closing the bridge");
                self.fail(&err, effects);
                self.close_bridge(effects);
            }
            Inbound::Disconnected => {
                tracing::info!("Webview disconnected");
                if self.state.is_in_flight() {
                    self.bridge_open = false;
                    self.fail(&AppError::ChannelClosed, effects);
                }
                self.close_bridge(effects);
            }
        }
    }

    fn on_stop(&mut self, effects: &mut Vec<Effect>) {
        if self.state == PreviewState::Stopped {
            return;
        }
        let attempt = self.current_attempt().unwrap_or(self.last_attempt);
        self.cancel_active(effects);
        self.transition(attempt, PreviewState::Stopped, effects);
        self.close_bridge(effects);
    }

    /// End the active attempt with `err`, reporting it to the webview.
    fn fail(&mut self, err: &AppError, effects: &mut Vec<Effect>) {
        let kind = err.failure_kind().unwrap_or(FailureKind::LaunchFailure);
        let attempt = self.current_attempt().unwrap_or(self.last_attempt);
        tracing::warn!(%attempt, %kind, error = %err, "Launch attempt failed");

        self.cancel_active(effects);
        self.send(
            HostMessage::Error {
                attempt: Some(attempt),
                kind,
                message: err.to_string(),
            },
            effects,
        );
        self.transition(attempt, PreviewState::Failed { kind }, effects);
    }

    fn cancel_active(&mut self, effects: &mut Vec<Effect>) {
        if let Some(active) = self.active.take() {
            tracing::debug!(attempt = %active.token, "Cancelling attempt");
            effects.push(Effect::Cancel {
                attempt: active.token,
            });
        }
    }

    fn close_bridge(&mut self, effects: &mut Vec<Effect>) {
        self.bridge_open = false;
        if !effects.contains(&Effect::DisposeBridge) {
            effects.push(Effect::DisposeBridge);
        }
    }

    fn transition(&mut self, attempt: AttemptToken, state: PreviewState, effects: &mut Vec<Effect>) {
        tracing::info!(%attempt, from = %self.state, to = %state, "Preview state changed");
        self.state = state;
        self.send(
            HostMessage::LaunchStatus {
                attempt,
                status: state,
            },
            effects,
        );
    }

    fn send(&self, message: HostMessage, effects: &mut Vec<Effect>) {
        if self.bridge_open {
            effects.push(Effect::Send(message));
        }
    }

    fn is_current(&self, attempt: AttemptToken, state: PreviewState) -> bool {
        self.state == state && self.current_attempt() == Some(attempt)
    }
}
