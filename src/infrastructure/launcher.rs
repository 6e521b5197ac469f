//! Platform launch processes.
//!
//! Starts the per-platform launch command (simulator, device or web bundler)
//! and reports its progress as [`LaunchSignal`]s.

use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{LaunchPlan, LaunchSignal, LaunchSettings, LaunchTemplate};

/// Something that can start the app for a launch plan.
pub trait AppLauncher: Send + Sync + 'static {
    /// Start launching. Progress goes to `signals`; aborting the returned task
    /// stops the launch. Must be called from within a Tokio runtime.
    fn launch(&self, plan: LaunchPlan, signals: mpsc::UnboundedSender<LaunchSignal>) -> JoinHandle<()>;
}

/// Launches apps by running the configured command for each platform.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    settings: LaunchSettings,
}

impl CommandLauncher {
    #[must_use]
    pub const fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }
}

impl AppLauncher for CommandLauncher {
    fn launch(&self, plan: LaunchPlan, signals: mpsc::UnboundedSender<LaunchSignal>) -> JoinHandle<()> {
        let template = self.settings.template(plan.platform).clone();
        tokio::spawn(supervise(plan, template, signals))
    }
}

enum Stream {
    Stdout,
    Stderr,
}

async fn supervise(
    plan: LaunchPlan,
    template: LaunchTemplate,
    signals: mpsc::UnboundedSender<LaunchSignal>,
) {
    let (program, args) = plan.command(&template);

    let mut command = Command::new(&program);
    command
        .args(&args)
        .current_dir(&plan.app_root)
        .envs(&plan.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = signals.send(LaunchSignal::Failed {
                message: format!("failed to start {program}: {e}"),
            });
            return;
        }
    };

    tracing::info!(
        platform = %plan.platform,
        program = %program,
        args = ?args,
        cwd = %plan.app_root.display(),
        "Launch process started"
    );
    let _ = signals.send(LaunchSignal::Spawned);

    let mut stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
    let mut stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
    let mut launched = false;

    while stdout.is_some() || stderr.is_some() {
        let (stream, line) = tokio::select! {
            line = next_line(&mut stdout), if stdout.is_some() => (Stream::Stdout, line),
            line = next_line(&mut stderr), if stderr.is_some() => (Stream::Stderr, line),
        };

        let Some(line) = line else {
            match stream {
                Stream::Stdout => stdout = None,
                Stream::Stderr => stderr = None,
            }
            continue;
        };

        tracing::trace!(platform = %plan.platform, "{line}");
        if !launched
            && template
                .launched_marker
                .as_deref()
                .is_some_and(|marker| line.contains(marker))
        {
            launched = true;
            tracing::info!(platform = %plan.platform, "App reported launch");
            let _ = signals.send(LaunchSignal::AppLaunched);
        }
    }

    let signal = match child.wait().await {
        Ok(status) => LaunchSignal::Exited {
            code: status.code(),
        },
        Err(e) => LaunchSignal::Failed {
            message: format!("failed to wait for {program}: {e}"),
        },
    };
    let _ = signals.send(signal);
}

/// Next output line. Invalid UTF-8 is replaced, not treated as end of
/// output; `None` only at EOF or on a read error.
async fn next_line<R>(lines: &mut Option<Split<R>>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let Some(lines) = lines else {
        return std::future::pending().await;
    };
    match lines.next_segment().await {
        Ok(Some(bytes)) => {
            let line = String::from_utf8_lossy(&bytes);
            Some(line.trim_end_matches('\r').to_string())
        }
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Launch output stream failed");
            None
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::{LaunchConfig, Platform};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn launcher(script: &str, marker: Option<&str>) -> CommandLauncher {
        let mut settings = LaunchSettings::default();
        settings.web = LaunchTemplate {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            launched_marker: marker.map(String::from),
        };
        CommandLauncher::new(settings)
    }

    fn plan(dir: &Path) -> LaunchPlan {
        let mut plan = LaunchPlan::new(&LaunchConfig::default(), Platform::Web, dir);
        plan.env = BTreeMap::from([("GREETING".to_string(), "hello".to_string())]);
        plan
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<LaunchSignal>) -> Vec<LaunchSignal> {
        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        signals
    }

    #[tokio::test]
    async fn test_marker_line_reports_app_launched() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = launcher(
            "echo building; echo \"$GREETING, Successfully launched\" >&2; exit 0",
            Some("Successfully launched"),
        )
        .launch(plan(dir.path()), tx);

        task.await.unwrap();
        assert_eq!(
            collect(rx).await,
            vec![
                LaunchSignal::Spawned,
                LaunchSignal::AppLaunched,
                LaunchSignal::Exited { code: Some(0) },
            ]
        );
    }

    #[tokio::test]
    async fn test_non_utf8_output_keeps_reading() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = launcher(
            "printf 'build \\377\\n'; sleep 0.2; echo 'Successfully launched'; exit 0",
            Some("Successfully launched"),
        )
        .launch(plan(dir.path()), tx);

        task.await.unwrap();
        assert_eq!(
            collect(rx).await,
            vec![
                LaunchSignal::Spawned,
                LaunchSignal::AppLaunched,
                LaunchSignal::Exited { code: Some(0) },
            ]
        );
    }

    #[tokio::test]
    async fn test_env_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = launcher("echo \"$GREETING world\"", Some("hello world"))
            .launch(plan(dir.path()), tx);

        task.await.unwrap();
        assert!(collect(rx).await.contains(&LaunchSignal::AppLaunched));
    }

    #[tokio::test]
    async fn test_failing_process_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = launcher("echo nope; exit 3", Some("Successfully launched"))
            .launch(plan(dir.path()), tx);

        task.await.unwrap();
        assert_eq!(
            collect(rx).await,
            vec![LaunchSignal::Spawned, LaunchSignal::Exited { code: Some(3) }]
        );
    }

    #[tokio::test]
    async fn test_missing_program_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = LaunchSettings::default();
        settings.web.program = "definitely-not-a-real-launcher-binary".into();
        let (tx, rx) = mpsc::unbounded_channel();

        CommandLauncher::new(settings)
            .launch(plan(dir.path()), tx)
            .await
            .unwrap();

        let signals = collect(rx).await;
        assert_eq!(signals.len(), 1);
        assert!(matches!(&signals[0], LaunchSignal::Failed { message } if message.contains("failed to start")));
    }
}
