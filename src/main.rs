//! React Native IDE host - the editor-side plumbing of the preview panel.
//!
//! Resolves the workspace's `react-native-ide` launch configuration, bundles
//! the preview webview into content-addressed artifacts, and drives the app
//! launch while talking to the webview over a versioned JSON message bridge.
//!
//! Quick start:
//!   rn-ide config                 # Resolved launch configuration
//!   rn-ide plan ios               # Launch plan and command for iOS
//!   rn-ide build                  # Bundle the webview into dist/
//!   rn-ide serve                  # Rebuild on change, serve on :2137
//!   rn-ide preview android        # Run a session, frames on stdout/stdin
//!   rn-ide init                   # Write the default host config

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    channel, format_artifacts_table, format_build_summary, format_config_table, format_json,
    format_plan_table, rebuild_on_change, resolve, BundleBuilder, Event, OutputFormat, PlanView, PreviewOrchestrator,
    PreviewSession, WebviewPort, DEFAULT_SETTLE,
};
use cli::{Cli, Commands};
use domain::{AppConfig, LaunchConfig, LaunchPlan, Platform, PreviewState};
use infrastructure::{
    ensure_config_exists, find_workspace_root, load_config, CommandLauncher, ConfigSource,
    DevServer, SourceWatcher, WorkspaceConfigSource,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| domain::AppError::Config { message: e })?;
    let config = load_config(cli.config.as_deref()).context("Failed to load host configuration")?;

    match cli.command {
        Commands::Config { workspace } => cmd_config(&workspace, format),
        Commands::Plan {
            platform,
            workspace,
        } => cmd_plan(&config, platform, &workspace, format),
        Commands::Build {
            workspace,
            entry,
            out,
        } => cmd_build(&config, &workspace, entry, out, format),
        Commands::Serve { workspace, port } => cmd_serve(&config, &workspace, port),
        Commands::Preview {
            platform,
            workspace,
            timeout,
        } => cmd_preview(config, platform, &workspace, timeout),
        Commands::Init => cmd_init(cli.config.as_deref()),
        Commands::Paths { workspace } => cmd_paths(&config, cli.config.as_deref(), &workspace),
    }
}

/// Resolve the workspace folder the editor would have open.
fn workspace_root(dir: &Path) -> anyhow::Result<PathBuf> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", dir.display()))?;
    Ok(find_workspace_root(&dir))
}

fn resolve_workspace(dir: &Path) -> anyhow::Result<(PathBuf, LaunchConfig)> {
    let root = workspace_root(dir)?;
    let config = resolve(&WorkspaceConfigSource::new(&root).launch_configurations());
    if config.is_absent() {
        tracing::info!(root = %root.display(), "No react-native-ide launch configuration, defaults apply");
    }
    Ok((root, config))
}

/// Show the resolved launch configuration.
fn cmd_config(workspace: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let (root, config) = resolve_workspace(workspace)?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&config)?),
        OutputFormat::Table => {
            println!("{}", "⚙️  Launch configuration".bold());
            println!("  Workspace: {}", root.display().to_string().cyan());
            println!();
            if config.is_absent() {
                println!(
                    "  {} no \"{}\" entry found, defaults apply",
                    "!".yellow().bold(),
                    domain::LAUNCH_CONFIG_TYPE
                );
            } else {
                println!("{}", format_config_table(&config));
            }
        }
    }

    Ok(())
}

/// Show the launch plan for a platform.
fn cmd_plan(
    app_config: &AppConfig,
    platform: Platform,
    workspace: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (root, config) = resolve_workspace(workspace)?;
    let plan = LaunchPlan::new(&config, platform, &root);
    let (program, args) = plan.command(app_config.launch.template(platform));
    let view = PlanView {
        plan: &plan,
        program: &program,
        args: &args,
    };

    match format {
        OutputFormat::Json => println!("{}", format_json(&view)?),
        OutputFormat::Table => println!("{}", format_plan_table(&view)),
    }

    Ok(())
}

/// Bundle the webview.
fn cmd_build(
    app_config: &AppConfig,
    workspace: &Path,
    entry: Option<PathBuf>,
    out: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let root = workspace_root(workspace)?;
    let entry = entry.map_or_else(|| app_config.entry_path(&root), |p| root.join(p));
    let out = out.map_or_else(|| app_config.out_dir(&root), |p| root.join(p));

    let builder = BundleBuilder::new(entry, out);
    tracing::info!(
        entry = %builder.entry().display(),
        out_dir = %builder.out_dir().display(),
        "Building webview"
    );
    let artifacts = builder.run().context("Webview build failed")?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&artifacts)?),
        OutputFormat::Table => {
            println!("{}", format_build_summary(&artifacts));
            if !artifacts.assets.is_empty() {
                println!();
                println!("{}", format_artifacts_table(&artifacts));
            }
        }
    }

    Ok(())
}

/// Keep the webview bundle current and serve it until interrupted.
fn cmd_serve(app_config: &AppConfig, workspace: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let root = workspace_root(workspace)?;
    let port = port.unwrap_or(app_config.build.dev_port);
    let builder = Arc::new(BundleBuilder::new(
        app_config.entry_path(&root),
        app_config.out_dir(&root),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let (latest_tx, latest_rx) = tokio::sync::watch::channel(None);

        let watched = Arc::clone(&builder);
        let (_watcher, changes) =
            SourceWatcher::start(&builder.source_root(), move |path| watched.is_source(path))
                .context("Failed to watch webview sources")?;

        let server = DevServer::bind(port, builder.out_dir(), latest_rx).await?;
        let addr = server.local_addr()?;
        println!(
            "{} Serving {} on {}",
            "✓".green().bold(),
            builder.out_dir().display(),
            format!("http://{addr}/").cyan()
        );

        tokio::select! {
            () = rebuild_on_change(Arc::clone(&builder), changes, latest_tx, DEFAULT_SETTLE) => {
                tracing::warn!("Source watcher stopped");
            }
            served = server.run() => served?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, stopping dev server"),
        }
        anyhow::Ok(())
    })?;

    // Builds on the blocking pool are not waited for.
    runtime.shutdown_background();
    Ok(())
}

/// Run one preview session with the webview on stdin/stdout.
fn cmd_preview(
    app_config: AppConfig,
    platform: Platform,
    workspace: &Path,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let root = workspace_root(workspace)?;
    let timeout = timeout.map_or_else(|| app_config.launch.timeout(), std::time::Duration::from_secs);
    let builder = BundleBuilder::new(app_config.entry_path(&root), app_config.out_dir(&root));
    let launcher = CommandLauncher::new(app_config.launch);
    let orchestrator = PreviewOrchestrator::new(WorkspaceConfigSource::new(&root), &root, timeout);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(async move {
        let (bridge, port) = channel();
        let stdio = tokio::spawn(pump_stdio(port));

        let mut session = PreviewSession::new(orchestrator, builder, launcher, bridge)?;
        let events = session.events();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping preview");
                let _ = events.send(Event::StopRequested);
            }
        });

        session.request_launch(platform)?;
        let state = session.run().await;
        drop(session);

        if let Err(e) = stdio.await {
            tracing::warn!(error = %e, "Webview frame pump failed");
        }
        anyhow::Ok(state)
    });

    // stdin reads block a runtime thread; don't wait for them.
    runtime.shutdown_background();

    match result? {
        PreviewState::Failed { kind } if kind.is_recoverable() => {
            anyhow::bail!("preview ended with {kind}, fix the cause and run again")
        }
        PreviewState::Failed { kind } => anyhow::bail!("preview ended with {kind}"),
        state => {
            tracing::info!(%state, "Preview finished");
            Ok(())
        }
    }
}

/// Bind the webview end of the bridge to stdout (host frames) and stdin
/// (webview frames), one JSON document per line. Closing stdin disconnects
/// the webview.
async fn pump_stdio(mut port: WebviewPort) {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            frame = port.recv_frame() => {
                let Some(frame) = frame else { break };
                let written = async {
                    stdout.write_all(frame.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await
                };
                if let Err(e) = written.await {
                    tracing::warn!(error = %e, "Failed to write host frame");
                    break;
                }
            }
            line = stdin.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    if port.post_frame(line).is_err() {
                        tracing::debug!("Host side closed, dropping webview frame");
                    }
                }
                Ok(None) => {
                    tracing::info!("Webview input closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read webview frame");
                    break;
                }
            }
        }
    }
}

/// Write the default host configuration.
fn cmd_init(path: Option<&Path>) -> anyhow::Result<()> {
    let path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if ensure_config_exists(&path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Config already exists: {}", path.display());
    }

    Ok(())
}

/// Show the paths being used.
fn cmd_paths(app_config: &AppConfig, config_path: Option<&Path>, workspace: &Path) -> anyhow::Result<()> {
    let root = workspace_root(workspace)?;
    let source = WorkspaceConfigSource::new(&root);
    let config_path = config_path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    println!("{}", "📂 React Native IDE Paths".bold());
    println!();

    let rows = [
        ("config", config_path),
        ("workspace", root.clone()),
        ("launch", source.launch_file()),
        ("settings", source.settings_file()),
        ("entry", app_config.entry_path(&root)),
        ("output", app_config.out_dir(&root)),
    ];
    for (label, path) in &rows {
        let marker = if path.exists() { "✓".green() } else { "✗".red() };
        println!("  {marker} {:<10} {}", label, path.display());
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries bridge frames and command output
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}
