//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::Platform;

/// React Native IDE host - resolve launch configurations, bundle the preview
/// webview and launch the app.
///
/// Quick start: rn-ide config | plan ios | build | serve | preview android
#[derive(Parser, Debug)]
#[command(name = "rn-ide")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: json or table.
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Host configuration file (default: ~/.react-native-ide/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved React Native IDE launch configuration.
    Config {
        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Show the launch plan and command for a platform.
    Plan {
        /// Target platform.
        #[arg(value_enum)]
        platform: Platform,

        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Bundle the webview into the output directory.
    Build {
        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Entry point (overrides the configured one).
        #[arg(short, long)]
        entry: Option<PathBuf>,

        /// Output directory (overrides the configured one).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Watch the webview sources, rebuild on change and serve the output.
    Serve {
        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Port to listen on (overrides the configured dev port).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a preview session: bridge frames on stdout, webview frames on stdin.
    Preview {
        /// Target platform of the first launch.
        #[arg(value_enum)]
        platform: Platform,

        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Seconds to wait for the app (overrides the configured timeout).
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Write the default host configuration file if it does not exist.
    Init,

    /// Show the paths being used.
    Paths {
        /// Workspace folder (searched upwards for editor settings).
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_preview() {
        let cli = Cli::try_parse_from(["rn-ide", "-vv", "preview", "android", "--timeout", "5"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Preview {
                platform: Platform::Android,
                timeout: Some(5),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_serve_port() {
        let cli = Cli::try_parse_from(["rn-ide", "serve", "-p", "3000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(3000), .. }));

        let cli = Cli::try_parse_from(["rn-ide", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: None, .. }));
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        assert!(Cli::try_parse_from(["rn-ide", "plan", "windows"]).is_err());
    }

    #[test]
    fn test_format_after_subcommand() {
        let cli = Cli::try_parse_from(["rn-ide", "config", "-f", "json"]).unwrap();
        assert_eq!(cli.output_format(), Ok(OutputFormat::Json));
    }
}
