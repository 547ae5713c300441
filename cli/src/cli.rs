// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use colored::Colorize;
use futures::{FutureExt, future::BoxFuture};
use groupsync_core::APP_NAME;
use tracing_subscriber::EnvFilter;

use crate::cmd_collections::{CmdCollections, CmdItems};
use crate::cmd_status::CmdStatus;
use crate::cmd_suppress::{CmdObserve, CmdSuppress};
use crate::config::parse_config;
use crate::context::Context;

/// Exit status of `observe` when the change was suppressed.
pub const EXIT_SUPPRESSED: u8 = 3;

/// Run the groupsync command-line interface.
pub async fn run() -> ExitCode {
    init_tracing();
    let outcome = match Cli::parse() {
        Ok(cli) => cli.run().await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file
    pub config: Option<PathBuf>,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("Inspect and steer the groupware sync engine.")
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(false) // defaults to status
            .arg_required_else_help(false)
            .arg(
                arg!(-c --config [CONFIG] "Path to the configuration file")
                    .long_help(
                        "\
Path to the configuration file. Defaults to $GROUPSYNC_CONFIG, then \
$XDG_CONFIG_HOME/groupsync/config.toml on Linux and MacOS, \
%LOCALAPPDATA%/groupsync/config.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            )
            .subcommand(CmdStatus::command())
            .subcommand(CmdCollections::command())
            .subcommand(CmdItems::command())
            .subcommand(CmdSuppress::command())
            .subcommand(CmdObserve::command())
    }

    /// Parse the command-line arguments
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Self::from(matches)
    }

    /// Parse the specified arguments
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Self::from(matches)
    }

    /// Create a CLI instance from the `ArgMatches`
    pub fn from(matches: ArgMatches) -> Result<Self, Box<dyn Error>> {
        use Commands::*;
        let command = match matches.subcommand() {
            Some((CmdStatus::NAME, _)) | None => Status(CmdStatus),
            Some((CmdCollections::NAME, matches)) => Collections(CmdCollections::from(matches)),
            Some((CmdItems::NAME, matches)) => Items(CmdItems::from(matches)?),
            Some((CmdSuppress::NAME, matches)) => Suppress(CmdSuppress::from(matches)?),
            Some((CmdObserve::NAME, _)) => Observe(CmdObserve),
            Some((name, _)) => return Err(format!("Unknown command: {name}").into()),
        };

        let config = matches.get_one("config").cloned();
        Ok(Cli { config, command })
    }

    /// Run the command
    pub async fn run(self) -> Result<ExitCode, Box<dyn Error>> {
        self.command.run(self.config).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// Show account state and the last pass
    Status(CmdStatus),

    /// List local collections
    Collections(CmdCollections),

    /// List the items of a collection
    Items(CmdItems),

    /// Arm or clear the suppression window
    Suppress(CmdSuppress),

    /// Gate a local change notification
    Observe(CmdObserve),
}

impl Commands {
    /// Run the command with the given configuration
    #[rustfmt::skip]
    pub async fn run(self, config: Option<PathBuf>) -> Result<ExitCode, Box<dyn Error>> {
        use Commands::*;
        match self {
            Status(a)      => Self::run_with(config, |x| a.run(x).boxed()).await?,
            Collections(a) => Self::run_with(config, |x| a.run(x).boxed()).await?,
            Items(a)       => Self::run_with(config, |x| a.run(x).boxed()).await?,
            Suppress(a)    => Self::run_with(config, |x| a.run(x).boxed()).await?,
            Observe(a) => {
                let may_trigger = Self::run_with(config, |x| a.run(x).boxed()).await?;
                if !may_trigger {
                    return Ok(ExitCode::from(EXIT_SUPPRESSED));
                }
            }
        };
        Ok(ExitCode::SUCCESS)
    }

    async fn run_with<T, F>(config: Option<PathBuf>, f: F) -> Result<T, Box<dyn Error>>
    where
        F: for<'a> FnOnce(&'a Context) -> BoxFuture<'a, Result<T, Box<dyn Error>>>,
    {
        tracing::debug!("parsing configuration...");
        let (core_config, _config) = parse_config(config).await?;
        let context = Context::open(core_config).await?;

        let output = f(&context).await;

        context.close().await?;
        output
    }
}
