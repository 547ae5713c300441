// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use colored::Colorize;
use groupsync_core::parse_duration;
use jiff::SignedDuration;
use jiff::tz::TimeZone;

use crate::context::Context;

#[derive(Debug, Clone, Copy)]
pub struct CmdSuppress {
    pub duration: Option<SignedDuration>,
    pub clear: bool,
}

impl CmdSuppress {
    pub const NAME: &str = "suppress";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Ignore local change notifications for a while")
            .long_about(
                "\
Arm the suppression window so that local change notifications do not trigger \
a sync pass, e.g. while a bulk import runs. Scheduled passes still run.",
            )
            .arg(
                Arg::new("DURATION")
                    .help("How long to suppress, e.g. 90s, 10m or 1h")
                    .value_parser(|s: &str| -> Result<SignedDuration, String> {
                        let d = parse_duration(s).map_err(|e| e.to_string())?;
                        if d.is_negative() {
                            return Err("duration must not be negative".to_string());
                        }
                        Ok(d)
                    }),
            )
            .arg(
                Arg::new("clear")
                    .long("clear")
                    .help("Close the window immediately")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("DURATION"),
            )
            .group(
                ArgGroup::new("window")
                    .args(["DURATION", "clear"])
                    .required(true),
            )
    }

    pub fn from(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let duration = matches.get_one::<SignedDuration>("DURATION").copied();
        let clear = matches.get_flag("clear");
        if duration.is_none() && !clear {
            return Err("either a duration or --clear is required".into());
        }
        Ok(Self { duration, clear })
    }

    pub async fn run(self, ctx: &Context) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "updating suppression...");
        let suppressor = ctx.suppressor();
        match self.duration {
            Some(duration) if !self.clear => {
                let until = suppressor.suppress_for(duration).await?;
                let local = until.to_zoned(TimeZone::system());
                println!(
                    "Local changes suppressed until {}",
                    local.strftime("%Y-%m-%d %H:%M:%S").to_string().yellow()
                );
            }
            _ => {
                suppressor.clear().await?;
                let dropped = suppressor.take_suppressed_changes().await?;
                println!("Suppression cleared");
                if dropped > 0 {
                    println!("{dropped} local changes were suppressed, the next pass picks them up");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CmdObserve;

impl CmdObserve {
    pub const NAME: &str = "observe";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Report a local change and tell whether it may trigger a pass")
            .long_about(
                "\
Report a local change notification. Exits with status 0 when a sync pass may \
be triggered and with status 3 when the change is suppressed.",
            )
    }

    /// Returns whether the observed change may trigger a pass.
    pub async fn run(self, ctx: &Context) -> Result<bool, Box<dyn Error>> {
        tracing::debug!(?self, "observing local change...");
        let may_trigger = ctx.suppressor().observe_change().await?;
        if may_trigger {
            println!("{}", "may trigger".green());
        } else {
            println!("{}", "suppressed".yellow());
        }
        Ok(may_trigger)
    }
}
