// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::fmt::Write as _;

use clap::Command;
use colored::Colorize;
use groupsync_core::{DB_FILENAME, PassRecord, PassStatus};
use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::context::Context;

#[derive(Debug, Default, Clone, Copy)]
pub struct CmdStatus;

impl CmdStatus {
    pub const NAME: &str = "status";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Show suppression state, pending local changes and the last pass")
    }

    pub async fn run(self, ctx: &Context) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "showing status...");
        let status = Status::load(ctx, Timestamp::now()).await?;
        print!("{}", status.render(&TimeZone::system()));
        Ok(())
    }
}

/// Snapshot of everything `status` prints.
#[derive(Debug)]
pub struct Status {
    pub account: String,
    pub database: String,
    pub suppressed_until: Option<Timestamp>,
    pub suppressed_changes: i64,
    pub pending: i64,
    pub last_pass: Option<PassRecord>,
}

impl Status {
    pub async fn load(ctx: &Context, now: Timestamp) -> Result<Self, Box<dyn Error>> {
        let suppressor = ctx.suppressor();
        let suppressed_until = suppressor.expires_at().await?.filter(|until| *until > now);
        Ok(Self {
            account: ctx.account().to_string(),
            database: match &ctx.config.state_dir {
                Some(dir) => dir.join(DB_FILENAME).display().to_string(),
                None => "in-memory".to_string(),
            },
            suppressed_until,
            suppressed_changes: suppressor.suppressed_changes().await?,
            pending: ctx.db.count_pending(ctx.account()).await?,
            last_pass: PassRecord::load(&ctx.db.kv, ctx.account()).await?,
        })
    }

    pub fn render(&self, tz: &TimeZone) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<20}{}", "Account:".bold(), self.account);
        let _ = writeln!(out, "{:<20}{}", "Database:".bold(), self.database);

        let suppression = match self.suppressed_until {
            Some(until) => format!("active until {}", format_timestamp(until, tz))
                .yellow()
                .to_string(),
            None => "inactive".to_string(),
        };
        let _ = writeln!(out, "{:<20}{}", "Suppression:".bold(), suppression);
        let _ = writeln!(out, "{:<20}{}", "Suppressed changes:".bold(), self.suppressed_changes);
        let _ = writeln!(out, "{:<20}{}", "Pending changes:".bold(), self.pending);

        match &self.last_pass {
            Some(record) => {
                let status = match record.status {
                    PassStatus::Completed if record.result.failures() > 0 => {
                        "completed with failures".yellow()
                    }
                    PassStatus::Completed => "completed".green(),
                    PassStatus::AuthFailed => "authentication failed".red(),
                    PassStatus::Cancelled => "cancelled".yellow(),
                };
                let took = record.finished_at.duration_since(record.started_at);
                let _ = writeln!(
                    out,
                    "{:<20}{} ({}) at {}, took {:.1}s",
                    "Last pass:".bold(),
                    status,
                    record.reason,
                    format_timestamp(record.finished_at, tz),
                    took.as_secs_f64(),
                );
                let _ = writeln!(out, "{:<20}{}", "", record.result);
            }
            None => {
                let _ = writeln!(out, "{:<20}{}", "Last pass:".bold(), "never".italic());
            }
        }
        out
    }
}

fn format_timestamp(ts: Timestamp, tz: &TimeZone) -> String {
    ts.to_zoned(tz.clone()).strftime("%Y-%m-%d %H:%M:%S").to_string()
}
