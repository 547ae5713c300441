// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface over the local store and the suppression gate of
//! the groupsync engine.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro
)]

mod cli;
mod cmd_collections;
mod cmd_status;
mod cmd_suppress;
mod config;
mod context;
mod table;

pub use crate::cli::{Cli, Commands, EXIT_SUPPRESSED, run};
pub use crate::config::{Config, parse_config};
pub use crate::context::Context;
