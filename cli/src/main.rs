// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! groupsync - operator tool for the groupware sync engine

use std::process::ExitCode;

use groupsync_cli::run;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}
