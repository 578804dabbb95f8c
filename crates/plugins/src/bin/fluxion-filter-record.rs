// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    fluxion_plugins::plugin_main("filter-record").await
}
