// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod dump_module;
mod export_snapshot;
mod list_modules;
mod weaver;

use std::process::ExitCode;

use clap::Parser;

use crate::weaver::weaver_main;

fn main() -> ExitCode {
    cliutil::cli_main(|| weaver_main(weaver::Args::parse()))
}
