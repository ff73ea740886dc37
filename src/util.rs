// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

use std::path::Path;

// exit statuses. a supervisor tells "no device" from "bad input" by these
pub const EXIT_OPEN: i32 = 1;
pub const EXIT_INPUT: i32 = 2;
pub const EXIT_OUTPUT: i32 = 3;
pub const EXIT_USAGE: i32 = 64;

pub fn get_version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// program name for usage text, falling back to what we're usually called
pub fn get_basename(arg0: &str) -> String {
    Path::new(arg0)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "zgen".to_string())
}

// logs go to stderr; stdout belongs to the protocol
pub fn init_std_logger(verbose: bool) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", if verbose { "debug" } else { "warn" });
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init()
}
