// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

use std::io;
use std::process::exit;
use zgen::ioc::{self, Handle};
use zgen::query::{self, Malformed, Stop};
use zgen::util;

fn usage(prog: &str, gopt: &getopts::Options) {
    print!(
        "{}",
        gopt.usage(&format!(
            "{prog} [options]\n\n\
            Reads \"<dataset> <object>\" records from stdin and prints the\n\
            generation number of each object on stdout"
        ))
    );
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let prog = &util::get_basename(args.first().map_or("zgen", String::as_str));

    let mut gopt = getopts::Options::new();
    gopt.optopt("d", "", "Control device", "<path>");
    gopt.optflag("v", "", "Enable debug logging");
    gopt.optflag("", "version", "Print version and exit");
    gopt.optflag("", "help", "Print usage and exit");

    let matches = match gopt.parse(args.iter().skip(1)) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            usage(prog, &gopt);
            exit(util::EXIT_USAGE);
        }
    };
    if matches.opt_present("version") {
        println!("{}", util::get_version_string());
        exit(0);
    }
    if matches.opt_present("help") {
        usage(prog, &gopt);
        exit(0);
    }

    if let Err(e) = util::init_std_logger(matches.opt_present("v")) {
        eprintln!("{e}");
        exit(1);
    }

    let dev = matches.opt_str("d").unwrap_or_else(|| ioc::DEFAULT_DEV.to_string());
    let mut h = match Handle::open_dev(&dev) {
        Ok(h) => h,
        Err(e) => {
            log::error!("{dev}: {e}");
            println!("[zgen] ERROR opening {dev}");
            exit(util::EXIT_OPEN);
        }
    };
    log::debug!("opened {dev}");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let stop = query::run(&mut h, stdin.lock(), &mut stdout);
    match stop {
        Stop::Malformed(Malformed::EndOfInput) => {
            log::debug!("{stop}");
            exit(util::EXIT_INPUT);
        }
        Stop::Malformed(_) | Stop::Input(_) => {
            log::error!("{stop}");
            exit(util::EXIT_INPUT);
        }
        Stop::Output(_) => {
            log::error!("{stop}");
            exit(util::EXIT_OUTPUT);
        }
    }
}
