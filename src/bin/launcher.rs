// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{App, Arg, ArgMatches};
use tokio::runtime;

use launchrc::config::{Config, DEFAULT_CONFIG_FILE};
use launchrc::fork::ForkExec;
use launchrc::orchestrator::{Orchestrator, RunMode};
use launchrc::transport::UdpTransport;
use launchrc::Error;

const CONFIG: &str = "config";
const ACTION: &str = "ACTION";
const DOWN: &str = "down";

fn app() -> App<'static, 'static> {
    App::new("launcher")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name(CONFIG)
                .short("c")
                .long(CONFIG)
                .value_name("FILE")
                .default_value(DEFAULT_CONFIG_FILE)
                .help("launcher configuration, udp_base_port and executables")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(ACTION)
                .index(1)
                .possible_values(&[DOWN])
                .help("bring the system down and stop, without starting anything"),
        )
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = app().get_matches();
    run(&args)
}

fn run(args: &ArgMatches<'_>) -> Result<(), Error> {
    let path = args.value_of(CONFIG).unwrap_or(DEFAULT_CONFIG_FILE);
    let config = Config::load(path)?;

    let mode = match args.value_of(ACTION) {
        Some(DOWN) => RunMode::DownOnly,
        _ => RunMode::Up,
    };

    let runtime = runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;

    runtime.block_on(async move {
        let mut orchestrator = Orchestrator::new(config, ForkExec, UdpTransport::localhost());
        orchestrator.run(mode).await
    })
}
