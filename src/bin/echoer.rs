// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A minimal managed unit: answers PINGs on its `-mport` and exits on SHUTDOWN

use log::info;
use tokio::runtime;

use launchrc::control::{management_port, Responder};
use launchrc::transport::UdpTransport;
use launchrc::Error;

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let port = management_port(std::env::args().skip(1)).ok_or("usage: echoer -mport <port>")?;

    let runtime = runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;

    runtime.block_on(async move {
        let mut responder = Responder::bind(UdpTransport::localhost(), port).await?;
        info!("echoer listening on {}", responder.port());

        responder.serve_until_shutdown().await
    })
}
