// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Readiness and shutdown exchanges over a unit's management port

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

use crate::config::Timings;
use crate::error::ErrorKind;
use crate::msg::{Message, MAX_MESSAGE_LEN};
use crate::transport::{Receiver, Sender, Transport};
use crate::unit::{ManagedUnit, MPORT_FLAG};
use crate::Error;

/// Blocks until `unit` answers a PING sent from `reply_port`.
///
/// PINGs are resent every `ping_interval` until a PONG carrying the unit's own port arrives,
/// PONGs for any other port are dropped. Without a `ready_timeout` this never gives up.
pub async fn wait_until_ready<T: Transport>(
    transport: &T,
    reply_port: u16,
    unit: &ManagedUnit,
    timings: &Timings,
) -> Result<(), Error> {
    let port = unit.assigned_port();
    let mut receiver = transport.receiver(reply_port).await?;
    let mut sender = transport.sender(port).await?;

    let ping = Message::Ping { reply_port }.to_bytes()?;
    let deadline = timings.ready_timeout().map(|timeout| Instant::now() + timeout);
    let mut buf = [0u8; MAX_MESSAGE_LEN];

    loop {
        let mut slice = timings.ping_interval();
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::from_secs(0) {
                return Err(ErrorKind::NeverReady {
                    name: unit.name().to_string(),
                    port,
                }
                .into());
            }
            slice = slice.min(remaining);
        }

        // the unit may not be listening yet
        if let Err(e) = sender.send(&ping).await {
            debug!("ping to {} failed: {}", port, e);
        }

        let len = match receiver.recv_timeout(&mut buf, slice).await? {
            Some(len) => len,
            None => continue,
        };

        match Message::from_bytes(&buf[..len]) {
            Ok(Message::Pong { port: from }) if from == port => {
                debug!("{} ready on {}", unit.name(), port);
                return Ok(());
            }
            Ok(message) => debug!("waiting on {}, ignoring {:?}", port, message),
            Err(e) => debug!("waiting on {}, ignoring datagram: {}", port, e),
        }
    }
}

/// Fires a SHUTDOWN at `port`, nothing is waited for and a missing listener is not an error
pub async fn shutdown<T: Transport>(transport: &T, port: u16) {
    if let Err(e) = send_shutdown(transport, port).await {
        warn!("shutdown to {} not sent: {}", port, e);
    }
}

async fn send_shutdown<T: Transport>(transport: &T, port: u16) -> Result<(), Error> {
    let bytes = Message::Shutdown.to_bytes()?;
    transport.sender(port).await?.send(&bytes).await
}

/// Finds the management port given to a unit on its command line
pub fn management_port<I, S>(args: I) -> Option<u16>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg.as_ref() == MPORT_FLAG {
            return args.next().and_then(|port| port.as_ref().parse().ok());
        }
    }

    None
}

/// The unit's side of the control protocol
pub struct Responder<T: Transport> {
    transport: T,
    port: u16,
    receiver: T::Receiver,
}

impl<T: Transport> Responder<T> {
    /// Binds the unit's management port
    pub async fn bind(transport: T, port: u16) -> Result<Self, Error> {
        let receiver = transport.receiver(port).await?;

        Ok(Self {
            transport,
            port,
            receiver,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Answers PINGs until a SHUTDOWN arrives
    pub async fn serve_until_shutdown(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];

        loop {
            let len = match self
                .receiver
                .recv_timeout(&mut buf, Duration::from_secs(1))
                .await?
            {
                Some(len) => len,
                None => continue,
            };

            match Message::from_bytes(&buf[..len]) {
                Ok(Message::Ping { reply_port }) => {
                    trace!("{} pinged, answering on {}", self.port, reply_port);
                    let pong = Message::Pong { port: self.port }.to_bytes()?;
                    self.transport.sender(reply_port).await?.send(&pong).await?;
                }
                Ok(Message::Shutdown) => return Ok(()),
                Ok(message) => debug!("{} ignoring {:?}", self.port, message),
                Err(e) => debug!("{} ignoring datagram: {}", self.port, e),
            }
        }
    }
}
