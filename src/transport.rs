// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Connectionless datagram transport used by the control protocol

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::net::UdpSocket;
use tokio::time;

use crate::Error;

/// Opens senders and receivers on local ports
#[async_trait]
pub trait Transport: Send + Sync {
    type Sender: Sender;
    type Receiver: Receiver;

    /// A sender whose datagrams go to `port`
    async fn sender(&self, port: u16) -> Result<Self::Sender, Error>;

    /// A receiver bound to `port`
    async fn receiver(&self, port: u16) -> Result<Self::Receiver, Error>;
}

#[async_trait]
pub trait Sender: Send {
    /// Sends one datagram; delivery is not guaranteed
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error>;
}

#[async_trait]
pub trait Receiver: Send {
    /// Waits up to `timeout` for one datagram, `None` if nothing arrived
    async fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, Error>;
}

/// UDP over IPv4, always to and from localhost
#[derive(Clone, Copy, Debug)]
pub struct UdpTransport {
    addr: Ipv4Addr,
}

impl UdpTransport {
    pub fn localhost() -> Self {
        Self {
            addr: Ipv4Addr::LOCALHOST,
        }
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::localhost()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    type Sender = UdpSender;
    type Receiver = UdpReceiver;

    async fn sender(&self, port: u16) -> Result<UdpSender, Error> {
        // unconnected, so an absent listener never turns into an error on a later send
        let socket = UdpSocket::bind(SocketAddrV4::new(self.addr, 0)).await?;
        let target = SocketAddr::V4(SocketAddrV4::new(self.addr, port));

        Ok(UdpSender { socket, target })
    }

    async fn receiver(&self, port: u16) -> Result<UdpReceiver, Error> {
        let socket = UdpSocket::bind(SocketAddrV4::new(self.addr, port)).await?;

        Ok(UdpReceiver { socket })
    }
}

#[derive(Debug)]
pub struct UdpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

#[async_trait]
impl Sender for UdpSender {
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        let len = self.socket.send_to(payload, self.target).await?;
        trace!("sent {} bytes to {}", len, self.target);

        Ok(())
    }
}

#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    pub fn local_port(&self) -> Result<u16, Error> {
        Ok(self.socket.local_addr()?.port())
    }
}

#[async_trait]
impl Receiver for UdpReceiver {
    async fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, Error> {
        match time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(received) => {
                let (len, from) = received?;
                trace!("received {} bytes from {}", len, from);
                Ok(Some(len))
            }
            Err(_elapsed) => Ok(None),
        }
    }
}
