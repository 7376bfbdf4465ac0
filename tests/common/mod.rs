// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use tokio::time::Instant;

use launchrc::config::{Config, Timings};
use launchrc::control::management_port;
use launchrc::fork::{Spawn, SpawnOutcome};
use launchrc::msg::Message;
use launchrc::transport::{Receiver, Sender, Transport};
use launchrc::unit::Invocation;
use launchrc::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Spawn { path: String, args: Vec<String> },
    Bind { port: u16 },
    Send { port: u16, message: Message },
}

impl Event {
    pub fn spawn(path: &str, args: &[&str]) -> Self {
        Event::Spawn {
            path: path.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn ping(port: u16, reply_port: u16) -> Self {
        Event::Send {
            port,
            message: Message::Ping { reply_port },
        }
    }

    pub fn shutdown(port: u16) -> Self {
        Event::Send {
            port,
            message: Message::Shutdown,
        }
    }
}

#[derive(Default)]
struct World {
    events: Vec<Event>,
    /// when each of `events` happened
    times: Vec<Instant>,
    /// management ports of units that were spawned and not yet shut down
    live: HashSet<u16>,
    /// datagrams waiting on the orchestrator's reply port
    inbox: VecDeque<Vec<u8>>,
    missing: HashSet<String>,
    /// PONGs delivered ahead of the real answer the next time a port is pinged
    stale: HashMap<u16, Vec<u16>>,
    /// PINGs a live unit drops before it answers
    deaf: HashMap<u16, usize>,
}

impl World {
    fn record(&mut self, event: Event) {
        self.events.push(event);
        self.times.push(Instant::now());
    }
}

/// In-memory stand-in for both the process table and the network
///
/// Spawned units answer PINGs on their `-mport` until they are sent a SHUTDOWN.
#[derive(Clone, Default)]
pub struct Harness(Arc<Mutex<World>>);

impl Harness {
    fn world(&self) -> MutexGuard<'_, World> {
        self.0.lock().expect("poisoned")
    }

    pub fn missing(self, path: &str) -> Self {
        self.world().missing.insert(path.to_string());
        self
    }

    pub fn stale_before(self, port: u16, stale_port: u16) -> Self {
        self.world().stale.entry(port).or_default().push(stale_port);
        self
    }

    pub fn deaf(self, port: u16, pings: usize) -> Self {
        self.world().deaf.insert(port, pings);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.world().events.clone()
    }

    pub fn timeline(&self) -> Vec<(Instant, Event)> {
        let world = self.world();
        world
            .times
            .iter()
            .copied()
            .zip(world.events.iter().cloned())
            .collect()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Spawn { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn pinged(&self) -> Vec<u16> {
        self.sent(|message| matches!(message, Message::Ping { .. }))
    }

    pub fn shut_down(&self) -> Vec<u16> {
        self.sent(|message| *message == Message::Shutdown)
    }

    fn sent<F: Fn(&Message) -> bool>(&self, filter: F) -> Vec<u16> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Send { port, message } if filter(&message) => Some(port),
                _ => None,
            })
            .collect()
    }
}

impl Spawn for Harness {
    fn spawn(&mut self, invocation: &Invocation) -> Result<SpawnOutcome, Error> {
        let mut world = self.world();
        world.record(Event::Spawn {
            path: invocation.path().to_string(),
            args: invocation.args().to_vec(),
        });

        if world.missing.contains(invocation.path()) {
            return Ok(SpawnOutcome::ImageLoadFailed(Errno::ENOENT));
        }

        if let Some(port) = management_port(invocation.args()) {
            world.live.insert(port);
        }
        Ok(SpawnOutcome::Started)
    }
}

pub struct FakeSender {
    harness: Harness,
    port: u16,
}

#[async_trait]
impl Sender for FakeSender {
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        let message = Message::from_bytes(payload)?;
        let port = self.port;

        let mut guard = self.harness.world();
        let world = &mut *guard;
        world.record(Event::Send { port, message });

        match message {
            Message::Ping { .. } if world.live.contains(&port) => {
                if let Some(stale) = world.stale.remove(&port) {
                    for stale_port in stale {
                        world.inbox.push_back(pong(stale_port));
                    }
                }

                match world.deaf.get_mut(&port) {
                    Some(remaining) if *remaining > 0 => *remaining -= 1,
                    _ => world.inbox.push_back(pong(port)),
                }
            }
            Message::Shutdown => {
                world.live.remove(&port);
            }
            _ => (),
        }

        Ok(())
    }
}

fn pong(port: u16) -> Vec<u8> {
    Message::Pong { port }.to_bytes().expect("encode pong")
}

pub struct FakeReceiver {
    harness: Harness,
}

#[async_trait]
impl Receiver for FakeReceiver {
    async fn recv_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, Error> {
        let datagram = self.harness.world().inbox.pop_front();

        match datagram {
            Some(datagram) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some(datagram.len()))
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Transport for Harness {
    type Sender = FakeSender;
    type Receiver = FakeReceiver;

    async fn sender(&self, port: u16) -> Result<FakeSender, Error> {
        Ok(FakeSender {
            harness: self.clone(),
            port,
        })
    }

    async fn receiver(&self, port: u16) -> Result<FakeReceiver, Error> {
        self.world().record(Event::Bind { port });

        Ok(FakeReceiver {
            harness: self.clone(),
        })
    }
}

pub fn fast_timings() -> Timings {
    Timings {
        ping_interval_ms: 1,
        shutdown_settle_ms: 0,
        sweep_settle_ms: 0,
        ready_timeout_ms: None,
    }
}

pub fn config(base_port: u16, executables: &[&[&str]], timings: Timings) -> Config {
    let executables = executables
        .iter()
        .map(|tokens| tokens.iter().map(|s| s.to_string()).collect())
        .collect();

    Config::new(base_port, executables, timings).expect("valid config")
}
