// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Ordered bring-up and reverse bring-down of the configured units

use log::{debug, info};
use tokio::time;

use crate::config::Config;
use crate::control;
use crate::error::ErrorKind;
use crate::fork::{Spawn, SpawnOutcome};
use crate::transport::Transport;
use crate::unit::ManagedUnit;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    /// Clearing anything left over from an earlier run
    DownSweep,
    /// Waiting for swept units to release their ports
    Settle,
    BringingUp,
    /// Every unit has been started and answered
    Running,
}

/// What a run should do after the startup sweep
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Up,
    DownOnly,
}

/// How units are taken down
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Teardown {
    /// Reports each unit and pauses after each SHUTDOWN
    Graceful,
    /// No output, no pauses; for units that are not expected to exist
    Immediate,
}

/// Drives bring-up and bring-down for one run
///
/// Units are started strictly in list order, each one must answer on its management port
/// before the next is spawned. Nothing is tracked about a unit beyond its port.
pub struct Orchestrator<S: Spawn, T: Transport> {
    config: Config,
    units: Vec<ManagedUnit>,
    spawner: S,
    transport: T,
    state: State,
}

impl<S: Spawn, T: Transport> Orchestrator<S, T> {
    pub fn new(config: Config, spawner: S, transport: T) -> Self {
        let units = config.units();

        Self {
            config,
            units,
            spawner,
            transport,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn units(&self) -> &[ManagedUnit] {
        &self.units
    }

    /// Sweeps away any previous instance, then brings every unit up unless only `DownOnly` was asked for
    pub async fn run(&mut self, mode: RunMode) -> Result<(), Error> {
        self.transition(State::DownSweep);
        self.bring_down_units(&self.units, Teardown::Immediate).await;

        if mode == RunMode::DownOnly {
            info!("system is down");
            return Ok(());
        }

        self.transition(State::Settle);
        time::sleep(self.config.timings().sweep_settle()).await;

        self.transition(State::BringingUp);
        self.bring_up().await?;

        self.transition(State::Running);
        info!("{} unit(s) running", self.units.len());
        Ok(())
    }

    /// Takes down every configured unit, last first
    pub async fn bring_down(&self, teardown: Teardown) {
        self.bring_down_units(&self.units, teardown).await
    }

    /// Sends SHUTDOWN to each of `units` in reverse order
    pub async fn bring_down_units(&self, units: &[ManagedUnit], teardown: Teardown) {
        for unit in units.iter().rev() {
            if teardown == Teardown::Graceful {
                println!("Killing {}", unit.name());
            }

            control::shutdown(&self.transport, unit.assigned_port()).await;

            if teardown == Teardown::Graceful {
                time::sleep(self.config.timings().shutdown_settle()).await;
            }
        }
    }

    async fn bring_up(&mut self) -> Result<(), Error> {
        for position in 0..self.units.len() {
            let unit = self.units[position].clone();
            println!("Launching {}", unit.name());

            let failure = match self.spawner.spawn(&unit.invocation()) {
                Ok(SpawnOutcome::Started) => None,
                Ok(SpawnOutcome::ImageLoadFailed(errno)) => Some(Error::from(ErrorKind::SpawnFailed {
                    path: unit.name().to_string(),
                    errno,
                })),
                Err(e) => Some(e),
            };
            if let Some(e) = failure {
                self.bring_down_units(&self.units[..position], Teardown::Graceful)
                    .await;
                return Err(e);
            }

            let reply_port = self.config.udp_base_port();
            let timings = self.config.timings();
            if let Err(e) =
                control::wait_until_ready(&self.transport, reply_port, &unit, timings).await
            {
                // the unit was started, it may still come up
                self.bring_down_units(&self.units[..=position], Teardown::Graceful)
                    .await;
                return Err(e);
            }
        }

        Ok(())
    }

    fn transition(&mut self, state: State) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }
}
