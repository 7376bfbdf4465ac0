// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Launcher configuration: the management base port and the ordered executables

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::unit::ManagedUnit;
use crate::Error;

pub const DEFAULT_CONFIG_FILE: &str = "launcher.yaml";

/// One line of the executable list
///
/// Either a single string, split on whitespace, or an explicit list of tokens.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Executable {
    Line(String),
    Tokens(Vec<String>),
}

impl Executable {
    fn tokens(&self) -> Vec<String> {
        match self {
            Executable::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Executable::Tokens(tokens) => tokens.clone(),
        }
    }
}

/// Delays used while bringing units up and down, all in milliseconds
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// How long to wait for a PONG before sending another PING
    pub ping_interval_ms: u64,
    /// Pause after each SHUTDOWN in a graceful bring-down
    pub shutdown_settle_ms: u64,
    /// Pause between the startup sweep and the first launch
    pub sweep_settle_ms: u64,
    /// Upper bound on waiting for a unit to answer, unset waits forever
    pub ready_timeout_ms: Option<u64>,
}

impl Timings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn shutdown_settle(&self) -> Duration {
        Duration::from_millis(self.shutdown_settle_ms)
    }

    pub fn sweep_settle(&self) -> Duration {
        Duration::from_millis(self.sweep_settle_ms)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ping_interval_ms: 100,
            shutdown_settle_ms: 500,
            sweep_settle_ms: 1000,
            ready_timeout_ms: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawConfig {
    udp_base_port: u16,
    #[serde(default)]
    executables: Vec<Executable>,
    #[serde(default)]
    timings: Timings,
}

/// Validated, immutable launcher configuration
#[derive(Clone, Debug)]
pub struct Config {
    udp_base_port: u16,
    executables: Vec<Vec<String>>,
    timings: Timings,
}

impl Config {
    /// Validates the unit list against the base port
    pub fn new(
        udp_base_port: u16,
        executables: Vec<Vec<String>>,
        timings: Timings,
    ) -> Result<Self, Error> {
        if let Some(position) = executables.iter().position(Vec::is_empty) {
            return Err(Error::config(format!(
                "executable {} has no program path",
                position + 1
            )));
        }

        let last_port = u32::from(udp_base_port) + executables.len() as u32;
        if last_port > u32::from(u16::MAX) {
            return Err(Error::config(format!(
                "udp_base_port {} leaves no room for {} management ports",
                udp_base_port,
                executables.len()
            )));
        }

        Ok(Self {
            udp_base_port,
            executables,
            timings,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("unable to read {}: {}", path.display(), e))
        })?;
        debug!("configuration read from {}", path.display());

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        let executables = raw.executables.iter().map(Executable::tokens).collect();

        Self::new(raw.udp_base_port, executables, raw.timings)
    }

    /// The orchestrator's own reply port; every unit port is above it
    pub fn udp_base_port(&self) -> u16 {
        self.udp_base_port
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// The ordered units, the first on `udp_base_port + 1`
    pub fn units(&self) -> Vec<ManagedUnit> {
        // ports were range checked in new()
        self.executables
            .iter()
            .enumerate()
            .filter_map(|(position, tokens)| {
                let port = self.udp_base_port + position as u16 + 1;
                tokens
                    .split_first()
                    .map(|(name, arguments)| ManagedUnit::new(name.clone(), arguments.to_vec(), port))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    #[test]
    fn test_full_config() {
        let yaml = r#"
udp_base_port: 9000
executables:
  - echoer
  - logger -v
  - [./with space, "-x", "1"]
timings:
  ping_interval_ms: 10
  ready_timeout_ms: 2000
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let units = config.units();

        assert_eq!(config.udp_base_port(), 9000);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].name(), "echoer");
        assert!(units[0].arguments().is_empty());
        assert_eq!(units[1].arguments(), &["-v"]);
        assert_eq!(units[2].name(), "./with space");
        assert_eq!(units[2].arguments(), &["-x", "1"]);

        let timings = config.timings();
        assert_eq!(timings.ping_interval(), Duration::from_millis(10));
        assert_eq!(timings.shutdown_settle(), Duration::from_millis(500));
        assert_eq!(timings.sweep_settle(), Duration::from_secs(1));
        assert_eq!(timings.ready_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_ports_follow_list_order() {
        let config = Config::from_yaml("udp_base_port: 9000\nexecutables: [a, b, c, d]\n").unwrap();
        let ports = config
            .units()
            .iter()
            .map(ManagedUnit::assigned_port)
            .collect::<Vec<_>>();

        assert_eq!(ports, vec![9001, 9002, 9003, 9004]);
        assert_eq!(config.units(), config.units());
    }

    #[test]
    fn test_default_timings() {
        let config = Config::from_yaml("udp_base_port: 9000\n").unwrap();

        assert!(config.units().is_empty());
        assert_eq!(config.timings(), &Timings::default());
        assert_eq!(config.timings().ready_timeout(), None);
    }

    #[test]
    fn test_empty_executable() {
        let err = Config::from_yaml("udp_base_port: 9000\nexecutables: [a, '  ']\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config(_)));
    }

    #[test]
    fn test_port_overflow() {
        let err = Config::from_yaml("udp_base_port: 65534\nexecutables: [a, b]\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config(_)));

        assert!(Config::from_yaml("udp_base_port: 65534\nexecutables: [a]\n").is_ok());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Config::from_yaml("udp_base_port: many\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Yaml(_)));

        let err = Config::from_yaml("executables: [a]\n").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Yaml(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "udp_base_port: 7000\nexecutables:\n  - /bin/true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.units()[0].assigned_port(), 7001);

        let err = Config::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config(_)));
    }
}
