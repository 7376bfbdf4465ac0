// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Managed units and the command lines used to start them

use log::warn;

/// The switch handed to every unit, followed by its management port
pub const MPORT_FLAG: &str = "-mport";

/// Maximum number of argv entries, program path included, passed to a unit.
///
/// Anything past this is dropped rather than rejected.
pub const MAX_ARGV: usize = 19;

/// One program in the ordered unit list, with the port it is managed on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedUnit {
    name: String,
    arguments: Vec<String>,
    assigned_port: u16,
}

impl ManagedUnit {
    pub fn new(name: String, arguments: Vec<String>, assigned_port: u16) -> Self {
        Self {
            name,
            arguments,
            assigned_port,
        }
    }

    /// Path of the program, used both for exec and in progress output
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured arguments, not including the management port switch
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn assigned_port(&self) -> u16 {
        self.assigned_port
    }

    /// Builds the command line for this unit, appending `-mport <port>`
    pub fn invocation(&self) -> Invocation {
        let mut argv = Vec::with_capacity(self.arguments.len() + 3);
        argv.push(self.name.clone());
        argv.extend(self.arguments.iter().cloned());
        argv.push(MPORT_FLAG.to_string());
        argv.push(self.assigned_port.to_string());

        Invocation::new(argv)
    }
}

/// A program path plus its arguments, as handed to exec
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    argv: Vec<String>,
}

impl Invocation {
    /// `argv[0]` is the program path; the list is truncated to [`MAX_ARGV`] entries
    pub fn new(mut argv: Vec<String>) -> Self {
        if argv.len() > MAX_ARGV {
            warn!(
                "{}: dropping {} argument(s) past the limit of {}",
                argv.first().map(String::as_str).unwrap_or_default(),
                argv.len() - MAX_ARGV,
                MAX_ARGV
            );
            argv.truncate(MAX_ARGV);
        }

        Self { argv }
    }

    pub fn path(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the program path
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}
