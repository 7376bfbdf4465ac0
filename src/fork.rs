// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Process creation with synchronous detection of a failed exec

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use log::debug;
use nix::errno::Errno;
use nix::unistd::{fork, ForkResult};

use crate::pipe::{Pipe, PipeEnd, Write};
use crate::unit::Invocation;
use crate::Error;

/// Result of attempting to start a program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// The program image replaced the child, it is now running on its own
    Started,
    /// exec failed in the child, which has already exited
    ImageLoadFailed(Errno),
}

impl SpawnOutcome {
    pub fn is_started(self) -> bool {
        self == SpawnOutcome::Started
    }
}

/// Starts programs for the orchestrator
pub trait Spawn {
    /// Returns once the image load has either succeeded or failed.
    ///
    /// `Err` is reserved for failures of the launcher itself, e.g. no pipe or fork available.
    fn spawn(&mut self, invocation: &Invocation) -> Result<SpawnOutcome, Error>;
}

/// fork/exec spawner, children are not tracked after a successful exec
#[derive(Clone, Copy, Debug, Default)]
pub struct ForkExec;

impl Spawn for ForkExec {
    fn spawn(&mut self, invocation: &Invocation) -> Result<SpawnOutcome, Error> {
        // everything the child needs is allocated before fork
        let argv = invocation
            .argv()
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("{}: argument contains a nul byte", invocation.path()))?;
        let path = argv
            .first()
            .ok_or("cannot spawn an empty command line")?;
        let mut argv_ptrs = argv.iter().map(|arg| arg.as_ptr()).collect::<Vec<_>>();
        argv_ptrs.push(ptr::null());

        let (mut read, write) = Pipe::new()?.split();

        // This is safe because the child only calls async-signal-safe functions before exec or _exit
        match unsafe { fork() }? {
            ForkResult::Child => exec_child(path, &argv_ptrs, write),
            ForkResult::Parent { child } => {
                // the child now holds the only write end
                drop(write);

                let outcome = match read.read_byte()? {
                    None => SpawnOutcome::Started,
                    Some(errno) => SpawnOutcome::ImageLoadFailed(Errno::from_i32(i32::from(errno))),
                };

                debug!("{} ({}): {:?}", invocation.path(), child, outcome);
                Ok(outcome)
            }
        }
    }
}

/// Replaces the child image, on failure reports the errno's low byte to the parent and exits
///
/// `argv` must be null terminated. Nothing here allocates.
fn exec_child(path: &CString, argv: &[*const c_char], mut notify: PipeEnd<Write>) -> ! {
    unsafe { libc::execv(path.as_ptr(), argv.as_ptr()) };
    let errno = Errno::last();

    notify.write_byte(errno as i32 as u8).ok();

    // skip atexit handlers and destructors inherited from the parent
    unsafe { libc::_exit(1) }
}
