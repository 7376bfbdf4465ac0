// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use log::{trace, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{close, pipe2, read as nix_read, write as nix_write};

#[derive(Clone, Copy, Debug)]
pub struct Read;
#[derive(Clone, Copy, Debug)]
pub struct Write;

// A marker trait to designate the end of the pipe this represents
pub trait End: Clone + Copy + Debug {
    fn display() -> &'static str;
}

impl End for Read {
    fn display() -> &'static str {
        "Read"
    }
}
impl End for Write {
    fn display() -> &'static str {
        "Write"
    }
}

#[derive(Debug)]
pub struct PipeEnd<E: End> {
    raw_fd: RawFd,
    ghost: PhantomData<E>,
}

impl<E: End> PipeEnd<E> {
    /// Forget the fd so that drop will not close it
    pub fn forget(&mut self) {
        self.raw_fd = -1;
    }

    pub fn close(&mut self) -> nix::Result<()> {
        if self.raw_fd < 0 {
            return Ok(());
        }

        let raw_fd = self.raw_fd;
        self.forget();
        close(raw_fd)
    }
}

impl PipeEnd<Read> {
    /// Reads a single byte, retrying on EINTR
    ///
    /// `None` means every write end is closed.
    pub fn read_byte(&mut self) -> nix::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match nix_read(self.raw_fd, &mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl PipeEnd<Write> {
    /// Writes a single byte, safe to call between fork and exec
    pub fn write_byte(&mut self, byte: u8) -> nix::Result<()> {
        loop {
            match nix_write(self.raw_fd, &[byte]) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<E: End> FromRawFd for PipeEnd<E> {
    unsafe fn from_raw_fd(raw_fd: RawFd) -> Self {
        Self {
            raw_fd,
            ghost: PhantomData,
        }
    }
}

impl<E: End> AsRawFd for PipeEnd<E> {
    fn as_raw_fd(&self) -> RawFd {
        self.raw_fd
    }
}

impl<E: End> Drop for PipeEnd<E> {
    fn drop(&mut self) {
        match self.raw_fd {
            // don't implicitly close any of the std io
            0..=2 => return,
            // don't close -1, NULL
            i if i < 0 => return,
            _ => (),
        }

        trace!("closing fd: {} ({})", self.raw_fd, E::display());

        close(self.raw_fd)
            .map_err(|e| warn!("error closing file handle ({}): {}", self.raw_fd, e))
            .ok();
    }
}

/// A one-directional channel whose ends both close on a successful exec
pub struct Pipe {
    read: PipeEnd<Read>,
    write: PipeEnd<Write>,
}

impl Pipe {
    /// Creates a new close-on-exec pipe.
    ///
    /// This is expected to be created before forking, then split so each process keeps the end it needs.
    pub fn new() -> nix::Result<Self> {
        // the flag must be set atomically, another thread may fork at any time
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        trace!("created pipe, read: {} write: {}", read, write);

        // This is safe, because the PipeEnds are taking direct ownership of the FileHandles
        unsafe {
            Ok(Self {
                read: PipeEnd::from_raw_fd(read),
                write: PipeEnd::from_raw_fd(write),
            })
        }
    }

    pub fn split(self) -> (PipeEnd<Read>, PipeEnd<Write>) {
        (self.read, self.write)
    }
}
