// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("nix error: {0}")]
    NixError(#[from] nix::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("bad control message: {0}")]
    Codec(#[from] bincode::Error),
    #[error("unknown control message type: {0}")]
    UnknownMessage(u16),
    #[error("{path} doesn't exist! ({errno})")]
    SpawnFailed { path: String, errno: Errno },
    #[error("{name} never became ready on port {port}")]
    NeverReady { name: String, port: u16 },
    #[error("an error occured: {0}")]
    ErrorMsg(String),
    #[error("an error occured: {0}")]
    ErrorStr(&'static str),
}

#[derive(Error)]
#[error(transparent)]
pub struct Error(ErrorKind);

// main returns this, so Debug is what the user sees on exit
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Config(msg.into()))
    }
}

impl<E> From<E> for Error
where
    E: Into<ErrorKind>,
{
    fn from(err: E) -> Self {
        Self::from_kind(err.into())
    }
}

impl From<&'static str> for Error {
    fn from(err: &'static str) -> Self {
        Self::from_kind(ErrorKind::ErrorStr(err))
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::from_kind(ErrorKind::ErrorMsg(err))
    }
}
