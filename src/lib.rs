// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Ordered launcher for a fixed set of programs
//!
//! Each program is a unit with its own UDP management port. Units are started one at a time,
//! each confirmed over its port before the next, and shut down over the same ports in reverse.

pub mod config;
pub mod control;
pub mod error;
pub mod fork;
pub mod msg;
pub mod orchestrator;
pub mod pipe;
pub mod transport;
pub mod unit;

pub use error::Error;
