//! `gptp` is a library implementation of the synchronization core of gPTP,
//! the generalized Precision Time Protocol (IEEE 802.1AS-2021 profile of
//! IEEE 1588). It provides the building blocks a time-aware system needs on
//! each of its ports: the wire message model, a strict-format message
//! validator, the best master clock algorithm (BMCA), the port state
//! machine, the time synchronization servo and the peer path-delay
//! measurement engine.
//!
//! # Device interfaces
//! `gptp` is designed to work on many different underlying platforms,
//! including embedded targets. This means it cannot use the standard library
//! or platform specific libraries to access hardware timestamping units or
//! the network. That needs to be provided by the user of the library.
//!
//! The crate defines a [`HardwareClock`] interface for timestamp capture and
//! clock steering. The [`GptpPort`] abstraction provides the glue between
//! received messages, timer expiries and the engines. All network
//! transmission, timer scheduling and timestamp retrieval happen outside the
//! library: the engines are logic-only and are driven by discrete events.
//!
//! A [`SimulatedHardwareClock`](`hardware::SimulatedHardwareClock`) is
//! provided for testing and loopback use; the whole core is exercisable
//! against it without any conditional compilation.

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

// Needs to be at the root because of use rules in the submodules
macro_rules! actions {
    [] => {
        {
            crate::port::PortActionIterator::from(::arrayvec::ArrayVec::new())
        }
    };
    [$action:expr] => {
        {
            let mut list = ::arrayvec::ArrayVec::new();
            list.push($action);
            crate::port::PortActionIterator::from(list)
        }
    };
    [$action1:expr, $action2:expr] => {
        {
            let mut list = ::arrayvec::ArrayVec::new();
            list.push($action1);
            list.push($action2);
            crate::port::PortActionIterator::from(list)
        }
    };
}

mod bmc;
pub mod config;
pub(crate) mod datastructures;
mod float_polyfill;
pub mod hardware;
mod instance;
pub mod observability;
pub mod pdelay;
pub mod port;
pub mod sync;
pub mod time;
pub mod validation;

pub use bmc::{compare_clocks, ForeignClockDS};
pub use datastructures::messages::MessageType;
pub use hardware::HardwareClock;
pub use instance::GptpPort;
