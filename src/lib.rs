//! ScapeProp control core library.
//!
//! One generic control loop for the whole prop family (button panel,
//! cable panel, simultaneous-press pads, tag readers).  The pure-logic
//! modules are exposed for integration testing; sockets, clocks and
//! panels live behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod http;
pub mod link;
pub mod scheduler;
pub mod sensors;
