//! Application core: domain orchestration behind port traits.
//!
//! This module holds the prop's control loop: command handling, link
//! supervision, sampling and reporting, sequenced by [`service::PropService`].
//! All interaction with sockets and hardware happens through **port traits**
//! defined in [`ports`], keeping this layer testable without peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
