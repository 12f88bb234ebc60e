//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that drives a full `PropService`
//! against mock sockets, a simulated panel, and a hand-driven clock.
//! Everything runs on the host with no network access.

mod listener_tests;
mod mock_hw;
mod rig;
mod service_tests;
