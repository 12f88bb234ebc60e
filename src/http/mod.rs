//! HTTP/1.x surface: the inbound command endpoint and the request
//! encoding used for reports to the orchestrator.

pub mod codec;
pub mod listener;
pub mod outbound;
pub mod request;
pub mod response;
pub mod transport;

pub use listener::{CommandListener, Inbound, ListenerTimeouts};
pub use request::{Rejection, Route};
pub use response::{ProbeEcho, Response};
pub use transport::Transport;
