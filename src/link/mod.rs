//! Orchestrator link: who to talk to, when, and what to say.

pub mod payload;
pub mod reporter;
pub mod supervisor;

pub use reporter::{DeliveryMode, Report, ReportKind, ReportingClient};
pub use supervisor::{ConnectionState, ConnectionSupervisor, LivenessTimer, SupervisorAction};
