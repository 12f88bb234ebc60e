//! Inbound commands to the application service.
//!
//! The command listener parses these from `/control` requests; the
//! [`PropService`](super::service::PropService) hands them to the puzzle
//! machine.  Anything that does not parse is answered with a 400 and never
//! reaches the machine.

use core::fmt;
use core::str::FromStr;

/// Remote control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Reset channels and arm the puzzle.
    Start,
    /// Return to Idle.
    Stop,
    /// Reset per the variant's restart policy.
    Restart,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The command field held something other than `start|stop|restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCommand;

impl FromStr for ControlCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            _ => Err(UnknownCommand),
        }
    }
}
