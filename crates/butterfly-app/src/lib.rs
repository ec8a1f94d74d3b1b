//! Shared application plumbing for the butterfly timeline shell.

use std::sync::{Arc, Mutex};

pub mod command;
pub mod session;

pub use command::{CommandReceiver, CommandSender, create_command_bus, drain_pending_commands};
pub use session::{ScenarioSession, SessionCommand, SessionSummary};

pub type SharedSession = Arc<Mutex<ScenarioSession>>;
