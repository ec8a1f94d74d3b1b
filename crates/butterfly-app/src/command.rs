use crossfire::mpmc;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, detect_backoff_cfg};
use tracing::{debug, warn};

use crate::session::{ScenarioSession, SessionCommand};

pub type CommandSender = MAsyncTx<SessionCommand>;
pub type CommandReceiver = MRx<SessionCommand>;

pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_tx_async_rx_blocking(capacity)
}

/// Apply every queued command to the session. Called once per tick,
/// before the viewpoint advances, so a parameter change and the
/// recompute it triggers land in the same frame.
pub fn drain_pending_commands(receiver: &CommandReceiver, session: &mut ScenarioSession) {
    loop {
        match receiver.try_recv() {
            Ok(command) => {
                debug!(?command, "applying session command");
                session.apply(command);
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

/// Submit a command without blocking; a full queue drops the command
/// with a warning rather than stalling the sender.
pub fn try_submit(sender: &CommandSender, command: SessionCommand) -> bool {
    match sender.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(cmd)) => {
            warn!(?cmd, "session command queue full; dropping command");
            false
        }
        Err(TrySendError::Disconnected(cmd)) => {
            warn!(?cmd, "session command queue disconnected");
            false
        }
    }
}
