use crossfire::mpmc;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, detect_backoff_cfg};
use kalmanviz_core::{ControlCommand, Engine, FramePainter, TelemetrySurface, TickScheduler};
use std::sync::Arc;
use tracing::{debug, warn};

pub type CommandSender = MAsyncTx<ControlCommand>;
pub type CommandReceiver = MRx<ControlCommand>;
pub type CommandSubmit = Arc<dyn Fn(ControlCommand) -> bool + Send + Sync>;

pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_tx_async_rx_blocking(capacity)
}

/// Applies everything queued so far. Returns `(applied, rejected)`.
pub fn drain_pending_commands<E, P, S>(
    receiver: &CommandReceiver,
    scheduler: &mut TickScheduler<E, P, S>,
) -> (usize, usize)
where
    E: Engine,
    P: FramePainter,
    S: TelemetrySurface,
{
    let mut applied = 0;
    let mut rejected = 0;
    loop {
        match receiver.try_recv() {
            Ok(command) => {
                debug!(?command, "applying control command");
                match scheduler.apply(command) {
                    Ok(()) => applied += 1,
                    Err(_) => rejected += 1,
                }
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    (applied, rejected)
}

pub fn make_command_submit(sender: CommandSender) -> CommandSubmit {
    let sender = Arc::new(sender);
    Arc::new(
        move |command: ControlCommand| match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                warn!(?cmd, "control command queue full; dropping command");
                false
            }
            Err(TrySendError::Disconnected(cmd)) => {
                warn!(?cmd, "control command queue disconnected");
                false
            }
        },
    )
}
