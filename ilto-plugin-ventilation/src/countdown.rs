use crate::machine::{OverrideMachine, TickOutcome};
use ilto_bus::Bus;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::debug;

/// Compte à rebours d'une session : un tick toutes les `settings.tick`.
///
/// S'arrête dès que `stop` est signalé (ou que son sender est droppé), avant
/// le tick suivant, ou quand la machine indique que la session est finie.
pub(crate) async fn run<B: Bus>(machine: OverrideMachine<B>, session_id: u64, mut stop: oneshot::Receiver<()>) {
    let period = machine.settings().tick;
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => {
                debug!("[ventilation] countdown {session_id} stopped");
                return;
            }
            _ = ticker.tick() => {
                if machine.tick(session_id).await == TickOutcome::Finished {
                    debug!("[ventilation] countdown {session_id} finished");
                    return;
                }
            }
        }
    }
}
