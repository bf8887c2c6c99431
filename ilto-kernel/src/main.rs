/**
 * ILTO KERNEL - Superviseur watchdog du pipeline de ventilation
 *
 * RÔLE : Lance le Device Bridge, la machine d'override et l'aggregator comme
 * une seule unité, surveille le heartbeat du bridge et redémarre tout à froid
 * quand la chaîne ne répond plus.
 *
 * ARCHITECTURE : kernel.yaml → WorkerGroup (processus) + Supervisor (MQTT heartbeat,
 * status/watchdog) + journal d'exploitation append-only.
 */

mod config;
mod liveness;
mod status_log;
mod watchdog;
mod workers;

use crate::config::KernelConfig;
use crate::status_log::StatusLog;
use crate::watchdog::Supervisor;
use crate::workers::WorkerGroup;
use anyhow::Context;
use ilto_bus::{init_logging, load_config, MqttBus};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("ilto_kernel=info,ilto_bus=info");

    let cfg: KernelConfig = load_config("ILTO_KERNEL_CONFIG", "kernel.yaml").await;
    let mqtt = cfg.mqtt.clone().with_env_overrides();

    let group = WorkerGroup::from_specs(&cfg.workers, KernelConfig::worker_env(&mqtt));
    if group.is_empty() {
        warn!("[kernel] no workers configured, watching heartbeat only");
    }
    info!(
        "[kernel] supervising {} workers, budget {} x {}s",
        group.len(),
        cfg.liveness_budget,
        cfg.tick().as_secs()
    );

    let (bus, rx) = MqttBus::connect(&mqtt, "ilto-kernel");
    let mut supervisor = Supervisor::new(
        bus,
        mqtt.topics(),
        group,
        cfg.liveness_budget,
        cfg.tick(),
        StatusLog::new(&cfg.status_log),
    );
    supervisor.subscribe().await.context("subscribing to heartbeat")?;
    info!("[kernel] status log: {}", supervisor.status_log().display());

    supervisor
        .run(rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("[kernel] ctrl-c handler failed: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("[kernel] bye");
    Ok(())
}
