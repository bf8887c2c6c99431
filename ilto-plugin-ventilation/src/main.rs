/**
 * ILTO VENTILATION - Override temporisé de l'unité de ventilation
 *
 * RÔLE :
 * Worker autonome lancé par le kernel. Traduit les directives V<d>/B<d> du
 * topic `control` en séquences de commandes appareil, puis restaure la
 * configuration d'origine à l'expiration ou à l'annulation.
 *
 * COMMUNICATION MQTT :
 * Écoute: control, telemetry/heating, telemetry/mode, telemetry/speed
 * Publie: control (L/T/S/V0/GG), status/ventilation, status/boost
 */

mod config;
mod countdown;
mod device;
mod directive;
mod machine;

use crate::config::VentilationConfig;
use crate::machine::OverrideMachine;
use anyhow::Context;
use ilto_bus::{init_logging, load_config, MqttBus};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("ilto_ventilation=info,ilto_bus=info");

    let cfg: VentilationConfig = load_config("ILTO_VENTILATION_CONFIG", "ventilation.yaml").await;
    let mqtt = cfg.mqtt.clone().with_env_overrides();

    let (bus, rx) = MqttBus::connect(&mqtt, "ilto-ventilation");
    let machine = OverrideMachine::new(bus, mqtt.topics(), cfg.settings());
    machine.subscribe().await.context("subscribing to control/telemetry")?;

    // état initial de l'appareil
    machine.request_refresh().await;

    info!("[ventilation] ready on {}:{}", mqtt.host, mqtt.port);
    tokio::select! {
        _ = machine.run(rx) => info!("[ventilation] bus closed"),
        _ = tokio::signal::ctrl_c() => info!("[ventilation] shutting down"),
    }
    Ok(())
}
