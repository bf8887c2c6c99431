/**
 * ILTO AGGREGATOR - Moyennes glissantes des capteurs
 *
 * RÔLE :
 * Worker autonome lancé par le kernel. Bufferise les mesures haute fréquence
 * et publie toutes les 2 minutes (configurable) la moyenne de chaque topic
 * sur la fenêtre écoulée.
 *
 * COMMUNICATION MQTT :
 * Écoute: sensor/+ (configurable)
 * Publie: aggregate (ou fichier JSON lines selon `sink`)
 */

mod aggregator;
mod buffer;
mod config;
mod record;
mod sink;

use crate::aggregator::Aggregator;
use crate::config::{AggregatorConfig, SinkConf};
use crate::sink::{BusSink, JsonLinesSink, TelemetrySink};
use anyhow::Context;
use ilto_bus::{init_logging, load_config, MqttBus};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("ilto_aggregator=info,ilto_bus=info");

    let cfg: AggregatorConfig = load_config("ILTO_AGGREGATOR_CONFIG", "aggregator.yaml").await;
    let mqtt = cfg.mqtt.clone().with_env_overrides();
    let topics = mqtt.topics();

    let (bus, rx) = MqttBus::connect(&mqtt, "ilto-aggregator");
    let aggregator = Aggregator::new(cfg.filters(), cfg.window());
    aggregator
        .subscribe(&bus)
        .await
        .context("subscribing to sensor topics")?;

    let sink: Box<dyn TelemetrySink> = match &cfg.sink {
        SinkConf::Bus => Box::new(BusSink::new(bus.clone(), topics.aggregate)),
        SinkConf::File { path } => Box::new(JsonLinesSink::new(path.clone())),
    };
    info!(
        "[aggregator] window {}s, sink {}, filters {:?}",
        cfg.window().as_secs(),
        sink.describe(),
        cfg.filters()
    );

    tokio::select! {
        _ = aggregator.run(rx) => info!("[aggregator] bus closed"),
        _ = aggregator.run_cycles(sink.as_ref()) => {}
        _ = tokio::signal::ctrl_c() => info!("[aggregator] shutting down"),
    }
    Ok(())
}
