use ilto_bus::{topics::prefixed, MqttConf};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Destination des agrégats
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConf {
    /// JSON publié sur le topic `aggregate`
    #[default]
    Bus,
    /// Une ligne JSON par cycle dans un fichier
    File { path: PathBuf },
}

/// `aggregator.yaml` (chemin surchargé par `ILTO_AGGREGATOR_CONFIG`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AggregatorConfig {
    pub mqtt: MqttConf,
    pub window_secs: u64,
    /// Filtres MQTT des capteurs (préfixés comme les autres topics)
    pub subscriptions: Vec<String>,
    pub sink: SinkConf,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            window_secs: 120,
            subscriptions: vec!["sensor/+".into()],
            sink: SinkConf::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }

    pub fn filters(&self) -> Vec<String> {
        let prefix = self.mqtt.topic_prefix.as_deref();
        self.subscriptions.iter().map(|f| prefixed(prefix, f)).collect()
    }
}
