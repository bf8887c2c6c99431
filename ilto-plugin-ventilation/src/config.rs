use crate::machine::OverrideSettings;
use ilto_bus::MqttConf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `ventilation.yaml` (chemin surchargé par `ILTO_VENTILATION_CONFIG`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct VentilationConfig {
    pub mqtt: MqttConf,
    pub settle_delay_ms: u64,
    pub tick_ms: u64,
    pub status_every_ticks: u32,
    pub guard_ticks: u32,
}

impl Default for VentilationConfig {
    fn default() -> Self {
        let settings = OverrideSettings::default();
        Self {
            mqtt: MqttConf::default(),
            settle_delay_ms: settings.settle_delay.as_millis() as u64,
            tick_ms: settings.tick.as_millis() as u64,
            status_every_ticks: settings.status_every_ticks,
            guard_ticks: settings.guard_ticks,
        }
    }
}

impl VentilationConfig {
    pub fn settings(&self) -> OverrideSettings {
        OverrideSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            // tick nul => interval tokio panique
            tick: Duration::from_millis(self.tick_ms.max(1)),
            status_every_ticks: self.status_every_ticks.max(1),
            guard_ticks: self.guard_ticks,
        }
    }
}
