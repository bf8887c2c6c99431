use crate::workers::WorkerRole;
use ilto_bus::MqttConf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// `kernel.yaml` (chemin surchargé par `ILTO_KERNEL_CONFIG`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub mqtt: MqttConf,
    /// Ticks sans heartbeat tolérés avant le redémarrage complet
    pub liveness_budget: u32,
    pub tick_secs: u64,
    /// Journal append-only Begin/Start/Killed/Exit
    pub status_log: PathBuf,
    /// Lancés dans cet ordre, arrêtés ensemble
    pub workers: Vec<WorkerSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkerSpec {
    pub role: WorkerRole,
    /// Ligne de commande, découpée avec shell-words (ex: "ilto-bridge --tty /dev/ttyUSB0")
    pub command: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl WorkerSpec {
    pub fn new(role: WorkerRole, command: &str) -> Self {
        Self {
            role,
            command: command.to_string(),
            env: HashMap::new(),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            liveness_budget: 12,
            tick_secs: 10,
            status_log: PathBuf::from("ilto-status.log"),
            workers: vec![
                WorkerSpec::new(WorkerRole::DeviceBridge, "ilto-bridge"),
                WorkerSpec::new(WorkerRole::OverrideMachine, "ilto-ventilation"),
                WorkerSpec::new(WorkerRole::Aggregator, "ilto-aggregator"),
            ],
        }
    }
}

impl KernelConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    /// Variables transmises à tous les workers : même broker que le kernel
    pub fn worker_env(mqtt: &MqttConf) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("ILTO_MQTT_HOST".to_string(), mqtt.host.clone());
        env.insert("ILTO_MQTT_PORT".to_string(), mqtt.port.to_string());
        env
    }
}
