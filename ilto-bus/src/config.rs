use crate::topics::Topics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    /// Sinon chaque worker utilise son id par défaut (`ilto-kernel`, ...).
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub topic_prefix: Option<String>,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: None,
            keep_alive_secs: 30,
            topic_prefix: None,
        }
    }
}

impl MqttConf {
    /// `ILTO_MQTT_HOST` / `ILTO_MQTT_PORT` écrasent le fichier : c'est ainsi
    /// que le kernel transmet le broker aux workers qu'il lance.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("ILTO_MQTT_HOST") {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }
        if let Ok(port) = std::env::var("ILTO_MQTT_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!("[config] ILTO_MQTT_PORT invalide: {port}"),
            }
        }
        self
    }

    pub fn topics(&self) -> Topics {
        Topics::new(self.topic_prefix.as_deref())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Lit un fichier YAML ; fichier absent ou vide => config par défaut.
pub async fn read_config<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

/// Charge la config d'un binaire : chemin dans `env_var`, sinon `default_path`.
/// Une config invalide est loggée et remplacée par les valeurs par défaut.
pub async fn load_config<T>(env_var: &str, default_path: &str) -> T
where
    T: DeserializeOwned + Default,
{
    dotenvy::dotenv().ok();

    let path = std::env::var(env_var).unwrap_or_else(|_| default_path.into());
    if !Path::new(&path).exists() {
        info!("[config] pas de {path}, usage config par défaut");
    }
    read_config(Path::new(&path)).await.unwrap_or_else(|e| {
        warn!("[config] config invalide ({path}): {e}");
        T::default()
    })
}
