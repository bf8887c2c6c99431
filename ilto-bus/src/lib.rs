/*!
# ILTO Bus - Contrat MQTT partagé par tous les workers

Bibliothèque commune aux trois workers (ventilation, aggregator) et au kernel :
- `Bus` : contrat publish/subscribe consommé par la logique métier
- `MqttBus` : implémentation rumqttc avec re-subscribe automatique
- `Topics` : noms des topics (avec préfixe optionnel)
- Chargement de configuration YAML + logging `tracing`
*/

pub mod bus;
pub mod config;
pub mod logging;
pub mod mqtt;
pub mod state;
pub mod topics;

pub use bus::{Bus, BusError, BusMessage};
pub use config::{load_config, read_config, ConfigError, MqttConf};
pub use logging::init_logging;
pub use mqtt::MqttBus;
pub use state::{new_state, Shared};
pub use topics::{topic_matches, Topics};
