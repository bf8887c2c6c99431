/*!
# ILTO DevKit - Stubs et utilitaires de test

Bibliothèque (dev-dependency) pour tester les workers sans broker:
- `MockMqttClient` : implémente `ilto_bus::Bus`, enregistre les publications
- Loopback optionnel : un publish est redistribué aux abonnements qui matchent
- `TestHarness` : expectations et assertions sur les topics
*/

pub mod mqtt_stub;
pub mod test_utils;

pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use test_utils::TestHarness;
