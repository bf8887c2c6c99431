/*!
Test Harness pour les workers ILTO

Facilite l'écriture de tests avec:
- Setup automatique du mock MQTT et des topics par défaut
- Envoi de commandes `control`, télémétrie, heartbeats, samples
- Assertions sur les messages publiés
*/

use crate::mqtt_stub::MockMqttClient;
use anyhow::Result;
use ilto_bus::{BusMessage, Topics};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Harness de test complet pour un worker ILTO
pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    pub topics: Topics,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    /// Harness sans loopback : seuls les messages simulés arrivent au worker
    pub fn new() -> Self {
        Self::with_client(MockMqttClient::new())
    }

    /// Harness dont le mock se comporte comme un broker (loopback)
    pub fn with_loopback() -> Self {
        Self::with_client(MockMqttClient::with_loopback())
    }

    fn with_client(mqtt_client: MockMqttClient) -> Self {
        env_logger::builder().is_test(true).try_init().ok();

        Self {
            mqtt_client,
            topics: Topics::default(),
            expectations: Vec::new(),
        }
    }

    /// Receiver à passer à la boucle `run` du worker testé
    pub fn receiver(&self) -> mpsc::UnboundedReceiver<BusMessage> {
        self.mqtt_client.setup_receiver()
    }

    /// Ajoute une expectation: on s'attend à N messages publiés sur un topic
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    pub async fn send(&self, topic: &str, payload: &str) -> Result<()> {
        self.mqtt_client.simulate_incoming(topic, payload.as_bytes().to_vec()).await
    }

    /// Simule une commande sur le topic `control` (ex: "V300", "S1")
    pub async fn send_control(&self, directive: &str) -> Result<()> {
        self.send(&self.topics.control, directive).await
    }

    /// Simule un cycle de télémétrie complet du Device Bridge
    pub async fn send_telemetry(&self, heating: u8, mode: i32, speed: u8) -> Result<()> {
        self.send(&self.topics.telemetry_heating, &heating.to_string()).await?;
        self.send(&self.topics.telemetry_mode, &mode.to_string()).await?;
        self.send(&self.topics.telemetry_speed, &speed.to_string()).await
    }

    pub async fn send_heartbeat(&self) -> Result<()> {
        self.send(&self.topics.heartbeat, "1").await
    }

    /// Payloads publiés sur un topic, dans l'ordre
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.mqtt_client.payloads(topic)
    }

    /// Attend qu'un message soit publié sur un topic (compatible horloge en pause)
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Option<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);

        while tokio::time::Instant::now() < deadline {
            if let Some(last) = self.payloads(topic).pop() {
                return Some(last);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        log::warn!("Timeout waiting for message on {}", topic);
        None
    }

    /// Vérifie toutes les expectations configurées
    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual_count = self.mqtt_client.find_messages_by_topic(&expectation.topic).len();

            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic,
                    expectation.expected_count,
                    actual_count
                );
            }
        }
        Ok(())
    }

    /// Assert qu'un payload précis a été publié sur un topic
    pub fn assert_message_sent(&self, topic: &str, expected_payload: &str) -> Result<()> {
        if self.payloads(topic).iter().any(|p| p == expected_payload) {
            return Ok(());
        }
        anyhow::bail!("Expected message '{}' not found on topic: {}", expected_payload, topic);
    }

    /// Stats sur les messages collectés
    pub fn get_stats(&self) -> TestStats {
        let messages = self.mqtt_client.get_published_messages();
        let mut topic_counts = HashMap::new();

        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }

        TestStats {
            total_messages: messages.len(),
            topic_counts,
            subscriptions: self.mqtt_client.get_subscriptions(),
        }
    }

    /// Reset le harness pour un nouveau scénario
    pub fn reset(&mut self) {
        self.mqtt_client.clear();
        self.expectations.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub subscriptions: Vec<String>,
}
