/*!
Mock MQTT Client pour tester les workers sans broker

Enregistre tous les messages publiés et permet de simuler la réception.
En mode loopback il se comporte comme un broker minimal : ce qui est publié
sur un topic auquel on est abonné revient sur le receiver (le worker de
ventilation observe ainsi ses propres commandes `control`).
*/

use anyhow::Result;
use async_trait::async_trait;
use ilto_bus::{topic_matches, Bus, BusError, BusMessage};
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Mock MQTT Client qui remplace `ilto_bus::MqttBus` dans les tests
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<BusMessage>>>>,
    loopback: bool,
    fail_publish: Arc<AtomicBool>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
            loopback: false,
            fail_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Les publications sont aussi livrées aux abonnements qui matchent
    pub fn with_loopback() -> Self {
        Self {
            loopback: true,
            ..Self::new()
        }
    }

    /// Configuration d'un channel pour recevoir les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<BusMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule une panne transitoire du broker : les publish échouent
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Simule la réception d'un message sur un topic auquel on est abonné
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = BusMessage::new(topic, payload);
        if !self.deliver(&message)? {
            log::warn!("[MOCK] no subscription matches {}, message dropped", message.topic);
        } else {
            log::info!("[MOCK] Simulated incoming: {}", message.topic);
        }
        Ok(())
    }

    fn deliver(&self, message: &BusMessage) -> Result<bool> {
        let subscribed = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|filter| topic_matches(filter, &message.topic));
        if !subscribed {
            return Ok(false);
        }
        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }
        Ok(true)
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Récupère les abonnements (pour assertions de tests)
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads texte publiés sur un topic, dans l'ordre
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.find_messages_by_topic(topic)
            .iter()
            .map(MockMessage::text)
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Reset des messages publiés (les abonnements sont conservés)
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MockMqttClient {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "mock broker unavailable".to_string(),
            });
        }

        let message = MockMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };
        self.published_messages.lock().unwrap().push(message);
        log::info!("[MOCK] Published to {}: {}", topic, payload);

        if self.loopback {
            self.deliver(&BusMessage::new(topic, payload.as_bytes().to_vec()))
                .map_err(|e| BusError::Publish {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), BusError> {
        self.subscriptions.lock().unwrap().push(filter.to_string());
        log::info!("[MOCK] Subscribed to {}", filter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_publish_subscribe() {
        let client = MockMqttClient::new();

        client.subscribe("sensor/+").await.unwrap();
        assert_eq!(client.get_subscriptions(), vec!["sensor/+"]);

        client.publish("control", "V300").await.unwrap();

        let messages = client.get_published_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "control");
        assert_eq!(messages[0].text(), "V300");
    }

    #[tokio::test]
    async fn test_incoming_requires_matching_subscription() {
        let client = MockMqttClient::new();
        let mut rx = client.setup_receiver();
        client.subscribe("sensor/+").await.unwrap();

        client.simulate_incoming("heartbeat", "x").await.unwrap();
        client.simulate_incoming("sensor/supply", "21.5").await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "sensor/supply");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_loopback_delivers_own_publications() {
        let client = MockMqttClient::with_loopback();
        let mut rx = client.setup_receiver();
        client.subscribe("control").await.unwrap();

        client.publish("control", "V0").await.unwrap();
        client.publish("status/boost", "0").await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.text(), Some("V0"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fail_publish() {
        let client = MockMqttClient::new();
        client.set_fail_publish(true);
        assert!(client.publish("aggregate", "{}").await.is_err());
        assert!(client.get_published_messages().is_empty());

        client.set_fail_publish(false);
        client.publish("aggregate", "{}").await.unwrap();
        let parsed: Option<serde_json::Value> = client.get_last_json_message("aggregate").unwrap();
        assert_eq!(parsed, Some(serde_json::json!({})));
    }
}
