use async_trait::async_trait;

/// Message reçu sur le bus, découplé de `rumqttc::Publish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new<S, V>(topic: S, payload: V) -> Self
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload texte sans les espaces de bord (les payloads ILTO sont courts).
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok().map(str::trim)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("publish on {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("subscribe to {filter} failed: {reason}")]
    Subscribe { filter: String, reason: String },
}

/// Transport publish/subscribe vu par les workers.
///
/// Les erreurs sont transitoires : l'appelant les logge et abandonne
/// l'opération pour ce cycle.
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;

    async fn subscribe(&self, filter: &str) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_trims_payload() {
        let msg = BusMessage::new("control", b"V300\n".to_vec());
        assert_eq!(msg.text(), Some("V300"));
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let msg = BusMessage::new("sensor/t", vec![0xff, 0xfe]);
        assert_eq!(msg.text(), None);
    }
}
