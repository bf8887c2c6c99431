/// Noms des topics échangés entre les workers.
///
/// Avec un préfixe `ilto`, `control` devient `ilto/control`, etc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub control: String,
    pub status_ventilation: String,
    pub status_boost: String,
    pub status_watchdog: String,
    pub telemetry_heating: String,
    pub telemetry_mode: String,
    pub telemetry_speed: String,
    pub aggregate: String,
    pub heartbeat: String,
}

impl Topics {
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            control: prefixed(prefix, "control"),
            status_ventilation: prefixed(prefix, "status/ventilation"),
            status_boost: prefixed(prefix, "status/boost"),
            status_watchdog: prefixed(prefix, "status/watchdog"),
            telemetry_heating: prefixed(prefix, "telemetry/heating"),
            telemetry_mode: prefixed(prefix, "telemetry/mode"),
            telemetry_speed: prefixed(prefix, "telemetry/speed"),
            aggregate: prefixed(prefix, "aggregate"),
            heartbeat: prefixed(prefix, "heartbeat"),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Préfixe un nom de topic (ou filtre) ; un préfixe vide est ignoré.
pub fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{p}/{name}"),
        _ => name.to_string(),
    }
}

/// Vérifie qu'un topic correspond à un filtre MQTT (`+` et `#`).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topics_are_unprefixed() {
        let topics = Topics::default();
        assert_eq!(topics.control, "control");
        assert_eq!(topics.status_boost, "status/boost");
        assert_eq!(topics.telemetry_speed, "telemetry/speed");
    }

    #[test]
    fn test_prefix() {
        let topics = Topics::new(Some("ilto/"));
        assert_eq!(topics.control, "ilto/control");
        assert_eq!(topics.heartbeat, "ilto/heartbeat");
        assert_eq!(prefixed(Some(""), "aggregate"), "aggregate");
    }

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("sensor/+", "sensor/supply"));
        assert!(!topic_matches("sensor/+", "sensor/supply/raw"));
        assert!(topic_matches("sensor/#", "sensor/supply/raw"));
        assert!(topic_matches("#", "heartbeat"));
        assert!(topic_matches("control", "control"));
        assert!(!topic_matches("control", "controls"));
        assert!(!topic_matches("sensor/+", "telemetry/speed"));
    }
}
