/**
 * TELEMETRY SINK - Destination des AggregateRecord
 *
 * - BusSink : JSON publié sur le topic `aggregate` (défaut)
 * - JsonLinesSink : une ligne JSON par cycle, ajoutée à un fichier local
 */

use crate::record::AggregateRecord;
use async_trait::async_trait;
use ilto_bus::{Bus, BusError};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn write(&self, record: &AggregateRecord) -> Result<(), SinkError>;

    /// Nom affiché dans les logs
    fn describe(&self) -> String;
}

pub struct BusSink<B> {
    bus: B,
    topic: String,
}

impl<B: Bus> BusSink<B> {
    pub fn new(bus: B, topic: impl Into<String>) -> Self {
        Self { bus, topic: topic.into() }
    }
}

#[async_trait]
impl<B: Bus> TelemetrySink for BusSink<B> {
    async fn write(&self, record: &AggregateRecord) -> Result<(), SinkError> {
        let payload = record.to_json()?;
        self.bus.publish(&self.topic, &payload).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("bus:{}", self.topic)
    }
}

pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TelemetrySink for JsonLinesSink {
    async fn write(&self, record: &AggregateRecord) -> Result<(), SinkError> {
        let mut line = record.to_json()?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilto_devkit::MockMqttClient;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    fn record(value: f64) -> AggregateRecord {
        let mut averages = BTreeMap::new();
        averages.insert("sensor/supply".to_string(), value);
        AggregateRecord::new(averages, datetime!(2024-01-10 12:00:00 UTC))
    }

    #[tokio::test]
    async fn test_bus_sink_publishes_json() {
        let bus = MockMqttClient::new();
        let sink = BusSink::new(bus.clone(), "aggregate");

        sink.write(&record(15.0)).await.unwrap();

        let json: serde_json::Value = bus.get_last_json_message("aggregate").unwrap().unwrap();
        assert_eq!(json["sensor/supply"], 15.0);
        assert_eq!(json["timestamp"], 1704888000);
        assert_eq!(sink.describe(), "bus:aggregate");
    }

    #[tokio::test]
    async fn test_bus_sink_reports_failure() {
        let bus = MockMqttClient::new();
        bus.set_fail_publish(true);
        let sink = BusSink::new(bus, "aggregate");

        assert!(matches!(sink.write(&record(1.0)).await, Err(SinkError::Bus(_))));
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregate.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.write(&record(10.0)).await.unwrap();
        sink.write(&record(20.0)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["sensor/supply"], 20.0);
    }

    #[tokio::test]
    async fn test_json_lines_sink_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing/aggregate.jsonl"));

        assert!(matches!(sink.write(&record(1.0)).await, Err(SinkError::Io(_))));
    }
}
