/**
 * AGGREGATOR - Réception des mesures capteurs et cycles d'agrégation
 *
 * FONCTIONNEMENT :
 * - handle : topic filtré par les subscriptions configurées, payload parsé,
 *   mesure ajoutée au SampleBuffer partagé
 * - run_cycles : toutes les `window`, éviction + moyenne sous lock, puis
 *   écriture dans le TelemetrySink une fois le lock relâché
 */

use crate::buffer::{parse_sample, SampleBuffer, SampleError};
use crate::record::{AggregateRecord, TIMESTAMP_KEY};
use crate::sink::TelemetrySink;
use ilto_bus::{new_state, topic_matches, Bus, BusError, BusMessage, Shared};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Aggregator {
    buffer: Shared<SampleBuffer>,
    filters: Vec<String>,
    window: Duration,
}

impl Aggregator {
    pub fn new(filters: Vec<String>, window: Duration) -> Self {
        Self {
            buffer: new_state(SampleBuffer::new()),
            filters,
            window,
        }
    }

    pub fn buffer(&self) -> Shared<SampleBuffer> {
        self.buffer.clone()
    }

    pub async fn subscribe<B: Bus>(&self, bus: &B) -> Result<(), BusError> {
        for filter in &self.filters {
            bus.subscribe(filter).await?;
        }
        Ok(())
    }

    /// Une mesure reçue ; les payloads invalides sont loggés et ignorés.
    pub fn handle(&self, msg: &BusMessage) {
        if !self.filters.iter().any(|f| topic_matches(f, &msg.topic)) {
            debug!("[aggregator] ignoring topic {}", msg.topic);
            return;
        }
        if msg.topic == TIMESTAMP_KEY {
            warn!("[aggregator] topic {} clashes with the record timestamp, dropped", msg.topic);
            return;
        }

        let value = msg.text().ok_or(SampleError::NotUtf8).and_then(parse_sample);
        match value {
            Ok(value) => self.buffer.lock().record(&msg.topic, value),
            Err(e) => warn!("[aggregator] {} on {}, dropped", e, msg.topic),
        }
    }

    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<BusMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle(&msg);
        }
    }

    /// Un cycle complet : agrégation sous lock, écriture hors lock.
    /// Un record est écrit à chaque cycle, même sans mesure récente.
    pub async fn cycle(&self, sink: &dyn TelemetrySink, now: OffsetDateTime) -> AggregateRecord {
        let window = time::Duration::try_from(self.window).unwrap_or(time::Duration::MAX);
        let record = self.buffer.lock().aggregate(now, window);

        if record.is_empty() {
            debug!("[aggregator] no fresh samples this cycle");
        }

        match sink.write(&record).await {
            Ok(()) => info!("[aggregator] {} topic(s) written to {}", record.averages.len(), sink.describe()),
            Err(e) => warn!("[aggregator] sink {} failed: {}", sink.describe(), e),
        }
        record
    }

    /// Boucle infinie : un cycle toutes les `window`.
    pub async fn run_cycles(&self, sink: &dyn TelemetrySink) {
        let mut ticker = interval_at(Instant::now() + self.window, self.window);
        loop {
            ticker.tick().await;
            self.cycle(sink, OffsetDateTime::now_utc()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BusSink, SinkError};
    use async_trait::async_trait;
    use ilto_devkit::{MockMqttClient, TestHarness};
    use parking_lot::Mutex;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(120);

    fn aggregator() -> Aggregator {
        Aggregator::new(vec!["sensor/+".to_string()], WINDOW)
    }

    fn msg(topic: &str, payload: &str) -> BusMessage {
        BusMessage::new(topic, payload.as_bytes().to_vec())
    }

    #[derive(Default)]
    struct FlakySink {
        fail: bool,
        written: Arc<Mutex<Vec<AggregateRecord>>>,
    }

    #[async_trait]
    impl TelemetrySink for FlakySink {
        async fn write(&self, record: &AggregateRecord) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Io(std::io::Error::other("disk full")));
            }
            self.written.lock().push(record.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    #[tokio::test]
    async fn test_handle_filters_and_parses() {
        let agg = aggregator();

        agg.handle(&msg("sensor/supply", "10"));
        agg.handle(&msg("sensor/supply", "20"));
        agg.handle(&msg("sensor/supply", "warm"));
        agg.handle(&msg("sensor/exhaust", "NaN"));
        agg.handle(&BusMessage::new("sensor/exhaust", vec![0xc3]));
        agg.handle(&msg("telemetry/speed", "2"));

        let buffer = agg.buffer();
        let buffer = buffer.lock();
        assert_eq!(buffer.samples("sensor/supply").len(), 2);
        assert!(buffer.samples("sensor/exhaust").is_empty());
        assert_eq!(buffer.topic_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_writes_average() {
        let agg = aggregator();
        let sink = FlakySink::default();
        agg.handle(&msg("sensor/supply", "10"));
        agg.handle(&msg("sensor/supply", "20"));

        let record = agg.cycle(&sink, OffsetDateTime::now_utc()).await;

        assert_eq!(record.averages["sensor/supply"], 15.0);
        assert_eq!(sink.written.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cycle_writes_timestamp_only_record() {
        let agg = aggregator();
        let sink = FlakySink::default();
        let now = OffsetDateTime::now_utc();

        let record = agg.cycle(&sink, now).await;

        assert!(record.is_empty());
        assert_eq!(*sink.written.lock(), vec![AggregateRecord::new(Default::default(), now)]);
    }

    #[tokio::test]
    async fn test_empty_cycle_publishes_on_bus() {
        let bus = MockMqttClient::new();
        let sink = BusSink::new(bus.clone(), "aggregate");
        let agg = aggregator();

        agg.cycle(&sink, OffsetDateTime::now_utc()).await;

        let published = bus.payloads("aggregate");
        assert_eq!(published.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&published[0]).unwrap();
        assert_eq!(json.as_object().map(|o| o.len()), Some(1));
        assert!(json["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_cycles() {
        let agg = aggregator();
        let failing = FlakySink { fail: true, ..Default::default() };
        agg.handle(&msg("sensor/supply", "10"));

        assert!(!agg.cycle(&failing, OffsetDateTime::now_utc()).await.is_empty());

        let healthy = FlakySink::default();
        agg.handle(&msg("sensor/supply", "30"));
        let record = agg.cycle(&healthy, OffsetDateTime::now_utc()).await;
        assert_eq!(record.averages["sensor/supply"], 20.0);
    }

    #[tokio::test]
    async fn test_stale_samples_dropped_at_cycle() {
        let agg = aggregator();
        let sink = FlakySink::default();
        agg.handle(&msg("sensor/supply", "10"));

        let later = OffsetDateTime::now_utc() + time::Duration::minutes(5);
        assert!(agg.cycle(&sink, later).await.is_empty());
        assert!(agg.buffer().lock().is_empty());
        assert_eq!(sink.written.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_timestamp_topic_is_dropped() {
        let agg = Aggregator::new(vec!["#".to_string()], WINDOW);
        let sink = FlakySink::default();

        agg.handle(&msg("timestamp", "12"));
        agg.handle(&msg("sensor/timestamp", "3"));

        let record = agg.cycle(&sink, OffsetDateTime::now_utc()).await;
        assert_eq!(record.averages.keys().collect::<Vec<_>>(), vec!["sensor/timestamp"]);
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!(json["timestamp"].is_i64());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_publish_on_bus_every_window() {
        let harness = TestHarness::new();
        let rx = harness.receiver();
        let agg = aggregator();
        agg.subscribe(&harness.mqtt_client).await.unwrap();

        let receiver = agg.clone();
        tokio::spawn(async move { receiver.run(rx).await });
        let cycles = agg.clone();
        let sink = BusSink::new(harness.mqtt_client.clone(), harness.topics.aggregate.clone());
        tokio::spawn(async move { cycles.run_cycles(&sink).await });

        harness.send("sensor/supply", "10").await.unwrap();
        harness.send("sensor/supply", "20").await.unwrap();
        harness.send("heartbeat", "1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(harness.payloads("aggregate").is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let json: serde_json::Value = harness
            .mqtt_client
            .get_last_json_message("aggregate")
            .unwrap()
            .unwrap();
        assert_eq!(json["sensor/supply"], 15.0);
        assert!(json["timestamp"].is_i64());
        assert_eq!(harness.mqtt_client.get_subscriptions(), vec!["sensor/+"]);
    }

    #[tokio::test]
    async fn test_bus_sink_failure_keeps_buffer() {
        let bus = MockMqttClient::new();
        bus.set_fail_publish(true);
        let sink = BusSink::new(bus, "aggregate");
        let agg = aggregator();
        agg.handle(&msg("sensor/supply", "4"));

        agg.cycle(&sink, OffsetDateTime::now_utc()).await;

        assert_eq!(agg.buffer().lock().samples("sensor/supply").len(), 1);
    }
}
