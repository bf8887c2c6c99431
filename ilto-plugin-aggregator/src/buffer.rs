/**
 * SAMPLE BUFFER - Fenêtre glissante approximative des mesures capteurs
 *
 * FONCTIONNEMENT :
 * - record : ajoute (timestamp, valeur) à la fin du buffer du topic
 * - aggregate : coupe le préfixe périmé (jusqu'à la dernière entrée plus
 *   vieille que `now - window`), moyenne ce qui reste, supprime les topics vides
 *
 * Le buffer est partagé (`Shared<SampleBuffer>`) entre les handlers MQTT et
 * le cycle d'agrégation ; chaque opération se fait sous un seul lock.
 */

use crate::record::AggregateRecord;
use std::collections::{BTreeMap, HashMap};
use time::{Duration, OffsetDateTime};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("sample is not valid UTF-8")]
    NotUtf8,
    #[error("sample is not a number: {0:?}")]
    NotANumber(String),
    #[error("sample is not finite: {0:?}")]
    NotFinite(String),
}

/// Parse une mesure brute (`"21.5"`, `" 3\n"`)
pub fn parse_sample(payload: &str) -> Result<f64, SampleError> {
    let value: f64 = payload
        .trim()
        .parse()
        .map_err(|_| SampleError::NotANumber(payload.to_string()))?;
    if !value.is_finite() {
        return Err(SampleError::NotFinite(payload.to_string()));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: OffsetDateTime,
    pub value: f64,
}

#[derive(Debug, Default)]
pub struct SampleBuffer {
    topics: HashMap<String, Vec<Sample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, topic: &str, value: f64) {
        self.record_at(topic, OffsetDateTime::now_utc(), value);
    }

    pub fn record_at(&mut self, topic: &str, at: OffsetDateTime, value: f64) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Sample { at, value });
    }

    pub fn samples(&self, topic: &str) -> &[Sample] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Éviction + moyenne de tous les topics, en un seul passage.
    pub fn aggregate(&mut self, now: OffsetDateTime, window: Duration) -> AggregateRecord {
        let cutoff = now - window;
        let mut averages = BTreeMap::new();

        self.topics.retain(|topic, samples| {
            // arrivée ~ ordre chronologique : on coupe jusqu'à la dernière entrée périmée
            if let Some(last_stale) = samples.iter().rposition(|s| s.at < cutoff) {
                samples.drain(..=last_stale);
            }
            if samples.is_empty() {
                return false;
            }
            let sum: f64 = samples.iter().map(|s| s.value).sum();
            averages.insert(topic.clone(), sum / samples.len() as f64);
            true
        });

        AggregateRecord::new(averages, now)
    }
}
