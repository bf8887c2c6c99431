use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Clé réservée à l'horodatage dans le JSON du record
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Résultat d'un cycle : moyenne par topic + horodatage du cycle.
///
/// Sérialisé à plat : `{"sensor/supply": 15.0, "timestamp": 1704888000}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    #[serde(flatten)]
    pub averages: BTreeMap<String, f64>,
    #[serde(with = "time::serde::timestamp")]
    pub timestamp: OffsetDateTime,
}

impl AggregateRecord {
    pub fn new(averages: BTreeMap<String, f64>, timestamp: OffsetDateTime) -> Self {
        Self { averages, timestamp }
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
