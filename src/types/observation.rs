//! Sensor readings and the composite key addressing per-sensor state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Composite (machine, sensor type) key addressing one history buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorKey {
    pub machine_id: String,
    pub sensor_type: String,
}

impl SensorKey {
    pub fn new(machine_id: impl Into<String>, sensor_type: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            sensor_type: sensor_type.into(),
        }
    }
}

impl std::fmt::Display for SensorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.machine_id, self.sensor_type)
    }
}

/// One scalar reading submitted by the ingestion side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Machine identifier; integer ids in JSON are accepted and stringified
    #[serde(deserialize_with = "deserialize_machine_id")]
    pub machine_id: String,
    pub sensor_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn new(machine_id: impl Into<String>, sensor_type: impl Into<String>, value: f64) -> Self {
        Self {
            machine_id: machine_id.into(),
            sensor_type: sensor_type.into(),
            value,
            timestamp: None,
        }
    }

    /// Attach a reading timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn key(&self) -> SensorKey {
        SensorKey::new(self.machine_id.as_str(), self.sensor_type.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MachineIdRepr {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

fn deserialize_machine_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match MachineIdRepr::deserialize(deserializer)? {
        MachineIdRepr::Text(s) => s,
        MachineIdRepr::Signed(n) => n.to_string(),
        MachineIdRepr::Unsigned(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(SensorKey::new("machine-001", "temperature").to_string(), "machine-001:temperature");
    }

    #[test]
    fn test_integer_machine_id_is_stringified() {
        let obs: Observation =
            serde_json::from_str(r#"{"machine_id": 7, "sensor_type": "pressure", "value": 101.5}"#).unwrap();
        assert_eq!(obs.machine_id, "7");
        assert_eq!(obs.key(), SensorKey::new("7", "pressure"));
        assert!(obs.timestamp.is_none());
    }

    #[test]
    fn test_timestamp_parsed() {
        let obs: Observation = serde_json::from_str(
            r#"{"machine_id": "m1", "sensor_type": "vibration", "value": 0.4, "timestamp": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(obs.timestamp.is_some());
    }
}
