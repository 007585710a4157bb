use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One point-in-time measurement from a collector.
///
/// Holds a timestamp (seconds since the Unix epoch) and an ordered list of
/// named metric values. A field that could not be read is `None`, never `0`.
///
/// Serializes as a flat JSON object with `timestamp` first and the fields
/// after it in order; absent fields become `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub timestamp: f64,
    fields: Vec<(String, Option<f64>)>,
}

impl Snapshot {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            fields: Vec::new(),
        }
    }

    /// Creates a snapshot carrying every name in `names`, all absent.
    pub fn with_fields(timestamp: f64, names: &[&str]) -> Self {
        Self {
            timestamp,
            fields: names.iter().map(|n| (n.to_string(), None)).collect(),
        }
    }

    /// Sets `name`, appending it when not yet present.
    ///
    /// Non-finite values are stored as absent.
    pub fn set(&mut self, name: &str, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Value of `name`; `None` when absent or unknown.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Number of fields, present or absent.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields that carry a value.
    pub fn present_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| v.is_some()).count()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = Snapshot;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a flat object with a numeric timestamp and nullable numeric fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Snapshot, A::Error> {
        let mut timestamp = None;
        let mut snapshot = Snapshot::default();
        while let Some(key) = access.next_key::<String>()? {
            if key == "timestamp" {
                if timestamp.is_some() {
                    return Err(de::Error::duplicate_field("timestamp"));
                }
                timestamp = Some(access.next_value::<f64>()?);
            } else {
                let value = access.next_value::<Option<f64>>()?;
                snapshot.set(&key, value);
            }
        }
        snapshot.timestamp = timestamp.ok_or_else(|| de::Error::missing_field("timestamp"))?;
        Ok(snapshot)
    }
}
