use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Element count and express IDs of one row on one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelQuantity {
    #[serde(default)]
    pub count: usize,
    #[serde(default, rename = "expressIds")]
    pub express_ids: Vec<u64>,
}

/// Level name → quantity, in the order the backend emitted them.
///
/// Row selection flattens IDs in this order, so it is kept as a list rather
/// than a sorted map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Levels(Vec<(String, LevelQuantity)>);

impl Levels {
    #[must_use]
    pub fn new(entries: Vec<(String, LevelQuantity)>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn get(&self, level: &str) -> Option<&LevelQuantity> {
        self.0.iter().find(|(name, _)| name == level).map(|(_, q)| q)
    }

    /// Count on `level`, 0 when the row has no entry for it.
    #[must_use]
    pub fn count(&self, level: &str) -> usize {
        self.get(level).map_or(0, |q| q.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LevelQuantity)> {
        self.0.iter().map(|(name, q)| (name.as_str(), q))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Levels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, quantity) in &self.0 {
            map.serialize_entry(name, quantity)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Levels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelsVisitor;

        impl<'de> Visitor<'de> for LevelsVisitor {
            type Value = Levels;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of level name to {count, expressIds}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Levels, A::Error> {
                let mut entries: Vec<(String, LevelQuantity)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, quantity)) = access.next_entry::<String, LevelQuantity>()? {
                    match entries.iter_mut().find(|(n, _)| *n == name) {
                        Some(entry) => entry.1 = quantity,
                        None => entries.push((name, quantity)),
                    }
                }
                Ok(Levels(entries))
            }
        }

        deserializer.deserialize_map(LevelsVisitor)
    }
}

/// One aggregated row of the quantity table (one element type).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityRow {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub total: u64,
    /// m³
    #[serde(default)]
    pub volume: f64,
    /// m
    #[serde(default)]
    pub length: f64,
    /// m²
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub levels: Levels,
}

impl QuantityRow {
    /// All express IDs of this row, level by level.
    pub fn express_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.levels
            .iter()
            .flat_map(|(_, q)| q.express_ids.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityMetadata {
    #[serde(default)]
    pub all_levels: Vec<String>,
    #[serde(default)]
    pub total_processed_elements: Option<u64>,
    #[serde(default)]
    pub total_aggregated_groups: Option<u64>,
    #[serde(default)]
    pub ifc_schema: Option<String>,
    #[serde(default)]
    pub extraction_timestamp: Option<String>,
}

/// Quantity rows plus metadata, as produced by the backend aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityData {
    #[serde(default)]
    pub data: Vec<QuantityRow>,
    #[serde(default)]
    pub metadata: QuantityMetadata,
}

impl QuantityData {
    /// Level column order: `all_levels` when the backend sent it, otherwise
    /// the order in which levels first appear across rows.
    #[must_use]
    pub fn level_names(&self) -> Vec<String> {
        if !self.metadata.all_levels.is_empty() {
            return self.metadata.all_levels.clone();
        }

        let mut names: Vec<String> = Vec::new();
        for name in self.data.iter().flat_map(|row| row.levels.names()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}
