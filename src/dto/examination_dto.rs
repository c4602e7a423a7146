use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::services::examination_service::Examination;

/// Requested question count per category, in the order the caller listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quota(Vec<(String, u32)>);

impl Quota {
    pub fn new<K: Into<String>>(entries: impl IntoIterator<Item = (K, u32)>) -> Self {
        let mut quota = Quota::default();
        for (key, count) in entries {
            quota.set(key.into(), count);
        }
        quota
    }

    fn set(&mut self, key: String, count: u32) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = count,
            None => self.0.push((key, count)),
        }
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, count)| u64::from(*count)).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.0.iter().map(|(key, count)| (key.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Quota {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuotaVisitor;

        impl<'de> Visitor<'de> for QuotaVisitor {
            type Value = Quota;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category to non-negative question count")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Quota, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut quota = Quota::default();
                while let Some((key, count)) = map.next_entry::<String, u32>()? {
                    quota.set(key, count);
                }
                Ok(quota)
            }
        }

        deserializer.deserialize_map(QuotaVisitor)
    }
}

impl Serialize for Quota {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaminationRequest {
    #[serde(default)]
    pub question_ids: Vec<i64>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub bloom_levels: Quota,
    #[serde(default)]
    pub question_types: Quota,
}

fn default_title() -> String {
    "New Examination".to_string()
}

#[derive(Debug, Serialize)]
pub struct ExaminationResponse {
    pub success: bool,
    pub examination: Examination,
}
