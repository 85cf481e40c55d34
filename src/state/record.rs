//! Records of the durable results collection
//!
//! The JSON layout (`iter`, `url`, `title` / `error`) matches result files
//! written by earlier harvesting runs, so they can be resumed as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document found by the discovery pass
///
/// Written once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    /// Task index under which the item was discovered
    #[serde(rename = "iter")]
    pub sequence_index: u64,

    /// Address the document was fetched from
    #[serde(rename = "url")]
    pub source_url: String,

    #[serde(default)]
    pub title: String,
}

impl DiscoveredItem {
    pub fn new(sequence_index: u64, source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            sequence_index,
            source_url: source_url.into(),
            title: title.into(),
        }
    }

    /// Key of this item in the retrieval checkpoint
    pub fn item_id(&self) -> String {
        self.sequence_index.to_string()
    }

    /// Title to display, falling back to the item id for untitled entries
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            format!("iter_{}", self.sequence_index)
        } else {
            self.title.clone()
        }
    }
}

/// Audit entry for a probe that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub iter: u64,
    pub url: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl FaultRecord {
    pub fn new(iter: u64, url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            iter,
            url: url.into(),
            error: error.into(),
            recorded_at: Some(Utc::now()),
        }
    }
}

/// One entry offered to the result buffer
///
/// `Filtered` marks a document that matched an exclusion rule. It is accepted
/// by the buffer API but never stored, so it has no serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HarvestRecord {
    // Fault is tried first: discovered items have no `error` field
    Fault(FaultRecord),
    Discovered(DiscoveredItem),
    #[serde(skip)]
    Filtered(DiscoveredItem),
}

impl HarvestRecord {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }

    pub fn iter(&self) -> u64 {
        match self {
            Self::Fault(fault) => fault.iter,
            Self::Discovered(item) | Self::Filtered(item) => item.sequence_index,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Fault(fault) => &fault.url,
            Self::Discovered(item) | Self::Filtered(item) => &item.source_url,
        }
    }

    /// Returns the discovered item, if this record is one
    pub fn as_discovered(&self) -> Option<&DiscoveredItem> {
        match self {
            Self::Discovered(item) => Some(item),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_legacy_result_file() {
        let json = r#"[
            {"iter": 3, "url": "https://h.example/display/42", "title": "Atlas 1"},
            {"iter": 4, "url": "https://h.example/display/43", "error": "HTTP 503"},
            {"iter": 5, "url": "https://h.example/display/44"}
        ]"#;

        let records: Vec<HarvestRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            HarvestRecord::Discovered(DiscoveredItem::new(3, "https://h.example/display/42", "Atlas 1"))
        );
        assert!(matches!(&records[1], HarvestRecord::Fault(f) if f.error == "HTTP 503" && f.recorded_at.is_none()));
        assert_eq!(records[2].as_discovered().unwrap().display_title(), "iter_5");
    }

    #[test]
    fn test_discovered_item_serializes_with_short_keys() {
        let record = HarvestRecord::Discovered(DiscoveredItem::new(7, "https://h.example/d/1", "Book"));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"iter": 7, "url": "https://h.example/d/1", "title": "Book"})
        );
    }

    #[test]
    fn test_fault_record_carries_timestamp() {
        let record = HarvestRecord::Fault(FaultRecord::new(9, "https://h.example/d/2", "timeout"));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["error"], "timeout");
        assert!(value.get("recorded_at").is_some());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_filtered_records_cannot_be_serialized() {
        let record = HarvestRecord::Filtered(DiscoveredItem::new(1, "u", "t"));
        assert!(record.is_filtered());
        assert!(serde_json::to_string(&record).is_err());
    }

    #[test]
    fn test_item_id() {
        assert_eq!(DiscoveredItem::new(1234, "u", "t").item_id(), "1234");
    }
}
