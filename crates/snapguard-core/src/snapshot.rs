use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the stable key handed out to each record.
pub const KEY_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Who asked for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Manual,
    Auto,
}

impl Origin {
    fn message_tag(self) -> &'static str {
        match self {
            Origin::Manual => "[Snapshot]",
            Origin::Auto => "[Auto]",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Manual => f.write_str("manual"),
            Origin::Auto => f.write_str("auto"),
        }
    }
}

// ---------------------------------------------------------------------------
// SnapshotRecord
// ---------------------------------------------------------------------------

/// One catalog entry describing a shelved checkpoint.
///
/// `id` is the shelf's positional index as last observed; it shifts whenever
/// an older shelf entry is removed. `key` and `message` do not change and are
/// what the engine resolves through before touching a shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub auto: bool,
}

impl SnapshotRecord {
    /// Build a fresh record for a shelf about to be created at index 0.
    ///
    /// For `Origin::Auto`, `label` is the operation being guarded and the
    /// description is derived from it.
    pub fn new(origin: Origin, label: &str, now: DateTime<Utc>) -> Self {
        // git reports only the first line of a stash message.
        let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
        let timestamp = now.trunc_subsecs(3);
        let key = new_key();
        let description = match origin {
            Origin::Manual => label.clone(),
            Origin::Auto => format!("Auto snapshot: {label}"),
        };
        let message = format!(
            "{} {} - {} #{}",
            origin.message_tag(),
            label,
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            key
        );
        Self {
            id: "0".to_string(),
            key: Some(key),
            description,
            timestamp,
            message,
            auto: origin == Origin::Auto,
        }
    }

    pub fn origin(&self) -> Origin {
        if self.auto {
            Origin::Auto
        } else {
            Origin::Manual
        }
    }

    /// Stored positional index, if it parses.
    pub fn index(&self) -> Option<usize> {
        self.id.parse().ok()
    }

    pub fn key_matches(&self, prefix: &str) -> bool {
        !prefix.is_empty()
            && self
                .key
                .as_deref()
                .is_some_and(|k| k.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Short random key; collisions only matter within one catalog.
pub fn new_key() -> String {
    let mut key = uuid::Uuid::new_v4().simple().to_string();
    key.truncate(KEY_LEN);
    key
}

// ---------------------------------------------------------------------------
// Catalog operations
// ---------------------------------------------------------------------------

/// Insert `record` at the head, keeping the catalog newest-first.
pub fn insert_newest(catalog: &mut Vec<SnapshotRecord>, record: SnapshotRecord) {
    catalog.insert(0, record);
    if !is_newest_first(catalog) {
        // Clock went backwards; stable sort keeps equal timestamps in place.
        catalog.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

pub fn is_newest_first(catalog: &[SnapshotRecord]) -> bool {
    catalog.windows(2).all(|w| w[0].timestamp >= w[1].timestamp)
}

/// Drop automatic records beyond the newest `max`. Manual records stay.
/// Returns the evicted records, oldest last.
pub fn evict_auto(catalog: &mut Vec<SnapshotRecord>, max: usize) -> Vec<SnapshotRecord> {
    let mut seen = 0usize;
    let mut evicted = Vec::new();
    catalog.retain(|r| {
        if !r.auto {
            return true;
        }
        seen += 1;
        if seen <= max {
            true
        } else {
            evicted.push(r.clone());
            false
        }
    });
    evicted
}

/// Remove the record carrying `message`. Returns it if present.
pub fn remove_by_message(
    catalog: &mut Vec<SnapshotRecord>,
    message: &str,
) -> Option<SnapshotRecord> {
    let pos = catalog.iter().position(|r| r.message == message)?;
    Some(catalog.remove(pos))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(origin: Origin, label: &str, minutes_ago: i64) -> SnapshotRecord {
        SnapshotRecord::new(origin, label, Utc::now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn manual_record_message_embeds_description_and_key() {
        let r = record(Origin::Manual, "pre-refactor", 0);
        let key = r.key.clone().unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(r.id, "0");
        assert!(!r.auto);
        assert_eq!(r.description, "pre-refactor");
        assert!(r.message.starts_with("[Snapshot] pre-refactor - "));
        assert!(r.message.ends_with(&format!("#{key}")));
    }

    #[test]
    fn auto_record_derives_description() {
        let r = record(Origin::Auto, "edit src/lib.rs", 0);
        assert!(r.auto);
        assert_eq!(r.origin(), Origin::Auto);
        assert_eq!(r.description, "Auto snapshot: edit src/lib.rs");
        assert!(r.message.starts_with("[Auto] edit src/lib.rs - "));
    }

    #[test]
    fn multiline_label_is_flattened() {
        let r = record(Origin::Manual, "before\n  big   refactor", 0);
        assert_eq!(r.description, "before big refactor");
        assert!(!r.message.contains('\n'));
    }

    #[test]
    fn timestamp_in_message_matches_record() {
        let r = record(Origin::Manual, "x", 0);
        let ts = r.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        assert!(r.message.contains(&ts));
    }

    #[test]
    fn legacy_record_without_key_or_auto_parses() {
        let json = r#"{
            "id": "2",
            "description": "手动备份",
            "timestamp": "2024-05-01T10:00:00.000Z",
            "message": "[Snapshot] 手动备份 - 2024-05-01T10:00:00.000Z"
        }"#;
        let r: SnapshotRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.index(), Some(2));
        assert!(r.key.is_none());
        assert!(!r.auto);
        assert!(!r.key_matches("ab"));
    }

    #[test]
    fn key_prefix_matching_is_case_insensitive() {
        let mut r = record(Origin::Manual, "x", 0);
        r.key = Some("a1b2c3d4".to_string());
        assert!(r.key_matches("a1b2"));
        assert!(r.key_matches("A1B2"));
        assert!(!r.key_matches("b2"));
        assert!(!r.key_matches(""));
    }

    #[test]
    fn insert_newest_keeps_order_when_clock_goes_backwards() {
        let mut catalog = vec![record(Origin::Manual, "newer", 1)];
        insert_newest(&mut catalog, record(Origin::Manual, "older", 10));
        assert!(is_newest_first(&catalog));
        assert_eq!(catalog[0].description, "newer");
        assert_eq!(catalog[1].description, "older");
    }

    #[test]
    fn evict_auto_keeps_manual_and_newest_auto() {
        let mut catalog = Vec::new();
        insert_newest(&mut catalog, record(Origin::Manual, "manual-old", 100));
        for i in (0..12).rev() {
            insert_newest(&mut catalog, record(Origin::Auto, &format!("op{i}"), i));
        }
        let evicted = evict_auto(&mut catalog, 10);
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].description, "Auto snapshot: op10");
        assert_eq!(evicted[1].description, "Auto snapshot: op11");
        assert_eq!(catalog.iter().filter(|r| r.auto).count(), 10);
        assert!(catalog.iter().any(|r| r.description == "manual-old"));
    }

    #[test]
    fn remove_by_message_removes_exactly_one() {
        let a = record(Origin::Manual, "a", 2);
        let b = record(Origin::Manual, "b", 1);
        let mut catalog = vec![b.clone(), a.clone()];
        let removed = remove_by_message(&mut catalog, &a.message).unwrap();
        assert_eq!(removed, a);
        assert_eq!(catalog, vec![b]);
        assert!(remove_by_message(&mut catalog, "missing").is_none());
    }
}
