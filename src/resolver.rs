//! Dataset identifier resolution.
//!
//! The portal publishes a configuration manifest (NMPA_DATA.json) whose
//! structure changes without notice. Rather than chase its schema, we
//! search the whole tree for a node whose display name mentions the
//! dataset keyword and grab the first plausible identifier next to it.
//! When that fails, a locally shipped table of previously captured
//! identifiers takes over.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CrawlError;
use crate::models::{DatasetDescriptor, DatasetKind};

/// Keys that may carry a dataset's display name, in priority order.
const NAME_KEYS: &[&str] = &["name", "dbName", "title", "itemName", "label", "cnName"];

/// Keys that may carry the identifier, in priority order.
const ID_KEYS: &[&str] = &["itemId", "id", "nmpaItem", "value", "dbId"];

/// Identifiers are long opaque tokens; anything this short is a false
/// positive (ordinal ids, enum values).
const MIN_ID_LEN: usize = 16;

/// Search `tree` for the identifier of the dataset whose name contains
/// `keyword`. Returns an empty string when nothing matches.
///
/// Pre-order depth-first, first match wins; scalar leaves are ignored.
pub fn resolve(tree: &Value, keyword: &str) -> String {
    match tree {
        Value::Object(map) => {
            let name = NAME_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str));

            if name.is_some_and(|n| n.contains(keyword)) {
                for key in ID_KEYS {
                    if let Some(id) = map.get(*key).and_then(Value::as_str) {
                        if id.len() > MIN_ID_LEN {
                            return id.to_string();
                        }
                    }
                }
            }

            for value in map.values() {
                let found = resolve(value, keyword);
                if !found.is_empty() {
                    return found;
                }
            }
            String::new()
        }
        Value::Array(items) => {
            for item in items {
                let found = resolve(item, keyword);
                if !found.is_empty() {
                    return found;
                }
            }
            String::new()
        }
        _ => String::new(),
    }
}

/// Pre-captured identifiers used when live manifest resolution fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticItemIds {
    #[serde(default)]
    pub domestic: String,
    #[serde(default)]
    pub imported: String,
}

impl StaticItemIds {
    /// Identifiers captured from the portal while it still served them
    /// openly. They have been stable for years but may rot; the file on
    /// disk overrides these.
    pub fn builtin() -> Self {
        Self {
            domestic: "ff80808183cad75001840881f848179f".to_string(),
            imported: "ff80808183cad7500184088665711800".to_string(),
        }
    }

    /// Load the fallback table from a JSON file, falling back to the
    /// built-in capture when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Ignoring malformed static id file {}: {}", path.display(), e);
                    Self::builtin()
                }
            },
            Err(_) => Self::builtin(),
        }
    }

    pub fn get(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Domestic => &self.domestic,
            DatasetKind::Imported => &self.imported,
        }
    }
}

/// Resolve descriptors for every dataset kind in `kinds`, preferring
/// the live manifest and falling back to the static table per kind.
///
/// A kind that resolves nowhere is a hard error: running a search with
/// an empty item id silently returns nothing, which is worse than
/// failing loudly.
pub fn resolve_descriptors(
    manifest: Option<&Value>,
    kinds: &[DatasetKind],
    fallback: &StaticItemIds,
) -> Result<HashMap<DatasetKind, DatasetDescriptor>, CrawlError> {
    let mut out = HashMap::new();
    for &kind in kinds {
        let mut item_id = manifest
            .map(|tree| resolve(tree, kind.keyword()))
            .unwrap_or_default();

        if item_id.is_empty() {
            item_id = fallback.get(kind).to_string();
            if !item_id.is_empty() {
                debug!("Using static fallback item id for {}", kind);
            }
        }

        if item_id.is_empty() {
            return Err(CrawlError::Resolution(kind.as_str().to_string()));
        }
        out.insert(kind, DatasetDescriptor { kind, item_id });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_manifest_entry() {
        let tree = json!({"list": [{"name": "境内生产药品数据库", "itemId": "1234567890123456789"}]});
        assert_eq!(resolve(&tree, "境内生产药品"), "1234567890123456789");
    }

    #[test]
    fn test_resolve_deeply_nested() {
        let tree = json!({
            "config": {"sections": [
                {"title": "器械", "itemId": "aaaaaaaaaaaaaaaaaaaaa"},
                {"groups": [{"cnName": "境外生产药品库", "dbId": "bbbbbbbbbbbbbbbbbbbbb"}]}
            ]}
        });
        assert_eq!(resolve(&tree, "境外生产药品"), "bbbbbbbbbbbbbbbbbbbbb");
    }

    #[test]
    fn test_resolve_rejects_short_ids() {
        let tree = json!({"name": "境内生产药品", "itemId": "short", "id": "12345678901234567"});
        assert_eq!(resolve(&tree, "境内生产药品"), "12345678901234567");
    }

    #[test]
    fn test_resolve_missing_returns_empty() {
        let tree = json!({"list": [{"name": "医疗器械", "itemId": "1234567890123456789"}]});
        assert_eq!(resolve(&tree, "境内生产药品"), "");
    }

    #[test]
    fn test_resolve_tolerates_scalar_leaves() {
        let tree = json!([1, null, true, "text", {"name": "境内生产药品", "itemId": "1234567890123456789"}]);
        assert_eq!(resolve(&tree, "境内生产药品"), "1234567890123456789");
    }

    #[test]
    fn test_fallback_when_manifest_misses() {
        let fallback = StaticItemIds::builtin();
        let descriptors = resolve_descriptors(
            Some(&json!({})),
            &[DatasetKind::Domestic, DatasetKind::Imported],
            &fallback,
        )
        .unwrap();
        assert_eq!(
            descriptors[&DatasetKind::Domestic].item_id,
            fallback.domestic
        );
        assert_eq!(
            descriptors[&DatasetKind::Imported].item_id,
            fallback.imported
        );
    }

    #[test]
    fn test_resolution_failure_is_fatal() {
        let empty = StaticItemIds::default();
        let result = resolve_descriptors(None, &[DatasetKind::Domestic], &empty);
        assert!(matches!(result, Err(CrawlError::Resolution(_))));
    }

    #[test]
    fn test_manifest_wins_over_fallback() {
        let manifest = json!({"name": "境内生产药品", "itemId": "live_id_12345678901234567890"});
        let descriptors = resolve_descriptors(
            Some(&manifest),
            &[DatasetKind::Domestic],
            &StaticItemIds::builtin(),
        )
        .unwrap();
        assert_eq!(
            descriptors[&DatasetKind::Domestic].item_id,
            "live_id_12345678901234567890"
        );
    }
}
