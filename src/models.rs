//! Core data types shared across the crawler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{DOMESTIC_FIELDS, IMPORTED_FIELDS};

/// Which registration database a job targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// 境内生产药品 (domestically produced drugs).
    Domestic,
    /// 境外生产药品 (imported drugs).
    Imported,
}

impl DatasetKind {
    /// Keyword searched for in the portal's dataset manifest.
    pub fn keyword(&self) -> &'static str {
        match self {
            DatasetKind::Domestic => "境内生产药品",
            DatasetKind::Imported => "境外生产药品",
        }
    }

    /// Canonical output fields for this dataset. Every record carries
    /// exactly these keys, each possibly empty.
    pub fn canonical_fields(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Domestic => DOMESTIC_FIELDS,
            DatasetKind::Imported => IMPORTED_FIELDS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Domestic => "domestic",
            DatasetKind::Imported => "imported",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset resolved to its opaque portal identifier.
///
/// Resolved once per run and immutable afterward.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    pub kind: DatasetKind,
    pub item_id: String,
}

/// One acquired registration record.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Canonical field → value. Key set is fixed per dataset kind.
    pub fields: HashMap<String, String>,
    /// The detail document exactly as the portal returned it.
    pub raw: Value,
}

/// One page of search results, consumed immediately by the pagination
/// engine.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub rows: Vec<Value>,
    pub page_count: Option<u64>,
    pub total_count: Option<u64>,
}

impl PageResult {
    /// Pull the row list and page counters out of a search response.
    ///
    /// The portal wraps payloads inconsistently: rows live under
    /// `data.list`, `data.resultList` or `data.rows`, or under the same
    /// keys at the top level when the `data` wrapper is absent.
    pub fn parse(response: &Value) -> PageResult {
        let node = match response.get("data") {
            Some(data) if data.is_object() => data,
            _ => response,
        };

        let rows = ["list", "resultList", "rows"]
            .iter()
            .filter_map(|key| node.get(*key).and_then(Value::as_array))
            .find(|list| !list.is_empty())
            .map(|list| list.to_vec())
            .unwrap_or_default();

        PageResult {
            rows,
            page_count: counter(node, "pageCount"),
            total_count: counter(node, "totalCount"),
        }
    }
}

fn counter(node: &Value, key: &str) -> Option<u64> {
    match node.get(key)? {
        Value::Number(n) => n.as_u64(),
        // Some responses send counters as strings.
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Derive the detail-document identifier for a search row.
///
/// Rows without any recognized identifier field are skipped by the
/// caller.
pub fn row_doc_id(row: &Value) -> Option<String> {
    for key in ["id", "ID", "docId", "dataId"] {
        match row.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_list() {
        let resp = json!({"code": 200, "data": {"list": [{"id": "a"}], "pageCount": 3, "totalCount": 71}});
        let page = PageResult::parse(&resp);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.page_count, Some(3));
        assert_eq!(page.total_count, Some(71));
    }

    #[test]
    fn test_parse_top_level_rows() {
        let resp = json!({"rows": [{"id": "a"}, {"id": "b"}]});
        let page = PageResult::parse(&resp);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.page_count, None);
    }

    #[test]
    fn test_parse_prefers_first_non_empty_key() {
        let resp = json!({"data": {"list": [], "resultList": [{"id": "x"}]}});
        let page = PageResult::parse(&resp);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["id"], "x");
    }

    #[test]
    fn test_parse_no_recognized_keys() {
        let page = PageResult::parse(&json!({"data": {"items": [1, 2]}}));
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_parse_string_counter() {
        let page = PageResult::parse(&json!({"data": {"list": [{}], "pageCount": "5"}}));
        assert_eq!(page.page_count, Some(5));
    }

    #[test]
    fn test_row_doc_id_priority() {
        assert_eq!(
            row_doc_id(&json!({"docId": "d", "id": "a"})),
            Some("a".to_string())
        );
        assert_eq!(row_doc_id(&json!({"ID": "b"})), Some("b".to_string()));
        assert_eq!(row_doc_id(&json!({"dataId": 42})), Some("42".to_string()));
        assert_eq!(row_doc_id(&json!({"name": "no id"})), None);
        assert_eq!(row_doc_id(&json!({"id": ""})), None);
    }

    #[test]
    fn test_canonical_field_counts() {
        assert_eq!(DatasetKind::Domestic.canonical_fields().len(), 2);
        assert_eq!(DatasetKind::Imported.canonical_fields().len(), 4);
    }
}
