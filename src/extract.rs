//! Canonical field extraction from flattened detail documents.
//!
//! The portal has never labeled its fields consistently; each canonical
//! output field carries an ordered list of label variants observed in
//! the wild. First alias present with a non-empty value wins. Some
//! documents swap the full-width parentheses for ASCII ones, so every
//! alias is retried with `（）` replaced by `()`.

use std::collections::HashMap;

use crate::models::DatasetKind;

pub const PRODUCT_NAME_CN: &str = "产品名称（中文）";
pub const PRODUCT_NAME_EN: &str = "产品名称（英文）";
pub const BRAND_NAME_CN: &str = "商品名（中文）";
pub const BRAND_NAME_EN: &str = "商品名（英文）";

/// Canonical fields for domestically produced drugs.
pub const DOMESTIC_FIELDS: &[&str] = &[PRODUCT_NAME_CN, PRODUCT_NAME_EN];

/// Canonical fields for imported drugs: the domestic set plus brand
/// names.
pub const IMPORTED_FIELDS: &[&str] = &[
    PRODUCT_NAME_CN,
    PRODUCT_NAME_EN,
    BRAND_NAME_CN,
    BRAND_NAME_EN,
];

/// Label variants per canonical field, in priority order.
fn aliases(canonical: &str) -> &'static [&'static str] {
    match canonical {
        PRODUCT_NAME_CN => &[
            "产品名称（中文）",
            "产品名称",
            "通用名称",
            "药品名称",
            "中文名称",
            "中文品名",
        ],
        PRODUCT_NAME_EN => &[
            "产品名称（英文）",
            "英文名称",
            "英文品名",
            "英文通用名称",
            "enProductName",
        ],
        BRAND_NAME_CN => &["商品名（中文）", "商品名", "商品名称（中文）", "中文商品名"],
        BRAND_NAME_EN => &["商品名（英文）", "英文商品名", "商品名称（英文）", "英文商品名"],
        _ => &[],
    }
}

/// Return the first non-empty value among `keys`, trying each alias
/// literally and then with ASCII parentheses. Empty string if nothing
/// matches.
pub fn pick_first(flat: &HashMap<String, String>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(v) = flat.get(*key).filter(|v| !v.is_empty()) {
            return v.clone();
        }
        let ascii = key.replace('（', "(").replace('）', ")");
        if let Some(v) = flat.get(&ascii).filter(|v| !v.is_empty()) {
            return v.clone();
        }
    }
    String::new()
}

/// Extract the canonical fields for `kind` from a flattened document.
///
/// The result always contains exactly the canonical key set for the
/// dataset kind; unmatched fields are empty strings, never absent.
pub fn extract(flat: &HashMap<String, String>, kind: DatasetKind) -> HashMap<String, String> {
    kind.canonical_fields()
        .iter()
        .map(|field| ((*field).to_string(), pick_first(flat, aliases(field))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_alias_priority() {
        let m = flat(&[("通用名称", "青霉素"), ("产品名称", "阿莫西林")]);
        assert_eq!(pick_first(&m, aliases(PRODUCT_NAME_CN)), "阿莫西林");
    }

    #[test]
    fn test_ascii_paren_fallback() {
        // Document uses half-width parens, alias table lists full-width.
        let m = flat(&[("产品名称(中文)", "阿莫西林")]);
        assert_eq!(pick_first(&m, &["产品名称（中文）"]), "阿莫西林");
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let m = flat(&[("产品名称", ""), ("药品名称", "阿莫西林")]);
        assert_eq!(pick_first(&m, aliases(PRODUCT_NAME_CN)), "阿莫西林");
    }

    #[test]
    fn test_no_match_yields_empty_string() {
        let m = flat(&[("无关字段", "x")]);
        assert_eq!(pick_first(&m, aliases(BRAND_NAME_EN)), "");
    }

    #[test]
    fn test_domestic_key_set() {
        let fields = extract(&flat(&[("产品名称", "阿莫西林")]), DatasetKind::Domestic);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[PRODUCT_NAME_CN], "阿莫西林");
        assert_eq!(fields[PRODUCT_NAME_EN], "");
    }

    #[test]
    fn test_imported_always_four_keys() {
        // Regardless of input shape, the imported key set is fixed.
        let fields = extract(&HashMap::new(), DatasetKind::Imported);
        assert_eq!(fields.len(), 4);
        for key in IMPORTED_FIELDS {
            assert_eq!(fields[*key], "");
        }

        let fields = extract(
            &flat(&[("英文商品名", "Amoxil"), ("中文商品名", "安灭菌")]),
            DatasetKind::Imported,
        );
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[BRAND_NAME_EN], "Amoxil");
        assert_eq!(fields[BRAND_NAME_CN], "安灭菌");
    }
}
