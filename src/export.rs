//! Record export.
//!
//! Every job always gets a raw JSON-lines archive of the detail
//! documents; the structured canonical fields go to CSV unless the
//! configuration asks for raw output only.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{DatasetKind, Record};

/// UTF-8 byte order mark; spreadsheet tools need it to detect the
/// encoding of CJK CSV files.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Canonical fields as CSV plus the raw JSONL archive.
    #[default]
    Csv,
    /// Raw JSONL archive only.
    RawOnly,
}

/// Files written for one job.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub raw: PathBuf,
    pub csv: Option<PathBuf>,
}

/// Write a job's records under `out_dir` using `basename`.
pub fn export_records(
    records: &[Record],
    out_dir: &Path,
    basename: &str,
    format: ExportFormat,
    kind: DatasetKind,
) -> anyhow::Result<ExportPaths> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;

    let raw_path = out_dir.join(format!("{}.raw.jsonl", basename));
    write_raw_jsonl(records, &raw_path)?;

    let csv_path = match format {
        ExportFormat::Csv => {
            let path = out_dir.join(format!("{}.csv", basename));
            write_csv(records, &path, kind)?;
            Some(path)
        }
        ExportFormat::RawOnly => None,
    };

    info!(
        "Exported {} records to {}",
        records.len(),
        raw_path.display()
    );
    Ok(ExportPaths {
        raw: raw_path,
        csv: csv_path,
    })
}

fn write_raw_jsonl(records: &[Record], path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, &record.raw)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_csv(records: &[Record], path: &Path, kind: DatasetKind) -> anyhow::Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    let columns = kind.canonical_fields();
    writer.write_record(columns)?;
    for record in records {
        let row: Vec<&str> = columns
            .iter()
            .map(|c| record.fields.get(*c).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn record(kind: DatasetKind, cn: &str) -> Record {
        let mut fields: HashMap<String, String> = kind
            .canonical_fields()
            .iter()
            .map(|f| (f.to_string(), String::new()))
            .collect();
        fields.insert("产品名称（中文）".to_string(), cn.to_string());
        Record {
            fields,
            raw: json!({"产品名称": cn}),
        }
    }

    #[test]
    fn test_export_csv_and_raw() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(DatasetKind::Domestic, "阿莫西林"),
            record(DatasetKind::Domestic, "青霉素"),
        ];

        let paths = export_records(
            &records,
            dir.path(),
            "domestic_H2023",
            ExportFormat::Csv,
            DatasetKind::Domestic,
        )
        .unwrap();

        let raw = std::fs::read_to_string(&paths.raw).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["产品名称"], "阿莫西林");

        let csv_bytes = std::fs::read(paths.csv.as_ref().unwrap()).unwrap();
        assert!(csv_bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(csv_bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "产品名称（中文）,产品名称（英文）");
        assert_eq!(lines.next().unwrap(), "阿莫西林,");
    }

    #[test]
    fn test_raw_only_skips_csv() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_records(
            &[record(DatasetKind::Imported, "x")],
            dir.path(),
            "imported_J",
            ExportFormat::RawOnly,
            DatasetKind::Imported,
        )
        .unwrap();
        assert!(paths.csv.is_none());
        assert!(paths.raw.exists());
    }

    #[test]
    fn test_empty_job_still_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_records(
            &[],
            dir.path(),
            "empty",
            ExportFormat::Csv,
            DatasetKind::Domestic,
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&paths.raw).unwrap(), "");
    }
}
