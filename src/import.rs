//! Import of receipt documents exported as JSON
//!
//! Walks a directory for `*.json` files. Each file holds one receipt
//! document or an array of them, keyed the way the document store keeps
//! them (`name`, `DMP`, `H3PO4`, `COLOR`, `yellow`, `blue`, `Litre`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ReceiptError, Result};
use crate::models::{Chemical, ChemicalFields, ReceiptDraft};
use crate::store::ReceiptStore;

/// A quantity as exported: text, a bare number, or absent
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum ExportedValue {
    Text(String),
    Number(f64),
    #[default]
    Missing,
}

impl ExportedValue {
    fn into_text(self) -> String {
        match self {
            ExportedValue::Text(s) => s,
            ExportedValue::Number(n) => n.to_string(),
            ExportedValue::Missing => String::new(),
        }
    }
}

/// One exported receipt. Stored `kilos` is ignored and recomputed.
#[derive(Debug, Deserialize)]
struct ReceiptDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "DMP", default)]
    dmp: ExportedValue,
    #[serde(rename = "H3PO4", default)]
    h3po4: ExportedValue,
    #[serde(rename = "COLOR", default)]
    color: ExportedValue,
    #[serde(default)]
    yellow: ExportedValue,
    #[serde(default)]
    blue: ExportedValue,
    #[serde(rename = "Litre", alias = "litre", default)]
    litre: ExportedValue,
}

impl ReceiptDocument {
    fn into_draft(self) -> (Option<String>, ReceiptDraft) {
        let mut chemicals = ChemicalFields::default();
        chemicals.set(Chemical::Dmp, self.dmp.into_text());
        chemicals.set(Chemical::H3po4, self.h3po4.into_text());
        chemicals.set(Chemical::Color, self.color.into_text());
        chemicals.set(Chemical::Yellow, self.yellow.into_text());
        chemicals.set(Chemical::Blue, self.blue.into_text());

        let draft = ReceiptDraft {
            name: self.name.trim().to_string(),
            chemicals,
            litre: self.litre.into_text(),
        };
        (self.id.filter(|id| !id.trim().is_empty()), draft)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Many(Vec<ReceiptDocument>),
    One(ReceiptDocument),
}

/// Find all JSON files below `dir`, sorted by path
pub fn find_export_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ReceiptError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();
    files.sort();
    Ok(files)
}

fn parse_export_file(path: &Path) -> Result<Vec<ReceiptDocument>> {
    let content = fs::read_to_string(path)?;
    let file: ExportFile = serde_json::from_str(&content).map_err(|source| ReceiptError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(match file {
        ExportFile::Many(docs) => docs,
        ExportFile::One(doc) => vec![doc],
    })
}

/// Import every exported receipt below `dir` into `store`.
///
/// Documents carrying an id overwrite the receipt with that id; the rest
/// are created fresh. Files that fail to parse are counted and skipped.
pub fn import_directory(store: &impl ReceiptStore, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    let files = find_export_files(dir)?;
    info!(dir = %dir.display(), files = files.len(), "importing receipts");

    for path in &files {
        stats.files += 1;
        let documents = match parse_export_file(path) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping export file");
                stats.errors += 1;
                continue;
            }
        };

        for document in documents {
            let (id, draft) = document.into_draft();
            if draft.name.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let receipt = match id {
                Some(id) => store.put(&id, &draft)?,
                None => store.create(&draft)?,
            };
            debug!(id = %receipt.id, name = %receipt.name, kilos = receipt.kilos, "imported");
            stats.receipts += 1;
        }
    }

    Ok(stats)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub receipts: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} receipts from {} files. Skipped: {}, Errors: {}",
            self.receipts, self.files, self.skipped, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_text_both_become_text() {
        let doc: ReceiptDocument = serde_json::from_str(
            r#"{"name": " Batch 7 ", "DMP": 10, "H3PO4": "20.5", "blue": null, "kilos": 99, "Litre": "4"}"#,
        )
        .unwrap();
        let (id, draft) = doc.into_draft();

        assert_eq!(id, None);
        assert_eq!(draft.name, "Batch 7");
        assert_eq!(draft.chemicals.dmp, "10");
        assert_eq!(draft.chemicals.h3po4, "20.5");
        assert_eq!(draft.chemicals.color, "");
        assert_eq!(draft.chemicals.blue, "");
        assert_eq!(draft.litre, "4");
    }

    #[test]
    fn export_file_accepts_single_document_or_array() {
        let one: ExportFile = serde_json::from_str(r#"{"id": "r1", "name": "A"}"#).unwrap();
        assert!(matches!(one, ExportFile::One(_)));

        let many: ExportFile =
            serde_json::from_str(r#"[{"name": "A"}, {"name": "B", "yellow": "3"}]"#).unwrap();
        assert!(matches!(many, ExportFile::Many(ref docs) if docs.len() == 2));
    }
}
