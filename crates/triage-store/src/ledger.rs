//! Append-only feedback ledger.
//!
//! One CSV file with header `text,category,priority`. Either correction
//! column may be blank. Rows are never rewritten or deduplicated.

use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arrow::array::{Array, StringArray};
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tracing::{debug, info, warn};
use triage_core::{FeedbackEntry, Tier};

use crate::StoreError;

/// Well-known ledger file name inside the data directory.
pub const FEEDBACK_FILE: &str = "feedback.csv";

fn ledger_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("text", DataType::Utf8, true),
        Field::new("category", DataType::Utf8, true),
        Field::new("priority", DataType::Utf8, true),
    ]))
}

/// Handle to the feedback ledger file.
///
/// Appends are serialized through an internal mutex. Reads take no lock and
/// may run alongside an append; they see whatever complete rows were on disk
/// when the read started.
pub struct FeedbackLedger {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl FeedbackLedger {
    /// Ledger at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Ledger at `<data_dir>/feedback.csv`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(FEEDBACK_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it to disk.
    ///
    /// The row is encoded in memory first and written with a single append.
    /// If an earlier write was cut off mid-row, the new row starts on a fresh
    /// line so the torn tail stays a row of its own.
    pub fn append(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StoreError::Other("ledger append lock poisoned".into()))?;

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let mut encoded = Vec::new();
        if len > 0 && !ends_with_newline(&mut file)? {
            warn!(path = %self.path.display(), "feedback ledger ends mid-row; starting a new line");
            encoded.push(b'\n');
        }

        let batch = entries_to_batch(std::slice::from_ref(entry))?;
        let mut writer = WriterBuilder::new().with_header(len == 0).build(encoded);
        writer.write(&batch)?;
        let encoded = writer.into_inner();

        file.write_all(&encoded)?;
        file.sync_data()?;
        debug!(path = %self.path.display(), "appended feedback entry");
        Ok(())
    }

    /// Every entry on file, in append order.
    ///
    /// A missing file, a zero-byte file and a header-only file all read as
    /// "no feedback". Rows that fail to parse are skipped one at a time with
    /// a warning; the rows around them still count. I/O errors are returned.
    pub fn read_all(&self) -> Result<Vec<FeedbackEntry>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        // First record is the header.
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (idx, record) in split_records(&raw).into_iter().enumerate().skip(1) {
            match decode_record(record) {
                Ok(rows) => entries.extend(rows),
                // An unbalanced quote from a torn row swallows the lines
                // after it; retry those lines one by one.
                Err(_) if record.contains(&b'\n') => {
                    for line in record.split(|&b| b == b'\n').filter(|l| !is_blank(l)) {
                        match decode_record(line) {
                            Ok(rows) => entries.extend(rows),
                            Err(e) => {
                                skipped += 1;
                                warn!(record = idx, error = %e, "skipping malformed feedback row");
                            }
                        }
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(record = idx, error = %e, "skipping malformed feedback row");
                }
            }
        }

        info!(count = entries.len(), skipped, "read feedback ledger");
        Ok(entries)
    }
}

fn ends_with_newline(file: &mut File) -> Result<bool, StoreError> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Split raw CSV into records on newlines outside quotes. Blank records are
/// dropped and a trailing `\r` is stripped.
fn split_records(raw: &[u8]) -> Vec<&[u8]> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, &b) in raw.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                records.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    records.push(&raw[start..]);

    records
        .into_iter()
        .map(|r| r.strip_suffix(b"\r").unwrap_or(r))
        .filter(|r| !is_blank(r))
        .collect()
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn decode_record(record: &[u8]) -> Result<Vec<FeedbackEntry>, StoreError> {
    let reader = ReaderBuilder::new(ledger_schema())
        .with_header(false)
        .build(Cursor::new(record))?;
    let mut entries = Vec::new();
    for batch in reader {
        entries.extend(batch_to_entries(&batch?)?);
    }
    Ok(entries)
}

fn entries_to_batch(entries: &[FeedbackEntry]) -> Result<RecordBatch, StoreError> {
    let text: StringArray = entries.iter().map(|e| Some(e.text.as_str())).collect();
    let category: StringArray = entries
        .iter()
        .map(|e| e.corrected_category.as_deref())
        .collect();
    let priority: StringArray = entries
        .iter()
        .map(|e| e.corrected_priority.map(|t| t.as_str()))
        .collect();

    Ok(RecordBatch::try_new(
        ledger_schema(),
        vec![Arc::new(text), Arc::new(category), Arc::new(priority)],
    )?)
}

fn batch_to_entries(batch: &RecordBatch) -> Result<Vec<FeedbackEntry>, StoreError> {
    let text = string_column(batch, 0)?;
    let category = string_column(batch, 1)?;
    let priority = string_column(batch, 2)?;

    let mut entries = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let Some(text) = cell(text, row) else {
            warn!(row, "skipping feedback row without text");
            continue;
        };
        let corrected_priority = match cell(priority, row) {
            None => None,
            Some(raw) => match raw.parse::<Tier>() {
                Ok(tier) => Some(tier),
                Err(e) => {
                    warn!(row, error = %e, "ignoring unknown priority in feedback row");
                    None
                }
            },
        };
        entries.push(FeedbackEntry::new(
            text,
            cell(category, row).map(str::to_string),
            corrected_priority,
        ));
    }
    Ok(entries)
}

fn string_column(batch: &RecordBatch, idx: usize) -> Result<&StringArray, StoreError> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::Other(format!("ledger column {idx} is not Utf8")))
}

/// Non-blank cell value; null and whitespace-only both read as absent.
fn cell(col: &StringArray, row: usize) -> Option<&str> {
    if col.is_null(row) {
        return None;
    }
    let v = col.value(row).trim();
    (!v.is_empty()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, FeedbackLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = FeedbackLedger::in_dir(dir.path());
        (dir, ledger)
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, ledger) = ledger();
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn zero_byte_file_reads_empty() {
        let (_dir, ledger) = ledger();
        std::fs::write(ledger.path(), "").unwrap();
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn header_only_file_reads_empty() {
        let (_dir, ledger) = ledger();
        std::fs::write(ledger.path(), "text,category,priority\n").unwrap();
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn append_then_read_preserves_order_and_blanks() {
        let (_dir, ledger) = ledger();
        let entries = vec![
            FeedbackEntry::new("pothole near school", Some("Road".into()), None),
            FeedbackEntry::new("sparking wire", None, Some(Tier::Critical)),
            FeedbackEntry::new("dirty, smelly \"tap\" water", Some("Water".into()), Some(Tier::High)),
        ];
        for e in &entries {
            ledger.append(e).unwrap();
        }

        let read = ledger.read_all().unwrap();
        assert_eq!(read, entries);

        // Header written exactly once.
        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw.matches("text,category,priority").count(), 1);
    }

    #[test]
    fn reads_hand_written_rows() {
        let (_dir, ledger) = ledger();
        std::fs::write(
            ledger.path(),
            "text,category,priority\n\
             Loud music all night,Police,\n\
             Tree fell on car,,high\n\
             Odd request,,urgent\n",
        )
        .unwrap();

        let read = ledger.read_all().unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].corrected_category.as_deref(), Some("Police"));
        assert_eq!(read[0].corrected_priority, None);
        assert_eq!(read[1].corrected_category, None);
        assert_eq!(read[1].corrected_priority, Some(Tier::High));
        // Unknown tier is dropped, leaving an entry that corrects nothing.
        assert!(read[2].is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped_individually() {
        let (_dir, ledger) = ledger();
        std::fs::write(
            ledger.path(),
            "text,category,priority\n\
             Broken drain cover,Road,\n\
             a,b,c,d,e\n\
             Tap water brown,Water,high\n",
        )
        .unwrap();

        let read = ledger.read_all().unwrap();
        let texts: Vec<&str> = read.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["Broken drain cover", "Tap water brown"]);
    }

    fn tear(ledger: &FeedbackLedger, bytes: &str) {
        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        file.write_all(bytes.as_bytes()).unwrap();
    }

    #[test]
    fn torn_tail_does_not_corrupt_earlier_or_later_rows() {
        let (_dir, ledger) = ledger();
        ledger
            .append(&FeedbackEntry::new("pothole near school", Some("Road".into()), None))
            .unwrap();
        ledger
            .append(&FeedbackEntry::new("sparking wire", None, Some(Tier::Critical)))
            .unwrap();

        tear(&ledger, "half written ro");
        assert_eq!(ledger.read_all().unwrap().len(), 2);

        let next = FeedbackEntry::new("water leak", Some("Water".into()), None);
        ledger.append(&next).unwrap();

        let read = ledger.read_all().unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].text, "pothole near school");
        assert_eq!(read[1].corrected_priority, Some(Tier::Critical));
        assert_eq!(read[2], next);

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(raw.contains("half written ro\nwater leak,Water,"));
    }

    #[test]
    fn torn_quoted_tail_does_not_swallow_later_rows() {
        let (_dir, ledger) = ledger();
        ledger
            .append(&FeedbackEntry::new("pothole near school", Some("Road".into()), None))
            .unwrap();
        tear(&ledger, "\"dirty, smelly");

        ledger
            .append(&FeedbackEntry::new("water leak", Some("Water".into()), None))
            .unwrap();
        ledger
            .append(&FeedbackEntry::new("dead dog on highway", None, Some(Tier::High)))
            .unwrap();

        let texts: Vec<String> = ledger
            .read_all()
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, ["pothole near school", "water leak", "dead dog on highway"]);
    }

    #[test]
    fn concurrent_appends_are_not_interleaved() {
        let (_dir, ledger) = ledger();
        let ledger = Arc::new(ledger);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        let e = FeedbackEntry::new(format!("entry {i}-{j}"), Some("Road".into()), None);
                        ledger.append(&e).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.read_all().unwrap().len(), 80);
    }
}
