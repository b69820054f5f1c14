//! Journal protocol: the append-only text log of entry state transitions
//!
//! The journal is a newline-delimited US-ASCII file. The header is exactly
//! five lines:
//!
//! ```text
//! libcore.io.DiskLruCache
//! 1
//! <app_version>
//! <value_count>
//! <blank>
//! ```
//!
//! Body records are space-separated:
//!
//! - `DIRTY <key>` — an editor was opened
//! - `CLEAN <key> <len0> <len1> ...` — an edit committed; one decimal length
//!   per value index
//! - `REMOVE <key>` — entry removed (explicit remove or eviction)
//! - `READ <key>` — entry read (LRU hint at replay)
//!
//! Parse discipline is strict: an unrecognized verb, a malformed length, or
//! a header mismatch makes the journal corrupt. The one tolerated defect is
//! a final unterminated line (a crash mid-append); it is dropped and the
//! caller compacts the journal immediately after replay.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CacheError, CacheResult};
use crate::sync::durable_sync;

/// Active journal file name, relative to the cache directory.
pub(crate) const JOURNAL_FILE: &str = "journal";
/// Transient file used while writing a compacted journal.
pub(crate) const JOURNAL_TMP: &str = "journal.tmp";
/// Transient file used during the compaction rename sequence.
pub(crate) const JOURNAL_BACKUP: &str = "journal.bkp";

const MAGIC: &str = "libcore.io.DiskLruCache";
const VERSION: &str = "1";

/// One journal body record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalRecord {
    Dirty(String),
    Clean(String, Vec<u64>),
    Remove(String),
    Read(String),
}

impl JournalRecord {
    /// Append the encoded record (with trailing newline) to `out`.
    pub(crate) fn encode_into(&self, out: &mut String) {
        match self {
            JournalRecord::Dirty(key) => {
                out.push_str("DIRTY ");
                out.push_str(key);
            }
            JournalRecord::Clean(key, lengths) => {
                out.push_str("CLEAN ");
                out.push_str(key);
                for len in lengths {
                    out.push(' ');
                    out.push_str(&len.to_string());
                }
            }
            JournalRecord::Remove(key) => {
                out.push_str("REMOVE ");
                out.push_str(key);
            }
            JournalRecord::Read(key) => {
                out.push_str("READ ");
                out.push_str(key);
            }
        }
        out.push('\n');
    }

    /// Parse a single body line. `value_count` fixes how many lengths a
    /// CLEAN record must carry. Returns the failure reason on a malformed
    /// line; the caller turns that into a corrupt-journal error.
    pub(crate) fn parse(line: &str, value_count: usize) -> Result<JournalRecord, String> {
        let (verb, rest) = match line.split_once(' ') {
            Some(split) => split,
            None => return Err(format!("record without key: {:?}", line)),
        };

        match verb {
            "DIRTY" => Self::key_only(rest).map(JournalRecord::Dirty),
            "REMOVE" => Self::key_only(rest).map(JournalRecord::Remove),
            "READ" => Self::key_only(rest).map(JournalRecord::Read),
            "CLEAN" => {
                let mut fields = rest.split(' ');
                let key = match fields.next() {
                    Some(key) if !key.is_empty() => key.to_string(),
                    _ => return Err("CLEAN record without key".to_string()),
                };
                let mut lengths = Vec::with_capacity(value_count);
                for field in fields {
                    let len: u64 = field
                        .parse()
                        .map_err(|_| format!("malformed length {:?}", field))?;
                    lengths.push(len);
                }
                if lengths.len() != value_count {
                    return Err(format!(
                        "CLEAN record has {} lengths, expected {}",
                        lengths.len(),
                        value_count
                    ));
                }
                Ok(JournalRecord::Clean(key, lengths))
            }
            _ => Err(format!("unrecognized record {:?}", verb)),
        }
    }

    fn key_only(rest: &str) -> Result<String, String> {
        if rest.is_empty() || rest.contains(' ') {
            Err(format!("malformed key field {:?}", rest))
        } else {
            Ok(rest.to_string())
        }
    }
}

/// Cursor over newline-terminated lines; a trailing fragment with no
/// terminator stays in `rest`.
struct LineCursor<'a> {
    rest: &'a str,
}

impl<'a> LineCursor<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        let newline = self.rest.find('\n')?;
        let (line, tail) = self.rest.split_at(newline);
        self.rest = &tail[1..];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }
}

/// Everything replayed from a journal file.
pub(crate) struct ReplayedJournal {
    pub(crate) records: Vec<JournalRecord>,
    /// True when the file ended in an unterminated line (crash mid-append).
    /// The caller must compact the journal before handing out editors.
    pub(crate) truncated_tail: bool,
}

/// Read and strictly parse a journal file.
///
/// The header must match `app_version` and `value_count` exactly; any
/// mismatch or unparseable body line returns `CorruptJournal` and the caller
/// wipes the directory and starts fresh.
pub(crate) fn read_journal(
    path: &Path,
    app_version: u32,
    value_count: usize,
) -> CacheResult<ReplayedJournal> {
    let corrupt = |reason: String| CacheError::CorruptJournal {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| CacheError::io(path, "failed to read journal", e))?;
    if !bytes.is_ascii() {
        return Err(corrupt("journal is not US-ASCII".to_string()));
    }
    // Safe to interpret: ASCII is valid UTF-8.
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| corrupt(format!("journal is not valid text: {}", e)))?;

    let mut lines = LineCursor { rest: text };

    let expected_header = [
        MAGIC.to_string(),
        VERSION.to_string(),
        app_version.to_string(),
        value_count.to_string(),
        String::new(),
    ];
    for expected in &expected_header {
        match lines.next_line() {
            Some(line) if line == expected.as_str() => {}
            Some(line) => {
                return Err(corrupt(format!(
                    "header line {:?}, expected {:?}",
                    line, expected
                )))
            }
            None => return Err(corrupt("incomplete header".to_string())),
        }
    }

    let mut records = Vec::new();
    let mut truncated_tail = false;
    loop {
        match lines.next_line() {
            Some(line) => {
                let record = JournalRecord::parse(line, value_count).map_err(&corrupt)?;
                records.push(record);
            }
            None => {
                if !lines.rest.is_empty() {
                    // A crash mid-append left a partial final line. Drop it;
                    // the caller compacts so the defect never ages.
                    tracing::warn!(
                        journal = %path.display(),
                        "dropping unterminated journal tail ({} bytes)",
                        lines.rest.len()
                    );
                    truncated_tail = true;
                }
                break;
            }
        }
    }

    Ok(ReplayedJournal { records, truncated_tail })
}

/// Buffered append-only writer over the active journal.
///
/// Flush discipline is the caller's contract: DIRTY records are flushed
/// before the editor is handed out, CLEAN/REMOVE after the filesystem
/// mutation they describe, and READ records are not flushed at all (an LRU
/// hint is tolerable to lose on crash).
pub(crate) struct JournalWriter {
    out: BufWriter<File>,
    path: PathBuf,
}

impl JournalWriter {
    /// Open the existing journal for appending.
    pub(crate) fn append_to(path: &Path) -> CacheResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| CacheError::io(path, "failed to open journal for append", e))?;
        Ok(Self { out: BufWriter::new(file), path: path.to_path_buf() })
    }

    pub(crate) fn append(&mut self, record: &JournalRecord) -> CacheResult<()> {
        let mut line = String::new();
        record.encode_into(&mut line);
        self.out
            .write_all(line.as_bytes())
            .map_err(|e| CacheError::io(&self.path, "journal append failed", e))
    }

    pub(crate) fn flush(&mut self) -> CacheResult<()> {
        self.out
            .flush()
            .map_err(|e| CacheError::io(&self.path, "journal flush failed", e))
    }
}

/// Write a compacted journal to `tmp_path`: header plus exactly one record
/// per live entry. The file is durably synced before returning so the
/// caller's rename sequence can only ever expose a complete journal.
pub(crate) fn write_compacted(
    tmp_path: &Path,
    app_version: u32,
    value_count: usize,
    records: &[JournalRecord],
) -> CacheResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp_path)
        .map_err(|e| CacheError::io(tmp_path, "failed to create compacted journal", e))?;
    let mut out = BufWriter::new(file);

    let mut text = String::new();
    text.push_str(MAGIC);
    text.push('\n');
    text.push_str(VERSION);
    text.push('\n');
    text.push_str(&app_version.to_string());
    text.push('\n');
    text.push_str(&value_count.to_string());
    text.push('\n');
    text.push('\n');
    for record in records {
        record.encode_into(&mut text);
    }

    out.write_all(text.as_bytes())
        .map_err(|e| CacheError::io(tmp_path, "failed to write compacted journal", e))?;
    out.flush()
        .map_err(|e| CacheError::io(tmp_path, "failed to flush compacted journal", e))?;
    durable_sync(out.get_ref())
        .map_err(|e| CacheError::io(tmp_path, "failed to sync compacted journal", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_journal(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(JOURNAL_FILE);
        let text = format!("libcore.io.DiskLruCache\n1\n1\n2\n\n{}", body);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parse_roundtrip() {
        let records = [
            JournalRecord::Dirty("k1".to_string()),
            JournalRecord::Clean("k1".to_string(), vec![10, 0]),
            JournalRecord::Read("k1".to_string()),
            JournalRecord::Remove("k1".to_string()),
        ];

        for record in &records {
            let mut line = String::new();
            record.encode_into(&mut line);
            let parsed = JournalRecord::parse(line.trim_end(), 2).unwrap();
            assert_eq!(&parsed, record);
        }
    }

    #[test]
    fn test_read_journal_body() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "DIRTY abc\nCLEAN abc 3 7\nREAD abc\n");

        let replayed = read_journal(&path, 1, 2).unwrap();
        assert_eq!(replayed.records.len(), 3);
        assert!(!replayed.truncated_tail);
        assert_eq!(
            replayed.records[1],
            JournalRecord::Clean("abc".to_string(), vec![3, 7])
        );
    }

    #[test]
    fn test_truncated_tail_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "CLEAN abc 3 7\nDIRTY ab");

        let replayed = read_journal(&path, 1, 2).unwrap();
        assert_eq!(replayed.records.len(), 1);
        assert!(replayed.truncated_tail);
    }

    #[test]
    fn test_header_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE);
        std::fs::write(&path, "libcore.io.DiskLruCache\n2\n1\n2\n\n").unwrap();

        match read_journal(&path, 1, 2) {
            Err(CacheError::CorruptJournal { .. }) => {}
            other => panic!("expected CorruptJournal, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_wrong_app_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "");
        assert!(matches!(
            read_journal(&path, 9, 2),
            Err(CacheError::CorruptJournal { .. })
        ));
    }

    #[test]
    fn test_unknown_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "SHRINK abc\n");
        assert!(matches!(
            read_journal(&path, 1, 2),
            Err(CacheError::CorruptJournal { .. })
        ));
    }

    #[test]
    fn test_malformed_length_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "CLEAN abc 3 x7\n");
        assert!(matches!(
            read_journal(&path, 1, 2),
            Err(CacheError::CorruptJournal { .. })
        ));
    }

    #[test]
    fn test_wrong_length_count_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = write_journal(&dir, "CLEAN abc 3\n");
        assert!(matches!(
            read_journal(&path, 1, 2),
            Err(CacheError::CorruptJournal { .. })
        ));
    }

    #[test]
    fn test_compacted_journal_replays() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join(JOURNAL_TMP);

        let records = vec![
            JournalRecord::Clean("alpha".to_string(), vec![5]),
            JournalRecord::Dirty("beta".to_string()),
        ];
        write_compacted(&tmp, 3, 1, &records).unwrap();

        let replayed = read_journal(&tmp, 3, 1).unwrap();
        assert_eq!(replayed.records, records);
        assert!(!replayed.truncated_tail);
    }

    #[test]
    fn test_writer_appends() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join(JOURNAL_TMP);
        write_compacted(&tmp, 1, 1, &[]).unwrap();

        let mut writer = JournalWriter::append_to(&tmp).unwrap();
        writer.append(&JournalRecord::Dirty("k".to_string())).unwrap();
        writer.append(&JournalRecord::Clean("k".to_string(), vec![2])).unwrap();
        writer.flush().unwrap();

        let replayed = read_journal(&tmp, 1, 1).unwrap();
        assert_eq!(replayed.records.len(), 2);
    }
}
