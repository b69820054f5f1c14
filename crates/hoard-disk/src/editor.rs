//! Editor and snapshot handles
//!
//! An `Editor` is the exclusive write handle for one entry: it stages bytes
//! into dirty files and finishes with exactly one of `commit` or `abort`.
//! Dropping an unfinished editor aborts it, so every control-flow exit keeps
//! the pairing contract.
//!
//! A `Snapshot` is an immutable capture of an entry's published files. The
//! file handles were opened under the cache lock, so reads keep working even
//! if eviction deletes the paths while the snapshot is alive.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Shared;
use crate::error::{CacheError, CacheResult};

/// Exclusive write handle for one entry.
///
/// The editor carries its key and an ownership token; all mutation goes
/// through the cache's lock, which re-resolves the entry by key. The cache
/// can therefore revoke an editor (on `close`) without reaching into it.
pub struct Editor {
    shared: Arc<Shared>,
    key: String,
    token: u64,
    /// Per-index write tracking; present only when the entry was new at
    /// edit start. A first commit must have written every index.
    written: Option<Vec<bool>>,
    finished: bool,
}

impl Editor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        key: String,
        token: u64,
        written: Option<Vec<bool>>,
    ) -> Self {
        Self { shared, key, token, written, finished: false }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the dirty file for `index`, for callers that stage bytes
    /// through their own I/O. Marks the index as written.
    pub fn dirty_file(&mut self, index: usize) -> CacheResult<PathBuf> {
        self.ensure_active()?;
        let path = self.shared.dirty_file_for_editor(&self.key, self.token, index)?;
        self.mark_written(index);
        Ok(path)
    }

    /// Open a write handle on the dirty file for `index`. Whether it
    /// truncates or appends follows the cache's `append_to_dirty` knob.
    pub fn writer(&mut self, index: usize) -> CacheResult<File> {
        self.ensure_active()?;
        let file = self.shared.open_dirty_writer(&self.key, self.token, index)?;
        self.mark_written(index);
        Ok(file)
    }

    /// Stage a string value for `index`.
    pub fn set(&mut self, index: usize, value: &str) -> CacheResult<()> {
        let mut writer = self.writer(index)?;
        writer.write_all(value.as_bytes()).map_err(CacheError::from)
    }

    /// Bytes of the last committed value for `index`, or `None` if this
    /// entry has never been published.
    pub fn committed_bytes(&self, index: usize) -> CacheResult<Option<Vec<u8>>> {
        if self.finished {
            return Err(CacheError::EditorFinished);
        }
        self.shared.read_committed(&self.key, self.token, index)
    }

    /// String form of [`Editor::committed_bytes`].
    pub fn committed_string(&self, index: usize) -> CacheResult<Option<String>> {
        match self.committed_bytes(index)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| invalid_utf8()),
            None => Ok(None),
        }
    }

    /// Publish the staged values: rename every written dirty file over its
    /// clean file and log `CLEAN`.
    pub fn commit(&mut self) -> CacheResult<()> {
        self.ensure_active()?;
        self.finished = true;
        Shared::complete_edit(&self.shared, &self.key, self.token, self.written.as_deref(), true)
    }

    /// Discard the staged values and restore the entry's prior state.
    pub fn abort(&mut self) -> CacheResult<()> {
        self.ensure_active()?;
        self.finished = true;
        Shared::complete_edit(&self.shared, &self.key, self.token, self.written.as_deref(), false)
    }

    /// Abort if neither `commit` nor `abort` ran yet. Safe to call any
    /// number of times; this is the drop hook's terminator.
    pub fn abort_unless_committed(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = Shared::complete_edit(
                &self.shared,
                &self.key,
                self.token,
                self.written.as_deref(),
                false,
            );
        }
    }

    fn ensure_active(&self) -> CacheResult<()> {
        if self.finished {
            Err(CacheError::EditorFinished)
        } else {
            Ok(())
        }
    }

    fn mark_written(&mut self, index: usize) {
        if let Some(written) = &mut self.written {
            if index < written.len() {
                written[index] = true;
            }
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.abort_unless_committed();
    }
}

/// Immutable capture of one entry's published files and lengths, stamped
/// with the sequence number current at read time.
pub struct Snapshot {
    shared: Arc<Shared>,
    key: String,
    sequence: u64,
    files: Vec<File>,
    lengths: Vec<u64>,
}

impl Snapshot {
    pub(crate) fn new(
        shared: Arc<Shared>,
        key: String,
        sequence: u64,
        files: Vec<File>,
        lengths: Vec<u64>,
    ) -> Self {
        Self { shared, key, sequence, files, lengths }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Byte length of value `index` as published.
    ///
    /// # Panics
    /// Panics if `index` is out of range, like slice indexing.
    pub fn length(&self, index: usize) -> u64 {
        self.lengths[index]
    }

    /// Clean-file path for `index` as captured at read time. The path may
    /// already be deleted by eviction; `read` stays valid regardless.
    pub fn path(&self, index: usize) -> PathBuf {
        crate::entry::clean_path(&self.shared.dir, &self.key, index)
    }

    /// Full bytes of value `index`.
    pub fn read(&self, index: usize) -> CacheResult<Vec<u8>> {
        let mut file = &self.files[index];
        file.seek(SeekFrom::Start(0)).map_err(CacheError::from)?;
        let mut bytes = Vec::with_capacity(self.lengths[index] as usize);
        file.read_to_end(&mut bytes).map_err(CacheError::from)?;
        Ok(bytes)
    }

    /// String form of [`Snapshot::read`].
    pub fn read_string(&self, index: usize) -> CacheResult<String> {
        String::from_utf8(self.read(index)?).map_err(|_| invalid_utf8())
    }

    /// Open a new editor for this snapshot's entry, or `None` if the entry
    /// was committed or removed since the snapshot was taken.
    pub fn edit(&self) -> CacheResult<Option<Editor>> {
        Shared::edit_internal(&self.shared, &self.key, Some(self.sequence))
    }
}

fn invalid_utf8() -> CacheError {
    CacheError::Io {
        path: None,
        kind: std::io::ErrorKind::InvalidData,
        message: "value is not valid UTF-8".to_string(),
    }
}
