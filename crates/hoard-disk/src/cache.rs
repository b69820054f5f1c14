//! Disk cache engine — journaled, size-bounded, LRU
//!
//! `DiskCache` combines an access-ordered in-memory entry index with an
//! append-only text journal and per-entry value files on disk.
//!
//! **Write ordering (the fundamental contract):**
//!
//! 1. `edit` appends and flushes `DIRTY key` before the editor exists, so a
//!    crash after `edit` leaves an orphan record recovery knows to sweep.
//! 2. `commit`/`abort`/`remove` perform the filesystem mutation (rename or
//!    delete) first, then append and flush their journal record. A crash in
//!    between leaves either the old files and no record (edit lost) or the
//!    new files and the record (edit kept) — never a half-published entry.
//! 3. `get` appends `READ key` without flushing; it is only an LRU hint.
//!
//! All mutable state sits behind one `parking_lot::Mutex` per cache
//! instance. I/O happens inside the lock, trading throughput for a simple
//! invariant story. A single-worker background queue re-checks size and
//! journal redundancy after operations that may have created pressure.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cleanup::CleanupQueue;
use crate::config::CacheConfig;
use crate::editor::{Editor, Snapshot};
use crate::entry::{clean_path, dirty_path, EntryIndex};
use crate::error::{CacheError, CacheResult};
use crate::journal::{
    read_journal, write_compacted, JournalRecord, JournalWriter, JOURNAL_BACKUP, JOURNAL_FILE,
    JOURNAL_TMP,
};

/// Journal compaction floor: rebuilding below this many redundant records is
/// never worth the I/O, no matter how small the cache is.
const REDUNDANT_OP_COMPACT_THRESHOLD: usize = 2000;

/// Hit/miss/eviction counters, readable without the cache lock.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) struct Inner {
    entries: EntryIndex,
    /// `None` once the cache is closed; every public op fails fast after.
    journal: Option<JournalWriter>,
    /// Sum of clean-file lengths across all entries.
    size: u64,
    max_size: u64,
    /// Journal records whose information a later record subsumes.
    redundant_op_count: usize,
    /// Stamp for the next successful commit. Starts at 1 so a never-stamped
    /// entry (sequence 0) can never alias a stamped one across reopen.
    next_sequence: u64,
    next_editor_token: u64,
}

impl Inner {
    fn fresh(max_size: u64) -> Self {
        Self {
            entries: EntryIndex::new(),
            journal: None,
            size: 0,
            max_size,
            redundant_op_count: 0,
            next_sequence: 1,
            next_editor_token: 1,
        }
    }

    fn journal_mut(&mut self) -> CacheResult<&mut JournalWriter> {
        self.journal.as_mut().ok_or(CacheError::Closed)
    }
}

pub(crate) struct Shared {
    pub(crate) dir: PathBuf,
    pub(crate) config: CacheConfig,
    stats: CacheStats,
    cleanup: CleanupQueue,
    cleanup_pending: AtomicBool,
    inner: Mutex<Inner>,
}

/// Journaled on-disk LRU cache. Cheap to clone; clones share one instance.
#[derive(Clone)]
pub struct DiskCache {
    shared: Arc<Shared>,
}

impl DiskCache {
    /// Open or create a cache in `directory`.
    ///
    /// Recovery order: promote or discard a leftover `journal.bkp`, replay
    /// the journal (wiping the directory and starting fresh if it is
    /// corrupt), sweep entries whose edit never completed, and compact
    /// immediately if the journal ended in a truncated line.
    pub fn open(directory: impl AsRef<Path>, config: CacheConfig) -> CacheResult<DiskCache> {
        let dir = directory.as_ref().to_path_buf();
        config.validate().map_err(CacheError::illegal)?;

        fs::create_dir_all(&dir)
            .map_err(|e| CacheError::io(&dir, "failed to create cache directory", e))?;

        // A backup journal means a crash interrupted the compaction rename
        // sequence. The backup is only authoritative when no journal exists.
        let journal_path = dir.join(JOURNAL_FILE);
        let backup_path = dir.join(JOURNAL_BACKUP);
        if backup_path.exists() {
            if journal_path.exists() {
                delete_if_exists(&backup_path)?;
            } else {
                fs::rename(&backup_path, &journal_path)
                    .map_err(|e| CacheError::io(&backup_path, "failed to promote backup journal", e))?;
            }
        }

        let mut inner = Inner::fresh(config.max_size);

        if journal_path.exists() {
            match replay_journal(&dir, &config, &mut inner) {
                Ok(truncated_tail) => {
                    tracing::info!(
                        directory = %dir.display(),
                        entries = inner.entries.len(),
                        size = inner.size,
                        "recovered disk cache"
                    );
                    if truncated_tail {
                        rebuild_journal(&dir, &config, &mut inner)?;
                    } else {
                        inner.journal = Some(JournalWriter::append_to(&journal_path)?);
                    }
                }
                Err(CacheError::CorruptJournal { path, reason }) => {
                    tracing::warn!(
                        journal = %path.display(),
                        reason = %reason,
                        "journal is corrupt; discarding cache contents"
                    );
                    delete_contents(&dir)?;
                    inner = Inner::fresh(config.max_size);
                    rebuild_journal(&dir, &config, &mut inner)?;
                }
                Err(other) => return Err(other),
            }
        } else {
            rebuild_journal(&dir, &config, &mut inner)?;
        }

        Ok(DiskCache {
            shared: Arc::new(Shared {
                dir,
                config,
                stats: CacheStats::new(),
                cleanup: CleanupQueue::new(),
                cleanup_pending: AtomicBool::new(false),
                inner: Mutex::new(inner),
            }),
        })
    }

    /// Snapshot of the entry for `key`, or `None` if the key was never
    /// published (or its files raced an eviction). Value files are opened
    /// under the cache lock, so the returned handles stay readable even if
    /// the entry is evicted while the snapshot is alive.
    pub fn get(&self, key: &str) -> CacheResult<Option<Snapshot>> {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        guard.journal_mut()?;
        validate_key(key)?;
        let inner = &mut *guard;

        let (sequence, lengths) = match inner.entries.get(key) {
            Some(entry) if entry.readable => (entry.sequence, entry.lengths.clone()),
            _ => {
                shared.stats.record_miss();
                return Ok(None);
            }
        };

        let mut files = Vec::with_capacity(shared.config.value_count);
        for index in 0..shared.config.value_count {
            let path = clean_path(&shared.dir, key, index);
            match File::open(&path) {
                Ok(file) => files.push(file),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // A concurrent eviction won the race. The read path never
                    // repairs state; the entry just looks absent.
                    shared.stats.record_miss();
                    return Ok(None);
                }
                Err(e) => return Err(CacheError::io(&path, "failed to open value file", e)),
            }
        }

        inner.entries.touch(key);
        inner.redundant_op_count += 1;
        inner
            .journal
            .as_mut()
            .ok_or(CacheError::Closed)?
            .append(&JournalRecord::Read(key.to_string()))?;
        let compact = journal_rebuild_required(inner);
        drop(guard);

        shared.stats.record_hit();
        if compact {
            Shared::submit_cleanup(shared);
        }
        Ok(Some(Snapshot::new(
            Arc::clone(shared),
            key.to_string(),
            sequence,
            files,
            lengths,
        )))
    }

    /// Open an editor for `key`, or `None` while another edit is in flight.
    pub fn edit(&self, key: &str) -> CacheResult<Option<Editor>> {
        Shared::edit_internal(&self.shared, key, None)
    }

    /// Drop the entry for `key`. Returns false if the key is absent or an
    /// edit is in flight.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        guard.journal_mut()?;
        validate_key(key)?;

        let removed = shared.remove_locked(&mut guard, key)?;
        let compact = journal_rebuild_required(&guard);
        drop(guard);
        if compact {
            Shared::submit_cleanup(shared);
        }
        Ok(removed)
    }

    /// Current byte total across all clean files.
    pub fn size(&self) -> u64 {
        self.shared.inner.lock().size
    }

    pub fn max_size(&self) -> u64 {
        self.shared.inner.lock().max_size
    }

    /// Change the byte budget. Trimming happens on the cleanup worker.
    pub fn set_max_size(&self, max_size: u64) {
        self.shared.inner.lock().max_size = max_size;
        Shared::submit_cleanup(&self.shared);
    }

    /// Trim to the byte budget and force buffered journal records to disk.
    pub fn flush(&self) -> CacheResult<()> {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        guard.journal_mut()?;
        shared.trim_to_size_locked(&mut guard)?;
        guard.journal_mut()?.flush()
    }

    /// Abort in-flight edits, trim, flush, and drop the journal writer.
    /// Every later operation fails with `Closed`. Idempotent.
    pub fn close(&self) -> CacheResult<()> {
        let shared = &self.shared;
        let mut guard = shared.inner.lock();
        if guard.journal.is_none() {
            return Ok(());
        }

        for key in guard.entries.keys_lru() {
            let token = guard.entries.get(&key).and_then(|entry| entry.current_editor);
            if let Some(token) = token {
                shared.complete_edit_locked(&mut guard, &key, token, None, false)?;
            }
        }
        shared.trim_to_size_locked(&mut guard)?;

        if let Some(mut journal) = guard.journal.take() {
            journal.flush()?;
        }
        Ok(())
    }

    /// Close the cache and delete everything it stored.
    pub fn delete(&self) -> CacheResult<()> {
        self.close()?;
        delete_contents(&self.shared.dir)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().journal.is_none()
    }

    pub fn directory(&self) -> &Path {
        &self.shared.dir
    }

    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Shared {
    /// Open an editor, optionally refusing when the entry's sequence no
    /// longer matches `expected_sequence` (the snapshot stale check).
    pub(crate) fn edit_internal(
        this: &Arc<Shared>,
        key: &str,
        expected_sequence: Option<u64>,
    ) -> CacheResult<Option<Editor>> {
        let mut guard = this.inner.lock();
        guard.journal_mut()?;
        validate_key(key)?;
        let inner = &mut *guard;

        if let Some(expected) = expected_sequence {
            match inner.entries.get(key) {
                Some(entry) if entry.sequence == expected => {}
                // The entry was committed or removed since the snapshot.
                _ => return Ok(None),
            }
        }

        let value_count = this.config.value_count;
        let entry = inner.entries.get_or_insert(key, value_count);
        if entry.current_editor.is_some() {
            return Ok(None);
        }

        let token = inner.next_editor_token;
        inner.next_editor_token += 1;
        let entry = inner
            .entries
            .get_mut(key)
            .ok_or_else(|| CacheError::illegal("entry vanished while locked"))?;
        entry.current_editor = Some(token);
        let is_new = !entry.readable;

        // DIRTY must be durable in the journal before any dirty file can be
        // created, or recovery could not tell an orphan from a live edit.
        let journal = inner.journal.as_mut().ok_or(CacheError::Closed)?;
        journal.append(&JournalRecord::Dirty(key.to_string()))?;
        journal.flush()?;

        Ok(Some(Editor::new(
            Arc::clone(this),
            key.to_string(),
            token,
            is_new.then(|| vec![false; value_count]),
        )))
    }

    /// Finish an edit. `written` is the editor's per-index tracking, present
    /// only for entries that were new when the edit began.
    pub(crate) fn complete_edit(
        this: &Arc<Shared>,
        key: &str,
        token: u64,
        written: Option<&[bool]>,
        success: bool,
    ) -> CacheResult<()> {
        let mut guard = this.inner.lock();
        let result = this.complete_edit_locked(&mut guard, key, token, written, success);
        let pressure = guard.size > guard.max_size || journal_rebuild_required(&guard);
        drop(guard);
        if pressure {
            Shared::submit_cleanup(this);
        }
        result
    }

    fn complete_edit_locked(
        &self,
        guard: &mut Inner,
        key: &str,
        token: u64,
        written: Option<&[bool]>,
        mut success: bool,
    ) -> CacheResult<()> {
        let inner = &mut *guard;
        let value_count = self.config.value_count;

        // Ownership is checked before the closed check: an editor the close
        // path already aborted reports EditorFinished, not Closed.
        let entry = match inner.entries.get_mut(key) {
            Some(entry) => entry,
            None => return Err(CacheError::EditorFinished),
        };
        if entry.current_editor != Some(token) {
            return Err(CacheError::EditorFinished);
        }
        let was_readable = entry.readable;

        // A first commit must have staged every value index; otherwise the
        // edit degrades to an abort and the caller gets the index it missed.
        let mut unwritten_index = None;
        if success && !was_readable {
            let written = written.ok_or_else(|| {
                CacheError::illegal("new entry committed without written-slot tracking")
            })?;
            if let Some(index) = written.iter().position(|w| !w) {
                unwritten_index = Some(index);
                success = false;
            } else if (0..value_count).any(|i| !dirty_path(&self.dir, key, i).exists()) {
                // Staged file vanished out from under the editor; publishing
                // would break the readable-entry invariant.
                success = false;
            }
        }

        for index in 0..value_count {
            let dirty = dirty_path(&self.dir, key, index);
            if success {
                if dirty.exists() {
                    let clean = clean_path(&self.dir, key, index);
                    fs::rename(&dirty, &clean)
                        .map_err(|e| CacheError::io(&dirty, "failed to publish value file", e))?;
                    let new_len = fs::metadata(&clean)
                        .map(|m| m.len())
                        .map_err(|e| CacheError::io(&clean, "failed to stat value file", e))?;
                    let old_len = entry.lengths[index];
                    entry.lengths[index] = new_len;
                    inner.size = inner.size - old_len + new_len;
                }
            } else {
                delete_if_exists(&dirty)?;
            }
        }

        inner.redundant_op_count += 1;
        entry.current_editor = None;

        let record = if was_readable || success {
            entry.readable = true;
            if success {
                entry.sequence = inner.next_sequence;
                inner.next_sequence += 1;
            }
            JournalRecord::Clean(key.to_string(), entry.lengths.clone())
        } else {
            JournalRecord::Remove(key.to_string())
        };

        match &record {
            JournalRecord::Clean(..) => {
                if success {
                    inner.entries.touch(key);
                }
            }
            _ => {
                inner.entries.remove(key);
            }
        }
        let journal = inner.journal.as_mut().ok_or(CacheError::Closed)?;
        journal.append(&record)?;
        journal.flush()?;

        if let Some(index) = unwritten_index {
            return Err(CacheError::illegal(format!(
                "newly created entry didn't create value for index {}",
                index
            )));
        }
        Ok(())
    }

    /// Delete `key`'s clean files and log the removal. The caller holds the
    /// lock. Returns false for absent keys and keys being edited.
    fn remove_locked(&self, guard: &mut Inner, key: &str) -> CacheResult<bool> {
        let inner = &mut *guard;
        let lengths = match inner.entries.get(key) {
            Some(entry) if entry.current_editor.is_none() => entry.lengths.clone(),
            _ => return Ok(false),
        };

        for (index, len) in lengths.iter().enumerate() {
            let clean = clean_path(&self.dir, key, index);
            delete_if_exists(&clean)?;
            inner.size -= len;
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.lengths[index] = 0;
            }
        }

        inner.redundant_op_count += 1;
        let journal = inner.journal.as_mut().ok_or(CacheError::Closed)?;
        journal.append(&JournalRecord::Remove(key.to_string()))?;
        journal.flush()?;
        inner.entries.remove(key);
        Ok(true)
    }

    /// Evict from the LRU end until the byte budget holds. Entries being
    /// edited are skipped; the completing edit re-submits cleanup.
    fn trim_to_size_locked(&self, guard: &mut Inner) -> CacheResult<()> {
        while guard.size > guard.max_size {
            let eldest = guard
                .entries
                .eldest_matching(|entry| entry.current_editor.is_none());
            let key = match eldest {
                Some(key) => key,
                None => break,
            };
            if self.remove_locked(guard, &key)? {
                tracing::debug!(key = %key, "evicted LRU entry over byte budget");
                self.stats.record_eviction();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Coalesced submission of the trim/compact job. The flag is cleared by
    /// the job before it runs, so a submission racing a running job still
    /// gets a fresh pass.
    pub(crate) fn submit_cleanup(this: &Arc<Shared>) {
        if this.cleanup_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(this);
        this.cleanup.submit(Box::new(move || {
            let shared = match weak.upgrade() {
                Some(shared) => shared,
                None => return,
            };
            shared.cleanup_pending.store(false, Ordering::Release);
            shared.run_cleanup();
        }));
    }

    fn run_cleanup(&self) {
        let mut guard = self.inner.lock();
        if guard.journal.is_none() {
            return;
        }
        if let Err(e) = self.trim_to_size_locked(&mut guard) {
            tracing::warn!(error = %e, "background trim failed");
        }
        if journal_rebuild_required(&guard) {
            if let Err(e) = rebuild_journal(&self.dir, &self.config, &mut guard) {
                tracing::warn!(error = %e, "journal compaction failed");
            }
        }
    }

    /// Verify the editor still owns its entry and hand back the dirty path
    /// for `index`, creating the cache directory if something removed it.
    pub(crate) fn dirty_file_for_editor(
        &self,
        key: &str,
        token: u64,
        index: usize,
    ) -> CacheResult<PathBuf> {
        let mut guard = self.inner.lock();
        guard.journal_mut()?;
        self.check_editor_locked(&guard, key, token, index)?;
        drop(guard);

        fs::create_dir_all(&self.dir)
            .map_err(|e| CacheError::io(&self.dir, "failed to create cache directory", e))?;
        Ok(dirty_path(&self.dir, key, index))
    }

    /// Open a write handle on the dirty file for `index`, truncating or
    /// appending per `append_to_dirty`.
    pub(crate) fn open_dirty_writer(
        &self,
        key: &str,
        token: u64,
        index: usize,
    ) -> CacheResult<File> {
        let path = self.dirty_file_for_editor(key, token, index)?;
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true);
        if self.config.append_to_dirty {
            options.append(true);
        } else {
            options.truncate(true);
        }
        options
            .open(&path)
            .map_err(|e| CacheError::io(&path, "failed to open dirty file", e))
    }

    /// Read the last committed bytes for `index`, or `None` if the entry was
    /// never published.
    pub(crate) fn read_committed(
        &self,
        key: &str,
        token: u64,
        index: usize,
    ) -> CacheResult<Option<Vec<u8>>> {
        let guard = self.inner.lock();
        if guard.journal.is_none() {
            return Err(CacheError::Closed);
        }
        self.check_editor_locked(&guard, key, token, index)?;
        let readable = guard
            .entries
            .get(key)
            .map(|entry| entry.readable)
            .unwrap_or(false);
        if !readable {
            return Ok(None);
        }
        let path = clean_path(&self.dir, key, index);
        drop(guard);

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, "failed to read value file", e)),
        }
    }

    fn check_editor_locked(
        &self,
        guard: &Inner,
        key: &str,
        token: u64,
        index: usize,
    ) -> CacheResult<()> {
        if index >= self.config.value_count {
            return Err(CacheError::illegal(format!(
                "value index {} out of range (value_count {})",
                index, self.config.value_count
            )));
        }
        match guard.entries.get(key) {
            Some(entry) if entry.current_editor == Some(token) => Ok(()),
            _ => Err(CacheError::EditorFinished),
        }
    }
}

fn journal_rebuild_required(inner: &Inner) -> bool {
    inner.redundant_op_count >= REDUNDANT_OP_COMPACT_THRESHOLD
        && inner.redundant_op_count >= inner.entries.len()
}

/// Replay the journal into `inner` and sweep half-finished edits. Returns
/// whether the journal ended in a truncated line (forcing compaction).
fn replay_journal(dir: &Path, config: &CacheConfig, inner: &mut Inner) -> CacheResult<bool> {
    let path = dir.join(JOURNAL_FILE);
    let replayed = read_journal(&path, config.app_version, config.value_count)?;
    let record_count = replayed.records.len();

    for record in replayed.records {
        match record {
            JournalRecord::Remove(key) => {
                inner.entries.remove(&key);
            }
            JournalRecord::Read(key) => {
                inner.entries.touch(&key);
            }
            JournalRecord::Dirty(key) => {
                let entry = inner.entries.get_or_insert(&key, config.value_count);
                entry.current_editor = Some(crate::entry::REPLAY_EDITOR);
            }
            JournalRecord::Clean(key, lengths) => {
                let entry = inner.entries.get_or_insert(&key, config.value_count);
                entry.readable = true;
                entry.current_editor = None;
                entry.lengths = lengths;
            }
        }
    }
    inner.redundant_op_count = record_count.saturating_sub(inner.entries.len());

    // A stray compaction temp file carries no information.
    delete_if_exists(&dir.join(JOURNAL_TMP))?;

    // Entries whose DIRTY record never met a CLEAN or REMOVE are the debris
    // of an interrupted edit: drop them and their files.
    for key in inner.entries.keys_lru() {
        let pending = inner
            .entries
            .get(&key)
            .map(|entry| entry.current_editor.is_some())
            .unwrap_or(false);
        if pending {
            inner.entries.remove(&key);
            for index in 0..config.value_count {
                delete_if_exists(&clean_path(dir, &key, index))?;
                if config.delete_dirty_on_open {
                    delete_if_exists(&dirty_path(dir, &key, index))?;
                }
            }
            tracing::debug!(key = %key, "swept interrupted edit");
        } else if let Some(entry) = inner.entries.get(&key) {
            inner.size += entry.total_length();
        }
    }

    Ok(replayed.truncated_tail)
}

/// Write a compacted journal and atomically promote it:
/// `journal → journal.bkp`, `journal.tmp → journal`, delete the backup.
/// Open-time recovery inverts whatever prefix of this sequence a crash left.
fn rebuild_journal(dir: &Path, config: &CacheConfig, inner: &mut Inner) -> CacheResult<()> {
    // Drop the live writer before renaming underneath it.
    inner.journal = None;

    let records: Vec<JournalRecord> = inner
        .entries
        .iter_lru()
        .map(|(key, entry)| {
            if entry.current_editor.is_some() {
                JournalRecord::Dirty(key.to_string())
            } else {
                JournalRecord::Clean(key.to_string(), entry.lengths.clone())
            }
        })
        .collect();

    let tmp_path = dir.join(JOURNAL_TMP);
    write_compacted(&tmp_path, config.app_version, config.value_count, &records)?;

    let journal_path = dir.join(JOURNAL_FILE);
    let backup_path = dir.join(JOURNAL_BACKUP);
    if journal_path.exists() {
        fs::rename(&journal_path, &backup_path)
            .map_err(|e| CacheError::io(&journal_path, "failed to back up journal", e))?;
    }
    fs::rename(&tmp_path, &journal_path)
        .map_err(|e| CacheError::io(&tmp_path, "failed to promote compacted journal", e))?;
    delete_if_exists(&backup_path)?;

    inner.journal = Some(JournalWriter::append_to(&journal_path)?);
    inner.redundant_op_count = 0;
    tracing::debug!(entries = inner.entries.len(), "compacted journal");
    Ok(())
}

fn validate_key(key: &str) -> CacheResult<()> {
    let valid = !key.is_empty()
        && key.len() <= 120
        && key
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKey { key: key.to_string() })
    }
}

fn delete_if_exists(path: &Path) -> CacheResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, "failed to delete file", e)),
    }
}

/// Delete everything inside `dir`, leaving the directory itself.
fn delete_contents(dir: &Path) -> CacheResult<()> {
    let entries =
        fs::read_dir(dir).map_err(|e| CacheError::io(dir, "failed to list cache directory", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CacheError::io(dir, "failed to list cache directory", e))?;
        let path = entry.path();
        let result = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| CacheError::io(&path, "failed to delete cache content", e))?;
    }
    Ok(())
}
