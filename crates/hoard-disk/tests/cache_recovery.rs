//! Integration tests: cache lifecycle across process "restarts".
//!
//! A restart is simulated by dropping (or deliberately leaking) one cache
//! instance and opening a fresh one over the same directory. Crashes are
//! simulated by leaking editors so no abort runs, and by mutilating the
//! journal files the way an interrupted rename sequence would.

use std::fs;

use tempfile::TempDir;

use hoard_disk::{CacheConfig, DiskCache};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> CacheConfig {
    CacheConfig::new(1, 1, 5120)
}

fn put(cache: &DiskCache, key: &str, value: &str) {
    let mut editor = cache.edit(key).unwrap().expect("editor available");
    editor.set(0, value).unwrap();
    editor.commit().unwrap();
}

fn value_for(key: &str) -> String {
    (0..10).map(|i| format!("{}.{},", key, i)).collect()
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_write_read_roundtrip_across_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        for i in 1..=10 {
            let key = format!("file{}", i);
            put(&cache, &key, &value_for(&key));
        }
        cache.close().unwrap();
    }

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    for i in 1..=10 {
        let key = format!("file{}", i);
        let snapshot = cache.get(&key).unwrap().expect("entry survived reopen");
        assert_eq!(snapshot.read_string(0).unwrap(), value_for(&key));
    }
}

#[test]
fn test_dirty_entry_swept_on_open() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        let mut editor = cache.edit("dirtyfile").unwrap().unwrap();
        editor.set(0, "never committed").unwrap();
        // Crash: the editor never aborts, the cache never closes.
        std::mem::forget(editor);
    }

    let dirty = dir.path().join("dirtyfile.0.tmp");
    assert!(dirty.exists(), "staged file survives the crash");

    // Default config deletes the dangling dirty file.
    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        assert!(cache.get("dirtyfile").unwrap().is_none());
        assert!(!dirty.exists());
    }
}

#[test]
fn test_dirty_file_preserved_when_configured() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        let mut editor = cache.edit("dirtyfile").unwrap().unwrap();
        editor.set(0, "never committed").unwrap();
        std::mem::forget(editor);
    }

    let mut keep = config();
    keep.delete_dirty_on_open = false;
    let cache = DiskCache::open(dir.path(), keep).unwrap();

    // The staged bytes are preserved for a later edit, but the entry is
    // still unpublished.
    assert!(cache.get("dirtyfile").unwrap().is_none());
    let dirty = dir.path().join("dirtyfile.0.tmp");
    assert_eq!(fs::read(&dirty).unwrap(), b"never committed");
}

#[test]
fn test_append_mode_resumes_preserved_dirty_file() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        let mut editor = cache.edit("resumed").unwrap().unwrap();
        editor.set(0, "first half ").unwrap();
        std::mem::forget(editor);
    }

    let mut resume = config();
    resume.delete_dirty_on_open = false;
    resume.append_to_dirty = true;
    let cache = DiskCache::open(dir.path(), resume).unwrap();

    let mut editor = cache.edit("resumed").unwrap().unwrap();
    editor.set(0, "second half").unwrap();
    editor.commit().unwrap();

    let snapshot = cache.get("resumed").unwrap().unwrap();
    assert_eq!(snapshot.read_string(0).unwrap(), "first half second half");
}

#[test]
fn test_eviction_under_pressure() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 1, 30)).unwrap();

    for i in 1..=10 {
        put(&cache, &format!("entry{}", i), "0123456789");
    }
    cache.flush().unwrap();

    assert!(cache.size() <= 30);
    for i in 8..=10 {
        assert!(
            cache.get(&format!("entry{}", i)).unwrap().is_some(),
            "entry{} should have survived",
            i
        );
    }
    for i in 1..=7 {
        assert!(cache.get(&format!("entry{}", i)).unwrap().is_none());
    }
}

#[test]
fn test_crash_during_compaction_promotes_backup() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "alpha", "aaa");
        put(&cache, "beta", "bbb");
        cache.close().unwrap();
    }

    // Crash window: journal was renamed to journal.bkp but the compacted
    // replacement never landed.
    fs::rename(dir.path().join("journal"), dir.path().join("journal.bkp")).unwrap();

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert_eq!(cache.get("alpha").unwrap().unwrap().read_string(0).unwrap(), "aaa");
    assert_eq!(cache.get("beta").unwrap().unwrap().read_string(0).unwrap(), "bbb");
    assert!(!dir.path().join("journal.bkp").exists());
}

#[test]
fn test_stale_backup_discarded_when_journal_exists() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "alpha", "aaa");
        cache.close().unwrap();
    }

    // Crash window: the compacted journal landed but the backup was never
    // deleted. The backup is stale and must lose.
    fs::write(dir.path().join("journal.bkp"), b"stale garbage").unwrap();

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert!(cache.get("alpha").unwrap().is_some());
    assert!(!dir.path().join("journal.bkp").exists());
}

#[test]
fn test_corrupt_journal_starts_fresh() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "doomed", "value");
        cache.close().unwrap();
    }

    let journal = dir.path().join("journal");
    let mut bytes = fs::read(&journal).unwrap();
    bytes.extend_from_slice(b"BOGUS record here\n");
    fs::write(&journal, bytes).unwrap();

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert!(cache.get("doomed").unwrap().is_none());
    assert!(!dir.path().join("doomed.0").exists());

    // The fresh cache is fully usable.
    put(&cache, "reborn", "value");
    assert!(cache.get("reborn").unwrap().is_some());
}

#[test]
fn test_truncated_journal_tail_recovers() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "kept", "value");
        cache.close().unwrap();
    }

    // Crash mid-append: a partial record with no terminator.
    let journal = dir.path().join("journal");
    let mut bytes = fs::read(&journal).unwrap();
    bytes.extend_from_slice(b"DIRTY half-writ");
    fs::write(&journal, bytes).unwrap();

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert_eq!(cache.get("kept").unwrap().unwrap().read_string(0).unwrap(), "value");

    // Open compacted immediately: the journal replays clean on a second open.
    cache.close().unwrap();
    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert!(cache.get("kept").unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn test_byte_accounting_matches_disk() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path(), config()).unwrap();

    put(&cache, "a", "12345");
    put(&cache, "b", "123456789");
    put(&cache, "c", "1");
    put(&cache, "b", "12"); // shrink on overwrite
    assert!(cache.remove("c").unwrap());
    cache.get("a").unwrap().unwrap();

    let on_disk: u64 = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_str().unwrap();
            !name.starts_with("journal")
        })
        .map(|e| e.metadata().unwrap().len())
        .sum();

    assert_eq!(cache.size(), on_disk);
    assert_eq!(cache.size(), 5 + 2);
}

#[test]
fn test_commit_is_atomic_across_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "k", "old value");

        let mut editor = cache.edit("k").unwrap().unwrap();
        editor.set(0, "new value").unwrap();
        editor.commit().unwrap();
        cache.close().unwrap();
    }
    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        assert_eq!(cache.get("k").unwrap().unwrap().read_string(0).unwrap(), "new value");
        cache.close().unwrap();
    }

    // An aborted edit leaves the committed value untouched across reopen.
    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        let mut editor = cache.edit("k").unwrap().unwrap();
        editor.set(0, "doomed value").unwrap();
        editor.abort().unwrap();
        cache.close().unwrap();
    }
    let cache = DiskCache::open(dir.path(), config()).unwrap();
    assert_eq!(cache.get("k").unwrap().unwrap().read_string(0).unwrap(), "new value");
}

#[test]
fn test_lru_eviction_prefers_recently_read() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 1, 5120)).unwrap();

    put(&cache, "a", "0123456789");
    put(&cache, "b", "0123456789");
    put(&cache, "c", "0123456789");
    cache.get("a").unwrap().unwrap();
    put(&cache, "d", "0123456789");

    // Budget for two entries; the trim runs on flush.
    cache.set_max_size(20);
    cache.flush().unwrap();

    assert!(cache.get("a").unwrap().is_some());
    assert!(cache.get("b").unwrap().is_none());
    assert!(cache.get("c").unwrap().is_none());
    assert!(cache.get("d").unwrap().is_some());

    // The recency ranking survives a reopen via READ records.
    cache.close().unwrap();
    let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 1, 20)).unwrap();
    assert!(cache.get("a").unwrap().is_some());
    assert!(cache.get("d").unwrap().is_some());
}

#[test]
fn test_sequence_stamps_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), config()).unwrap();
        put(&cache, "k", "first");
        cache.close().unwrap();
    }

    let cache = DiskCache::open(dir.path(), config()).unwrap();
    let stale = cache.get("k").unwrap().unwrap();
    put(&cache, "k", "second");

    // A snapshot taken before a post-reopen commit is still detected stale.
    assert!(stale.edit().unwrap().is_none());
    assert!(cache.get("k").unwrap().unwrap().edit().unwrap().is_some());
}

#[test]
fn test_value_count_mismatch_discards_cache() {
    let dir = TempDir::new().unwrap();

    {
        let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 1, 5120)).unwrap();
        put(&cache, "k", "value");
        cache.close().unwrap();
    }

    // Different geometry means the journal header no longer matches.
    let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 2, 5120)).unwrap();
    assert!(cache.get("k").unwrap().is_none());
}

#[test]
fn test_multi_value_entries_roundtrip() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::new(1, 3, 5120);

    {
        let cache = DiskCache::open(dir.path(), config.clone()).unwrap();
        let mut editor = cache.edit("multi").unwrap().unwrap();
        editor.set(0, "zero").unwrap();
        editor.set(1, "one").unwrap();
        editor.set(2, "two").unwrap();
        editor.commit().unwrap();
        cache.close().unwrap();
    }

    let cache = DiskCache::open(dir.path(), config).unwrap();
    let snapshot = cache.get("multi").unwrap().unwrap();
    assert_eq!(snapshot.read_string(0).unwrap(), "zero");
    assert_eq!(snapshot.read_string(1).unwrap(), "one");
    assert_eq!(snapshot.read_string(2).unwrap(), "two");
    assert_eq!(snapshot.length(1), 3);
    assert_eq!(cache.size(), 4 + 3 + 3);
}

#[test]
fn test_partial_update_keeps_untouched_indices() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path(), CacheConfig::new(1, 2, 5120)).unwrap();

    let mut editor = cache.edit("pair").unwrap().unwrap();
    editor.set(0, "left").unwrap();
    editor.set(1, "right").unwrap();
    editor.commit().unwrap();

    // A later edit touching only index 0 keeps index 1's prior value.
    let mut editor = cache.edit("pair").unwrap().unwrap();
    editor.set(0, "LEFT2").unwrap();
    editor.commit().unwrap();

    let snapshot = cache.get("pair").unwrap().unwrap();
    assert_eq!(snapshot.read_string(0).unwrap(), "LEFT2");
    assert_eq!(snapshot.read_string(1).unwrap(), "right");
    assert_eq!(cache.size(), 5 + 5);
}

#[test]
fn test_editor_reads_committed_value() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path(), config()).unwrap();

    // A brand-new entry has nothing committed to read.
    let mut editor = cache.edit("fresh").unwrap().unwrap();
    assert!(editor.committed_string(0).unwrap().is_none());
    editor.set(0, "published").unwrap();
    editor.commit().unwrap();

    let editor = cache.edit("fresh").unwrap().unwrap();
    assert_eq!(editor.committed_string(0).unwrap().as_deref(), Some("published"));
}
