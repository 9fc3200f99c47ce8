//! Classifies each scanned path against the index's latest-known state
//! (§4.4). The differ never touches the object store or the index
//! itself — it is pure comparison logic, kept separate so the four-way
//! classification can be tested without any I/O.

use std::collections::BTreeMap;

use crate::domain::{FileVersion, ScanEntry};

#[derive(Debug, PartialEq, Eq)]
pub enum Change<'a> {
    /// Present in scan, absent from latest-known state (or the latest
    /// known state for this path is a `DELETED` marker).
    New(&'a ScanEntry),
    /// Present in both; metadata differs. `rehash` is true when size or
    /// mtime changed and the content must be rehashed to find out whether
    /// the blob changed too.
    Changed { entry: &'a ScanEntry, rehash: bool },
    /// Present in both, metadata identical — no hash recomputation, no
    /// row written.
    Unchanged,
    /// Present in latest-known (non-deleted), absent from scan.
    Deleted,
}

/// Walks the scan and the latest-known state together and classifies
/// every path. `scan` must already be sorted by path (the scanner
/// guarantees this); `latest` is the index's per-path latest version map.
pub fn diff<'a>(
    scan: &'a [ScanEntry],
    latest: &BTreeMap<String, FileVersion>,
) -> Vec<(&'a str, Change<'a>)> {
    let mut out = Vec::with_capacity(scan.len());
    let mut seen = std::collections::HashSet::with_capacity(scan.len());

    for entry in scan {
        seen.insert(entry.path.as_str());
        let change = match latest.get(&entry.path) {
            None => Change::New(entry),
            Some(fv) if fv.is_deleted() => Change::New(entry),
            Some(fv) => classify_existing(entry, fv),
        };
        out.push((entry.path.as_str(), change));
    }

    for (path, fv) in latest {
        if !fv.is_deleted() && !seen.contains(path.as_str()) {
            out.push((path.as_str(), Change::Deleted));
        }
    }

    out
}

fn classify_existing<'a>(entry: &'a ScanEntry, fv: &FileVersion) -> Change<'a> {
    if entry.metadata_eq(fv) {
        return Change::Unchanged;
    }
    // §4.4: size/mtime is the fast path, but any mtime change forces a
    // rehash even if size didn't move, since an editor can rewrite a file
    // in place at the same length.
    let rehash = entry.size != fv.size || entry.mtime != fv.mtime;
    Change::Changed { entry, rehash }
}
