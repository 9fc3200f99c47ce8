//! Point-in-time reconstruction (§4.5): resolves a timestamp to a run id,
//! then asks the index for the set of paths visible as of that run,
//! optionally narrowed to a path or directory pattern. Pure read-side
//! logic — no decryption, no filesystem writes; that is `restore`'s job.

use crate::domain::FileVersion;
use crate::error::Result;
use crate::index::IndexStore;

/// Resolves `at` (seconds since epoch, UTC) to the run whose state is
/// visible at that instant, then returns every non-deleted path's latest
/// version as of that run, lexicographically ordered by path (the index
/// query already orders this way).
///
/// Edge cases per §4.5:
/// - `at` precedes every run: returns `Ok(vec![])`, not an error.
/// - `at` falls between two runs: uses the earlier run's state.
pub fn state_as_of(index: &IndexStore, at: i64) -> Result<Vec<FileVersion>> {
    match index.run_at_or_before(at)? {
        None => Ok(Vec::new()),
        Some(run_id) => index.versions_as_of(run_id),
    }
}

/// Narrows an already-resolved state to paths matching `pattern`: an
/// exact path match, or a directory-prefix match (`pattern` plus a path
/// separator). A pattern that matches nothing yields an empty result,
/// not an error — restoring `--pattern` over a typo'd path should say so
/// plainly rather than fail the whole run.
pub fn filter_by_pattern<'a>(
    versions: &'a [FileVersion],
    pattern: Option<&str>,
) -> Vec<&'a FileVersion> {
    let Some(pattern) = pattern else {
        return versions.iter().collect();
    };
    let prefix = format!("{}/", pattern.trim_end_matches('/'));
    versions
        .iter()
        .filter(|fv| fv.path == pattern || fv.path.starts_with(&prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(path: &str) -> FileVersion {
        FileVersion {
            id: 1,
            run_id: 1,
            path: path.to_string(),
            size: 0,
            mtime: 0,
            mode: 0,
            owner: String::new(),
            group: String::new(),
            hash: Some("h".into()),
            is_symlink: false,
        }
    }

    #[test]
    fn exact_match() {
        let versions = vec![fv("/a/b.txt"), fv("/a/c.txt")];
        let found = filter_by_pattern(&versions, Some("/a/b.txt"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/a/b.txt");
    }

    #[test]
    fn directory_prefix_match() {
        let versions = vec![fv("/a/b.txt"), fv("/ab/c.txt")];
        let found = filter_by_pattern(&versions, Some("/a"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/a/b.txt");
    }

    #[test]
    fn no_pattern_returns_everything() {
        let versions = vec![fv("/a"), fv("/b")];
        assert_eq!(filter_by_pattern(&versions, None).len(), 2);
    }

    #[test]
    fn pattern_matching_nothing_is_empty_not_error() {
        let versions = vec![fv("/a")];
        assert!(filter_by_pattern(&versions, Some("/nonexistent")).is_empty());
    }
}
