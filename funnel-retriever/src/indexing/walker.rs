//! Corpus file discovery.
//!
//! Walks a root directory and collects the files worth indexing: a fixed
//! skip-set of directory names is pruned before descent, and only files with
//! an allowed extension below the size cap are kept. Dotfiles outside the
//! skip-set are scanned like any other file; VCS ignore rules are not
//! consulted.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};

/// Directory names pruned before descent.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".env",
    "dist",
    "build",
    "target",
    ".idea",
    ".vscode",
];

/// File extensions eligible for indexing (case-sensitive).
pub const INDEXED_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "js", "json", "html", "css", "ts", "go", "rs", "java", "c", "h",
];

/// Files larger than this are skipped.
pub const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

/// Recursively collect indexable files under `root`.
///
/// The result is sorted so batch formation downstream is deterministic;
/// callers must not read meaning into the order beyond that. Unreadable
/// entries are skipped with a warning.
pub fn scan_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .follow_links(false)
        .filter_entry(|entry| {
            // Depth zero is the root the caller asked for; never prune it,
            // even when its name matches the skip-set.
            if entry.depth() == 0 {
                return true;
            }
            if !entry.file_type().is_some_and(|ty| ty.is_dir()) {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .is_none_or(|name| !SKIP_DIRS.contains(&name))
        })
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ty| ty.is_file()) {
            continue;
        }
        let path = entry.path();
        if !has_indexed_extension(path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() > MAX_FILE_SIZE_BYTES => {
                debug!(path = %path.display(), size = meta.len(), "skipping oversized file");
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file without readable metadata");
                continue;
            }
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    files
}

fn has_indexed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| INDEXED_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn collects_allowed_extensions_and_prunes_skip_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.txt"), "a");
        touch(&root.join("b.md"), "b");
        touch(&root.join("sub/c.rs"), "c");
        touch(&root.join("image.png"), "binary");
        touch(&root.join("README"), "no extension");
        touch(&root.join("UPPER.TXT"), "wrong case");
        touch(&root.join("node_modules/dep.js"), "skipped");
        touch(&root.join(".git/config.txt"), "skipped");
        touch(&root.join("__pycache__/mod.py"), "skipped");

        let files = scan_files(root);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "sub/c.rs"]);
    }

    #[test]
    fn hidden_files_outside_skip_set_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".hidden.txt"), "still text");
        touch(&root.join(".notes/todo.md"), "hidden dir, not in skip-set");

        let files = scan_files(root);
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with(".hidden.txt")));
        assert!(files.iter().any(|p| p.ends_with(".notes/todo.md")));
    }

    #[test]
    fn root_named_like_a_skip_dir_is_still_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        touch(&root.join("a.txt"), "a");

        let files = scan_files(&root);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("small.txt"), "tiny");
        fs::write(
            root.join("big.txt"),
            vec![b'x'; (MAX_FILE_SIZE_BYTES + 1) as usize],
        )
        .unwrap();

        let files = scan_files(root);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.txt"));
    }

    #[test]
    fn output_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("z.txt"), "z");
        touch(&root.join("a.txt"), "a");
        touch(&root.join("m/n.txt"), "n");

        let files = scan_files(root);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }
}
