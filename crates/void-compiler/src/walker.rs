//! Source file discovery.
//!
//! Walks a folder depth-first and yields regular files, listing the files of
//! each directory before descending into its subdirectories. Within those
//! two groups the order is whatever the filesystem reports, unless sorted
//! order is requested.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Order of entries within one directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkOrder {
    /// Directory listing order
    #[default]
    Listing,

    /// Sorted by file name
    Sorted,
}

/// Lazily enumerate the regular files under `dir`.
///
/// A missing or unreadable directory yields nothing.
pub fn walk(dir: &Path, order: WalkOrder) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by(move |a, b| {
            let files_first = a.file_type().is_dir().cmp(&b.file_type().is_dir());
            match order {
                WalkOrder::Listing => files_first,
                WalkOrder::Sorted => files_first.then_with(|| a.file_name().cmp(b.file_name())),
            }
        })
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}
