use std::path::{Path, PathBuf};

use log::info;

use super::model::Table;
use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// SourceEntry – one file added by the user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Last path segment, used for display and as a lookup key.
    pub short_name: String,
}

impl SourceEntry {
    pub fn new(path: PathBuf) -> Self {
        let short_name = short_name_of(&path);
        Self { path, short_name }
    }
}

fn short_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// SourceRegistry – ordered, de-duplicated set of files
// ---------------------------------------------------------------------------

/// Files added during a session, in the order they were first seen.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the paths not yet present and return the full lists of
    /// paths and short names.
    pub fn add_sources<I, P>(&mut self, paths: I) -> (Vec<PathBuf>, Vec<String>)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let before = self.entries.len();
        for path in paths {
            let path = path.into();
            if !self.contains(&path) {
                self.entries.push(SourceEntry::new(path));
            }
        }
        info!(
            "sources: {} added, {} total",
            self.entries.len() - before,
            self.entries.len()
        );
        (self.paths(), self.short_names())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    pub fn short_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.short_name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a source by full path, falling back to the first entry whose
    /// short name matches.
    pub fn resolve(&self, key: &str) -> Result<&SourceEntry> {
        self.entries
            .iter()
            .find(|e| e.path == Path::new(key))
            .or_else(|| self.entries.iter().find(|e| e.short_name == key))
            .ok_or_else(|| CoreError::UnknownSource(key.to_string()))
    }

    /// Key used to name curves taken from `entry`: its short name, or the
    /// full path when another source shares that short name.
    pub fn key_for(&self, entry: &SourceEntry) -> String {
        let shared = self
            .entries
            .iter()
            .filter(|e| e.short_name == entry.short_name)
            .count()
            > 1;
        if shared {
            entry.path.display().to_string()
        } else {
            entry.short_name.clone()
        }
    }

    pub fn clear(&mut self) {
        info!("sources: cleared {} entries", self.entries.len());
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Column names present in every table, in the order of the first one.
pub fn common_columns(tables: &[Table]) -> Vec<String> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };
    first
        .column_names()
        .into_iter()
        .filter(|name| rest.iter().all(|t| t.column(name).is_some()))
        .map(str::to_string)
        .collect()
}

/// Regular files directly inside `dir` whose name contains `extension`.
/// A missing or unreadable directory yields an empty list.
pub fn scan_folder(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().contains(extension))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn table(names: &[&str]) -> Table {
        let columns = names.iter().map(|n| Column::new(*n, vec![0.0])).collect();
        Table::from_columns(Path::new("t.csv"), columns).unwrap()
    }

    #[test]
    fn add_sources_deduplicates_and_keeps_order() {
        let mut reg = SourceRegistry::new();
        reg.add_sources(["/d/a.plt", "/d/b.csv"]);
        let (paths, names) = reg.add_sources(["/d/b.csv", "/e/c.plt", "/d/a.plt"]);

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/d/a.plt"),
                PathBuf::from("/d/b.csv"),
                PathBuf::from("/e/c.plt")
            ]
        );
        assert_eq!(names, vec!["a.plt", "b.csv", "c.plt"]);
    }

    #[test]
    fn resolve_by_full_path_or_short_name() {
        let mut reg = SourceRegistry::new();
        reg.add_sources(["/d/a.plt", "/e/a.plt"]);

        assert_eq!(reg.resolve("/e/a.plt").unwrap().path, Path::new("/e/a.plt"));
        assert_eq!(reg.resolve("a.plt").unwrap().path, Path::new("/d/a.plt"));
        assert!(matches!(reg.resolve("z.plt"), Err(CoreError::UnknownSource(_))));
    }

    #[test]
    fn key_for_falls_back_to_full_path_on_clash() {
        let mut reg = SourceRegistry::new();
        reg.add_sources(["/d/a.plt", "/e/a.plt", "/e/b.plt"]);

        let b = reg.resolve("b.plt").unwrap();
        assert_eq!(reg.key_for(b), "b.plt");
        let a = reg.resolve("/e/a.plt").unwrap();
        assert_eq!(reg.key_for(a), "/e/a.plt");
    }

    #[test]
    fn clear_empties_everything() {
        let mut reg = SourceRegistry::new();
        reg.add_sources(["/d/a.plt"]);
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.short_names().is_empty());
    }

    #[test]
    fn common_columns_follow_first_table_order() {
        let tables = [table(&["a", "b", "c"]), table(&["d", "c", "b"])];
        assert_eq!(common_columns(&tables), vec!["b", "c"]);
    }

    #[test]
    fn common_columns_of_nothing_is_empty() {
        assert!(common_columns(&[]).is_empty());
    }

    #[test]
    fn scan_folder_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.plt"), "").unwrap();
        std::fs::write(dir.path().join("a.plt"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub.plt")).unwrap();

        let files = scan_folder(dir.path(), ".plt");
        assert_eq!(
            files,
            vec![dir.path().join("a.plt"), dir.path().join("b.plt")]
        );
    }

    #[test]
    fn scan_missing_folder_is_empty() {
        assert!(scan_folder(Path::new("/definitely/not/here"), ".plt").is_empty());
    }
}
