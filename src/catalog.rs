use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::ViewerError;

/// One selectable CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// File name without extension, shown in the file bar.
    pub label: String,
}

impl FileEntry {
    fn new(path: PathBuf) -> Self {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        FileEntry { path, label }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    folder: PathBuf,
    files: Vec<FileEntry>,
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, ViewerError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_csv(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Last folder by name for which `list` finds any files. Unreadable folders are skipped.
fn latest_folder(
    mut dirs: Vec<PathBuf>,
    list: impl Fn(&Path) -> Result<Vec<PathBuf>, ViewerError>,
) -> Option<(PathBuf, Vec<PathBuf>)> {
    dirs.sort();
    for dir in dirs.into_iter().rev() {
        match list(&dir) {
            Ok(found) if !found.is_empty() => {
                debug!("Using latest output folder {}", dir.display());
                return Some((dir, found));
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping {}: {e}", dir.display()),
        }
    }
    None
}

impl Catalog {
    /// Resolves `path` to a list of CSV files.
    ///
    /// A CSV file is listed alone. A folder lists its own CSV files, or those of the
    /// last sub-folder by name that has any (timestamped output folders sort by age).
    pub fn discover(path: &Path) -> Result<Self, ViewerError> {
        if is_csv(path) {
            let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Ok(Catalog {
                folder,
                files: vec![FileEntry::new(path.to_path_buf())],
            });
        }
        if !path.is_dir() {
            return Err(ViewerError::NoCsvFiles(path.to_path_buf()));
        }

        let mut folder = path.to_path_buf();
        let mut files = csv_files(path)?;
        if files.is_empty() {
            let subdirs: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_dir())
                .collect();
            if let Some((dir, found)) = latest_folder(subdirs, csv_files) {
                folder = dir;
                files = found;
            }
        }

        if files.is_empty() {
            return Err(ViewerError::NoCsvFiles(path.to_path_buf()));
        }
        info!("Found {} CSV files in {}", files.len(), folder.display());
        Ok(Catalog {
            folder,
            files: files.into_iter().map(FileEntry::new).collect(),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn get(&self, idx: usize) -> Option<&FileEntry> {
        self.files.get(idx)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "Name\nA\n").unwrap();
    }

    fn labels(catalog: &Catalog) -> Vec<&str> {
        catalog.files().iter().map(|f| f.label.as_str()).collect()
    }

    #[test]
    fn lists_csv_files_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Pitching.csv"));
        touch(&dir.path().join("Batting.csv"));
        touch(&dir.path().join("Fielding.CSV"));
        touch(&dir.path().join("notes.txt"));
        let catalog = Catalog::discover(dir.path()).unwrap();
        assert_eq!(labels(&catalog), ["Batting", "Fielding", "Pitching"]);
        assert_eq!(catalog.folder(), dir.path());
    }

    #[test]
    fn picks_latest_output_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("2025-05-22_00h10/Batting.csv"));
        touch(&dir.path().join("2025-05-22_00h17/Batting.csv"));
        touch(&dir.path().join("2025-05-22_00h17/Pitching.csv"));
        fs::create_dir_all(dir.path().join("2025-05-23_09h00")).unwrap();
        let catalog = Catalog::discover(dir.path()).unwrap();
        assert_eq!(catalog.folder(), dir.path().join("2025-05-22_00h17"));
        assert_eq!(labels(&catalog), ["Batting", "Pitching"]);
    }

    #[test]
    fn unreadable_folder_does_not_stop_the_scan() {
        let dirs = vec![PathBuf::from("out/a"), PathBuf::from("out/b"), PathBuf::from("out/c")];
        let latest = latest_folder(dirs, |dir| match dir.file_name().and_then(|n| n.to_str()) {
            Some("c") => Err(ViewerError::NoCsvFiles(dir.to_path_buf())),
            Some("b") => Ok(vec![dir.join("Batting.csv")]),
            _ => Ok(Vec::new()),
        });
        assert_eq!(
            latest,
            Some((PathBuf::from("out/b"), vec![PathBuf::from("out/b/Batting.csv")]))
        );
    }

    #[test]
    fn single_file_is_its_own_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Fielding.csv");
        touch(&file);
        let catalog = Catalog::discover(&file).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0).unwrap().path, file);
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::discover(dir.path()).unwrap_err();
        assert!(matches!(err, ViewerError::NoCsvFiles(_)));
        assert!(Catalog::discover(&dir.path().join("missing")).is_err());
    }
}
