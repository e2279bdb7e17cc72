use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, error, instrument, trace};
use tracing_error::SpanTrace;

use crate::dataset::Dataset;
use crate::domain::ViewerError;

pub type LoadId = u64;

#[derive(Debug)]
pub struct LoadResult {
    pub id: LoadId,
    pub path: PathBuf,
    pub result: Result<Dataset, ViewerError>,
}

/// Reads and parses a CSV file.
#[instrument]
pub fn load_file(path: &Path, identity_column: &str) -> Result<Dataset, ViewerError> {
    let result = fs::read(path)
        .map_err(|source| ViewerError::LoadFailure {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|bytes| Dataset::parse(path, bytes, identity_column));
    if let Err(e) = &result {
        error!("{e}\n{}", SpanTrace::capture());
    }
    result
}

/// Runs file loads on the rayon pool. Only the most recent request is ever handed out.
pub struct Loader {
    identity_column: String,
    next_id: LoadId,
    pending: Option<LoadId>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
}

impl Loader {
    pub fn new(identity_column: &str) -> Self {
        let (tx, rx) = channel();
        Loader {
            identity_column: identity_column.to_string(),
            next_id: 0,
            pending: None,
            tx,
            rx,
        }
    }

    /// Starts loading `path`. Any earlier request still in flight becomes stale.
    pub fn request(&mut self, path: PathBuf) -> LoadId {
        self.next_id += 1;
        let id = self.next_id;
        self.pending = Some(id);
        debug!("Load #{id}: {}", path.display());

        let tx = self.tx.clone();
        let identity_column = self.identity_column.clone();
        rayon::spawn(move || {
            let result = load_file(&path, &identity_column);
            // The receiver only goes away on shutdown
            let _ = tx.send(LoadResult { id, path, result });
        });
        id
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the finished result of the latest request, if it has arrived.
    pub fn poll(&mut self) -> Option<LoadResult> {
        let mut latest = None;
        while let Ok(result) = self.rx.try_recv() {
            if let Some(result) = self.accept(result) {
                latest = Some(result);
            }
        }
        latest
    }

    fn accept(&mut self, result: LoadResult) -> Option<LoadResult> {
        if self.pending == Some(result.id) {
            self.pending = None;
            Some(result)
        } else {
            trace!(
                "Dropping stale load #{} of {}",
                result.id,
                result.path.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_file_reports_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.csv"), "Name").unwrap_err();
        assert!(matches!(err, ViewerError::LoadFailure { .. }));
        assert_eq!(err.user_message(), "Failed to load CSV file.");
    }

    #[test]
    fn load_file_reads_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Batting.csv", "Name,Round\nA,1\n");
        let ds = load_file(&path, "Name").unwrap();
        assert_eq!(ds.nrows(), 1);
        assert_eq!(ds.source(), path);
    }

    #[test]
    fn only_latest_request_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "Batting.csv", "Name\nA\n");
        let second = write(dir.path(), "Pitching.csv", "Name\nB\nC\n");

        let mut loader = Loader::new("Name");
        let stale = loader.request(first);
        let latest = loader.request(second.clone());
        assert!(latest > stale);

        let mut arrived = Vec::new();
        for _ in 0..2 {
            arrived.push(loader.rx.recv_timeout(Duration::from_secs(10)).unwrap());
        }
        let accepted: Vec<LoadResult> = arrived
            .into_iter()
            .filter_map(|r| loader.accept(r))
            .collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, latest);
        assert_eq!(accepted[0].path, second);
        assert_eq!(accepted[0].result.as_ref().unwrap().nrows(), 2);
        assert!(!loader.is_pending());
    }

    #[test]
    fn poll_returns_finished_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Batting.csv", "Name\nA\n");
        let mut loader = Loader::new("Name");
        let id = loader.request(path);
        assert!(loader.is_pending());

        let mut done = None;
        for _ in 0..1000 {
            done = loader.poll();
            if done.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(done.map(|r| r.id), Some(id));
        assert!(loader.poll().is_none());
    }
}
