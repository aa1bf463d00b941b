use crate::errors::TimerError;
use crate::models::AppData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Reads the snapshot document. A missing file is `Ok(None)`.
pub async fn read_data(path: &Path) -> Result<Option<AppData>, TimerError> {
    let read_error = |source: Box<dyn std::error::Error + Send + Sync>| TimerError::PersistenceRead {
        path: path.to_path_buf(),
        source,
    };

    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| read_error(Box::new(err))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(read_error(Box::new(err))),
    }
}

pub async fn load_data(path: &Path) -> AppData {
    match read_data(path).await {
        Ok(data) => data.unwrap_or_default(),
        Err(err) => {
            error!("{err}");
            AppData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), TimerError> {
    let write_error = |source: Box<dyn std::error::Error + Send + Sync>| TimerError::PersistenceWrite {
        path: path.to_path_buf(),
        source,
    };

    let payload = serde_json::to_vec_pretty(data).map_err(|err| write_error(Box::new(err)))?;
    fs::write(path, payload)
        .await
        .map_err(|err| write_error(Box::new(err)))?;
    Ok(())
}

enum WriteRequest {
    Snapshot(AppData),
    Flush(oneshot::Sender<()>),
}

/// Single writer for the snapshot file. Snapshots are written in the order
/// they were enqueued; a backlog collapses to its newest snapshot.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl Persister {
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path, rx));
        Self { tx }
    }

    pub fn enqueue(&self, data: AppData) {
        if self.tx.send(WriteRequest::Snapshot(data)).is_err() {
            warn!("snapshot writer has stopped, dropping write");
        }
    }

    /// Resolves once every snapshot enqueued before this call is on disk
    /// (or has failed and been logged).
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(WriteRequest::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        for request in batch {
            match request {
                WriteRequest::Snapshot(data) => latest = Some(data),
                WriteRequest::Flush(done) => acks.push(done),
            }
        }

        if let Some(data) = latest {
            match persist_data(&path, &data).await {
                Ok(()) => debug!(timers = data.timers.len(), "snapshot written"),
                Err(err) => error!("{err}"),
            }
        }

        for done in acks {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timer;

    fn sample() -> AppData {
        let mut timer = Timer::new("Stretch".to_string(), 90, Some("Health".to_string()));
        timer.time = 30;
        AppData {
            timers: vec![timer],
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        assert!(read_data(&path).await.unwrap().is_none());
        assert!(load_data(&path).await.timers.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_read_error_and_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            read_data(&path).await,
            Err(TimerError::PersistenceRead { .. })
        ));
        assert!(load_data(&path).await.timers.is_empty());
    }

    #[tokio::test]
    async fn snapshot_uses_one_key_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        persist_data(&path, &sample()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let stored = &raw["timers"][0];
        assert_eq!(stored["name"], "Stretch");
        assert_eq!(stored["time"], 30);
        assert_eq!(stored["halfwayReached"], false);
        assert!(raw["history"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_to_missing_directory_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("timers.json");
        assert!(matches!(
            persist_data(&path, &sample()).await,
            Err(TimerError::PersistenceWrite { .. })
        ));
    }

    #[tokio::test]
    async fn flush_waits_for_the_newest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let persister = Persister::spawn(path.clone());

        let mut data = sample();
        persister.enqueue(data.clone());
        data.timers[0].time = 45;
        persister.enqueue(data.clone());
        persister.flush().await;

        let stored = read_data(&path).await.unwrap().unwrap();
        assert_eq!(stored.timers[0].time, 45);
    }
}
