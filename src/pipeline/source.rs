//! Directory batch source.
//!
//! # Responsibilities
//! - Pick up batch files from the inbox, oldest name first
//! - Run each file through the pipeline, one batch at a time
//! - Move the file to the done or error folder afterwards
//!
//! # Design Decisions
//! - A filesystem watcher wakes the loop early; the poll interval is the
//!   fallback when events are missed
//! - Producers should write elsewhere and rename into the inbox, so a
//!   half-written file is never picked up
//! - Shutdown is only observed between batches

use std::path::{Path, PathBuf};

use notify::{Config as WatcherConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::lifecycle::Shutdown;
use crate::pipeline::batch::BatchPipeline;
use crate::pipeline::error::PipelineError;
use crate::pipeline::record::{BatchReport, RawBatch};

/// Outcome counts of one inbox pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub committed: Vec<BatchReport>,
    pub failed: usize,
}

impl DrainSummary {
    /// Turn failed batches into an error naming the folder they were moved to.
    pub fn into_result(self, error_dir: &Path) -> Result<Self, PipelineError> {
        if self.failed == 0 {
            Ok(self)
        } else {
            Err(PipelineError::BatchesFailed {
                failed: self.failed,
                error_dir: error_dir.to_path_buf(),
            })
        }
    }
}

pub struct DirectorySource {
    inbox: PathBuf,
    done_dir: PathBuf,
    error_dir: PathBuf,
    extension: String,
    config: PipelineConfig,
    pipeline: BatchPipeline,
}

impl DirectorySource {
    pub fn new(config: &PipelineConfig, pipeline: BatchPipeline) -> Self {
        Self {
            inbox: PathBuf::from(&config.inbox_dir),
            done_dir: PathBuf::from(&config.done_dir),
            error_dir: PathBuf::from(&config.error_dir),
            extension: config.file_extension.trim_start_matches('.').to_string(),
            config: config.clone(),
            pipeline,
        }
    }

    pub fn error_dir(&self) -> &Path {
        &self.error_dir
    }

    /// Create the inbox and the done/error folders.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        for dir in [&self.inbox, &self.done_dir, &self.error_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|source| PipelineError::Source {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Batch files currently waiting, sorted by file name.
    pub async fn pending(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let source_err = |source| PipelineError::Source {
            path: self.inbox.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.inbox).await.map_err(source_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(source_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let matches = path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
            if is_file && matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Process one file and move it out of the inbox.
    pub async fn process_file(&self, path: &Path) -> Result<BatchReport, PipelineError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = match tokio::fs::read_to_string(path).await {
            Ok(content) => self.pipeline.process_batch(&RawBatch::new(name.clone(), content)).await,
            Err(source) => Err(PipelineError::Source {
                path: path.to_path_buf(),
                source,
            }),
        };

        let target_dir = if result.is_ok() { &self.done_dir } else { &self.error_dir };
        let target = target_dir.join(&name);
        if let Err(source) = tokio::fs::rename(path, &target).await {
            tracing::error!(file = ?path, target = ?target, error = %source, "Failed to move batch file");
            // Leaving a committed file in the inbox would import it twice.
            return Err(PipelineError::Source { path: target, source });
        }
        result
    }

    /// Process every pending file once.
    pub async fn run_once(&self) -> Result<DrainSummary, PipelineError> {
        let mut summary = DrainSummary::default();
        for path in self.pending().await? {
            match self.process_file(&path).await {
                Ok(report) => summary.committed.push(report),
                Err(e) => {
                    tracing::error!(file = ?path, error = %e, "Batch failed, file moved to error folder");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Drain the inbox whenever it changes or the poll interval elapses,
    /// until `shutdown` fires.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), PipelineError> {
        self.prepare().await?;

        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        // Kept alive for the whole loop; dropping it stops the events.
        let _watcher = match self.watch(wake_tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(inbox = ?self.inbox, error = %e, "Inbox watcher unavailable, polling only");
                None
            }
        };

        let mut interval = tokio::time::interval(self.config.poll_interval());
        tracing::info!(inbox = ?self.inbox, "Directory source started");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = interval.tick() => {}
                Some(()) = wake_rx.recv() => {}
            }
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "Inbox scan failed");
            }
        }

        tracing::info!("Directory source stopped");
        Ok(())
    }

    fn watch(&self, wake: mpsc::Sender<()>) -> Result<RecommendedWatcher, notify::Error> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_create() || event.kind.is_modify() => {
                    // A full channel already has a wake-up pending.
                    let _ = wake.try_send(());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Inbox watch error"),
            },
            WatcherConfig::default().with_poll_interval(self.config.poll_interval()),
        )?;
        watcher.watch(&self.inbox, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fanout::EnrichmentFanout;
    use crate::pipeline::parser::ParserOptions;
    use crate::store::{MemoryLookups, MemoryStore};
    use std::sync::Arc;

    fn source(root: &Path, store: MemoryStore) -> DirectorySource {
        let config = PipelineConfig {
            inbox_dir: root.join("inbox").display().to_string(),
            done_dir: root.join("done").display().to_string(),
            error_dir: root.join("error").display().to_string(),
            ..PipelineConfig::default()
        };
        let lookups = MemoryLookups::new().with_supplier("SUP-1", 1).with_item("IT-1", 10);
        let pipeline = BatchPipeline::new(
            EnrichmentFanout::new(Arc::new(lookups)),
            Arc::new(store),
            ParserOptions::default(),
        );
        DirectorySource::new(&config, pipeline)
    }

    #[tokio::test]
    async fn test_run_once_moves_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new().with_stock(10, 0);
        let source = source(dir.path(), store.clone());
        source.prepare().await.unwrap();

        let inbox = dir.path().join("inbox");
        std::fs::write(inbox.join("b.csv"), "SH-2,SUP-1,IT-1,2,2024-01-02\n").unwrap();
        std::fs::write(inbox.join("a.csv"), "SH-1,SUP-1,IT-1,1,2024-01-01\n").unwrap();
        std::fs::write(inbox.join("c.csv"), "SH-3,SUP-1,IT-404,1,2024-01-01\n").unwrap();
        std::fs::write(inbox.join("notes.txt"), "ignored").unwrap();

        let summary = source.run_once().await.unwrap();

        let names: Vec<&str> = summary.committed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.stock_level(10), Some(3));
        assert!(dir.path().join("done/a.csv").exists());
        assert!(dir.path().join("done/b.csv").exists());
        assert!(dir.path().join("error/c.csv").exists());
        assert!(inbox.join("notes.txt").exists());
        assert!(source.pending().await.unwrap().is_empty());

        let err = summary.into_result(source.error_dir()).unwrap_err();
        assert!(matches!(err, PipelineError::BatchesFailed { failed: 1, .. }));
    }

    #[tokio::test]
    async fn test_clean_drain_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path(), MemoryStore::new().with_stock(10, 0));
        source.prepare().await.unwrap();
        std::fs::write(dir.path().join("inbox/a.csv"), "SH-1,SUP-1,IT-1,1,2024-01-01\n").unwrap();

        let summary = source.run_once().await.unwrap().into_result(source.error_dir()).unwrap();
        assert_eq!(summary.committed.len(), 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path(), MemoryStore::new().with_stock(10, 0));
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(source.run(shutdown.clone()));
        shutdown.trigger();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
