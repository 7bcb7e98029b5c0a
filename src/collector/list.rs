//! Clip list collaborator.
//!
//! Holds the most recently fetched clip collection and refetches it in the
//! background whenever the recorder signals a successful upload.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{AudioRecord, Collector, CollectorError};

/// Background-fetched list of uploaded clips.
pub struct ClipList {
    collector: Arc<dyn Collector>,
    records: Vec<AudioRecord>,
    error: Option<String>,
    fetch: Option<JoinHandle<Result<Vec<AudioRecord>, CollectorError>>>,
}

impl ClipList {
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            collector,
            records: Vec::new(),
            error: None,
            fetch: None,
        }
    }

    /// Starts a refetch, replacing any fetch still in flight.
    pub fn request_refresh(&mut self) {
        if let Some(previous) = self.fetch.take() {
            previous.abort();
        }
        let collector = Arc::clone(&self.collector);
        self.fetch = Some(tokio::spawn(async move { collector.list().await }));
        tracing::debug!("Clip list refresh requested");
    }

    /// Collects the result of a finished fetch, if any.
    ///
    /// Returns `true` when the list contents changed. A failed fetch is logged
    /// and leaves the list empty.
    pub async fn poll(&mut self) -> bool {
        match self.fetch.take() {
            Some(handle) if handle.is_finished() => {
                self.apply(handle.await);
                true
            }
            pending => {
                self.fetch = pending;
                false
            }
        }
    }

    fn apply(
        &mut self,
        outcome: Result<Result<Vec<AudioRecord>, CollectorError>, tokio::task::JoinError>,
    ) {
        match outcome {
            Ok(Ok(records)) => {
                tracing::info!("Clip list loaded: {} clips", records.len());
                self.records = records;
                self.error = None;
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to fetch clip list: {}", e);
                self.records.clear();
                self.error = Some(e.to_string());
            }
            Err(e) => {
                tracing::warn!("Clip list fetch task failed: {}", e);
                self.records.clear();
                self.error = Some(format!("fetch task failed: {e}"));
            }
        }
    }

    pub fn records(&self) -> &[AudioRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.fetch.is_some()
    }
}

impl Drop for ClipList {
    fn drop(&mut self) {
        if let Some(handle) = self.fetch.take() {
            handle.abort();
        }
    }
}
