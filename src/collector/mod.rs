//! Clip collector API client.
//!
//! The collector is the remote service that accepts uploaded clips and lists
//! them back. This module provides a trait-based seam over it so the recorder
//! can be driven against the real HTTP service or an in-memory stand-in.

mod client;
pub mod list;
mod record;

use async_trait::async_trait;
use thiserror::Error;

pub use client::HttpCollector;
pub use list::ClipList;
pub use record::AudioRecord;

/// Errors talking to the collector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("Failed to build collector request: {0}")]
    Build(String),

    #[error("Failed to connect to the collector at {0}. Check the base URL and your connection.")]
    Connect(String),

    #[error("Request to the collector timed out")]
    Timeout,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse collector response: {0}")]
    Decode(String),

    #[error("Collector network error: {0}")]
    Network(String),
}

/// A clip ready to be sent: title plus encoded audio bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub title: String,
    pub audio: Vec<u8>,
    pub file_name: &'static str,
    pub mime: &'static str,
}

/// Port for the remote clip store.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Uploads one clip. Any 2xx answer counts as success.
    async fn upload(&self, payload: &UploadPayload) -> Result<(), CollectorError>;

    /// Fetches the clip collection in server order.
    async fn list(&self) -> Result<Vec<AudioRecord>, CollectorError>;
}
