//! # Job Executors
//!
//! The queue hands each dispatched job to an [`Executor`]. Whatever the
//! executor returns is the outcome of that attempt: `Ok` completes the job,
//! any error counts as a retryable failure.
//!
//! [`LinkExecutor`] is the standard one: it streams the job payload through
//! an [`AdaptiveWriter`] over a single [`Link`].

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::job::JobSnapshot;
use crate::error::BleprintError;
use crate::transport::{AdaptiveWriter, Link, LinkHandle, WriteReport, open_link};

#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run one attempt of `job`. Called at most once per dispatch.
    async fn execute(&self, job: &JobSnapshot) -> Result<(), BleprintError>;
}

/// Writes job payloads to one device.
///
/// The link handle is opened on first use and cached between jobs. When a
/// write reports the link lost, the handle's route is dropped and the next
/// attempt connects and rediscovers from scratch. Writes are serialized by
/// the handle lock, so even with queue concurrency above one, a device never
/// sees interleaved payloads.
pub struct LinkExecutor<L> {
    link: Arc<L>,
    device_id: String,
    writer: AdaptiveWriter,
    handle: Mutex<Option<LinkHandle>>,
    last_report: StdMutex<Option<WriteReport>>,
}

impl<L: Link> LinkExecutor<L> {
    pub fn new(link: Arc<L>, device_id: impl Into<String>, writer: AdaptiveWriter) -> Self {
        Self {
            link,
            device_id: device_id.into(),
            writer,
            handle: Mutex::new(None),
            last_report: StdMutex::new(None),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn link(&self) -> &Arc<L> {
        &self.link
    }

    /// Statistics of the most recent successful write.
    pub fn last_report(&self) -> Option<WriteReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the link and forget the cached handle.
    pub async fn close(&self) -> Result<(), BleprintError> {
        let mut handle = self.handle.lock().await;
        if handle.take().is_some() {
            self.link.disconnect(&self.device_id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<L: Link + 'static> Executor for LinkExecutor<L> {
    async fn execute(&self, job: &JobSnapshot) -> Result<(), BleprintError> {
        let mut slot = self.handle.lock().await;

        let handle = match slot.take() {
            Some(handle) if handle.is_ready() => handle,
            _ => {
                debug!(device = %self.device_id, "opening link");
                open_link(self.link.as_ref(), &self.device_id).await?
            }
        };
        let handle = slot.insert(handle);

        let report = self
            .writer
            .write(self.link.as_ref(), handle, &job.payload)
            .await?;

        info!(
            job = %job.id,
            bytes = report.bytes_written,
            chunks = report.chunks,
            retries = report.retries,
            "payload delivered"
        );
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
        Ok(())
    }
}
