//! # Printer Transport Layer
//!
//! Link backends and the adaptive chunked writer that streams job payloads
//! through them.
//!
//! ## Available Links
//!
//! - [`rfcomm`]: classic Bluetooth SPP through `/dev/rfcommN` (Linux)
//! - [`memory`]: scripted in-memory link for tests and dry runs
//!
//! Every backend implements [`Link`]. The [`adaptive`] writer is generic over
//! it, so a new platform only needs one more `Link` implementation.
//!
//! ## Link Handles
//!
//! A [`LinkHandle`] pairs a device identifier with the [`Route`] (service and
//! writable characteristic) found at connect time. The route stays cached
//! until the link reports a disconnection, then it is dropped and
//! [`open_link`] must run again before the next write.

pub mod adaptive;
pub mod memory;
pub mod rfcomm;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LinkError;

pub use adaptive::{AdaptiveLimits, AdaptiveWriter, TransportConfig, WriteReport};
pub use memory::{MemoryLink, WriteOutcome};
pub use rfcomm::RfcommLink;

/// Service and characteristic addressing for one connected device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Route {
    pub service: String,
    pub characteristic: String,
}

/// Capability token for one device: its identifier plus cached routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHandle {
    device_id: String,
    route: Option<Route>,
}

impl LinkHandle {
    pub fn new(device_id: impl Into<String>, route: Route) -> Self {
        Self {
            device_id: device_id.into(),
            route: Some(route),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// A handle is usable for writes only while its route is cached.
    pub fn is_ready(&self) -> bool {
        self.route.is_some()
    }

    /// Forget the cached route after the link went down.
    pub fn invalidate(&mut self) {
        if self.route.take().is_some() {
            debug!(device = %self.device_id, "link handle invalidated");
        }
    }
}

/// # Link Capability
///
/// What the adaptive writer needs from a platform: connection management,
/// a connectivity query, discovery of the writable endpoint, and single
/// bounded writes. Implementations must be safe to share between tasks.
#[async_trait]
pub trait Link: Send + Sync {
    async fn connect(&self, device_id: &str) -> Result<(), LinkError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), LinkError>;

    async fn is_connected(&self, device_id: &str) -> Result<bool, LinkError>;

    /// Locate the service and characteristic that accept print data.
    async fn discover_write_characteristic(&self, device_id: &str) -> Result<Route, LinkError>;

    /// Write one chunk. The chunk is either delivered whole or the call fails.
    async fn write(&self, handle: &LinkHandle, data: &[u8]) -> Result<(), LinkError>;
}

/// Connect to a device and discover its write route.
///
/// Discovery is retried once automatically; a second discovery failure is
/// returned to the caller. Connect failures are never retried here.
pub async fn open_link<L: Link + ?Sized>(link: &L, device_id: &str) -> Result<LinkHandle, LinkError> {
    link.connect(device_id).await?;

    let route = match link.discover_write_characteristic(device_id).await {
        Ok(route) => route,
        Err(first) => {
            warn!(device = %device_id, error = %first, "discovery failed, retrying once");
            link.discover_write_characteristic(device_id).await?
        }
    };

    debug!(
        device = %device_id,
        service = %route.service,
        characteristic = %route.characteristic,
        "link ready"
    );
    Ok(LinkHandle::new(device_id, route))
}
