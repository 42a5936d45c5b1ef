//! # In-Memory Link
//!
//! A [`Link`] that records every delivered chunk instead of talking to
//! hardware. Write outcomes can be scripted ahead of time, which is how the
//! adaptive writer and the queue are exercised against timeouts, flaky
//! writes and dropped connections. The CLI uses it for `--dry-run`.
//!
//! ```
//! use bleprint::transport::{MemoryLink, WriteOutcome};
//!
//! let link = MemoryLink::new();
//! link.script([WriteOutcome::Fail, WriteOutcome::Ok]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Link, LinkHandle, Route};
use crate::error::LinkError;

/// Scripted result for one write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Deliver the chunk
    Ok,
    /// Reject the chunk with a write fault
    Fail,
    /// Never complete, so the caller's timeout fires
    Hang,
    /// Drop the connection and report a disconnection
    Disconnect,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    refuse_connections: bool,
    script: VecDeque<WriteOutcome>,
    writes: Vec<Vec<u8>>,
    write_calls: usize,
    discovery_failures: u32,
    discovery_attempts: u32,
    connects: u32,
    /// Connectivity queries left before the link silently drops
    checks_before_drop: Option<u32>,
}

#[derive(Debug, Default)]
pub struct MemoryLink {
    state: Mutex<State>,
    latency: Duration,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered write takes `latency` of (virtual) time.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue outcomes for the next write calls. Once the script runs out,
    /// writes succeed.
    pub fn script(&self, outcomes: impl IntoIterator<Item = WriteOutcome>) {
        self.state().script.extend(outcomes);
    }

    /// Make the next `count` discovery calls fail.
    pub fn fail_discovery(&self, count: u32) {
        self.state().discovery_failures = count;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Let `checks` connectivity queries succeed, then report the link as
    /// gone on the next one. Writes keep working until that query.
    pub fn drop_after_checks(&self, checks: u32) {
        self.state().checks_before_drop = Some(checks);
    }

    /// Force the connectivity flag, simulating the device dropping away.
    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Chunks delivered so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// All delivered bytes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state().writes.concat()
    }

    /// Write calls made, including failed ones.
    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    pub fn discovery_attempts(&self) -> u32 {
        self.state().discovery_attempts
    }

    pub fn connects(&self) -> u32 {
        self.state().connects
    }
}

#[async_trait]
impl Link for MemoryLink {
    async fn connect(&self, device_id: &str) -> Result<(), LinkError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(LinkError::DeviceNotFound(device_id.to_string()));
        }
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&self, _device_id: &str) -> Result<(), LinkError> {
        self.state().connected = false;
        Ok(())
    }

    async fn is_connected(&self, _device_id: &str) -> Result<bool, LinkError> {
        let mut state = self.state();
        match state.checks_before_drop {
            Some(0) => {
                state.connected = false;
                state.checks_before_drop = None;
            }
            Some(left) => state.checks_before_drop = Some(left - 1),
            None => {}
        }
        Ok(state.connected)
    }

    async fn discover_write_characteristic(&self, device_id: &str) -> Result<Route, LinkError> {
        let mut state = self.state();
        state.discovery_attempts += 1;
        if !state.connected {
            return Err(LinkError::Disconnected(device_id.to_string()));
        }
        if state.discovery_failures > 0 {
            state.discovery_failures -= 1;
            return Err(LinkError::CharacteristicNotFound(device_id.to_string()));
        }
        Ok(Route {
            service: "memory".to_string(),
            characteristic: "write".to_string(),
        })
    }

    async fn write(&self, handle: &LinkHandle, data: &[u8]) -> Result<(), LinkError> {
        let outcome = {
            let mut state = self.state();
            state.write_calls += 1;
            if !state.connected {
                return Err(LinkError::Disconnected(handle.device_id().to_string()));
            }
            state.script.pop_front().unwrap_or(WriteOutcome::Ok)
        };

        match outcome {
            WriteOutcome::Ok => {
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                self.state().writes.push(data.to_vec());
                Ok(())
            }
            WriteOutcome::Fail => Err(LinkError::WriteFailed("scripted failure".to_string())),
            WriteOutcome::Hang => std::future::pending().await,
            WriteOutcome::Disconnect => {
                self.state().connected = false;
                Err(LinkError::Disconnected(handle.device_id().to_string()))
            }
        }
    }
}
