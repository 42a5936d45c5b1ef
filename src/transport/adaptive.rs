//! # Adaptive Chunked Writer
//!
//! Streams a finished job payload through a [`Link`] in small chunks, one at
//! a time, and tunes chunk size and inter-chunk delay from what it observes.
//!
//! ## Write Loop
//!
//! ```text
//! check link ──► for each chunk:
//!                  every 5th chunk: re-check link
//!                  write (timeout 1000 ms + 5 ms/byte, 1000..=10000)
//!                    ok   ──► grow every 3rd clean success (+5 bytes, delay / 1.2)
//!                    err  ──► backoff min(delay × 2^(n-1), 200) and retry
//!                             2 failures in a row: shrink (-5 bytes, delay × 1.5)
//!                  sleep delay (not after the last chunk)
//! ```
//!
//! A disconnection ends the write at once and drops the handle's cached
//! route. Any other fault is retried up to `retries` attempts per chunk.
//!
//! Each write keeps its own [`TransmissionState`]; nothing carries over
//! between jobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{Link, LinkHandle};
use crate::error::{LinkError, TransportError};

/// Caller-facing transport options. Values are clamped when a write starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Initial chunk size in bytes (1..=256)
    pub chunk_size: usize,
    /// Base inter-chunk delay in milliseconds (10..=100)
    pub delay_ms: u64,
    /// Attempts per chunk (1..=10)
    pub retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            delay_ms: 20,
            retries: 3,
        }
    }
}

impl TransportConfig {
    pub fn clamped_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, 256)
    }

    pub fn clamped_delay_ms(&self) -> u64 {
        self.delay_ms.clamp(10, 100)
    }

    pub fn clamped_retries(&self) -> u32 {
        self.retries.clamp(1, 10)
    }
}

/// Adaptation bounds. The defaults are tuned for BLE characteristics; other
/// links (SPP, USB) can swap in their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveLimits {
    pub grow_step: usize,
    pub max_chunk: usize,
    pub min_chunk: usize,
    pub max_delay_ms: f64,
    pub grow_factor: f64,
    pub shrink_factor: f64,
    /// Consecutive clean successes between growth steps
    pub grow_every: u32,
    /// Consecutive failures that trigger a shrink
    pub shrink_after: u32,
    /// Link re-check interval in chunks
    pub check_every: usize,
    pub backoff_cap_ms: f64,
    pub timeout_base_ms: u64,
    pub timeout_per_byte_ms: u64,
    pub timeout_max_ms: u64,
}

impl Default for AdaptiveLimits {
    fn default() -> Self {
        Self {
            grow_step: 5,
            max_chunk: 256,
            min_chunk: 10,
            max_delay_ms: 200.0,
            grow_factor: 1.2,
            shrink_factor: 1.5,
            grow_every: 3,
            shrink_after: 2,
            check_every: 5,
            backoff_cap_ms: 200.0,
            timeout_base_ms: 1000,
            timeout_per_byte_ms: 5,
            timeout_max_ms: 10_000,
        }
    }
}

impl AdaptiveLimits {
    /// Bring hand-written limits back into a shape the write loop can run
    /// with: chunks of at least one byte, factors of at least 1, a timeout
    /// ceiling no lower than its base and non-zero counters.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let min_chunk = self.min_chunk.max(1);
        Self {
            grow_step: self.grow_step,
            min_chunk,
            max_chunk: self.max_chunk.max(min_chunk),
            max_delay_ms: finite_or(self.max_delay_ms, defaults.max_delay_ms).max(0.0),
            grow_factor: finite_or(self.grow_factor, defaults.grow_factor).max(1.0),
            shrink_factor: finite_or(self.shrink_factor, defaults.shrink_factor).max(1.0),
            grow_every: self.grow_every.max(1),
            shrink_after: self.shrink_after.max(1),
            check_every: self.check_every,
            backoff_cap_ms: finite_or(self.backoff_cap_ms, defaults.backoff_cap_ms).max(0.0),
            timeout_base_ms: self.timeout_base_ms,
            timeout_per_byte_ms: self.timeout_per_byte_ms,
            timeout_max_ms: self.timeout_max_ms.max(self.timeout_base_ms),
        }
    }

    /// Deadline for writing one chunk of `len` bytes.
    pub fn write_timeout(&self, len: usize) -> Duration {
        let ms = self
            .timeout_base_ms
            .saturating_add(self.timeout_per_byte_ms.saturating_mul(len as u64))
            .min(self.timeout_max_ms.max(self.timeout_base_ms));
        Duration::from_millis(ms)
    }

    /// Backoff before retry number `attempt` (1-based failed attempt).
    pub fn backoff(&self, delay_ms: f64, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        millis(delay_ms * 2f64.powi(exp)).min(millis(self.backoff_cap_ms))
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn millis(ms: f64) -> Duration {
    Duration::from_micros((ms.max(0.0) * 1000.0).round() as u64)
}

/// Per-write congestion state.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionState {
    pub chunk_size: usize,
    pub delay_ms: f64,
    pub base_delay_ms: f64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    limits: AdaptiveLimits,
}

impl TransmissionState {
    pub fn new(config: &TransportConfig, limits: AdaptiveLimits) -> Self {
        let limits = limits.normalized();
        let delay = config.clamped_delay_ms() as f64;
        Self {
            chunk_size: config.clamped_chunk_size(),
            delay_ms: delay,
            base_delay_ms: delay,
            successes: 0,
            failures: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
            limits,
        }
    }

    /// Record a delivered chunk. Only first-try deliveries count toward growth.
    pub fn record_success(&mut self, first_try: bool) {
        self.consecutive_failures = 0;
        if !first_try {
            return;
        }
        self.successes += 1;
        self.consecutive_successes += 1;
        if self.consecutive_successes % self.limits.grow_every.max(1) == 0 {
            self.chunk_size = (self.chunk_size + self.limits.grow_step).min(self.limits.max_chunk);
            self.delay_ms = (self.delay_ms / self.limits.grow_factor).max(self.base_delay_ms);
            debug!(chunk_size = self.chunk_size, delay_ms = self.delay_ms, "grew chunk");
        }
    }

    /// Record one failed attempt.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.consecutive_successes = 0;
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.limits.shrink_after {
            if self.chunk_size > self.limits.min_chunk {
                self.chunk_size = self
                    .chunk_size
                    .saturating_sub(self.limits.grow_step)
                    .max(self.limits.min_chunk);
            }
            self.delay_ms = (self.delay_ms * self.limits.shrink_factor).min(self.limits.max_delay_ms);
            self.consecutive_failures = 0;
            debug!(chunk_size = self.chunk_size, delay_ms = self.delay_ms, "shrank chunk");
        }
    }

    pub fn delay(&self) -> Duration {
        millis(self.delay_ms)
    }
}

/// Summary of a completed write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub bytes_written: usize,
    pub chunks: usize,
    pub retries: u64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub final_chunk_size: usize,
    pub final_delay_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptiveWriter {
    config: TransportConfig,
    limits: AdaptiveLimits,
}

impl AdaptiveWriter {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            limits: AdaptiveLimits::default(),
        }
    }

    /// Replace the adaptation bounds. Out-of-range values are normalized.
    pub fn with_limits(mut self, limits: AdaptiveLimits) -> Self {
        self.limits = limits.normalized();
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn ensure_connected<L: Link + ?Sized>(
        &self,
        link: &L,
        handle: &mut LinkHandle,
    ) -> Result<(), TransportError> {
        if !handle.is_ready() {
            return Err(LinkError::CharacteristicNotFound(handle.device_id().to_string()).into());
        }
        if link.is_connected(handle.device_id()).await? {
            return Ok(());
        }
        warn!(device = %handle.device_id(), "link reports disconnected");
        handle.invalidate();
        Err(LinkError::Disconnected(handle.device_id().to_string()).into())
    }

    /// Deliver `data` in full or fail.
    ///
    /// Returns a [`WriteReport`] only after every byte was acknowledged by
    /// the link. On a disconnection the handle's route is invalidated.
    pub async fn write<L: Link + ?Sized>(
        &self,
        link: &L,
        handle: &mut LinkHandle,
        data: &[u8],
    ) -> Result<WriteReport, TransportError> {
        self.ensure_connected(link, handle).await?;

        let max_attempts = self.config.clamped_retries();
        let mut state = TransmissionState::new(&self.config, self.limits);
        let mut report = WriteReport {
            min_chunk_size: usize::MAX,
            ..WriteReport::default()
        };
        let mut offset = 0;
        let mut index = 0;

        while offset < data.len() {
            if index > 0 && self.limits.check_every > 0 && index % self.limits.check_every == 0 {
                self.ensure_connected(link, handle).await?;
            }

            let end = (offset + state.chunk_size).min(data.len());
            let chunk = &data[offset..end];
            let deadline = self.limits.write_timeout(chunk.len());

            let mut attempt = 0;
            loop {
                attempt += 1;
                let error = match timeout(deadline, link.write(handle, chunk)).await {
                    Ok(Ok(())) => break,
                    Ok(Err(e)) => e,
                    Err(_) => LinkError::WriteTimeout(deadline.as_millis() as u64),
                };

                if error.is_disconnect() {
                    warn!(chunk = index, %error, "link lost mid-write");
                    handle.invalidate();
                    return Err(TransportError::Link(error));
                }

                state.record_failure();
                if attempt >= max_attempts {
                    warn!(chunk = index, attempts = attempt, %error, "chunk failed");
                    return Err(TransportError::Transmission {
                        chunk_index: index,
                        attempts: attempt,
                        source: error,
                    });
                }

                let backoff = self.limits.backoff(state.delay_ms, attempt);
                debug!(chunk = index, attempt, ?backoff, %error, "retrying chunk");
                report.retries += 1;
                sleep(backoff).await;
            }

            state.record_success(attempt == 1);
            report.chunks += 1;
            report.bytes_written += chunk.len();
            report.min_chunk_size = report.min_chunk_size.min(chunk.len());
            report.max_chunk_size = report.max_chunk_size.max(chunk.len());
            offset = end;
            index += 1;

            if offset < data.len() {
                sleep(state.delay()).await;
            }
        }

        if report.chunks == 0 {
            report.min_chunk_size = 0;
        }
        report.final_chunk_size = state.chunk_size;
        report.final_delay_ms = state.delay_ms;
        debug!(
            bytes = report.bytes_written,
            chunks = report.chunks,
            retries = report.retries,
            "write complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{open_link, MemoryLink, WriteOutcome};
    use pretty_assertions::assert_eq;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_config_clamps() {
        let config = TransportConfig {
            chunk_size: 0,
            delay_ms: 1,
            retries: 50,
        };
        assert_eq!(config.clamped_chunk_size(), 1);
        assert_eq!(config.clamped_delay_ms(), 10);
        assert_eq!(config.clamped_retries(), 10);

        let config = TransportConfig {
            chunk_size: 1000,
            delay_ms: 1000,
            retries: 0,
        };
        assert_eq!(config.clamped_chunk_size(), 256);
        assert_eq!(config.clamped_delay_ms(), 100);
        assert_eq!(config.clamped_retries(), 1);
    }

    #[test]
    fn test_write_timeout_scaling() {
        let limits = AdaptiveLimits::default();
        assert_eq!(limits.write_timeout(0), Duration::from_millis(1000));
        assert_eq!(limits.write_timeout(20), Duration::from_millis(1100));
        assert_eq!(limits.write_timeout(256), Duration::from_millis(2280));
        assert_eq!(limits.write_timeout(5000), Duration::from_millis(10_000));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let limits = AdaptiveLimits::default();
        assert_eq!(limits.backoff(20.0, 1), Duration::from_millis(20));
        assert_eq!(limits.backoff(20.0, 2), Duration::from_millis(40));
        assert_eq!(limits.backoff(20.0, 3), Duration::from_millis(80));
        assert_eq!(limits.backoff(20.0, 5), Duration::from_millis(200));
    }

    #[test]
    fn test_growth_every_third_clean_success() {
        let mut state = TransmissionState::new(&TransportConfig::default(), AdaptiveLimits::default());
        state.record_success(true);
        state.record_success(true);
        assert_eq!(state.chunk_size, 20);
        state.record_success(true);
        assert_eq!(state.chunk_size, 25);
        // delay never drops under the configured base
        assert_eq!(state.delay_ms, 20.0);
    }

    #[test]
    fn test_retried_success_does_not_grow() {
        let mut state = TransmissionState::new(&TransportConfig::default(), AdaptiveLimits::default());
        for _ in 0..6 {
            state.record_success(false);
        }
        assert_eq!(state.chunk_size, 20);
        assert_eq!(state.successes, 0);
    }

    #[test]
    fn test_shrink_after_two_failures() {
        let mut state = TransmissionState::new(&TransportConfig::default(), AdaptiveLimits::default());
        state.record_failure();
        assert_eq!(state.chunk_size, 20);
        state.record_failure();
        assert_eq!(state.chunk_size, 15);
        assert_eq!(state.delay_ms, 30.0);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_bounds_hold_under_any_history() {
        let limits = AdaptiveLimits::default();
        let mut state = TransmissionState::new(&TransportConfig::default(), limits);
        for round in 0..400u32 {
            if round % 7 < 3 {
                state.record_failure();
            } else {
                state.record_success(round % 2 == 0);
            }
            assert!((10..=256).contains(&state.chunk_size), "{}", state.chunk_size);
            assert!(state.delay_ms >= 20.0 && state.delay_ms <= 200.0, "{}", state.delay_ms);
        }
        for _ in 0..200 {
            state.record_success(true);
        }
        assert_eq!(state.chunk_size, 256);
        for _ in 0..200 {
            state.record_failure();
        }
        assert_eq!(state.chunk_size, 10);
        assert_eq!(state.delay_ms, 200.0);
    }

    #[test]
    fn test_small_configured_chunk_is_not_raised_by_shrink() {
        let config = TransportConfig {
            chunk_size: 4,
            ..TransportConfig::default()
        };
        let mut state = TransmissionState::new(&config, AdaptiveLimits::default());
        state.record_failure();
        state.record_failure();
        assert_eq!(state.chunk_size, 4);
    }

    #[test]
    fn test_normalized_limits() {
        let limits = AdaptiveLimits {
            min_chunk: 0,
            max_chunk: 0,
            grow_factor: 0.0,
            shrink_factor: f64::NAN,
            grow_every: 0,
            shrink_after: 0,
            timeout_max_ms: 500,
            ..AdaptiveLimits::default()
        }
        .normalized();
        assert_eq!(limits.min_chunk, 1);
        assert_eq!(limits.max_chunk, 1);
        assert_eq!(limits.grow_factor, 1.0);
        assert_eq!(limits.shrink_factor, 1.5);
        assert_eq!(limits.grow_every, 1);
        assert_eq!(limits.shrink_after, 1);
        assert_eq!(limits.timeout_max_ms, 1000);
        assert_eq!(AdaptiveLimits::default().normalized(), AdaptiveLimits::default());
    }

    #[test]
    fn test_inverted_timeout_bounds_do_not_panic() {
        let limits = AdaptiveLimits {
            timeout_max_ms: 500,
            ..AdaptiveLimits::default()
        };
        assert_eq!(limits.write_timeout(20), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_chunk_still_finishes() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        let writer = AdaptiveWriter::default().with_limits(AdaptiveLimits {
            max_chunk: 0,
            min_chunk: 0,
            ..AdaptiveLimits::default()
        });
        // three 20-byte chunks, then growth caps the chunk at one byte
        let data = payload(70);
        let report = tokio::time::timeout(
            Duration::from_secs(60),
            writer.write(&link, &mut handle, &data),
        )
        .await
        .expect("write should not spin")
        .unwrap();
        assert_eq!(link.written(), data);
        assert_eq!(report.min_chunk_size, 1);
        assert!(link.writes().iter().all(|chunk| !chunk.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inverted_timeout_limits_still_write() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        let writer = AdaptiveWriter::default().with_limits(AdaptiveLimits {
            timeout_max_ms: 500,
            ..AdaptiveLimits::default()
        });
        writer.write(&link, &mut handle, &payload(50)).await.unwrap();
        assert_eq!(link.written(), payload(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_check_catches_silent_drop() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        // first query passes, the re-check before chunk 5 sees the drop
        link.drop_after_checks(1);
        let err = AdaptiveWriter::default()
            .write(&link, &mut handle, &payload(200))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Link(LinkError::Disconnected(_))));
        assert_eq!(link.writes().len(), 5);
        assert_eq!(link.write_calls(), 5);
        assert!(!handle.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_chunk_write() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        let report = AdaptiveWriter::default()
            .write(&link, &mut handle, b"Hi")
            .await
            .unwrap();
        assert_eq!(link.writes(), vec![b"Hi".to_vec()]);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.bytes_written, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_grow_and_cover_input() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        let data = payload(200);
        let report = AdaptiveWriter::default()
            .write(&link, &mut handle, &data)
            .await
            .unwrap();
        let sizes: Vec<usize> = link.writes().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 20, 25, 25, 25, 30, 30, 5]);
        assert_eq!(link.written(), data);
        assert_eq!(report.bytes_written, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_link_still_delivers_everything() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        use WriteOutcome::*;
        link.script([Ok, Fail, Ok, Fail, Fail, Ok, Hang, Ok, Fail, Ok]);
        let data = payload(300);
        let report = AdaptiveWriter::default()
            .write(&link, &mut handle, &data)
            .await
            .unwrap();
        assert_eq!(link.written(), data);
        assert_eq!(report.retries, 5);
        assert!(report.min_chunk_size >= 1);
        assert!(report.max_chunk_size <= 256);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_name_the_chunk() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        use WriteOutcome::*;
        link.script([Ok, Fail, Fail, Fail]);
        let err = AdaptiveWriter::default()
            .write(&link, &mut handle, &payload(60))
            .await
            .unwrap_err();
        match err {
            TransportError::Transmission {
                chunk_index,
                attempts,
                source,
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(attempts, 3);
                assert_eq!(source, LinkError::WriteFailed("scripted failure".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(link.write_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_becomes_write_timeout() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        link.script([WriteOutcome::Hang]);
        let writer = AdaptiveWriter::new(TransportConfig {
            retries: 1,
            ..TransportConfig::default()
        });
        let err = writer.write(&link, &mut handle, b"Hi").await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Transmission {
                source: LinkError::WriteTimeout(1010),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_aborts_without_retry() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        link.script([WriteOutcome::Ok, WriteOutcome::Disconnect]);
        let err = AdaptiveWriter::default()
            .write(&link, &mut handle, &payload(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Link(LinkError::Disconnected(_))));
        assert_eq!(link.write_calls(), 2);
        assert!(!handle.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_link_fails_before_writing() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        link.set_connected(false);
        let err = AdaptiveWriter::default()
            .write(&link, &mut handle, b"Hi")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Link(LinkError::Disconnected(_))));
        assert_eq!(link.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_writes_nothing() {
        let link = MemoryLink::new();
        let mut handle = open_link(&link, "mem").await.unwrap();
        let report = AdaptiveWriter::default()
            .write(&link, &mut handle, &[])
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.min_chunk_size, 0);
        assert_eq!(link.write_calls(), 0);
    }
}
