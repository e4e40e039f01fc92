//! External-collaborator contracts and resilience helpers
//!
//! The engine reaches its backing stores through two narrow traits: a
//! vector/embedding service (the authoritative persistent vector store) and
//! a declarative graph-query service returning tabular rows. Both are
//! blocking I/O boundaries: calls are retried with bounded exponential
//! backoff and, once a service looks down, short-circuited for a cooldown
//! period so queries degrade to cached/partial results instead of stalling.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::{
    BACKOFF_INITIAL_MS, BACKOFF_MAX_RETRIES, FAILURE_COOLDOWN_SECS, FAILURE_THRESHOLD,
};
use crate::types::{MemoryId, MetadataMap};
use crate::vector_index::MetadataFilter;

/// Parameter values for declarative graph queries
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

/// One tabular row returned by the graph-query service
#[derive(Debug, Clone, Default)]
pub struct GraphRow {
    pub columns: HashMap<String, ParamValue>,
}

impl GraphRow {
    pub fn text(&self, column: &str) -> Option<&str> {
        match self.columns.get(column) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        match self.columns.get(column) {
            Some(ParamValue::Float(x)) => Some(*x),
            Some(ParamValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }
}

/// Authoritative vector/embedding store
///
/// The in-process LSH index is an accelerating overlay over this service,
/// not a replacement. Implementations must be safe to call from multiple
/// threads.
pub trait VectorService: Send + Sync {
    /// Generate an embedding for the given text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Persist a vector with its metadata
    fn persist(&self, id: MemoryId, vector: &[f32], metadata: &MetadataMap) -> Result<()>;

    /// Exact query against the persistent store (the full-scan fallback)
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>>;
}

/// Declarative graph-query service for persisted-edge reads and writes
pub trait GraphQueryService: Send + Sync {
    fn execute(&self, query: &str, params: &[(String, ParamValue)]) -> Result<Vec<GraphRow>>;
}

/// Retry a fallible external call with bounded exponential backoff
///
/// Delays double per attempt (50 ms, 100 ms, 200 ms by default). On
/// exhaustion the last error is returned; the caller decides how to
/// degrade.
pub fn with_backoff<T>(operation: &str, mut call: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = Duration::from_millis(BACKOFF_INITIAL_MS);
    let mut attempt = 0u32;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < BACKOFF_MAX_RETRIES => {
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient external failure, retrying"
                );
                std::thread::sleep(delay);
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run a blocking external call against a deadline
///
/// The call is dispatched to a worker thread and its result received with a
/// timeout. A call that misses the deadline yields an error and the worker
/// is abandoned; whatever it eventually produces is dropped.
pub fn call_with_timeout<T: Send + 'static>(
    operation: &'static str,
    timeout: Duration,
    call: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(call());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "external call missed its deadline"
            );
            Err(anyhow!(
                "{operation} timed out after {}ms",
                timeout.as_millis()
            ))
        }
    }
}

/// Retry a deadline-bounded external call with backoff
///
/// Every attempt runs under `call_with_timeout`, so a hung service burns
/// one deadline per attempt instead of stalling the caller indefinitely.
pub fn with_timeout_backoff<T: Send + 'static>(
    operation: &'static str,
    timeout: Duration,
    call: impl Fn() -> Result<T> + Send + Sync + 'static,
) -> Result<T> {
    let call = Arc::new(call);
    with_backoff(operation, || {
        let call = Arc::clone(&call);
        call_with_timeout(operation, timeout, move || (*call)())
    })
}

/// Consecutive-failure tracker for an external service
///
/// After a threshold of consecutive failures, calls are short-circuited for
/// a cooldown period: `should_skip()` returns true and the caller goes
/// straight to its degraded path without touching the service.
pub struct FailureTracker {
    name: &'static str,
    consecutive_failures: AtomicU32,
    open_until: Mutex<Option<Instant>>,
}

impl FailureTracker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            consecutive_failures: AtomicU32::new(0),
            open_until: Mutex::new(None),
        }
    }

    /// Whether calls should currently bypass the service
    pub fn should_skip(&self) -> bool {
        let mut open_until = self.open_until.lock();
        match *open_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // Cooldown elapsed: allow the next call through
                *open_until = None;
                self.consecutive_failures.store(0, Ordering::Relaxed);
                debug!(service = self.name, "cooldown elapsed, probing service again");
                false
            }
            None => false,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= FAILURE_THRESHOLD {
            let mut open_until = self.open_until.lock();
            if open_until.is_none() {
                *open_until = Some(Instant::now() + Duration::from_secs(FAILURE_COOLDOWN_SECS));
                warn!(
                    service = self.name,
                    failures, "service short-circuited for cooldown"
                );
            }
        }
    }
}
