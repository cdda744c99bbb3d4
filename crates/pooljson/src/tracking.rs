//! Allocation tracking for pool blocks.
//!
//! [`TrackingAllocator`] wraps the system allocator and records every block a
//! pool takes. Share one tracker between pools through
//! [`Pool::with_allocator`](crate::Pool::with_allocator), read a
//! [`report`](TrackingAllocator::report) at any time, or let a background
//! thread log one periodically with [`start_flush`](TrackingAllocator::start_flush).
//!
//! ```
//! use std::sync::Arc;
//!
//! use pooljson::{Pool, PoolOptions, TrackingAllocator};
//!
//! let tracker = Arc::new(TrackingAllocator::new("requests"));
//! let pool = Pool::with_allocator(PoolOptions::default(), tracker.clone());
//! pool.alloc(100_000);
//! assert_eq!(tracker.report().live_blocks, 2);
//! drop(pool);
//! assert_eq!(tracker.report().live_bytes, 0);
//! ```

use std::{
    alloc::Layout,
    collections::HashMap,
    fmt,
    ptr::NonNull,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::pool::{BlockAllocator, SystemAllocator};

/// A [`BlockAllocator`] that keeps a ledger of live blocks.
pub struct TrackingAllocator {
    label: String,
    ledger: Mutex<Ledger>,
}

#[derive(Default)]
struct Ledger {
    live: HashMap<usize, usize>,
    live_bytes: usize,
    peak_bytes: usize,
    allocations: u64,
    deallocations: u64,
}

/// A snapshot of a [`TrackingAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationReport {
    /// The tracker's label.
    pub label: String,
    /// Blocks allocated and not yet released.
    pub live_blocks: usize,
    /// Bytes held by the live blocks.
    pub live_bytes: usize,
    /// Largest value `live_bytes` has reached.
    pub peak_bytes: usize,
    /// Blocks handed out so far.
    pub allocations: u64,
    /// Blocks released so far.
    pub deallocations: u64,
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} live blocks, {} live bytes, {} peak bytes ({} allocated, {} freed)",
            self.label,
            self.live_blocks,
            self.live_bytes,
            self.peak_bytes,
            self.allocations,
            self.deallocations
        )
    }
}

impl TrackingAllocator {
    /// Creates a tracker. `label` names it in reports and log lines.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// The label given to [`TrackingAllocator::new`].
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current totals.
    #[must_use]
    pub fn report(&self) -> AllocationReport {
        let ledger = self.ledger.lock();
        AllocationReport {
            label: self.label.clone(),
            live_blocks: ledger.live.len(),
            live_bytes: ledger.live_bytes,
            peak_bytes: ledger.peak_bytes,
            allocations: ledger.allocations,
            deallocations: ledger.deallocations,
        }
    }

    /// Logs the current report, as a warning when blocks are still live.
    /// Meant for shutdown, once every pool using the tracker is gone.
    pub fn finish(&self) -> AllocationReport {
        let report = self.report();
        if report.live_blocks > 0 {
            tracing::warn!(
                label = %report.label,
                live_blocks = report.live_blocks,
                live_bytes = report.live_bytes,
                "pool blocks still live at shutdown"
            );
        } else {
            tracing::info!(label = %report.label, peak_bytes = report.peak_bytes, "all pool blocks released");
        }
        report
    }

    /// Spawns a thread that logs a report every `interval` until the
    /// returned handle is stopped or dropped.
    pub fn start_flush(self: &Arc<Self>, interval: Duration) -> FlushHandle {
        let tracker = Arc::clone(self);
        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name(format!("pooljson-tracking-{}", self.label))
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => tracker.flush(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracker.flush();
            });
        let worker = match spawned {
            Ok(worker) => Some(worker),
            Err(err) => {
                tracing::warn!(label = %self.label, %err, "could not start the tracking flush thread");
                None
            }
        };
        FlushHandle {
            stop: Some(stop),
            worker,
        }
    }

    fn flush(&self) {
        let report = self.report();
        tracing::info!(
            label = %report.label,
            live_blocks = report.live_blocks,
            live_bytes = report.live_bytes,
            peak_bytes = report.peak_bytes,
            allocations = report.allocations,
            deallocations = report.deallocations,
            "pool allocation report"
        );
    }
}

impl fmt::Debug for TrackingAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrackingAllocator").field(&self.report()).finish()
    }
}

impl BlockAllocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        let block = SystemAllocator.allocate(layout);
        let mut ledger = self.ledger.lock();
        ledger.live.insert(block.as_ptr() as usize, layout.size());
        ledger.live_bytes += layout.size();
        ledger.peak_bytes = ledger.peak_bytes.max(ledger.live_bytes);
        ledger.allocations += 1;
        block
    }

    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout) {
        {
            let mut ledger = self.ledger.lock();
            if let Some(size) = ledger.live.remove(&(block.as_ptr() as usize)) {
                ledger.live_bytes -= size;
                ledger.deallocations += 1;
            } else {
                tracing::warn!(label = %self.label, "releasing a block this tracker never issued");
            }
        }
        // SAFETY: forwarded from the caller.
        unsafe { SystemAllocator.deallocate(block, layout) }
    }
}

/// Stops the flush thread of [`TrackingAllocator::start_flush`] when stopped
/// or dropped. The thread logs one final report on the way out.
#[derive(Debug)]
pub struct FlushHandle {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl FlushHandle {
    /// Signals the thread and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FlushHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
