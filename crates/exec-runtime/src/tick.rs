//! The shared tick counter between the timer notification context and the
//! executive loop.
//!
//! Two execution contexts touch this counter and nothing else is shared
//! between them:
//!
//! - **Notification context** (signal handler or timer thread): calls
//!   [`TickCounter::notify`] once per timer expiry. Nothing here may block,
//!   allocate, perform I/O, or call into the dispatcher; the entire
//!   permitted operation set in that context is this one atomic increment.
//! - **Loop context**: calls [`TickCounter::take`] once per iteration,
//!   reading and resetting the counter in a single indivisible swap so no
//!   concurrent increment can be lost.
//!
//! Relaxed ordering is sufficient: the counter carries no payload that
//! other memory has to be synchronized with, it only reports how many
//! expirations accrued.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};

/// Count of timer expirations not yet serviced by the executive loop.
#[derive(Debug)]
pub struct TickCounter {
    pending: CachePadded<AtomicU32>,
}

impl TickCounter {
    /// Create a counter with no pending ticks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Record one timer expiry.
    ///
    /// The only operation permitted in the notification context.
    #[inline]
    pub fn notify(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset the counter in one indivisible operation.
    ///
    /// Called from the loop context once per iteration. An increment that
    /// races with the swap lands in the next iteration's value; none is
    /// ever lost.
    #[inline]
    pub fn take(&self) -> u32 {
        self.pending.swap(0, Ordering::Relaxed)
    }

    /// Peek at the pending count without consuming it (diagnostics only).
    #[inline]
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Relaxed)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}
