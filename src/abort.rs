//! Cooperative cancellation primitives shared across the pipeline (spec §4.3.6, §5).
//!
//! The core never spawns threads itself; cancellation is a callback the host
//! polls into at specified cadences, so a single-threaded embedded caller can
//! interleave layout work with other duties (input polling, low-battery
//! checks) without the core ever blocking on I/O it doesn't own.

/// Polled to ask whether the current operation should stop early.
///
/// Implementations should be cheap (an atomic load, a deadline check) since
/// they are called on tight loop cadences during layout and parsing.
pub trait ShouldAbort {
    fn should_abort(&self) -> bool;
}

impl<F: Fn() -> bool> ShouldAbort for F {
    fn should_abort(&self) -> bool {
        self()
    }
}

/// Never aborts. Used by callers that always want a complete run (tests,
/// non-interactive batch conversion).
pub struct NeverAbort;

impl ShouldAbort for NeverAbort {
    fn should_abort(&self) -> bool {
        false
    }
}

/// Always aborts on the first poll. Useful as a test double for exercising
/// suspend/resume paths without constructing a real deadline.
pub struct AlwaysAbort;

impl ShouldAbort for AlwaysAbort {
    fn should_abort(&self) -> bool {
        true
    }
}

/// Polling cadence for a cooperative loop: call `should_abort` every `every`
/// iterations rather than every iteration, to keep the check's overhead
/// negligible relative to the per-iteration work.
pub struct PollCadence {
    every: u32,
    counter: u32,
}

impl PollCadence {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    /// Advance the cadence by one unit of work; returns true on iterations
    /// where the caller should actually check `should_abort`. Fires on the
    /// very first tick (so a cancellation requested before any work started
    /// is honored immediately) and every `every` ticks after that, matching
    /// the "at least every N" wording of the cooperative-yield spec: this is
    /// an upper bound on the gap between checks, not a lower bound.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter == 1 || self.counter >= self.every {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

/// Cadence for the Knuth-Plass DP outer loop (spec §4.1.1, §5): every 100 words.
pub const DP_POLL_CADENCE: u32 = 100;

/// Cadence for greedy line composition (spec §4.1.1, §5): every 200 words.
pub const GREEDY_POLL_CADENCE: u32 = 200;

/// Cadence for the soft-hyphen pre-split pass (spec §5): every 50 words.
pub const PRESPLIT_POLL_CADENCE: u32 = 50;

/// Cadence for the page-assembler line sink (spec §4.1.1, §5): every 50 emitted lines.
pub const LINE_SINK_POLL_CADENCE: u32 = 50;

/// Cadence for the SAX parse loop (spec §4.3.6): every 128 buffer reads. Not
/// pinned to a specific count by the component design; chosen to keep the
/// per-check overhead negligible relative to per-event parsing cost.
pub const PARSE_POLL_CADENCE: u32 = 128;
