//! Scheduler statistics for debugging and performance analysis.
//!
//! Enable stats by compiling with the `render-stats` feature:
//! ```bash
//! cargo run --example calloop_host --features render-stats
//! ```
//!
//! Stats are printed at most once per second, at the end of a settled
//! run-loop cycle, showing:
//! - Transactions run vs revalidations skipped
//! - Roots rendered, deferred to the next pass, and attached
//! - Definition cache hits/misses
//! - Invalid sweeps and runaway renderers

/// Snapshot of accumulated scheduler statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub transactions: u64,
    pub revalidations_skipped: u64,
    pub roots_rendered: u64,
    pub roots_deferred: u64,
    pub roots_attached: u64,
    pub definition_cache_hits: u64,
    pub definition_cache_misses: u64,
    pub sweeps_retried: u64,
    pub runaway_destroyed: u64,
}

#[cfg(feature = "render-stats")]
mod inner {
    use std::cell::RefCell;
    use std::time::Instant;

    thread_local! {
        static STATS: RefCell<SchedulerStats> = RefCell::new(SchedulerStats::new());
    }

    struct SchedulerStats {
        // Transactions
        transactions: u64,
        revalidations_skipped: u64,
        // Roots
        roots_rendered: u64,
        roots_deferred: u64,
        roots_attached: u64,
        // Resolver
        definition_cache_hits: u64,
        definition_cache_misses: u64,
        // Sweeps
        sweeps_retried: u64,
        runaway_destroyed: u64,
        // Timing
        last_print: Instant,
    }

    impl SchedulerStats {
        fn new() -> Self {
            Self {
                transactions: 0,
                revalidations_skipped: 0,
                roots_rendered: 0,
                roots_deferred: 0,
                roots_attached: 0,
                definition_cache_hits: 0,
                definition_cache_misses: 0,
                sweeps_retried: 0,
                runaway_destroyed: 0,
                last_print: Instant::now(),
            }
        }

        fn reset(&mut self) {
            *self = Self::new();
        }
    }

    fn bump(f: impl FnOnce(&mut SchedulerStats)) {
        STATS.with(|s| f(&mut s.borrow_mut()));
    }

    /// Record a transaction over a renderer's roots.
    #[inline]
    pub fn record_transaction() {
        bump(|s| s.transactions += 1);
    }

    /// Record a revalidation that found the renderer still valid.
    #[inline]
    pub fn record_revalidate_skipped() {
        bump(|s| s.revalidations_skipped += 1);
    }

    #[inline]
    pub fn record_root_rendered() {
        bump(|s| s.roots_rendered += 1);
    }

    /// Record a root skipped because it was attached mid-pass.
    #[inline]
    pub fn record_root_deferred() {
        bump(|s| s.roots_deferred += 1);
    }

    #[inline]
    pub fn record_root_attached() {
        bump(|s| s.roots_attached += 1);
    }

    #[inline]
    pub fn record_definition_cache_hit() {
        bump(|s| s.definition_cache_hits += 1);
    }

    #[inline]
    pub fn record_definition_cache_miss() {
        bump(|s| s.definition_cache_misses += 1);
    }

    /// Record an end-of-cycle sweep that found an invalid renderer.
    #[inline]
    pub fn record_sweep_retried() {
        bump(|s| s.sweeps_retried += 1);
    }

    #[inline]
    pub fn record_runaway_destroyed() {
        bump(|s| s.runaway_destroyed += 1);
    }

    /// Return a snapshot of the current stats (for testing).
    pub fn get_stats() -> super::StatsSnapshot {
        STATS.with(|s| {
            let stats = s.borrow();
            super::StatsSnapshot {
                transactions: stats.transactions,
                revalidations_skipped: stats.revalidations_skipped,
                roots_rendered: stats.roots_rendered,
                roots_deferred: stats.roots_deferred,
                roots_attached: stats.roots_attached,
                definition_cache_hits: stats.definition_cache_hits,
                definition_cache_misses: stats.definition_cache_misses,
                sweeps_retried: stats.sweeps_retried,
                runaway_destroyed: stats.runaway_destroyed,
            }
        })
    }

    /// Reset all stats to zero (for test isolation).
    pub fn reset_stats() {
        STATS.with(|s| s.borrow_mut().reset());
    }

    /// Called when a sweep finds every renderer valid; prints stats at most once a second.
    pub fn end_cycle() {
        STATS.with(|s| {
            let mut stats = s.borrow_mut();
            if stats.last_print.elapsed().as_secs() < 1 {
                return;
            }

            let revalidations = stats.transactions + stats.revalidations_skipped;
            let skip_rate = if revalidations > 0 {
                (stats.revalidations_skipped as f64 / revalidations as f64) * 100.0
            } else {
                0.0
            };

            let lookups = stats.definition_cache_hits + stats.definition_cache_misses;
            let hit_rate = if lookups > 0 {
                (stats.definition_cache_hits as f64 / lookups as f64) * 100.0
            } else {
                0.0
            };

            eprintln!(
                "[Scheduler Stats] transactions={} skipped={} skip_rate={:.1}%",
                stats.transactions, stats.revalidations_skipped, skip_rate
            );
            eprintln!(
                "  roots: rendered={} deferred={} attached={}",
                stats.roots_rendered, stats.roots_deferred, stats.roots_attached
            );
            eprintln!(
                "  definitions: lookups={} hits={} misses={} hit_rate={:.1}%",
                lookups, stats.definition_cache_hits, stats.definition_cache_misses, hit_rate
            );
            if stats.sweeps_retried > 0 || stats.runaway_destroyed > 0 {
                eprintln!(
                    "  sweeps: retried={} runaway={}",
                    stats.sweeps_retried, stats.runaway_destroyed
                );
            }

            stats.reset();
        });
    }
}

#[cfg(feature = "render-stats")]
pub use inner::*;

// No-op implementations when feature is disabled - these get completely inlined away

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn get_stats() -> StatsSnapshot {
    StatsSnapshot::default()
}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn reset_stats() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_transaction() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_revalidate_skipped() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_root_rendered() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_root_deferred() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_root_attached() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_definition_cache_hit() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_definition_cache_miss() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_sweep_retried() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_runaway_destroyed() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn end_cycle() {}
