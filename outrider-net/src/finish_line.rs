use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// FinishLine
// ---------------------------------------------------------------------------

/// Arbitrates which of several racing completions produces the final result.
///
/// Strong participants are the racing attempts themselves; weak participants
/// are the deadline timer and the external cancel path.  Whichever admission
/// succeeds first — strong or weak — is the canonical winner; every later
/// admission of either kind fails.  A weak participant can therefore preempt
/// attempts that have not produced a result yet, which is exactly what lets
/// a timeout fire while a slow attempt is still waiting on a lease.
///
/// Admission is a single compare-and-swap, never a lock, so it is safe to
/// call from the hot completion path without stalling the reactor.
///
/// Separately from the race, the line carries an idempotent `done` latch so
/// that one-time teardown (registry erase, final accounting) runs exactly
/// once no matter how many paths reach it.
#[derive(Debug)]
pub struct FinishLine {
    // ---
    state: AtomicU8,
    done: AtomicBool,
}

// ---

const OPEN: u8 = 0;
const STRONG_WON: u8 = 1;
const WEAK_WON: u8 = 2;

// ---

impl FinishLine {
    // ---
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            done: AtomicBool::new(false),
        }
    }

    // ---

    /// Claim the race as a strong participant (a completed attempt).
    ///
    /// Returns `true` for exactly one admission across all participants; the
    /// caller that gets `true` owns producing the outcome.
    pub fn admit_strong(&self) -> bool {
        self.state
            .compare_exchange(OPEN, STRONG_WON, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // ---

    /// Claim the race as a weak participant (deadline or external cancel).
    ///
    /// Same exclusivity as [`admit_strong`](Self::admit_strong); fails once
    /// any admission of either kind has already won.
    pub fn admit_weak(&self) -> bool {
        self.state
            .compare_exchange(OPEN, WEAK_WON, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // ---

    /// Has any participant been admitted yet?
    pub fn is_decided(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    /// Did a weak participant win the race?
    pub fn weak_won(&self) -> bool {
        self.state.load(Ordering::Acquire) == WEAK_WON
    }

    // ---

    /// One-time teardown latch.  Returns `true` for the first caller only;
    /// safe to call from any number of cleanup paths.
    pub fn mark_done_at_least_once(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }
}

// ---

impl Default for FinishLine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use super::*;

    // ---

    #[test]
    fn first_strong_admission_wins() {
        // ---
        let line = FinishLine::new();
        assert!(!line.is_decided());

        assert!(line.admit_strong());
        assert!(line.is_decided());
        assert!(!line.weak_won());

        assert!(!line.admit_strong(), "second strong admission must fail");
        assert!(!line.admit_weak(), "weak after strong must fail");
    }

    // ---

    #[test]
    fn weak_admission_blocks_later_strong() {
        // ---
        let line = FinishLine::new();

        assert!(line.admit_weak());
        assert!(line.weak_won());
        assert!(!line.admit_strong(), "strong after weak must fail");
        assert!(!line.admit_weak(), "second weak must fail");
    }

    // ---

    #[test]
    fn done_latch_fires_once() {
        // ---
        let line = FinishLine::new();
        assert!(line.mark_done_at_least_once());
        assert!(!line.mark_done_at_least_once());
        assert!(!line.mark_done_at_least_once());
    }

    // ---

    /// Two threads race a strong admission 10 000 times; every iteration must
    /// admit exactly one of them — never zero, never two.
    #[test]
    fn racing_strong_admissions_admit_exactly_one() {
        // ---
        const ITERATIONS: usize = 10_000;

        for _ in 0..ITERATIONS {
            let line = Arc::new(FinishLine::new());
            let barrier = Arc::new(Barrier::new(2));
            let admitted = Arc::new(AtomicUsize::new(0));

            std::thread::scope(|s| {
                for _ in 0..2 {
                    let line = Arc::clone(&line);
                    let barrier = Arc::clone(&barrier);
                    let admitted = Arc::clone(&admitted);
                    s.spawn(move || {
                        barrier.wait();
                        if line.admit_strong() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(admitted.load(Ordering::SeqCst), 1);
        }
    }

    // ---

    /// Mixed strong/weak race: exactly one admission total, and the winner
    /// kind matches what the line reports afterwards.
    #[test]
    fn racing_strong_and_weak_admit_exactly_one() {
        // ---
        const ITERATIONS: usize = 10_000;

        for _ in 0..ITERATIONS {
            let line = Arc::new(FinishLine::new());
            let barrier = Arc::new(Barrier::new(2));
            let strong_won = Arc::new(AtomicUsize::new(0));
            let weak_won = Arc::new(AtomicUsize::new(0));

            std::thread::scope(|s| {
                let l = Arc::clone(&line);
                let b = Arc::clone(&barrier);
                let w = Arc::clone(&strong_won);
                s.spawn(move || {
                    b.wait();
                    if l.admit_strong() {
                        w.fetch_add(1, Ordering::SeqCst);
                    }
                });

                let l = Arc::clone(&line);
                let b = Arc::clone(&barrier);
                let w = Arc::clone(&weak_won);
                s.spawn(move || {
                    b.wait();
                    if l.admit_weak() {
                        w.fetch_add(1, Ordering::SeqCst);
                    }
                });
            });

            let strong = strong_won.load(Ordering::SeqCst);
            let weak = weak_won.load(Ordering::SeqCst);
            assert_eq!(strong + weak, 1, "exactly one admission per race");
            assert_eq!(weak == 1, line.weak_won());
        }
    }
}
