use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

///
/// Peterson's algorithm: software mutual exclusion for exactly two
/// participants, with no OS blocking primitive.
///
// Each participant owns an intent flag; a shared turn token breaks the tie
// when both want in. A participant spins while the other intends to enter
// AND it is the other's turn - either condition clearing lets it proceed.
// The turn token is overwritten by the later arrival, which is what grants
// the earlier arrival entry and bounds waiting to one of the peer's
// acquire/release cycles (starvation-freedom).
//
// Both guarantees hold for exactly two participants sharing one state
// block. pair() is the only constructor, so a third handle on the same
// state cannot be created.
//
// Acquire state machine, per participant:
//
//   idle ──acquire()──► wanting ──spin exits──► critical ──release()──► idle
//
// The spin is intentional: this is the textbook algorithm, not a
// production lock. A blocking-efficiency redesign would park the waiter
// (futex-style) instead of spinning, without changing the protocol.
//
struct PetersonState {
    // Padded: each participant hammers its own flag from its own core.
    flag: [CachePadded<AtomicBool>; 2],
    turn: CachePadded<AtomicUsize>,
}

impl PetersonState {
    fn new() -> Self {
        PetersonState {
            flag: [
                CachePadded::new(AtomicBool::new(false)),
                CachePadded::new(AtomicBool::new(false)),
            ],
            turn: CachePadded::new(AtomicUsize::new(0)),
        }
    }
}

/// One participant's handle on a shared Peterson lock.
///
/// Handles are created in pairs over one shared state block and are bound
/// to participant ids 0 and 1. Each handle belongs to one thread at a time;
/// the pair together forms the lock.
pub struct PetersonLock {
    state: Arc<PetersonState>,
    me: usize,
    other: usize,
}

impl PetersonLock {
    /// Create the two participant handles of a fresh lock.
    ///
    /// Every pair gets its own state block, so independent pairs coexist
    /// without interfering.
    pub fn pair() -> (PetersonLock, PetersonLock) {
        let state = Arc::new(PetersonState::new());
        (
            PetersonLock {
                state: Arc::clone(&state),
                me: 0,
                other: 1,
            },
            PetersonLock {
                state,
                me: 1,
                other: 0,
            },
        )
    }

    /// This handle's participant id (0 or 1).
    #[inline]
    pub fn id(&self) -> usize {
        self.me
    }

    /// Enter the critical section, busy-waiting until the peer yields.
    ///
    /// No timeout and no cancellation: a peer that acquired and never
    /// releases blocks this participant forever. That is the algorithm's
    /// documented limitation, not a detectable error.
    pub fn acquire(&self) {
        self.state.flag[self.me].store(true, Ordering::Release);
        self.state.turn.store(self.me, Ordering::Release);

        // The turn store must be globally ordered before the flag/turn
        // reads below. Release stores followed by Acquire loads still
        // permit that store-load reorder (a store buffer does exactly
        // this), and with it both participants can pass the spin at once.
        fence(Ordering::SeqCst);

        while self.state.flag[self.other].load(Ordering::Acquire)
            && self.state.turn.load(Ordering::Acquire) == self.other
        {
            std::hint::spin_loop();
        }

        // Nothing from the critical section may be reordered above the
        // spin exit.
        fence(Ordering::Acquire);
    }

    /// Leave the critical section.
    #[inline]
    pub fn release(&self) {
        self.state.flag[self.me].store(false, Ordering::Release);
    }

    /// Acquire and return a guard that releases on drop.
    pub fn lock(&self) -> PetersonGuard<'_> {
        self.acquire();
        PetersonGuard { lock: self }
    }
}

/// RAII guard: the critical section lasts as long as the guard lives.
pub struct PetersonGuard<'a> {
    lock: &'a PetersonLock,
}

impl Drop for PetersonGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
