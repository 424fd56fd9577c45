/// Bounded spin-then-yield budget for short cross-thread handoffs.
///
/// Used where one thread must wait for another to leave a critical window
/// that is known to be a few instructions long. It never parks: after the
/// spin phase it keeps yielding so a preempted peer gets CPU time.
#[derive(Copy, Clone, Debug)]
pub struct WaitBudget {
    spins: u32,
    spin_cap: u32,
    yields: u64,
}

impl WaitBudget {
    /// Budget tuned for a peer that is about to return from a poll.
    #[inline]
    pub fn handoff() -> Self {
        Self {
            spins: 0,
            spin_cap: 64,
            yields: 0,
        }
    }

    /// Number of times [`step`](Self::step) has yielded the thread so far.
    #[inline]
    pub fn yields(&self) -> u64 {
        self.yields
    }

    /// One wait step: spin while the budget lasts, then yield.
    #[inline]
    pub fn step(&mut self) {
        if self.spins < self.spin_cap {
            core::hint::spin_loop();
            self.spins += 1;
        } else {
            std::thread::yield_now();
            self.yields += 1;
        }
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::handoff()
    }
}
