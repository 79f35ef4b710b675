//! The down-counter bounding every wait for the card.

/// Reloaded when an operation is armed, decremented once per line cycle.
///
/// `step` reports expiry when the counter has already reached zero, so a
/// reload of `n` allows `n` full cycles and fires on cycle `n + 1`.
#[derive(Debug)]
pub struct Timeout {
    reload: u32,
    remaining: u32,
}

impl Timeout {
    /// A counter that reloads to `cycles`.
    pub const fn new(cycles: u32) -> Timeout {
        Timeout {
            reload: cycles,
            remaining: cycles,
        }
    }

    /// Start counting from the top again.
    pub fn reload(&mut self) {
        self.remaining = self.reload;
    }

    /// Count one cycle. Returns `true` if the budget ran out.
    pub fn step(&mut self) -> bool {
        let expired = self.remaining == 0;
        self.remaining = self.remaining.wrapping_sub(1);
        expired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_after_reload_plus_one() {
        let mut t = Timeout::new(3);
        t.reload();
        assert!(!t.step());
        assert!(!t.step());
        assert!(!t.step());
        assert!(t.step());
    }

    #[test]
    fn reload_restarts() {
        let mut t = Timeout::new(1);
        t.reload();
        assert!(!t.step());
        t.reload();
        assert!(!t.step());
        assert!(t.step());
    }

    #[test]
    fn zero_fires_immediately() {
        let mut t = Timeout::new(0);
        t.reload();
        assert!(t.step());
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
