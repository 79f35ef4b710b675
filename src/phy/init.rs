//! Power-up sequence: clock the card with every line held high.

use crate::{debug, pads::PadsOut, proto::INIT_CYCLES, trace};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Idle,
    Initialize,
}

/// Drives [`INIT_CYCLES`] clocked cycles of CMD and DAT[3:0] high once
/// triggered.
#[derive(Debug)]
pub struct Initializer {
    state: State,
    count: u16,
}

impl Initializer {
    /// An idle sequencer.
    pub const fn new() -> Initializer {
        Initializer {
            state: State::Idle,
            count: 0,
        }
    }

    /// Back to idle, abandoning any sequence in progress.
    pub fn reset(&mut self) {
        *self = Initializer::new();
    }

    /// Is the sequence running?
    pub fn busy(&self) -> bool {
        self.state != State::Idle
    }

    /// One line cycle. `trigger` is the synchronised one-shot from the
    /// control side.
    pub fn tick(&mut self, trigger: bool) -> PadsOut {
        match self.state {
            State::Idle => {
                self.count = 0;
                if trigger {
                    debug!("init: {} cycles", INIT_CYCLES);
                    self.state = State::Initialize;
                }
                PadsOut::RELEASED
            }
            State::Initialize => {
                self.count += 1;
                if self.count == INIT_CYCLES {
                    trace!("init: done");
                    self.state = State::Idle;
                }
                PadsOut {
                    clk: true,
                    cmd_oe: true,
                    cmd_o: true,
                    data_oe: true,
                    data_o: 0b1111,
                }
            }
        }
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Initializer::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eighty_cycles_all_high() {
        let mut init = Initializer::new();
        assert_eq!(init.tick(false), PadsOut::RELEASED);
        assert_eq!(init.tick(true), PadsOut::RELEASED);
        let mut driven = 0;
        loop {
            let out = init.tick(false);
            if !out.clk {
                break;
            }
            assert!(out.cmd_oe && out.cmd_o);
            assert!(out.data_oe);
            assert_eq!(out.data_o, 0b1111);
            driven += 1;
        }
        assert_eq!(driven, 80);
        assert!(!init.busy());
    }

    #[test]
    fn retrigger_runs_again() {
        let mut init = Initializer::new();
        init.tick(true);
        for _ in 0..80 {
            init.tick(false);
        }
        assert!(!init.busy());
        init.tick(true);
        assert!(init.busy());
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
