//! Derives the line clock from the control clock.

use crate::{debug, proto::DEFAULT_DIVIDER};

/// Divider register, enable bit and the free-running counter they tap.
#[derive(Debug)]
pub struct LineClock {
    enable: bool,
    divider: u8,
    counter: u8,
    level: bool,
}

impl LineClock {
    /// A disabled clock with the default divider.
    pub const fn new() -> LineClock {
        LineClock {
            enable: false,
            divider: DEFAULT_DIVIDER,
            counter: 0,
            level: false,
        }
    }

    /// Gate the line clock. While disabled the line domain is held in reset.
    pub fn set_enable(&mut self, enable: bool) {
        self.enable = enable;
    }

    /// Is the line clock running?
    pub fn enabled(&self) -> bool {
        self.enable
    }

    /// Load the divider register. Any value is accepted.
    pub fn set_divider(&mut self, divider: u8) {
        debug!(
            "line clock divider {} -> counter bit {}",
            divider,
            Self::tap_for(divider)
        );
        self.divider = divider;
    }

    /// Current divider register.
    pub fn divider(&self) -> u8 {
        self.divider
    }

    /// Counter bit the line clock is taken from.
    ///
    /// Powers of two select bit `log2(divider)`; anything else (0 included)
    /// falls back to bit 0.
    pub fn tap_for(divider: u8) -> u32 {
        match divider {
            1 => 0,
            2 => 1,
            4 => 2,
            8 => 3,
            16 => 4,
            32 => 5,
            64 => 6,
            128 => 7,
            _ => 0,
        }
    }

    /// Line clock frequency for a control clock of `clk_freq_hz`.
    pub fn line_clock_hz(&self, clk_freq_hz: u32) -> u32 {
        clk_freq_hz / (2 << Self::tap_for(self.divider))
    }

    /// Advance one control cycle. Returns `true` when this cycle is a rising
    /// edge of the line clock.
    pub fn tick(&mut self) -> bool {
        self.counter = self.counter.wrapping_add(1);
        let level = (self.counter >> Self::tap_for(self.divider)) & 1 != 0;
        let rising = level && !self.level;
        self.level = level;
        rising && self.enable
    }
}

impl Default for LineClock {
    fn default() -> Self {
        LineClock::new()
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
