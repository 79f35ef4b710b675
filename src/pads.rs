//! The line bus: what the card drives, what the engine drives, and how the
//! per-engine outputs are combined onto the shared lines.

use core::convert::Infallible;

/// Levels the card presents on its lines during one line cycle.
///
/// Undriven lines read high (pull-ups).
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PadsIn {
    /// CMD line.
    pub cmd: bool,
    /// DAT[3:0]; only the low four bits are meaningful.
    pub data: u8,
}

impl PadsIn {
    /// Nobody drives anything.
    pub const IDLE: PadsIn = PadsIn {
        cmd: true,
        data: 0b1111,
    };
}

impl Default for PadsIn {
    fn default() -> Self {
        PadsIn::IDLE
    }
}

/// What one engine wants on the lines for the current line cycle.
///
/// The all-false value means "this engine is not using the bus".
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PadsOut {
    /// Forward the line clock to the card during this cycle.
    pub clk: bool,
    /// Drive the CMD line.
    pub cmd_oe: bool,
    /// CMD level when driven.
    pub cmd_o: bool,
    /// Drive DAT[3:0].
    pub data_oe: bool,
    /// DAT[3:0] levels when driven.
    pub data_o: u8,
}

impl PadsOut {
    /// Not using the bus.
    pub const RELEASED: PadsOut = PadsOut {
        clk: false,
        cmd_oe: false,
        cmd_o: false,
        data_oe: false,
        data_o: 0,
    };

    /// Clock the card, drive nothing.
    pub const CLOCK: PadsOut = PadsOut {
        clk: true,
        ..PadsOut::RELEASED
    };

    /// Clock the card and drive `level` on CMD.
    pub const fn cmd(level: bool) -> PadsOut {
        PadsOut {
            clk: true,
            cmd_oe: true,
            cmd_o: level,
            ..PadsOut::RELEASED
        }
    }

    /// Clock the card and drive `nibble` on DAT[3:0].
    pub const fn data(nibble: u8) -> PadsOut {
        PadsOut {
            clk: true,
            data_oe: true,
            data_o: nibble & 0x0F,
            ..PadsOut::RELEASED
        }
    }

    /// Does this output drive any line?
    pub fn drives_any(&self) -> bool {
        self.cmd_oe || self.data_oe
    }

    fn or(self, other: PadsOut) -> PadsOut {
        PadsOut {
            clk: self.clk | other.clk,
            cmd_oe: self.cmd_oe | other.cmd_oe,
            cmd_o: self.cmd_o | other.cmd_o,
            data_oe: self.data_oe | other.data_oe,
            data_o: self.data_o | other.data_o,
        }
    }
}

/// Merge the outputs of every engine onto the shared bus.
///
/// This is a plain OR of each field. It is only meaningful because the
/// engines never drive the same line in the same cycle; nothing here checks
/// that.
pub fn arbitrate(drivers: &[PadsOut]) -> PadsOut {
    drivers
        .iter()
        .fold(PadsOut::RELEASED, |acc, drv| acc.or(*drv))
}

/// The far side of the line bus.
///
/// On hardware this is the pad/tristate layer; in tests it is a model of a
/// card.
pub trait Card {
    /// Levels for the line cycle about to be sampled.
    fn drive(&mut self) -> PadsIn;

    /// Called at the end of every line cycle with the arbitrated host
    /// output. The card should only advance when `pads.clk` is set.
    fn clock(&mut self, pads: &PadsOut);
}

/// Card detect input for boards without a card detect pin.
///
/// The pin is active low; this one always reads low, so a card is always
/// assumed present.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoCardDetect;

impl embedded_hal::digital::ErrorType for NoCardDetect {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for NoCardDetect {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arbitrate_empty_is_released() {
        assert_eq!(arbitrate(&[]), PadsOut::RELEASED);
    }

    #[test]
    fn arbitrate_merges_disjoint_drivers() {
        let merged = arbitrate(&[
            PadsOut::RELEASED,
            PadsOut::cmd(true),
            PadsOut::RELEASED,
            PadsOut::CLOCK,
        ]);
        assert!(merged.clk);
        assert!(merged.cmd_oe);
        assert!(merged.cmd_o);
        assert!(!merged.data_oe);
    }

    #[test]
    fn data_is_masked_to_four_lines() {
        assert_eq!(PadsOut::data(0xFA).data_o, 0x0A);
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
