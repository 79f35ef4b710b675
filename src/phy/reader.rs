//! Start-bit detection and serial-to-byte conversion, shared by every
//! engine that listens to the card.

use crate::warn;

/// Which line(s) a [`BitReader`] listens to.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Source {
    /// The CMD line.
    Cmd,
    /// DAT[width-1:0].
    Data,
}

/// Deserialises 1 or 4 lines into bytes.
///
/// The reader idles until every sampled line is low (the start condition),
/// then packs each following sample into a byte, first sample in the most
/// significant position. With `skip_start_bit` the start sample itself is
/// dropped; otherwise it becomes the top bit(s) of the first byte.
///
/// Completed bytes wait in a one-deep output buffer until the owning engine
/// takes them.
#[derive(Debug)]
pub struct BitReader {
    source: Source,
    width: u8,
    skip_start_bit: bool,
    run: bool,
    shift: u8,
    bits: u8,
    out: Option<u8>,
}

impl BitReader {
    /// Create a reader on `source`, `width` bits per cycle (1 or 4).
    pub const fn new(source: Source, width: u8, skip_start_bit: bool) -> BitReader {
        BitReader {
            source,
            width,
            skip_start_bit,
            run: false,
            shift: 0,
            bits: 0,
            out: None,
        }
    }

    /// Disarm and wait for a fresh start condition.
    pub fn reset(&mut self) {
        self.run = false;
        self.shift = 0;
        self.bits = 0;
        self.out = None;
    }

    /// Has the start condition been seen since the last reset?
    pub fn started(&self) -> bool {
        self.run
    }

    /// The completed byte waiting in the output buffer, if any.
    pub fn peek(&self) -> Option<u8> {
        self.out
    }

    /// Take the completed byte out of the output buffer.
    pub fn take(&mut self) -> Option<u8> {
        self.out.take()
    }

    fn select(&self, cmd: bool, data: u8) -> u8 {
        let mask = (1u8 << self.width) - 1;
        match self.source {
            Source::Cmd => u8::from(cmd) & mask,
            Source::Data => data & mask,
        }
    }

    /// Sample the lines for one line cycle.
    pub fn sample(&mut self, cmd: bool, data: u8) {
        let value = self.select(cmd, data);
        let start = value == 0;
        let feed = if self.skip_start_bit {
            self.run
        } else {
            start || self.run
        };
        self.run |= start;
        if !feed {
            return;
        }

        self.shift = (self.shift << self.width) | value;
        self.bits += self.width;
        if self.bits >= 8 {
            self.bits = 0;
            if self.out.is_some() {
                warn!("{:?} reader overrun, dropped {:x}", self.source, self.shift);
            } else {
                self.out = Some(self.shift);
            }
            self.shift = 0;
        }
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
