//! The SD line protocol engine.
//!
//! Two clock domains meet here. [`SdPhy::tick`] is the control domain: it is
//! called once per control clock cycle and is where requests are queued and
//! results collected. The line domain is every engine below this module; it
//! only advances on rising edges of the divided line clock. The single-slot
//! [`Handoff`] buffers are the only thing both sides touch.

mod clocker;
mod cmd;
mod data;
mod init;
mod reader;
mod timeout;

pub use self::clocker::LineClock;
pub use self::reader::{BitReader, Source};

use self::{
    cmd::{CommandReader, CommandWriter},
    data::{DataReader, DataWriter},
    init::Initializer,
};
use crate::{
    debug,
    pads::{arbitrate, Card, NoCardDetect, PadsIn, PadsOut},
    stream::{CommandReadRequest, DataReadRequest, Handoff, ReadByte, StreamByte},
    trace,
};

// =============================================================================
// Types
// =============================================================================

/// Construction-time options.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhyOptions {
    /// Frequency of the control clock, in Hz.
    pub clk_freq_hz: u32,
    /// How long the card gets to start (and finish) a response, in µs.
    pub cmd_timeout_us: u32,
    /// How long the card gets to start (and finish) a data block, in µs.
    pub data_timeout_us: u32,
}

impl PhyOptions {
    /// Reload value of the command timeout counter.
    pub fn cmd_timeout_cycles(&self) -> u32 {
        Self::cycles(self.clk_freq_hz, self.cmd_timeout_us)
    }

    /// Reload value of the data timeout counter.
    pub fn data_timeout_cycles(&self) -> u32 {
        Self::cycles(self.clk_freq_hz, self.data_timeout_us)
    }

    fn cycles(clk_freq_hz: u32, timeout_us: u32) -> u32 {
        let cycles = u64::from(clk_freq_hz) * u64::from(timeout_us) / 1_000_000;
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }
}

impl Default for PhyOptions {
    fn default() -> Self {
        PhyOptions {
            clk_freq_hz: 50_000_000,
            cmd_timeout_us: 5_000,
            data_timeout_us: 5_000,
        }
    }
}

/// The possible errors this crate can generate.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The handoff slot is still occupied; try again after the next tick
    WouldBlock,
    /// Couldn't read the card detect pin
    CardDetect,
}

/// What the card said about the most recently written block.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrcStatus {
    /// Any token other than "bad CRC".
    Valid,
    /// The card reported a CRC mismatch.
    Error,
}

/// Index of each engine in [`SdPhy::drivers`].
pub mod driver {
    /// Power-up sequencer.
    pub const INIT: usize = 0;
    /// Command writer.
    pub const CMD_WRITE: usize = 1;
    /// Command reader.
    pub const CMD_READ: usize = 2;
    /// Data writer.
    pub const DATA_WRITE: usize = 3;
    /// Data reader.
    pub const DATA_READ: usize = 4;
}

#[derive(Debug, Default)]
struct Streams {
    cmd_write: Handoff<StreamByte>,
    cmd_read: Handoff<CommandReadRequest>,
    cmd_result: Handoff<ReadByte>,
    data_write: Handoff<StreamByte>,
    data_read: Handoff<DataReadRequest>,
    data_result: Handoff<ReadByte>,
}

/// An SD card PHY: line clock, power-up sequencer and the four protocol
/// engines, plus the handoffs that feed them.
///
/// `CD` is the card detect input, active low. Use [`SdPhy::new`] if the
/// board has none.
#[derive(Debug)]
pub struct SdPhy<CD = NoCardDetect> {
    options: PhyOptions,
    clock: LineClock,
    in_reset: bool,
    init_pending: bool,
    init: Initializer,
    cmdw: CommandWriter,
    cmdr: CommandReader,
    dataw: DataWriter,
    datar: DataReader,
    streams: Streams,
    drivers: [PadsOut; 5],
    line_cycles: u64,
    card_detect: CD,
}

// =============================================================================
// Implementations
// =============================================================================

impl SdPhy<NoCardDetect> {
    /// Create a PHY for a board without a card detect pin.
    ///
    /// The line clock starts disabled, with the default divider.
    pub fn new(options: PhyOptions) -> SdPhy<NoCardDetect> {
        Self::new_with_card_detect(options, NoCardDetect)
    }
}

impl<CD> SdPhy<CD>
where
    CD: embedded_hal::digital::InputPin,
{
    /// Create a PHY that reads card presence from `card_detect`.
    pub fn new_with_card_detect(options: PhyOptions, card_detect: CD) -> SdPhy<CD> {
        debug!(
            "sdphy: {:?}, timeouts {}/{} cycles",
            options,
            options.cmd_timeout_cycles(),
            options.data_timeout_cycles()
        );
        SdPhy {
            options,
            clock: LineClock::new(),
            in_reset: true,
            init_pending: false,
            init: Initializer::new(),
            cmdw: CommandWriter::new(),
            cmdr: CommandReader::new(options.cmd_timeout_cycles()),
            dataw: DataWriter::new(),
            datar: DataReader::new(options.data_timeout_cycles()),
            streams: Streams::default(),
            drivers: [PadsOut::RELEASED; 5],
            line_cycles: 0,
            card_detect,
        }
    }

    /// The options this PHY was built with.
    pub fn options(&self) -> &PhyOptions {
        &self.options
    }

    // -------------------------------------------------------------------------
    // Control registers
    // -------------------------------------------------------------------------

    /// Start or stop the line clock. Stopping it holds every engine in reset.
    pub fn set_clock_enable(&mut self, enable: bool) {
        debug!("sdphy: line clock {}", if enable { "on" } else { "off" });
        self.clock.set_enable(enable);
    }

    /// Is the line clock running?
    pub fn clock_enabled(&self) -> bool {
        self.clock.enabled()
    }

    /// Load the line clock divider. Values that aren't a power of two run
    /// the line clock at half the control clock.
    pub fn set_divider(&mut self, divider: u8) {
        self.clock.set_divider(divider);
    }

    /// Current line clock divider.
    pub fn divider(&self) -> u8 {
        self.clock.divider()
    }

    /// Resulting line clock frequency, in Hz.
    pub fn line_clock_hz(&self) -> u32 {
        self.clock.line_clock_hz(self.options.clk_freq_hz)
    }

    /// Trigger the power-up sequence. It starts on the first line cycle
    /// with no transfer under way.
    pub fn initialize(&mut self) {
        self.init_pending = true;
    }

    /// Is a card in the slot?
    pub fn card_present(&mut self) -> Result<bool, Error> {
        self.card_detect.is_low().map_err(|_| Error::CardDetect)
    }

    /// CRC status of the most recent written block, `None` until a write
    /// completed. Cleared when the next write starts.
    pub fn crc_status(&self) -> Option<CrcStatus> {
        self.dataw.crc_status()
    }

    // -------------------------------------------------------------------------
    // Streams
    // -------------------------------------------------------------------------

    /// Queue one byte of an outgoing command.
    pub fn write_command(&mut self, byte: StreamByte) -> Result<(), Error> {
        self.streams
            .cmd_write
            .offer(byte)
            .map_err(|_| Error::WouldBlock)
    }

    /// Ask for a response from the card.
    pub fn read_response(&mut self, request: CommandReadRequest) -> Result<(), Error> {
        self.streams
            .cmd_read
            .offer(request)
            .map_err(|_| Error::WouldBlock)
    }

    /// Collect the next response byte, if one arrived.
    pub fn poll_response(&mut self) -> Option<ReadByte> {
        self.streams.cmd_result.accept()
    }

    /// Queue one byte of an outgoing data block.
    pub fn write_data(&mut self, byte: StreamByte) -> Result<(), Error> {
        self.streams
            .data_write
            .offer(byte)
            .map_err(|_| Error::WouldBlock)
    }

    /// Ask for a data block from the card.
    pub fn read_block(&mut self, request: DataReadRequest) -> Result<(), Error> {
        self.streams
            .data_read
            .offer(request)
            .map_err(|_| Error::WouldBlock)
    }

    /// Collect the next data byte, if one arrived.
    pub fn poll_data(&mut self) -> Option<ReadByte> {
        self.streams.data_result.accept()
    }

    // -------------------------------------------------------------------------
    // Clocking
    // -------------------------------------------------------------------------

    /// Run one control clock cycle with the card presenting `pads`.
    ///
    /// Returns the bus output if this cycle was a line clock edge.
    pub fn tick(&mut self, pads: PadsIn) -> Option<PadsOut> {
        let edge = self.clock.tick();
        if !self.clock.enabled() {
            if !self.in_reset {
                self.reset_line_domain();
            }
            self.init_pending = false;
            return None;
        }
        self.in_reset = false;
        if !edge {
            return None;
        }
        self.line_cycles += 1;

        // Each line has one owner per cycle. The power-up sequence waits for
        // a quiet bus, and no engine starts while it runs.
        let quiet = self.cmdw.done(&self.streams.cmd_write)
            && self.cmdr.is_idle()
            && self.dataw.is_idle()
            && self.streams.data_write.is_empty()
            && self.datar.is_idle();
        let trigger = self.init_pending && quiet;
        if trigger {
            self.init_pending = false;
        }
        let init_busy = trigger || self.init.busy();
        let writer_done = self.cmdw.done(&self.streams.cmd_write);
        let cmd_hold = init_busy || !self.cmdr.is_idle();
        let streams = &mut self.streams;
        self.drivers = [
            self.init.tick(trigger),
            self.cmdw.tick(&mut streams.cmd_write, cmd_hold),
            self.cmdr.tick(
                &mut streams.cmd_read,
                &mut streams.cmd_result,
                writer_done && !init_busy,
                pads,
            ),
            self.dataw.tick(&mut streams.data_write, init_busy, pads),
            self.datar
                .tick(&mut streams.data_read, &mut streams.data_result, pads),
        ];
        Some(arbitrate(&self.drivers))
    }

    /// Run one control clock cycle against `card`.
    pub fn step<C>(&mut self, card: &mut C) -> Option<PadsOut>
    where
        C: Card,
    {
        let out = self.tick(card.drive());
        if let Some(pads) = &out {
            card.clock(pads);
        }
        out
    }

    /// Per-engine bus outputs of the most recent line cycle, indexed by the
    /// constants in [`driver`].
    pub fn drivers(&self) -> &[PadsOut; 5] {
        &self.drivers
    }

    /// Line cycles run since construction.
    pub fn line_cycles(&self) -> u64 {
        self.line_cycles
    }

    /// Nothing queued, nothing in flight.
    pub fn is_idle(&self) -> bool {
        !self.init_pending
            && !self.init.busy()
            && self.cmdw.done(&self.streams.cmd_write)
            && self.cmdr.is_idle()
            && self.dataw.is_idle()
            && self.datar.is_idle()
            && self.streams.cmd_read.is_empty()
            && self.streams.data_write.is_empty()
            && self.streams.data_read.is_empty()
    }

    fn reset_line_domain(&mut self) {
        trace!("sdphy: line domain reset");
        self.in_reset = true;
        self.init_pending = false;
        self.init.reset();
        self.cmdw.reset();
        self.cmdr.reset();
        self.dataw.reset();
        self.datar.reset();
        self.drivers = [PadsOut::RELEASED; 5];
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
