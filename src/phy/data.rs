//! Data line engines: the 4-bit block writer with its CRC status decoder,
//! and the 4-bit block reader.

use super::{
    reader::{BitReader, Source},
    timeout::Timeout,
    CrcStatus,
};
use crate::{
    debug,
    pads::{PadsIn, PadsOut},
    proto::{
        CrcToken, DATA_CRC_LEN, DATA_TRAILER_CYCLES, START_NIBBLE, STOP_NIBBLE,
        WRITE_RESPONSE_CYCLES,
    },
    stream::{DataReadRequest, Handoff, ReadByte, StreamByte},
    trace, warn,
};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CrcState {
    Idle,
    WaitCheck,
}

/// Listens on DAT0 for the CRC status token that follows a written block.
///
/// Each `start` pulse arms it for exactly one decision.
#[derive(Debug)]
pub struct CrcResponse {
    state: CrcState,
    reader: BitReader,
}

impl CrcResponse {
    /// An idle decoder.
    pub const fn new() -> CrcResponse {
        CrcResponse {
            state: CrcState::Idle,
            reader: BitReader::new(Source::Data, 1, true),
        }
    }

    /// Back to idle, discarding a pending decision.
    pub fn reset(&mut self) {
        self.state = CrcState::Idle;
        self.reader.reset();
    }

    /// One line cycle. A `start` pulse re-arms the decoder even if the
    /// previous token never arrived.
    pub fn tick(&mut self, start: bool, pads: PadsIn) -> Option<CrcStatus> {
        if start {
            self.reader.reset();
            self.state = CrcState::WaitCheck;
            return None;
        }
        match self.state {
            CrcState::Idle => None,
            CrcState::WaitCheck => {
                if let Some(byte) = self.reader.take() {
                    self.state = CrcState::Idle;
                    // The token is the first three bits after the start bit.
                    let token = CrcToken::from_bits(byte >> 5);
                    trace!("crc: token {:?}", token);
                    return Some(if token == CrcToken::CrcError {
                        CrcStatus::Error
                    } else {
                        CrcStatus::Valid
                    });
                }
                self.reader.sample(pads.cmd, pads.data);
                None
            }
        }
    }
}

impl Default for CrcResponse {
    fn default() -> Self {
        CrcResponse::new()
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum WriterState {
    Idle,
    Start,
    Data,
    Stop,
    Response,
}

/// Sends bytes as two nibbles on DAT[3:0], high nibble first.
///
/// The first byte of a transfer is preceded by the start nibble. After the
/// byte marked `last` the writer drives the stop nibble, collects the card's
/// CRC status, waits [`WRITE_RESPONSE_CYCLES`] cycles and then holds the
/// final byte until DAT0 goes high (busy released).
#[derive(Debug)]
pub struct DataWriter {
    state: WriterState,
    started: bool,
    count: u8,
    crc: CrcResponse,
    status: Option<CrcStatus>,
}

impl DataWriter {
    /// An idle writer.
    pub const fn new() -> DataWriter {
        DataWriter {
            state: WriterState::Idle,
            started: false,
            count: 0,
            crc: CrcResponse::new(),
            status: None,
        }
    }

    /// Back to idle. The last CRC status is kept.
    pub fn reset(&mut self) {
        self.state = WriterState::Idle;
        self.started = false;
        self.count = 0;
        self.crc.reset();
    }

    /// Is the writer between transfers?
    pub fn is_idle(&self) -> bool {
        self.state == WriterState::Idle && !self.started
    }

    /// Decision for the most recent block, `None` until one was made.
    pub fn crc_status(&self) -> Option<CrcStatus> {
        self.status
    }

    /// One line cycle. While `hold` is set no new transfer starts; one
    /// already under way carries on.
    pub fn tick(
        &mut self,
        sink: &mut Handoff<StreamByte>,
        hold: bool,
        pads: PadsIn,
    ) -> PadsOut {
        let mut crc_start = false;
        let out = match self.state {
            WriterState::Idle => match sink.peek() {
                Some(byte) if self.started => {
                    let hi = byte.data >> 4;
                    self.goto(WriterState::Data);
                    PadsOut::data(hi)
                }
                Some(_) if hold => PadsOut::RELEASED,
                Some(_) => {
                    self.status = None;
                    self.goto(WriterState::Start);
                    PadsOut::data(START_NIBBLE)
                }
                None => PadsOut::RELEASED,
            },
            WriterState::Start => {
                self.started = true;
                self.goto(WriterState::Data);
                match sink.peek() {
                    Some(byte) => PadsOut::data(byte.data >> 4),
                    None => PadsOut::RELEASED,
                }
            }
            WriterState::Data => match sink.peek().copied() {
                Some(byte) => {
                    if byte.last {
                        self.goto(WriterState::Stop);
                    } else {
                        sink.accept();
                        self.goto(WriterState::Idle);
                    }
                    PadsOut::data(byte.data & 0x0F)
                }
                None => {
                    self.goto(WriterState::Idle);
                    PadsOut::RELEASED
                }
            },
            WriterState::Stop => {
                self.started = false;
                crc_start = true;
                self.goto(WriterState::Response);
                PadsOut::data(STOP_NIBBLE)
            }
            WriterState::Response => {
                if self.count < WRITE_RESPONSE_CYCLES {
                    self.count += 1;
                } else if pads.data & 1 != 0 {
                    self.count = 0;
                    sink.accept();
                    debug!("dataw: busy released");
                    self.goto(WriterState::Idle);
                }
                PadsOut::CLOCK
            }
        };

        if let Some(status) = self.crc.tick(crc_start, pads) {
            if status == CrcStatus::Error {
                warn!("dataw: card reported a CRC error");
            }
            self.status = Some(status);
        }
        out
    }

    fn goto(&mut self, state: WriterState) {
        trace!("dataw: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

impl Default for DataWriter {
    fn default() -> Self {
        DataWriter::new()
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ReaderState {
    Idle,
    Wait,
    Data,
    Clk40,
    Timeout,
}

/// Collects blocks from DAT[3:0].
///
/// Every block comes back as `block_length` payload bytes followed by the
/// [`DATA_CRC_LEN`] byte CRC field. After the final block of a transfer the
/// card gets [`DATA_TRAILER_CYCLES`] more clocks.
#[derive(Debug)]
pub struct DataReader {
    state: ReaderState,
    count: u32,
    timeout: Timeout,
    reader: BitReader,
}

impl DataReader {
    /// An idle reader that gives the card `timeout_cycles` line cycles per
    /// block.
    pub const fn new(timeout_cycles: u32) -> DataReader {
        DataReader {
            state: ReaderState::Idle,
            count: 0,
            timeout: Timeout::new(timeout_cycles),
            reader: BitReader::new(Source::Data, 4, true),
        }
    }

    /// Back to idle, dropping any partial block.
    pub fn reset(&mut self) {
        self.state = ReaderState::Idle;
        self.count = 0;
        self.timeout.reload();
        self.reader.reset();
    }

    /// Is the reader waiting for nothing?
    pub fn is_idle(&self) -> bool {
        self.state == ReaderState::Idle
    }

    /// One line cycle.
    pub fn tick(
        &mut self,
        requests: &mut Handoff<DataReadRequest>,
        results: &mut Handoff<ReadByte>,
        pads: PadsIn,
    ) -> PadsOut {
        let listening = matches!(self.state, ReaderState::Wait | ReaderState::Data);
        let out = match self.state {
            ReaderState::Idle => {
                self.count = 0;
                match requests.peek() {
                    Some(_req) => {
                        debug!("datar: waiting for {} byte block", _req.block_length);
                        self.timeout.reload();
                        self.reader.reset();
                        self.goto(ReaderState::Wait);
                        PadsOut::CLOCK
                    }
                    None => PadsOut::RELEASED,
                }
            }
            ReaderState::Wait => {
                if self.reader.peek().is_some() {
                    self.goto(ReaderState::Data);
                }
                if self.timeout.step() {
                    requests.accept();
                    self.goto(ReaderState::Timeout);
                }
                PadsOut::CLOCK
            }
            ReaderState::Data => {
                self.forward(requests, results);
                PadsOut::CLOCK
            }
            ReaderState::Clk40 => {
                self.count += 1;
                if self.count == u32::from(DATA_TRAILER_CYCLES) {
                    self.count = 0;
                    self.goto(ReaderState::Idle);
                }
                PadsOut::CLOCK
            }
            ReaderState::Timeout => {
                if results.offer(ReadByte::timeout()).is_ok() {
                    warn!("datar: timeout");
                    self.goto(ReaderState::Idle);
                }
                PadsOut::RELEASED
            }
        };
        if listening {
            self.reader.sample(pads.cmd, pads.data);
        }
        out
    }

    fn forward(&mut self, requests: &mut Handoff<DataReadRequest>, results: &mut Handoff<ReadByte>) {
        let Some(req) = requests.peek().copied() else {
            self.goto(ReaderState::Idle);
            return;
        };
        let mut consumed = false;
        if let Some(byte) = self.reader.peek() {
            let total = u32::from(req.block_length) + u32::from(DATA_CRC_LEN);
            let last = self.count + 1 == total;
            if results.offer(ReadByte::ok(byte, last)).is_ok() {
                self.reader.take();
                self.count += 1;
                if last {
                    requests.accept();
                    consumed = true;
                    if req.last {
                        self.count = 0;
                        self.goto(ReaderState::Clk40);
                    } else {
                        self.goto(ReaderState::Idle);
                    }
                }
            }
        }
        if self.timeout.step() {
            if !consumed {
                requests.accept();
            }
            self.goto(ReaderState::Timeout);
        }
    }

    fn goto(&mut self, state: ReaderState) {
        trace!("datar: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
