//! Command line engines: the serialiser for outgoing commands and the
//! deserialiser for card responses.

use super::{
    reader::{BitReader, Source},
    timeout::Timeout,
};
use crate::{
    debug,
    pads::{PadsIn, PadsOut},
    proto::CMD_TRAILER_CYCLES,
    stream::{CommandReadRequest, Handoff, ReadByte, StreamByte},
    trace, warn,
};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum WriterState {
    Idle,
    Write,
    Clk8,
}

/// Shifts command bytes out on CMD, most significant bit first.
///
/// A byte marked `last` is followed by [`CMD_TRAILER_CYCLES`] clocked cycles
/// with CMD held high.
#[derive(Debug)]
pub struct CommandWriter {
    state: WriterState,
    count: u8,
}

impl CommandWriter {
    /// An idle writer.
    pub const fn new() -> CommandWriter {
        CommandWriter {
            state: WriterState::Idle,
            count: 0,
        }
    }

    /// Back to idle. Whatever sits in the sink stays there.
    pub fn reset(&mut self) {
        *self = CommandWriter::new();
    }

    /// Idle with nothing queued: the command line is free for the reader.
    pub fn done(&self, sink: &Handoff<StreamByte>) -> bool {
        self.is_idle() && sink.is_empty()
    }

    /// Between bytes, not driving CMD.
    pub fn is_idle(&self) -> bool {
        self.state == WriterState::Idle
    }

    /// One line cycle. While `hold` is set another engine owns CMD and a
    /// queued byte stays queued.
    pub fn tick(&mut self, sink: &mut Handoff<StreamByte>, hold: bool) -> PadsOut {
        match self.state {
            WriterState::Idle => {
                self.count = 0;
                if !hold && sink.peek().is_some() {
                    self.goto(WriterState::Write);
                }
                PadsOut::RELEASED
            }
            WriterState::Write => {
                let Some(byte) = sink.peek().copied() else {
                    self.goto(WriterState::Idle);
                    return PadsOut::RELEASED;
                };
                let level = (byte.data >> (7 - self.count)) & 1 != 0;
                if self.count == 7 {
                    self.count = 0;
                    if byte.last {
                        self.goto(WriterState::Clk8);
                    } else {
                        sink.accept();
                        self.goto(WriterState::Idle);
                    }
                } else {
                    self.count += 1;
                }
                PadsOut::cmd(level)
            }
            WriterState::Clk8 => {
                self.count += 1;
                if self.count == CMD_TRAILER_CYCLES {
                    self.count = 0;
                    sink.accept();
                    self.goto(WriterState::Idle);
                }
                PadsOut::cmd(true)
            }
        }
    }

    fn goto(&mut self, state: WriterState) {
        trace!("cmdw: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

impl Default for CommandWriter {
    fn default() -> Self {
        CommandWriter::new()
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ReaderState {
    Idle,
    Wait,
    Cmd,
    Clk8,
    Timeout,
}

/// Collects card responses from CMD.
///
/// A request is only picked up once the [`CommandWriter`] has let go of the
/// line. The whole response, start bit included, must arrive before the
/// timeout counter expires; otherwise a single [`ReadByte::timeout`] closes
/// the frame.
#[derive(Debug)]
pub struct CommandReader {
    state: ReaderState,
    count: u8,
    timeout: Timeout,
    reader: BitReader,
}

impl CommandReader {
    /// An idle reader that gives the card `timeout_cycles` line cycles to
    /// answer.
    pub const fn new(timeout_cycles: u32) -> CommandReader {
        CommandReader {
            state: ReaderState::Idle,
            count: 0,
            timeout: Timeout::new(timeout_cycles),
            reader: BitReader::new(Source::Cmd, 1, false),
        }
    }

    /// Back to idle, dropping any partial response.
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
        requests: &mut Handoff<CommandReadRequest>,
        results: &mut Handoff<ReadByte>,
        writer_done: bool,
        pads: PadsIn,
    ) -> PadsOut {
        let listening = matches!(self.state, ReaderState::Wait | ReaderState::Cmd);
        let out = match self.state {
            ReaderState::Idle => {
                self.count = 0;
                self.timeout.reload();
                if let Some(_req) = requests.peek() {
                    if writer_done {
                        debug!("cmdr: waiting for {} byte response", _req.length);
                        self.reader.reset();
                        self.goto(ReaderState::Wait);
                    }
                }
                PadsOut::RELEASED
            }
            ReaderState::Wait => {
                if self.reader.peek().is_some() {
                    self.goto(ReaderState::Cmd);
                }
                if self.timeout.step() {
                    requests.accept();
                    self.goto(ReaderState::Timeout);
                }
                PadsOut::CLOCK
            }
            ReaderState::Cmd => {
                self.forward(requests, results);
                PadsOut::CLOCK
            }
            ReaderState::Clk8 => {
                self.count += 1;
                if self.count == CMD_TRAILER_CYCLES {
                    self.count = 0;
                    self.goto(ReaderState::Idle);
                }
                PadsOut::cmd(true)
            }
            ReaderState::Timeout => {
                if results.offer(ReadByte::timeout()).is_ok() {
                    warn!("cmdr: timeout");
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

    fn forward(
        &mut self,
        requests: &mut Handoff<CommandReadRequest>,
        results: &mut Handoff<ReadByte>,
    ) {
        let Some(req) = requests.peek().copied() else {
            self.goto(ReaderState::Idle);
            return;
        };
        let mut consumed = false;
        if let Some(byte) = self.reader.peek() {
            let last = self.count == req.length.wrapping_sub(1);
            if results.offer(ReadByte::ok(byte, last)).is_ok() {
                self.reader.take();
                self.count = self.count.wrapping_add(1);
                if last {
                    requests.accept();
                    consumed = true;
                    if req.last {
                        self.count = 0;
                        self.goto(ReaderState::Clk8);
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
        trace!("cmdr: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
