//! Useful library code for tests

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_sdphy::{
    phy::driver, proto::CrcToken, Card, PadsIn, PadsOut, PhyOptions, ReadByte, SdPhy, StreamByte,
};

/// Route the crate's log output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A PHY with the line clock running at half the control clock.
///
/// Timeouts are short so tests that wait for one finish quickly.
pub fn make_phy(cmd_timeout_us: u32, data_timeout_us: u32) -> SdPhy {
    init_logging();
    let mut phy = SdPhy::new(PhyOptions {
        clk_freq_hz: 1_000_000,
        cmd_timeout_us,
        data_timeout_us,
    });
    phy.set_divider(1);
    phy.set_clock_enable(true);
    phy
}

/// A card that plays back pre-recorded line levels.
///
/// The CMD script only advances on clocked cycles where the host is not
/// driving CMD, and likewise for the DAT script, so a response never starts
/// while the host is still talking. Everything the host drives on a clocked
/// cycle is recorded.
#[derive(Debug, Default)]
pub struct ScriptedCard {
    cmd: VecDeque<bool>,
    data: VecDeque<u8>,
    /// CMD levels the host drove, one per clocked cycle.
    pub host_cmd: Vec<bool>,
    /// DAT nibbles the host drove, one per clocked cycle.
    pub host_data: Vec<u8>,
    /// Clocked cycles seen.
    pub clocks: usize,
    /// Clocked cycles seen while the host drove nothing.
    pub idle_clocks: usize,
}

impl ScriptedCard {
    pub fn new() -> ScriptedCard {
        ScriptedCard::default()
    }

    /// Queue `delay` idle cycles and then `bytes` on CMD, MSB first.
    pub fn respond(&mut self, delay: usize, bytes: &[u8]) {
        self.cmd.extend(std::iter::repeat(true).take(delay));
        for b in bytes {
            self.cmd.extend((0..8).rev().map(|i| (b >> i) & 1 != 0));
        }
        self.cmd.push_back(true);
    }

    /// Queue `delay` idle cycles, the start nibble, `block`, its CRC field
    /// and the end nibble on DAT[3:0].
    pub fn send_block(&mut self, delay: usize, block: &[u8]) {
        self.data.extend(std::iter::repeat(0xF).take(delay));
        self.data.push_back(0x0);
        let crc = embedded_sdphy::proto::data_crc(block);
        for b in block.iter().chain(crc.iter()) {
            self.data.push_back(b >> 4);
            self.data.push_back(b & 0x0F);
        }
        self.data.push_back(0xF);
    }

    /// Queue a CRC status token on DAT0 followed by `busy` cycles of DAT0
    /// held low.
    pub fn crc_status(&mut self, delay: usize, token: CrcToken, busy: usize) {
        let token = token.bits();
        self.data.extend(std::iter::repeat(0xF).take(delay));
        self.data.push_back(0xE);
        for i in (0..3).rev() {
            self.data.push_back(0xE | ((token >> i) & 1));
        }
        self.data.push_back(0xF);
        self.data.extend(std::iter::repeat(0xE).take(busy));
    }
}

impl Card for ScriptedCard {
    fn drive(&mut self) -> PadsIn {
        PadsIn {
            cmd: self.cmd.front().copied().unwrap_or(true),
            data: self.data.front().copied().unwrap_or(0xF),
        }
    }

    fn clock(&mut self, pads: &PadsOut) {
        if !pads.clk {
            return;
        }
        self.clocks += 1;
        if pads.cmd_oe {
            self.host_cmd.push(pads.cmd_o);
        } else {
            self.cmd.pop_front();
        }
        if pads.data_oe {
            self.host_data.push(pads.data_o);
        } else {
            self.data.pop_front();
        }
        if !pads.drives_any() {
            self.idle_clocks += 1;
        }
    }
}

/// A card that echoes whatever the host clocked out on CMD back onto CMD.
#[derive(Debug, Default)]
pub struct LoopbackCard {
    echo: VecDeque<bool>,
}

impl LoopbackCard {
    /// Start the echo with `delay` idle cycles.
    pub fn new(delay: usize) -> LoopbackCard {
        LoopbackCard {
            echo: std::iter::repeat(true).take(delay).collect(),
        }
    }
}

impl Card for LoopbackCard {
    fn drive(&mut self) -> PadsIn {
        PadsIn {
            cmd: self.echo.front().copied().unwrap_or(true),
            data: 0xF,
        }
    }

    fn clock(&mut self, pads: &PadsOut) {
        if !pads.clk {
            return;
        }
        if pads.cmd_oe {
            self.echo.push_back(pads.cmd_o);
        } else {
            self.echo.pop_front();
        }
    }
}

/// Panic if more than one engine drove a line during the last line cycle.
pub fn assert_single_driver(phy: &SdPhy) {
    let drivers = phy.drivers();
    let cmd = drivers.iter().filter(|d| d.cmd_oe).count();
    let data = drivers.iter().filter(|d| d.data_oe).count();
    assert!(cmd <= 1, "{} engines drive CMD: {:?}", cmd, drivers);
    assert!(data <= 1, "{} engines drive DAT: {:?}", data, drivers);
    // The reader engines listen; they only ever drive trailer levels on CMD.
    assert!(!drivers[driver::DATA_READ].data_oe);
}

/// Tick until `done` says stop, checking the bus on every line cycle.
///
/// Returns the number of control ticks taken.
pub fn run_until<C, F>(phy: &mut SdPhy, card: &mut C, max_ticks: usize, mut done: F) -> usize
where
    C: Card,
    F: FnMut(&mut SdPhy) -> bool,
{
    for tick in 0..max_ticks {
        if done(phy) {
            return tick;
        }
        if phy.step(card).is_some() {
            assert_single_driver(phy);
        }
    }
    panic!("gave up after {} ticks", max_ticks);
}

/// Push `bytes` into the command writer, the final one marked `last` if
/// asked, ticking while the handoff is full.
pub fn send_command<C: Card>(phy: &mut SdPhy, card: &mut C, bytes: &[u8], last: bool) {
    for (i, &data) in bytes.iter().enumerate() {
        let byte = StreamByte {
            data,
            last: last && i == bytes.len() - 1,
        };
        run_until(phy, card, 10_000, |phy| phy.write_command(byte).is_ok());
    }
}

/// Push `bytes` into the data writer, the final one marked `last`.
pub fn send_data<C: Card>(phy: &mut SdPhy, card: &mut C, bytes: &[u8]) {
    for (i, &data) in bytes.iter().enumerate() {
        let byte = StreamByte {
            data,
            last: i == bytes.len() - 1,
        };
        run_until(phy, card, 10_000, |phy| phy.write_data(byte).is_ok());
    }
}

/// Collect response bytes until one is marked `last`.
pub fn collect_response<C: Card>(phy: &mut SdPhy, card: &mut C, max_ticks: usize) -> Vec<ReadByte> {
    let mut items = Vec::new();
    run_until(phy, card, max_ticks, |phy| {
        while let Some(item) = phy.poll_response() {
            items.push(item);
        }
        items.last().map(|i| i.last).unwrap_or(false)
    });
    items
}

/// Collect data bytes until `frames` items marked `last` were seen.
pub fn collect_data<C: Card>(
    phy: &mut SdPhy,
    card: &mut C,
    frames: usize,
    max_ticks: usize,
) -> Vec<ReadByte> {
    let mut items = Vec::new();
    run_until(phy, card, max_ticks, |phy| {
        while let Some(item) = phy.poll_data() {
            items.push(item);
        }
        items.iter().filter(|i| i.last).count() >= frames
    });
    items
}

/// Split a bit stream back into bytes, MSB first.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | u8::from(b)))
        .collect()
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
