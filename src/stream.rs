//! Stream items and the single-slot handoff that carries them between the
//! control domain and the line domain.

use heapless::spsc::Queue;

/// Outcome attached to every byte a reader produces.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// The byte was decoded from the card.
    Ok,
    /// The card did not answer in time. Always the final item of a frame.
    Timeout,
}

/// One byte of an outgoing (host to card) stream.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamByte {
    /// The byte.
    pub data: u8,
    /// Final byte of the frame.
    pub last: bool,
}

/// One item of an incoming (card to host) stream.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadByte {
    /// The byte. Zero on a timeout.
    pub data: u8,
    /// Whether `data` is valid.
    pub status: Status,
    /// Final item of the frame.
    pub last: bool,
}

impl ReadByte {
    /// A successfully decoded byte.
    pub const fn ok(data: u8, last: bool) -> ReadByte {
        ReadByte {
            data,
            status: Status::Ok,
            last,
        }
    }

    /// The terminal item of a read that timed out.
    pub const fn timeout() -> ReadByte {
        ReadByte {
            data: 0,
            status: Status::Timeout,
            last: true,
        }
    }
}

/// Ask the command reader to collect one response.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandReadRequest {
    /// Response length in bytes, start bit included.
    pub length: u8,
    /// Final response of the sequence; enables the 8 cycle trailer.
    pub last: bool,
}

/// Ask the data reader to collect one block.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataReadRequest {
    /// Payload length in bytes. The reader also returns the 8 CRC bytes.
    pub block_length: u16,
    /// Final block of the transfer; enables the 40 cycle trailer.
    pub last: bool,
}

/// A single-slot, order preserving buffer between two clock domains.
///
/// The producer's item is held until the consumer accepts it. A second
/// `offer` while the slot is taken is refused and hands the item back, so
/// nothing is ever overwritten or dropped.
pub struct Handoff<T> {
    // N = 2 gives a capacity of one
    slot: Queue<T, 2>,
}

impl<T> Handoff<T> {
    /// Create an empty handoff.
    pub const fn new() -> Handoff<T> {
        Handoff { slot: Queue::new() }
    }

    /// Producer side: place `item` in the slot, or get it back if the slot
    /// is occupied.
    pub fn offer(&mut self, item: T) -> Result<(), T> {
        self.slot.enqueue(item)
    }

    /// Producer side: would an `offer` succeed?
    pub fn has_room(&self) -> bool {
        !self.slot.is_full()
    }

    /// Consumer side: look at the pending item without taking it.
    pub fn peek(&self) -> Option<&T> {
        self.slot.peek()
    }

    /// Consumer side: take the pending item.
    pub fn accept(&mut self) -> Option<T> {
        self.slot.dequeue()
    }

    /// Is the slot empty?
    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Handoff::new()
    }
}

impl<T> core::fmt::Debug for Handoff<T>
where
    T: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handoff")
            .field("pending", &self.slot.peek())
            .finish()
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
