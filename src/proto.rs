//! embedded-sdphy - Constants and checksums of the SD line protocol
//!
//! The engine itself never computes a checksum: the command CRC7 and the
//! data CRC16 fields travel through it as ordinary bytes. The helpers here
//! are for whoever builds those bytes (a controller, or a card model in
//! tests).

use byteorder::{BigEndian, ByteOrder};

//==============================================================================

// Line timing

/// Line cycles of the power-up sequence (the card needs at least 74).
pub const INIT_CYCLES: u16 = 80;

/// Clock-only cycles after the final byte of a command or response.
pub const CMD_TRAILER_CYCLES: u8 = 8;

/// Clock-only cycles after the final block of a data read.
pub const DATA_TRAILER_CYCLES: u8 = 40;

/// Line cycles the data writer waits after the stop nibble before it starts
/// polling DAT0 for busy release.
pub const WRITE_RESPONSE_CYCLES: u8 = 16;

/// Default value of the line clock divider register.
pub const DEFAULT_DIVIDER: u8 = 128;

//==============================================================================

// Framing

/// Bytes of CRC that follow every block on a 4-bit bus: one CRC16 per line.
pub const DATA_CRC_LEN: u16 = 8;

/// Nibble driven on DAT[3:0] to close a written block.
pub const STOP_NIBBLE: u8 = 0b1111;

/// Nibble driven on DAT[3:0] to open a written block.
pub const START_NIBBLE: u8 = 0b0000;

/// Transmission bit of a host-to-card command frame.
pub const CMD_TRANSMISSION_BIT: u8 = 0x40;

//==============================================================================

/// The 3-bit CRC status token a card sends after a written block.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrcToken {
    /// `010`: the block was accepted.
    Accepted,
    /// `101`: the block was rejected because of a CRC mismatch.
    CrcError,
    /// `110`: the block was rejected because of a programming error.
    WriteError,
    /// Any other bit pattern.
    Unknown(u8),
}

/// Token bits meaning "block accepted".
pub const CRC_TOKEN_ACCEPTED: u8 = 0b010;

/// Token bits meaning "bad CRC".
pub const CRC_TOKEN_BAD: u8 = 0b101;

/// Token bits meaning "write error".
pub const CRC_TOKEN_WRITE_ERROR: u8 = 0b110;

impl CrcToken {
    /// Decode the low three bits of `bits`.
    pub fn from_bits(bits: u8) -> CrcToken {
        match bits & 0b111 {
            CRC_TOKEN_ACCEPTED => CrcToken::Accepted,
            CRC_TOKEN_BAD => CrcToken::CrcError,
            CRC_TOKEN_WRITE_ERROR => CrcToken::WriteError,
            other => CrcToken::Unknown(other),
        }
    }

    /// The token as the card puts it on DAT0, most significant bit first.
    pub fn bits(self) -> u8 {
        match self {
            CrcToken::Accepted => CRC_TOKEN_ACCEPTED,
            CrcToken::CrcError => CRC_TOKEN_BAD,
            CrcToken::WriteError => CRC_TOKEN_WRITE_ERROR,
            CrcToken::Unknown(bits) => bits & 0b111,
        }
    }
}

//==============================================================================

/// Build the six byte frame for command `index` with argument `arg`.
///
/// The frame carries the start and transmission bits, the argument in
/// big-endian order and the CRC7 with its end bit, so it can be fed straight
/// into the command writer.
pub fn command_frame(index: u8, arg: u32) -> [u8; 6] {
    let mut buf = [0u8; 6];
    buf[0] = CMD_TRANSMISSION_BIT | (index & 0x3F);
    BigEndian::write_u32(&mut buf[1..5], arg);
    buf[5] = crc7(&buf[0..5]);
    buf
}

/// Perform the 7-bit CRC used on the SD card command line.
///
/// The result is shifted up and carries the end bit, as sent on the wire.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        for i in (0..8).rev() {
            let feedback = (crc & 0x40 != 0) ^ ((byte >> i) & 1 != 0);
            crc = (crc << 1) & 0x7F;
            if feedback {
                crc ^= 0x09;
            }
        }
    }
    (crc << 1) | 1
}

/// Feed a single bit into a running CRC16 (CCITT, `x^16 + x^12 + x^5 + 1`).
///
/// The data lines each carry their own checksum, so it is built one bit at a
/// time.
pub fn crc16_bits(crc: u16, bit: bool) -> u16 {
    let feedback = ((crc >> 15) != 0) ^ bit;
    let crc = crc << 1;
    if feedback {
        crc ^ 0x1021
    } else {
        crc
    }
}

/// The CRC field that follows `block` on a 4-bit data bus.
///
/// Each DAT line gets its own CRC16 over the bits it carried. The four
/// checksums are then sent in parallel, one bit per line per cycle, which
/// packs into eight bytes exactly the way the data reader unpacks them.
pub fn data_crc(block: &[u8]) -> [u8; 8] {
    let mut crcs = [0u16; 4];
    for &byte in block {
        for nibble in [byte >> 4, byte & 0x0F] {
            for (line, crc) in crcs.iter_mut().enumerate() {
                *crc = crc16_bits(*crc, (nibble >> line) & 1 != 0);
            }
        }
    }

    let mut field = [0u8; 8];
    for cycle in 0..16 {
        let mut nibble = 0u8;
        for (line, crc) in crcs.iter().enumerate() {
            if (crc >> (15 - cycle)) & 1 != 0 {
                nibble |= 1 << line;
            }
        }
        let byte = &mut field[cycle / 2];
        if cycle % 2 == 0 {
            *byte |= nibble << 4;
        } else {
            *byte |= nibble;
        }
    }
    field
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_crc7() {
        const DATA: [u8; 15] = hex!("00 26 00 32 5F 59 83 C8 AD DB CF FF D2 40 40");
        assert_eq!(crc7(&DATA), 0xA5);
    }

    fn crc16(data: &[u8]) -> u16 {
        data.iter().fold(0, |crc, byte| {
            (0..8)
                .rev()
                .fold(crc, |crc, i| crc16_bits(crc, (byte >> i) & 1 != 0))
        })
    }

    #[test]
    fn test_crc16_bits() {
        // An actual CSD read from an SD card
        const DATA: [u8; 16] = hex!("00 26 00 32 5F 5A 83 AE FE FB CF FF 92 80 40 DF");
        assert_eq!(crc16(&DATA), 0x9fc5);
    }

    #[test]
    fn test_command_frame() {
        // CMD0, GO_IDLE_STATE
        assert_eq!(command_frame(0, 0), hex!("40 00 00 00 00 95"));
        // CMD8, SEND_IF_COND with the usual check pattern
        assert_eq!(command_frame(8, 0x1AA), hex!("48 00 00 01 AA 87"));
    }

    #[test]
    fn test_data_crc_per_line() {
        // 0xF0 puts 1,0 on every line, so each line carries 0xAA bytes.
        let block = [0xF0u8; 512];
        let line_crc = crc16(&[0xAA; 128]);
        let field = data_crc(&block);
        for cycle in 0..16 {
            let nibble = if cycle % 2 == 0 {
                field[cycle / 2] >> 4
            } else {
                field[cycle / 2] & 0x0F
            };
            let expected = if (line_crc >> (15 - cycle)) & 1 != 0 {
                0x0F
            } else {
                0x00
            };
            assert_eq!(nibble, expected, "cycle {}", cycle);
        }
    }

    #[test]
    fn test_data_crc_lines_are_independent() {
        // Only DAT0 toggles.
        let block = [0x10u8; 64];
        let field = data_crc(&block);
        for byte in field {
            assert_eq!(byte & 0xEE, 0);
        }
    }

    #[test]
    fn test_crc_token() {
        assert_eq!(CrcToken::from_bits(0b010), CrcToken::Accepted);
        assert_eq!(CrcToken::from_bits(0b101), CrcToken::CrcError);
        assert_eq!(CrcToken::from_bits(0b1110), CrcToken::WriteError);
        assert_eq!(CrcToken::from_bits(0b111), CrcToken::Unknown(0b111));
        assert_eq!(CrcToken::CrcError.bits(), CRC_TOKEN_BAD);
        assert_eq!(CrcToken::Unknown(0b1000).bits(), 0);
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
