//! Command kinds and bitstream builders.
//!
//! Every command the reader can issue is pre-generated into a
//! [`CommandBitstream`] before the listen window is acquired, so the
//! timing-critical transmit loop only walks an array of bit symbols.
//!
//! The opcode is a fixed 3-bit value per command. Tags that require
//! command parity get a trailing even-parity bit (`b2 b1 b0 p`); tags
//! that do not get a leading zero instead (`0 b2 b1 b0`). The parity bit
//! is emitted for every command, authentication included.

use crate::bits::BitBuffer;
use crate::consts::{
    COMMAND_AUTH, COMMAND_ID, COMMAND_PIN, COMMAND_UM1, COMMAND_UM2, COMMAND_WRITE,
    MAX_RECEIVE_BITCOUNT, MAX_SEND_BITCOUNT,
};
use crate::error::Error;

/// The six operations understood by EM4x70-family tags.
///
/// V4070/EM4070 tags do not support [`Pin`](CommandKind::Pin) or
/// [`Um2`](CommandKind::Um2); issuing them simply reads nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum CommandKind {
    /// Read the 32-bit tag identifier.
    Id,
    /// Read user memory 1, lock bits included.
    Um1,
    /// Read user memory 2 (EM4170 only).
    Um2,
    /// Authenticate with a 56-bit nonce and 28-bit f(RN).
    Auth,
    /// Send the PIN to unlock the tag.
    Pin,
    /// Write one 16-bit word.
    Write,
}

impl CommandKind {
    /// The 3-bit opcode value.
    pub const fn code(self) -> u8 {
        match self {
            CommandKind::Id => COMMAND_ID,
            CommandKind::Um1 => COMMAND_UM1,
            CommandKind::Um2 => COMMAND_UM2,
            CommandKind::Auth => COMMAND_AUTH,
            CommandKind::Pin => COMMAND_PIN,
            CommandKind::Write => COMMAND_WRITE,
        }
    }

    /// The four on-air opcode bits, most significant first.
    ///
    /// Without parity: `0 b2 b1 b0`. With parity: `b2 b1 b0 p`, where `p`
    /// makes the number of ones in the nibble even.
    pub fn opcode_bits(self, with_parity: bool) -> [u8; 4] {
        let code = self.code();
        let b2 = (code >> 2) & 1;
        let b1 = (code >> 1) & 1;
        let b0 = code & 1;
        if with_parity {
            [b2, b1, b0, b2 ^ b1 ^ b0]
        } else {
            [0, b2, b1, b0]
        }
    }
}

/// A fully generated command: the bits to send, the expected response
/// length, and room for the decoded response.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct CommandBitstream {
    /// Which command this stream encodes.
    pub kind: CommandKind,
    /// Bits to modulate, RM preamble excluded.
    pub to_send: BitBuffer<MAX_SEND_BITCOUNT>,
    /// Bits the tag is expected to answer with: 0, 20, 32 or 64.
    pub expected_receive_bits: usize,
    /// Raw bits decoded from the tag.
    pub to_receive: BitBuffer<MAX_RECEIVE_BITCOUNT>,
    /// Response bits packed into bytes, reverse byte order (the oldest
    /// eight bits land in the highest used index).
    pub received_bytes: [u8; MAX_RECEIVE_BITCOUNT / 8],
}

impl CommandBitstream {
    fn with_opcode(kind: CommandKind, with_parity: bool) -> Result<Self, Error> {
        let mut cmd = Self {
            kind,
            to_send: BitBuffer::new(),
            expected_receive_bits: 0,
            to_receive: BitBuffer::new(),
            received_bytes: [0; MAX_RECEIVE_BITCOUNT / 8],
        };
        for bit in kind.opcode_bits(with_parity) {
            cmd.to_send.push_bit(bit)?;
        }
        Ok(cmd)
    }

    /// Read the 32-bit ID. Sends 4 bits, receives 32.
    pub fn read_id(with_parity: bool) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Id, with_parity)?;
        cmd.expected_receive_bits = 32;
        Ok(cmd)
    }

    /// Read UM1. Sends 4 bits, receives 32 (two lock bits in front).
    pub fn read_um1(with_parity: bool) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Um1, with_parity)?;
        cmd.expected_receive_bits = 32;
        Ok(cmd)
    }

    /// Read UM2. Sends 4 bits, receives 64.
    pub fn read_um2(with_parity: bool) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Um2, with_parity)?;
        cmd.expected_receive_bits = 64;
        Ok(cmd)
    }

    /// Authenticate: command, 56-bit nonce, seven zero diversity bits,
    /// then the 28-bit f(RN) (three bytes plus the high nibble of the
    /// fourth). Sends 95 bits, receives the 20-bit g(RN).
    pub fn auth(with_parity: bool, rnd: &[u8; 7], frnd: &[u8; 4]) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Auth, with_parity)?;

        for &b in rnd {
            cmd.to_send.push_byte(b)?;
        }
        for _ in 0..7 {
            cmd.to_send.push_bit(0)?;
        }
        for &b in &frnd[..3] {
            cmd.to_send.push_byte(b)?;
        }
        cmd.to_send.push_nibble((frnd[3] >> 4) & 0xf)?;

        cmd.expected_receive_bits = 20;
        Ok(cmd)
    }

    /// Send the PIN: command, the tag ID with its bytes reversed relative
    /// to the tag image, then the PIN in little-endian byte order. Sends
    /// 68 bits, receives the 32-bit ID again.
    ///
    /// Both byte orders are part of the wire format; neither may be
    /// normalized.
    pub fn send_pin(with_parity: bool, tag_id: &[u8; 4], pin: u32) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Pin, with_parity)?;

        for i in 0..4 {
            cmd.to_send.push_byte(tag_id[3 - i])?;
        }
        for i in 0..4 {
            cmd.to_send.push_byte((pin >> (i * 8)) as u8)?;
        }

        cmd.expected_receive_bits = 32;
        Ok(cmd)
    }

    /// Write one word: command, address nibble with parity, the four data
    /// nibbles each with parity, the column parity, and a closing zero.
    /// Sends 34 bits; success is signalled by two ACKs, not data.
    ///
    /// The word's bytes are swapped before the nibble split, so the
    /// on-air nibble order for `0xA53C` is `3, C, A, 5`.
    pub fn write_word(with_parity: bool, word: u16, address: u8) -> Result<Self, Error> {
        let mut cmd = Self::with_opcode(CommandKind::Write, with_parity)?;

        let address = address & 0x0f;
        cmd.to_send.push_nibble(address)?;
        cmd.to_send.push_nibble_parity(address)?;

        let nibbles = [
            ((word >> 4) & 0xf) as u8,
            (word & 0xf) as u8,
            ((word >> 12) & 0xf) as u8,
            ((word >> 8) & 0xf) as u8,
        ];
        for nibble in nibbles {
            cmd.to_send.push_nibble(nibble)?;
            cmd.to_send.push_nibble_parity(nibble)?;
        }

        let column_parity = nibbles[0] ^ nibbles[1] ^ nibbles[2] ^ nibbles[3];
        cmd.to_send.push_nibble(column_parity)?;
        cmd.to_send.push_bit(0)?;

        cmd.expected_receive_bits = 0;
        Ok(cmd)
    }
}
