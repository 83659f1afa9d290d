//! Constants used across the EM4x70 protocol implementation.
//!
//! This module defines the chip timing table, signal thresholds, command
//! opcodes and buffer bounds used by the transmit, receive and engine
//! layers.
//!
//! ## Key Concepts
//!
//! - **Ticks**: all timing is expressed in ticks of the free-running
//!   platform clock. One carrier period (field cycle, "FC") at 125 kHz is
//!   [`TICKS_PER_FC`] ticks, so one tick is 1/12 of a carrier period
//!   (about 667 ns).
//! - **Bit period**: a tag bit lasts 32 carrier periods
//!   ([`T_TAG_FULL_PERIOD`]). The quarter/half/three-quarter subdivisions
//!   drive both the modulator and the pulse-length classifier.
//! - **Wait states**: [`T_TAG_TWA`], [`T_TAG_TWALB`] and [`T_TAG_WEE`] are
//!   the datasheet wait times between a write-style command and the tag's
//!   ACK responses.
//! - **Opcodes**: each of the six commands is a fixed 3-bit value; the
//!   4-bit on-air encoding (with or without the trailing parity bit) is
//!   produced by
//!   [`CommandKind::opcode_bits`](crate::command::CommandKind::opcode_bits).
//!
//! These values constitute the wire contract; changing any of them changes
//! the on-air format.

/// Ticks per carrier period (field cycle). 1 us = 1.5 ticks, 1 FC = 8 us.
pub const TICKS_PER_FC: u32 = 12;

/// Quarter of a tag bit period, in ticks.
pub const T_TAG_QUARTER_PERIOD: u32 = 8 * TICKS_PER_FC;

/// Half of a tag bit period, in ticks.
pub const T_TAG_HALF_PERIOD: u32 = 16 * TICKS_PER_FC;

/// Three quarters of a tag bit period, in ticks.
pub const T_TAG_THREE_QUARTER_PERIOD: u32 = 24 * TICKS_PER_FC;

/// One full tag bit period, in ticks.
pub const T_TAG_FULL_PERIOD: u32 = 32 * TICKS_PER_FC;

/// Write access time, in ticks.
pub const T_TAG_TWA: u32 = 128 * TICKS_PER_FC;

/// Divergency time, in ticks.
pub const T_TAG_DIV: u32 = 224 * TICKS_PER_FC;

/// Authentication time, in ticks.
pub const T_TAG_AUTH: u32 = 4224 * TICKS_PER_FC;

/// EEPROM write time, in ticks.
pub const T_TAG_WEE: u32 = 3072 * TICKS_PER_FC;

/// Write access time of the lock bits, in ticks.
pub const T_TAG_TWALB: u32 = 672 * TICKS_PER_FC;

/// Initial modulation drop when sending a 0 bit, in ticks.
pub const T_TAG_BITMOD: u32 = 4 * TICKS_PER_FC;

/// Tolerance applied to every pulse-length comparison, in ticks.
pub const T_TAG_TOLERANCE: u32 = 8 * TICKS_PER_FC;

/// Upper bound on any single pulse measurement, in ticks.
pub const T_TAG_TIMEOUT: u32 = 4 * T_TAG_FULL_PERIOD;

/// Carrier periods to wait between listen-window acceptance and the RM
/// preamble (reader-to-tag turnaround).
pub const T_RM_TURNAROUND_FC: u32 = 40;

/// Pulse quadruples inspected while searching for a listen window.
pub const LIW_SEARCH_ATTEMPTS: u32 = 50;

/// Pulses inspected while searching for the read-header 1-to-0 transition.
pub const READ_HEADER_LEN: usize = 16;

/// Attempts to acquire a listen window before a command is abandoned.
pub const COMMAND_RETRIES: u32 = 5;

/// Largest command bitstream sent to the tag, in bits. Authentication is
/// the longest: CMD(4) + RN(56) + diversity(7) + f(RN)(28) = 95 bits. The
/// two RM bits are emitted by the listen-window detector and not stored.
pub const MAX_SEND_BITCOUNT: usize = 96;

/// Largest response received from any command, in bits, excluding the
/// 16-bit header of `0b1111_1111_1111_0000`.
pub const MAX_RECEIVE_BITCOUNT: usize = 64;

/// Capacity of one transaction-trace channel, in bits. The transmit side
/// records the two RM bits ahead of the bitstream (2 + 96); that exceeds
/// the receive side's worst case of a 16-bit header plus 64 data bits.
pub const MAX_TRACE_BITS: usize = 2 + MAX_SEND_BITCOUNT;

/// ADC noise margin around the 127 midpoint. May need adjustment in
/// electrically noisy environments.
pub const NOISE_THRESHOLD: u8 = 13;

/// Samples above this value count as a high signal.
pub const HIGH_SIGNAL_THRESHOLD: u8 = 127 + NOISE_THRESHOLD;

/// Samples below this value count as a low signal.
pub const LOW_SIGNAL_THRESHOLD: u8 = 127 - NOISE_THRESHOLD;

/// 3-bit opcode of the read-ID command.
pub const COMMAND_ID: u8 = 0x01;
/// 3-bit opcode of the read-UM1 command.
pub const COMMAND_UM1: u8 = 0x02;
/// 3-bit opcode of the authenticate command.
pub const COMMAND_AUTH: u8 = 0x03;
/// 3-bit opcode of the send-PIN command.
pub const COMMAND_PIN: u8 = 0x04;
/// 3-bit opcode of the write-word command.
pub const COMMAND_WRITE: u8 = 0x05;
/// 3-bit opcode of the read-UM2 command (EM4170 only).
pub const COMMAND_UM2: u8 = 0x07;

/// Even-parity lookup over a nibble: bit `n` is the XOR of the four bits
/// of `n`.
pub const NIBBLE_PARITY: u16 = 0x6996;
