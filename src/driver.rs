//! Command engine and host-facing reader session.
//!
//! [`Em4x70`] owns everything one host command needs: the platform, the
//! tag image, the per-session parity flag and the transaction trace. The
//! hardware can only run one transaction tree at a time, so the session
//! object is built per host command and torn down with it; the host
//! dispatcher owns its lifetime.
//!
//! A data-returning transaction is always the same shape: reset the
//! trace, acquire a listen window (with retries), stream the pre-built
//! command bits, decode the response, convert it to bytes. The PIN and
//! WRITE commands replace the receive step with datasheet wait states and
//! ACK handshakes.

use crate::bits::pack_bits_reversed;
use crate::brute::{self, AuthOracle};
use crate::command::{CommandBitstream, CommandKind};
use crate::consts::{
    MAX_RECEIVE_BITCOUNT, MAX_SEND_BITCOUNT, T_TAG_TWA, T_TAG_TWALB, T_TAG_WEE,
};
use crate::demod::receive;
use crate::error::{Error, Status};
use crate::listen::{check_ack, find_listen_window};
use crate::modulate::{send_bit, send_bitstream};
use crate::platform::Platform;
use crate::pulse::signal_present;
use crate::trace::TransactionTrace;
use heapless::Vec;

/// The tag's public memory, as a 32-byte scratch image.
///
/// Bytes 0..4 hold UM1 (two lock bits in the top of byte 0), bytes 4..8
/// the ID, bytes 8..20 the write-only crypto key, bytes 20..24 the PIN
/// words and bytes 24..32 UM2 (EM4170 only). Word address `a` maps to
/// bytes `2a..2a + 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TagImage {
    /// Raw image bytes.
    pub data: [u8; 32],
}

impl TagImage {
    /// First byte of the 32-bit ID.
    pub const ID_OFFSET: usize = 4;
    /// First byte of UM2.
    pub const UM2_OFFSET: usize = 24;
    /// Highest crypto-key word address; the key occupies words 4..=9.
    pub const KEY_WORD_TOP: u8 = 9;
    /// Word address holding the PIN's high half.
    pub const PIN_WORD_LOWER: u8 = 10;
    /// Word address holding the PIN's low half.
    pub const PIN_WORD_UPPER: u8 = 11;

    /// A zeroed image.
    pub const fn new() -> Self {
        Self { data: [0; 32] }
    }

    /// Clears the image. Called at the start of every host command.
    pub fn reset(&mut self) {
        self.data = [0; 32];
    }

    /// The tag ID, in image byte order (least significant byte first).
    pub fn id(&self) -> [u8; 4] {
        [self.data[4], self.data[5], self.data[6], self.data[7]]
    }
}

impl Default for TagImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for [`Em4x70::write`].
#[derive(Debug, Clone, Copy)]
pub struct WriteArgs {
    /// Whether the tag requires command parity.
    pub command_parity: bool,
    /// The 16-bit word to write.
    pub word: u16,
    /// The word address, 0..=15.
    pub address: u8,
}

/// Arguments for [`Em4x70::unlock`] and [`Em4x70::set_pin`].
#[derive(Debug, Clone, Copy)]
pub struct PinArgs {
    /// Whether the tag requires command parity.
    pub command_parity: bool,
    /// The 32-bit PIN.
    pub pin: u32,
}

/// Arguments for [`Em4x70::auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthArgs {
    /// Whether the tag requires command parity.
    pub command_parity: bool,
    /// The 56-bit nonce RN, seven bytes most significant first.
    pub rnd: [u8; 7],
    /// The 28-bit f(RN): three bytes plus the high nibble of the fourth.
    pub frnd: [u8; 4],
}

/// Arguments for [`Em4x70::brute`].
#[derive(Debug, Clone, Copy)]
pub struct BruteArgs {
    /// Whether the tag requires command parity.
    pub command_parity: bool,
    /// Key word under attack: 7, 8 or 9.
    pub address: u8,
    /// Reference nonce captured from a live transponder exchange.
    pub rnd: [u8; 7],
    /// f(RN) captured alongside the nonce.
    pub frnd: [u8; 4],
    /// First candidate of the sweep.
    pub start_key: u16,
}

/// Arguments for [`Em4x70::set_key`].
#[derive(Debug, Clone, Copy)]
pub struct KeyArgs {
    /// Whether the tag requires command parity.
    pub command_parity: bool,
    /// The 96-bit crypto key, words little-endian from word 9 downwards.
    pub crypt_key: [u8; 12],
}

/// Status plus payload returned to the host for every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Outcome of the operation.
    pub status: Status,
    /// Reply payload; layout and length depend on the command.
    pub data: Vec<u8, 32>,
}

impl CommandResponse {
    fn new(status: Status, data: &[u8]) -> Self {
        let mut v = Vec::new();
        let _ = v.extend_from_slice(data);
        Self { status, data: v }
    }
}

/// One reader session: the protocol engine bound to a platform.
#[derive(Debug)]
pub struct Em4x70<P: Platform> {
    platform: P,
    tag: TagImage,
    command_parity: bool,
    trace: TransactionTrace,
}

impl<P: Platform> Em4x70<P> {
    /// Creates a session. No field activity happens until the first host
    /// operation.
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            tag: TagImage::new(),
            command_parity: false,
            trace: TransactionTrace::new(),
        }
    }

    /// The tag image accumulated by the most recent operation.
    pub fn tag(&self) -> &TagImage {
        &self.tag
    }

    /// The trace of the most recent transaction.
    pub fn trace(&self) -> &TransactionTrace {
        &self.trace
    }

    /// Consumes the session and returns the platform.
    pub fn release(self) -> P {
        self.platform
    }

    /// Common preamble of every host command: latch the parity flag,
    /// clear the tag image, power the field and confirm a tag is present.
    fn begin(&mut self, command_parity: bool) -> Result<(), Error> {
        self.command_parity = command_parity;
        self.tag.reset();

        self.platform.field_on();
        self.platform.field_settle();
        self.platform.wdt_kick();

        if !signal_present(&mut self.platform) {
            return Err(Error::NoSignal);
        }
        if !find_listen_window(&mut self.platform, &mut self.trace, false) {
            return Err(Error::Timeout);
        }
        Ok(())
    }

    fn warn_if_parity(&self, command_parity: bool, op: &str) {
        if command_parity {
            #[cfg(feature = "log")]
            log::warn!("command parity with `{op}` is non-functional and may corrupt tag data");
            #[cfg(not(feature = "log"))]
            let _ = op;
        }
    }

    /// Reads ID and UM1, and UM2 where the tag has it.
    ///
    /// On success the payload is the first 20 image bytes (UM1 + ID), or
    /// 32 when UM2 also read; on failure it is empty.
    pub fn info(&mut self, command_parity: bool) -> CommandResponse {
        match self.run_info(command_parity) {
            Ok(len) => CommandResponse::new(Status::Ok, &self.tag.data[..len]),
            Err(e) => CommandResponse::new(e.into(), &[]),
        }
    }

    fn run_info(&mut self, command_parity: bool) -> Result<usize, Error> {
        self.begin(command_parity)?;
        read_id(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag)?;
        read_um1(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag)?;

        // EM4170 has UM2; V4070/EM4070 does not, which is not an error.
        match read_um2(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag) {
            Ok(()) => Ok(32),
            Err(_) => Ok(20),
        }
    }

    /// Writes one word, then re-reads the tag. The payload is always the
    /// full 32-byte image.
    pub fn write(&mut self, args: &WriteArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "write");
        let status = match self.run_write(args) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &self.tag.data)
    }

    fn run_write(&mut self, args: &WriteArgs) -> Result<(), Error> {
        self.begin(args.command_parity)?;
        write_word(
            &mut self.platform,
            &mut self.trace,
            self.command_parity,
            args.word,
            args.address,
        )?;

        // Re-read so the host sees the tag as it now is. Failures here do
        // not undo a confirmed write.
        if read_id(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag).is_ok()
        {
            let _ = read_um1(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
            let _ = read_um2(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
        }
        Ok(())
    }

    /// Unlocks the tag with its PIN. The payload is the full image.
    pub fn unlock(&mut self, args: &PinArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "unlock");
        let status = match self.run_unlock(args) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &self.tag.data)
    }

    fn run_unlock(&mut self, args: &PinArgs) -> Result<(), Error> {
        self.begin(args.command_parity)?;

        // The PIN command carries the tag ID, so read it first.
        read_id(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag)?;
        send_pin(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag, args.pin)?;

        let _ = read_um1(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
        let _ = read_um2(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
        Ok(())
    }

    /// Runs one authentication. The payload is the 3-byte packed g(RN).
    pub fn auth(&mut self, args: &AuthArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "auth");
        let mut response = [0u8; 3];
        let status = match self.run_auth(args, &mut response) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &response)
    }

    fn run_auth(&mut self, args: &AuthArgs, response: &mut [u8; 3]) -> Result<(), Error> {
        self.begin(args.command_parity)?;
        authenticate(
            &mut self.platform,
            &mut self.trace,
            self.command_parity,
            &args.rnd,
            &args.frnd,
            response,
        )
    }

    /// Sweeps a 16-bit key word. The payload is the recovered key,
    /// big-endian.
    pub fn brute(&mut self, args: &BruteArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "brute");
        let mut key = [0u8; 2];
        let status = match self.run_brute(args, &mut key) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &key)
    }

    fn run_brute(&mut self, args: &BruteArgs, key: &mut [u8; 2]) -> Result<(), Error> {
        self.begin(args.command_parity)?;
        let mut oracle = TagOracle {
            platform: &mut self.platform,
            trace: &mut self.trace,
            command_parity: self.command_parity,
        };
        *key = brute::search(args.address, &args.rnd, &args.frnd, args.start_key, &mut oracle)?;
        Ok(())
    }

    /// Writes a new PIN, then unlocks with it to prove the write took.
    /// The payload is the full image.
    pub fn set_pin(&mut self, args: &PinArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "setpin");
        let status = match self.run_set_pin(args) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &self.tag.data)
    }

    fn run_set_pin(&mut self, args: &PinArgs) -> Result<(), Error> {
        self.begin(args.command_parity)?;
        read_id(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag)?;

        write_word(
            &mut self.platform,
            &mut self.trace,
            self.command_parity,
            args.pin as u16,
            TagImage::PIN_WORD_UPPER,
        )?;
        write_word(
            &mut self.platform,
            &mut self.trace,
            self.command_parity,
            (args.pin >> 16) as u16,
            TagImage::PIN_WORD_LOWER,
        )?;

        send_pin(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag, args.pin)?;

        let _ = read_um1(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
        let _ = read_um2(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag);
        Ok(())
    }

    /// Writes the six crypto-key words, top block first. The payload is
    /// the full image.
    pub fn set_key(&mut self, args: &KeyArgs) -> CommandResponse {
        self.warn_if_parity(args.command_parity, "setkey");
        let status = match self.run_set_key(args) {
            Ok(()) => Status::Ok,
            Err(e) => e.into(),
        };
        CommandResponse::new(status, &self.tag.data)
    }

    fn run_set_key(&mut self, args: &KeyArgs) -> Result<(), Error> {
        self.begin(args.command_parity)?;

        // Read ID first to confirm the tag answers at all.
        read_id(&mut self.platform, &mut self.trace, self.command_parity, &mut self.tag)?;

        for i in 0..6u8 {
            let idx = usize::from(i) * 2;
            let word = u16::from(args.crypt_key[idx + 1]) << 8 | u16::from(args.crypt_key[idx]);
            write_word(
                &mut self.platform,
                &mut self.trace,
                self.command_parity,
                word,
                TagImage::KEY_WORD_TOP - i,
            )?;
        }
        Ok(())
    }
}

/// The live-tag oracle handed to the brute-force sweep.
struct TagOracle<'a, P: Platform> {
    platform: &'a mut P,
    trace: &'a mut TransactionTrace,
    command_parity: bool,
}

impl<P: Platform> AuthOracle for TagOracle<'_, P> {
    fn try_auth(&mut self, rnd: &[u8; 7], frnd: &[u8; 4]) -> bool {
        let mut response = [0u8; 3];
        authenticate(self.platform, self.trace, self.command_parity, rnd, frnd, &mut response)
            .is_ok()
    }

    fn checkpoint(&mut self, key: u16) {
        #[cfg(feature = "log")]
        log::info!("trying key {key:04X}");
        #[cfg(not(feature = "log"))]
        let _ = key;
        self.platform.wdt_kick();
    }

    fn abort_requested(&mut self) -> bool {
        self.platform.abort_requested()
    }
}

/// Runs one data-returning transaction: listen window, transmit, receive,
/// convert. The received bytes land in `cmd.received_bytes`.
fn transact<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    cmd: &mut CommandBitstream,
) -> Result<(), Error> {
    match cmd.kind {
        CommandKind::Id | CommandKind::Um1 | CommandKind::Um2 | CommandKind::Auth => {}
        // PIN and WRITE have their own engines with wait states and ACKs.
        _ => return Err(Error::Validation),
    }
    let expected = cmd.expected_receive_bits;
    if cmd.to_send.is_empty() || cmd.to_send.len() >= MAX_SEND_BITCOUNT {
        return Err(Error::Validation);
    }
    if expected == 0 || expected > MAX_RECEIVE_BITCOUNT {
        return Err(Error::Validation);
    }
    // Authentication receives 20 bits but decodes 24: round up to the
    // byte boundary, padding with zeros.
    let bits_to_decode = expected.div_ceil(8) * 8;
    if bits_to_decode > MAX_RECEIVE_BITCOUNT {
        return Err(Error::Validation);
    }

    trace.reset();
    send_bitstream(p, trace, &cmd.to_send)?;
    let got = receive(p, trace, &mut cmd.to_receive, expected);
    trace.dump();

    if got < expected {
        return Err(Error::ShortRead {
            got: got as u8,
            expected: expected as u8,
        });
    }
    while cmd.to_receive.len() < bits_to_decode {
        cmd.to_receive.push_bit(0)?;
    }
    pack_bits_reversed(
        cmd.to_receive.as_bits(),
        &mut cmd.received_bytes[..bits_to_decode / 8],
    )
}

fn read_id<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    tag: &mut TagImage,
) -> Result<(), Error> {
    let mut cmd = CommandBitstream::read_id(command_parity)?;
    transact(p, trace, &mut cmd)?;
    tag.data[TagImage::ID_OFFSET..TagImage::ID_OFFSET + 4]
        .copy_from_slice(&cmd.received_bytes[..4]);
    Ok(())
}

fn read_um1<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    tag: &mut TagImage,
) -> Result<(), Error> {
    let mut cmd = CommandBitstream::read_um1(command_parity)?;
    transact(p, trace, &mut cmd)?;
    tag.data[0..4].copy_from_slice(&cmd.received_bytes[..4]);
    Ok(())
}

fn read_um2<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    tag: &mut TagImage,
) -> Result<(), Error> {
    let mut cmd = CommandBitstream::read_um2(command_parity)?;
    transact(p, trace, &mut cmd)?;
    tag.data[TagImage::UM2_OFFSET..TagImage::UM2_OFFSET + 8]
        .copy_from_slice(&cmd.received_bytes[..8]);
    Ok(())
}

fn authenticate<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    rnd: &[u8; 7],
    frnd: &[u8; 4],
    response: &mut [u8; 3],
) -> Result<(), Error> {
    let mut cmd = CommandBitstream::auth(command_parity, rnd, frnd)?;
    transact(p, trace, &mut cmd)?;
    response.copy_from_slice(&cmd.received_bytes[..3]);
    Ok(())
}

/// Sends the PIN and, after the ACK, reads back the 32-bit ID into the
/// tag image.
fn send_pin<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    tag: &mut TagImage,
    pin: u32,
) -> Result<(), Error> {
    let mut cmd = CommandBitstream::send_pin(command_parity, &tag.id(), pin)?;

    trace.reset();
    if !find_listen_window(p, trace, true) {
        trace.dump();
        return Err(Error::Timeout);
    }
    for &bit in cmd.to_send.as_bits() {
        send_bit(p, trace, bit);
    }

    // The tag writes its lock bits before answering.
    p.wait_ticks(T_TAG_TWALB);
    if !check_ack(p) {
        trace.dump();
        return Err(Error::Nak);
    }

    p.wait_ticks(T_TAG_WEE);
    let got = receive(p, trace, &mut cmd.to_receive, 32);
    trace.dump();
    if got < 32 {
        return Err(Error::ShortRead {
            got: got as u8,
            expected: 32,
        });
    }
    pack_bits_reversed(cmd.to_receive.as_bits(), &mut cmd.received_bytes[..4])?;
    tag.data[TagImage::ID_OFFSET..TagImage::ID_OFFSET + 4]
        .copy_from_slice(&cmd.received_bytes[..4]);
    Ok(())
}

/// Writes one word. Success is two ACKs; the tag returns no data.
fn write_word<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    command_parity: bool,
    word: u16,
    address: u8,
) -> Result<(), Error> {
    let cmd = CommandBitstream::write_word(command_parity, word, address)?;

    trace.reset();
    if !find_listen_window(p, trace, true) {
        trace.dump();
        return Err(Error::Timeout);
    }
    for &bit in cmd.to_send.as_bits() {
        send_bit(p, trace, bit);
    }

    p.wait_ticks(T_TAG_TWA);
    if !check_ack(p) {
        trace.dump();
        return Err(Error::Nak);
    }

    // The EEPROM write itself, confirmed by the second ACK.
    p.wait_ticks(T_TAG_WEE);
    let acked = check_ack(p);
    trace.dump();
    if acked { Ok(()) } else { Err(Error::Nak) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{T_TAG_FULL_PERIOD, TICKS_PER_FC};
    use crate::testutil::{ScriptedPlatform, fc, listen_window, tag_response};
    use std::vec::Vec as StdVec;

    fn msb_bits(bytes: &[u8]) -> StdVec<u8> {
        let mut bits = StdVec::new();
        for &b in bytes {
            for i in (0..8).rev() {
                bits.push((b >> i) & 1);
            }
        }
        bits
    }

    /// Listen-window pattern without its quiet tail; the closing edge sits
    /// at 368 fc.
    fn liw_head() -> StdVec<(bool, u32)> {
        let mut segs = listen_window();
        let _ = segs.pop();
        segs
    }

    /// Ticks consumed by `n` transmitted bits on the scripted platform.
    fn sent_bits(n: u32) -> u32 {
        n * (T_TAG_FULL_PERIOD + 3)
    }

    /// Nominal tick at which transmission ends: listen-window close, RM
    /// turnaround, two RM bits, then the command bits.
    fn send_end(command_bits: u32) -> u32 {
        fc(368) + fc(40) + sent_bits(2 + command_bits)
    }

    /// An ACK whose first falling edge lands two full periods after
    /// `measure_start`.
    fn ack_segments(segs: &mut StdVec<(bool, u32)>, mut cursor: u32, measure_start: u32) -> u32 {
        let f1 = measure_start + 2 * T_TAG_FULL_PERIOD;
        segs.push((false, f1 - T_TAG_FULL_PERIOD - cursor));
        segs.push((true, T_TAG_FULL_PERIOD));
        segs.push((false, T_TAG_FULL_PERIOD));
        segs.push((true, T_TAG_FULL_PERIOD));
        cursor = f1 + 2 * T_TAG_FULL_PERIOD;
        cursor
    }

    #[test]
    fn test_read_id_transaction() {
        // Listen window, then the ID response placed after the reader's
        // 4-bit command has gone out.
        let mut segs = liw_head();
        let response_start = send_end(4) + 100;
        segs.push((false, response_start - fc(368)));
        segs.extend(tag_response(&msb_bits(&[0xde, 0xad, 0xbe, 0xef])));

        let mut p = ScriptedPlatform::new(segs);
        let mut trace = TransactionTrace::new();
        let mut tag = TagImage::new();
        read_id(&mut p, &mut trace, false, &mut tag).unwrap();

        // bytes land in reverse order: image holds LSB first
        assert_eq!(&tag.data[4..8], &[0xef, 0xbe, 0xad, 0xde]);
        // RM preamble plus the four opcode bits
        assert_eq!(&trace.transmit.bits()[..6], &[0, 0, 0, 0, 0, 1]);
        assert_eq!(trace.receive.bits().len(), 32);
    }

    #[test]
    fn test_read_id_short_response_is_short_read() {
        let mut segs = liw_head();
        let response_start = send_end(4) + 100;
        segs.push((false, response_start - fc(368)));
        // only 8 bits instead of 32
        segs.extend(tag_response(&msb_bits(&[0x5a])));

        let mut p = ScriptedPlatform::new(segs);
        let mut trace = TransactionTrace::new();
        let mut tag = TagImage::new();
        assert!(matches!(
            read_id(&mut p, &mut trace, false, &mut tag),
            Err(Error::ShortRead { expected: 32, .. })
        ));
    }

    #[test]
    fn test_write_word_two_acks() {
        let mut segs = liw_head();
        let mut cursor = fc(368);

        // first ACK after TWA
        let ack1_start = send_end(34) + 128 * TICKS_PER_FC + 5;
        cursor = ack_segments(&mut segs, cursor, ack1_start);
        // second ACK after WEE
        let ack2_start = cursor + 4 + crate::consts::T_TAG_WEE + 5;
        let _ = ack_segments(&mut segs, cursor, ack2_start);
        segs.push((false, fc(512)));

        let mut p = ScriptedPlatform::new(segs);
        let mut trace = TransactionTrace::new();
        write_word(&mut p, &mut trace, false, 0xa53c, 0x05).unwrap();
        // 2 RM bits + 34 command bits were modulated
        assert_eq!(trace.transmit.bits().len(), 36);
    }

    #[test]
    fn test_write_word_nak_is_error() {
        // No ACK pattern anywhere after the command: dead air NAKs.
        let mut segs = liw_head();
        segs.push((false, fc(4096)));

        let mut p = ScriptedPlatform::new(segs);
        let mut trace = TransactionTrace::new();
        assert_eq!(
            write_word(&mut p, &mut trace, false, 0x1234, 0x05),
            Err(Error::Nak)
        );
    }

    #[test]
    fn test_send_pin_unlocks_and_reads_new_id() {
        let mut segs = liw_head();
        let mut cursor = fc(368);

        let ack_start = send_end(68) + crate::consts::T_TAG_TWALB + 5;
        cursor = ack_segments(&mut segs, cursor, ack_start);

        // new ID response placed after the EEPROM wait
        let response_start = cursor + 4 + crate::consts::T_TAG_WEE + 60;
        segs.push((false, response_start - cursor));
        segs.extend(tag_response(&msb_bits(&[0xde, 0xad, 0xbe, 0xef])));

        let mut p = ScriptedPlatform::new(segs);
        let mut trace = TransactionTrace::new();
        let mut tag = TagImage::new();

        send_pin(&mut p, &mut trace, false, &mut tag, 0x1234_5678).unwrap();
        // image now holds the ID the tag answered with
        assert_eq!(&tag.data[4..8], &[0xef, 0xbe, 0xad, 0xde]);
        // RM + 68 command bits sent, 32 bits received
        assert_eq!(trace.transmit.bits().len(), 70);
        assert_eq!(trace.receive.bits().len(), 32);
    }

    #[test]
    fn test_transact_rejects_write_kind() {
        let mut p = ScriptedPlatform::dead_air();
        let mut trace = TransactionTrace::new();
        let mut cmd = CommandBitstream::write_word(false, 0, 0).unwrap();
        assert_eq!(
            transact(&mut p, &mut trace, &mut cmd),
            Err(Error::Validation)
        );
    }

    #[test]
    fn test_info_dead_air_is_no_signal() {
        let mut reader = Em4x70::new(ScriptedPlatform::dead_air());
        let response = reader.info(false);
        assert_eq!(response.status, Status::SoftError);
        assert!(response.data.is_empty());

        let p = reader.release();
        assert_eq!(p.field_on_count, 1);
        assert_eq!(p.settle_count, 1);
        assert_eq!(p.wdt_kicks, 1);
    }

    #[test]
    fn test_signal_without_listen_window_is_soft_error() {
        // Carrier present but never a listen window.
        let mut segs = StdVec::new();
        for _ in 0..2000 {
            segs.push((true, fc(16)));
            segs.push((false, fc(16)));
        }
        let mut reader = Em4x70::new(ScriptedPlatform::new(segs));
        let response = reader.info(false);
        assert_eq!(response.status, Status::SoftError);
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_write_dead_air_returns_full_image() {
        let mut reader = Em4x70::new(ScriptedPlatform::dead_air());
        let response = reader.write(&WriteArgs {
            command_parity: false,
            word: 0x1234,
            address: 1,
        });
        assert_eq!(response.status, Status::SoftError);
        assert_eq!(response.data.len(), 32);
    }

    #[test]
    fn test_auth_dead_air_payload_is_three_bytes() {
        let mut reader = Em4x70::new(ScriptedPlatform::dead_air());
        let response = reader.auth(&AuthArgs {
            command_parity: false,
            rnd: [0; 7],
            frnd: [0; 4],
        });
        assert_eq!(response.status, Status::SoftError);
        assert_eq!(response.data.len(), 3);
    }

    #[test]
    fn test_brute_dead_air_payload_is_two_bytes() {
        let mut reader = Em4x70::new(ScriptedPlatform::dead_air());
        let response = reader.brute(&BruteArgs {
            command_parity: false,
            address: 9,
            rnd: [0; 7],
            frnd: [0; 4],
            start_key: 0,
        });
        assert_eq!(response.status, Status::SoftError);
        assert_eq!(response.data.len(), 2);
    }

    #[test]
    fn test_tag_image_layout() {
        let mut tag = TagImage::new();
        tag.data[4..8].copy_from_slice(&[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(tag.id(), [0x78, 0x56, 0x34, 0x12]);
        tag.reset();
        assert_eq!(tag.data, [0; 32]);
        assert_eq!(TagImage::KEY_WORD_TOP, 9);
        assert_eq!(TagImage::PIN_WORD_LOWER, 10);
        assert_eq!(TagImage::PIN_WORD_UPPER, 11);
    }
}
