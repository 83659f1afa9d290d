//! Timing-critical transmit path.
//!
//! [`send_bit`] is the only place that toggles the modulation pin for data
//! bits. Everything is busy-wait against the tick clock; between the bits
//! of a bitstream nothing else runs, so a bit period is never stretched
//! beyond one full period.

use crate::bits::BitBuffer;
use crate::consts::{
    COMMAND_RETRIES, MAX_SEND_BITCOUNT, T_TAG_BITMOD, T_TAG_FULL_PERIOD, T_TAG_HALF_PERIOD,
};
use crate::error::Error;
use crate::listen::find_listen_window;
use crate::platform::{Platform, ticks_elapsed};
use crate::trace::TransactionTrace;

/// Modulates a single bit onto the field.
///
/// A 0 drops the modulation pin for [`T_TAG_BITMOD`], raises it until the
/// half period, then drops it for the rest of the bit. A 1 keeps the pin
/// low for the whole period.
pub(crate) fn send_bit<P: Platform>(p: &mut P, trace: &mut TransactionTrace, bit: u8) {
    let start = p.now_ticks();
    trace.sent_bit(start, bit);

    if bit == 0 {
        p.set_mod_low();
        while ticks_elapsed(p.now_ticks(), start) <= T_TAG_BITMOD {}

        p.set_mod_high();
        while ticks_elapsed(p.now_ticks(), start) <= T_TAG_HALF_PERIOD {}

        p.set_mod_low();
        while ticks_elapsed(p.now_ticks(), start) <= T_TAG_FULL_PERIOD {}
    } else {
        p.set_mod_low();
        while ticks_elapsed(p.now_ticks(), start) <= T_TAG_FULL_PERIOD {}
    }

    trace.sent_bit_end(p.now_ticks());
}

/// Acquires a listen window (which also emits the RM preamble) and then
/// transmits every bit of `send` back to back.
///
/// Only the listen-window search retries, up to [`COMMAND_RETRIES`] times;
/// once transmission starts it runs to completion.
pub(crate) fn send_bitstream<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    send: &BitBuffer<MAX_SEND_BITCOUNT>,
) -> Result<(), Error> {
    let mut retries = COMMAND_RETRIES;
    while retries > 0 {
        retries -= 1;
        if find_listen_window(p, trace, true) {
            for &bit in send.as_bits() {
                send_bit(p, trace, bit);
            }
            return Ok(());
        }
    }
    Err(Error::Timeout)
}
