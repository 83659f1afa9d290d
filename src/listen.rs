//! Listen-window detection and ACK/NAK classification.
//!
//! Between frames the tag emits a fixed pulse pattern (the listen window),
//! the only point at which the reader may issue a command. The detector
//! recognizes the pattern from four consecutive pulse widths:
//!
//! ```text
//! rising  80 fc ( 64 + 16 )
//! rising  80 fc ( 64 + 16 )
//! falling 96 fc ( 64 + 32 )
//! falling 64 fc ( 32 + 16 + 16 )
//! ```
//!
//! After acceptance the reader may announce a command by sending the RM
//! preamble: two 0 bits, emitted one turnaround delay after the closing
//! edge.

use crate::consts::{
    LIW_SEARCH_ATTEMPTS, T_RM_TURNAROUND_FC, T_TAG_FULL_PERIOD, T_TAG_HALF_PERIOD, TICKS_PER_FC,
};
use crate::modulate::send_bit;
use crate::platform::{Edge, Platform};
use crate::pulse::{check_pulse_length, pulse_length};
use crate::trace::TransactionTrace;

/// Searches for a listen window, inspecting up to
/// [`LIW_SEARCH_ATTEMPTS`] pulse quadruples.
///
/// With `emit_rm` the RM preamble is sent immediately after acceptance,
/// leaving the field ready for the command bits. Returns `false` if no
/// window was found (no tag, or the field is too noisy).
pub(crate) fn find_listen_window<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    emit_rm: bool,
) -> bool {
    for _ in 0..LIW_SEARCH_ATTEMPTS {
        if check_pulse_length(
            pulse_length(p, Edge::Rising),
            2 * T_TAG_FULL_PERIOD + T_TAG_HALF_PERIOD,
        ) && check_pulse_length(
            pulse_length(p, Edge::Rising),
            2 * T_TAG_FULL_PERIOD + T_TAG_HALF_PERIOD,
        ) && check_pulse_length(pulse_length(p, Edge::Falling), 3 * T_TAG_FULL_PERIOD)
            && check_pulse_length(pulse_length(p, Edge::Falling), 2 * T_TAG_FULL_PERIOD)
        {
            if emit_rm {
                // Reader-to-tag turnaround after the closing edge. The
                // datasheet asks for about 48 field cycles; 32..40 is what
                // works on real antennas.
                p.wait_ticks(T_RM_TURNAROUND_FC * TICKS_PER_FC);
                send_bit(p, trace, 0);
                send_bit(p, trace, 0);
            }
            return true;
        }
    }
    false
}

/// Classifies the tag's answer after a write-style wait state.
///
/// ACK is two successive falling pulses of two full periods each. Anything
/// else, a listen window included, reads as NAK.
pub(crate) fn check_ack<P: Platform>(p: &mut P) -> bool {
    check_pulse_length(pulse_length(p, Edge::Falling), 2 * T_TAG_FULL_PERIOD)
        && check_pulse_length(pulse_length(p, Edge::Falling), 2 * T_TAG_FULL_PERIOD)
}
