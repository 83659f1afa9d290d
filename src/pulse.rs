//! Edge-timed pulse-length measurement.
//!
//! The tag's response is decoded entirely from the spacing of same-polarity
//! edges. A measurement runs three busy-poll phases (wait until the signal
//! has moved away from the requested edge level, record the edge, wait
//! until the signal comes back), all bounded by one shared
//! [`T_TAG_TIMEOUT`] deadline. A timed-out measurement reports length 0,
//! which no caller accepts as a valid pulse.

use crate::consts::{
    HIGH_SIGNAL_THRESHOLD, T_TAG_HALF_PERIOD, T_TAG_TIMEOUT, T_TAG_TOLERANCE,
};
use crate::platform::{Edge, Platform, is_high, is_low, ticks_elapsed};

/// Polls until `pred(sample)` turns false. Returns `false` if the shared
/// measurement deadline expired first.
fn wait_while<P: Platform>(p: &mut P, timeout_start: u32, pred: fn(u8) -> bool) -> bool {
    loop {
        if !pred(p.sample()) {
            return true;
        }
        if ticks_elapsed(p.now_ticks(), timeout_start) > T_TAG_TIMEOUT {
            return false;
        }
    }
}

fn falling_pulse_length<P: Platform>(p: &mut P) -> u32 {
    let timeout_start = p.now_ticks();

    if !wait_while(p, timeout_start, is_high) {
        return 0;
    }
    let start = p.now_ticks();
    if !wait_while(p, timeout_start, is_low) {
        return 0;
    }
    if !wait_while(p, timeout_start, is_high) {
        return 0;
    }
    ticks_elapsed(p.now_ticks(), start)
}

fn rising_pulse_length<P: Platform>(p: &mut P) -> u32 {
    let timeout_start = p.now_ticks();

    if !wait_while(p, timeout_start, is_low) {
        return 0;
    }
    let start = p.now_ticks();
    if !wait_while(p, timeout_start, is_high) {
        return 0;
    }
    if !wait_while(p, timeout_start, is_low) {
        return 0;
    }
    ticks_elapsed(p.now_ticks(), start)
}

/// Ticks between two successive edges of the requested polarity, or 0 on
/// timeout.
pub(crate) fn pulse_length<P: Platform>(p: &mut P, edge: Edge) -> u32 {
    match edge {
        Edge::Rising => rising_pulse_length(p),
        Edge::Falling => falling_pulse_length(p),
    }
}

/// `true` if `pulse` lies within ±[`T_TAG_TOLERANCE`] of `target`.
pub(crate) fn check_pulse_length(pulse: u32, target: u32) -> bool {
    pulse >= target - T_TAG_TOLERANCE && pulse <= target + T_TAG_TOLERANCE
}

/// Probes for any signal above the noise threshold: two samples per bit
/// period over 32 periods. `false` means dead air, no tag in the field.
pub(crate) fn signal_present<P: Platform>(p: &mut P) -> bool {
    for _ in 0..64 {
        p.wait_ticks(T_TAG_HALF_PERIOD);
        if p.sample() > HIGH_SIGNAL_THRESHOLD {
            return true;
        }
    }
    false
}
