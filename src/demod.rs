//! Receive path: edge-timed pulse-length demodulation.
//!
//! Every tag response opens with a fixed header of twelve Manchester 1s
//! followed by four 0s. The decoder skips roughly half of the leading 1s,
//! locks onto the 1-to-0 transition (a pulse of one and a half bit
//! periods), consumes the remaining 0s, and then classifies pulse widths
//! into data bits.
//!
//! Between listen windows only pulse widths of 1, 1.5 and 2 bit periods
//! can occur:
//!
//! - one period: one bit, 1 on a falling measurement and 0 on a rising one,
//! - one and a half: two equal bits, and the active edge flips,
//! - two: two unequal bits, edge unchanged.
//!
//! Any other width is the next listen window (or noise) and ends the
//! stream.

use crate::bits::BitBuffer;
use crate::consts::{
    MAX_RECEIVE_BITCOUNT, READ_HEADER_LEN, T_TAG_FULL_PERIOD, T_TAG_HALF_PERIOD,
};
use crate::platform::{Edge, Platform};
use crate::pulse::{check_pulse_length, pulse_length};
use crate::trace::TransactionTrace;

/// Decodes up to `max_bits` bits from the tag into `out`.
///
/// Returns the number of bits decoded; 0 if the header never appeared.
/// Short counts are possible when a listen window interrupts the stream
/// early; the caller decides whether that is an error.
pub(crate) fn receive<P: Platform>(
    p: &mut P,
    trace: &mut TransactionTrace,
    out: &mut BitBuffer<MAX_RECEIVE_BITCOUNT>,
    max_bits: usize,
) -> usize {
    let mut edge = Edge::Rising;
    out.clear();

    // Skip about half of the leading 1s; the signal may still be settling.
    p.wait_ticks(6 * T_TAG_FULL_PERIOD);

    // Wait for the 1-to-0 transition, one and a half bit periods wide.
    let mut found_header = false;
    for _ in 0..READ_HEADER_LEN {
        let pl = pulse_length(p, edge);
        if check_pulse_length(pl, 3 * T_TAG_HALF_PERIOD) {
            found_header = true;
            break;
        }
    }
    if !found_header {
        return 0;
    }

    // The transition consumed the first 0; the next three must be plain
    // full-period pulses.
    for _ in 0..3 {
        if !check_pulse_length(pulse_length(p, edge), T_TAG_FULL_PERIOD) {
            return 0;
        }
    }
    let start = p.now_ticks();
    trace.received_start(start);

    while out.len() < max_bits {
        let pl = pulse_length(p, edge);

        if check_pulse_length(pl, T_TAG_FULL_PERIOD) {
            let bit = if edge == Edge::Falling { 1 } else { 0 };
            let _ = out.push_bit(bit);
        } else if check_pulse_length(pl, 3 * T_TAG_HALF_PERIOD) {
            match edge {
                Edge::Falling => {
                    let _ = out.push_bit(0);
                    if out.len() < max_bits {
                        let _ = out.push_bit(0);
                    }
                    edge = Edge::Rising;
                }
                Edge::Rising => {
                    let _ = out.push_bit(1);
                    if out.len() < max_bits {
                        let _ = out.push_bit(1);
                    }
                    edge = Edge::Falling;
                }
            }
        } else if check_pulse_length(pl, 2 * T_TAG_FULL_PERIOD) {
            match edge {
                Edge::Falling => {
                    let _ = out.push_bit(0);
                    if out.len() < max_bits {
                        let _ = out.push_bit(1);
                    }
                }
                Edge::Rising => {
                    let _ = out.push_bit(1);
                    if out.len() < max_bits {
                        let _ = out.push_bit(0);
                    }
                }
            }
        } else {
            // Listen window, or an invalid bit.
            break;
        }
    }

    trace.received_end(p.now_ticks());
    trace.received_bits(out.as_bits());
    out.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedPlatform, fc, push_manchester, tag_response};

    fn decode(payload: &[u8], max_bits: usize) -> (usize, std::vec::Vec<u8>) {
        let mut p = ScriptedPlatform::new(tag_response(payload));
        let mut trace = TransactionTrace::new();
        let mut out = BitBuffer::new();
        let n = receive(&mut p, &mut trace, &mut out, max_bits);
        (n, out.as_bits().to_vec())
    }

    #[test]
    fn test_width_classes_decode() {
        // As a pulse sequence this is FULL, FULL, 2*FULL, 3*HALF, FULL
        // starting on a rising measurement: 0, 0, then 1,0 from the double
        // width, then 1,1 with an edge flip, then 1 on the falling edge.
        let (n, bits) = decode(&[0, 0, 1, 0, 1, 1, 1], 7);
        assert_eq!(n, 7);
        assert_eq!(bits, vec![0, 0, 1, 0, 1, 1, 1]);
    }

    #[test]
    fn test_flip_sequence_decodes() {
        let (n, bits) = decode(&[0, 0, 0, 1, 1, 1, 1], 7);
        assert_eq!(n, 7);
        assert_eq!(bits, vec![0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_mixed_payload_roundtrip() {
        let (n, bits) = decode(&[0, 0, 1, 0, 1, 1], 6);
        assert_eq!(n, 6);
        assert_eq!(bits, vec![0, 0, 1, 0, 1, 1]);

        let (n, bits) = decode(&[1, 0, 0, 1, 0], 5);
        assert_eq!(n, 5);
        assert_eq!(bits, vec![1, 0, 0, 1, 0]);
    }

    #[test]
    fn test_byte_payload_roundtrip() {
        // A full 32-bit ID, MSB first.
        let id: u32 = 0xdead_beef;
        let mut payload = std::vec::Vec::new();
        for i in (0..32).rev() {
            payload.push(((id >> i) & 1) as u8);
        }
        let (n, bits) = decode(&payload, 32);
        assert_eq!(n, 32);
        assert_eq!(bits, payload);
    }

    #[test]
    fn test_missing_header_reads_nothing() {
        // Constant-width carrier: plenty of pulses, no 1.5-period
        // transition.
        let mut segments = std::vec::Vec::new();
        for _ in 0..40 {
            segments.push((true, fc(16)));
            segments.push((false, fc(16)));
        }
        let mut p = ScriptedPlatform::new(segments);
        let mut trace = TransactionTrace::new();
        let mut out = BitBuffer::new();
        assert_eq!(receive(&mut p, &mut trace, &mut out, 32), 0);
    }

    #[test]
    fn test_listen_window_terminates_stream_short() {
        // Header plus three bits, then quiet: asking for more returns the
        // short count.
        let mut segments = std::vec::Vec::new();
        let mut header = [1u8; 16];
        header[12..].fill(0);
        push_manchester(&mut segments, &header);
        push_manchester(&mut segments, &[0, 0, 0]);
        segments.push((false, fc(512)));
        let mut p = ScriptedPlatform::new(segments);
        let mut trace = TransactionTrace::new();
        let mut out = BitBuffer::new();
        let n = receive(&mut p, &mut trace, &mut out, 32);
        assert_eq!(n, 3);
        assert_eq!(out.as_bits(), &[0, 0, 0]);
    }

    #[test]
    fn test_dead_air_reads_nothing() {
        let mut p = ScriptedPlatform::dead_air();
        let mut trace = TransactionTrace::new();
        let mut out = BitBuffer::new();
        assert_eq!(receive(&mut p, &mut trace, &mut out, 32), 0);
    }
}
