//! Tick-stamped transaction trace.
//!
//! Between the bits of a transmission nothing may run that could stretch a
//! bit period, so the engine never formats text inside a transaction.
//! Instead every sent and received bit is recorded with its tick into a
//! preallocated trace, which the host renders after the transaction
//! completes (via `log` when that feature is enabled).

use crate::consts::MAX_TRACE_BITS;
use heapless::Vec;

/// One direction of a transaction: tick window plus the raw bit symbols.
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TraceChannel {
    start_tick: u32,
    end_tick: u32,
    bits: Vec<u8, MAX_TRACE_BITS>,
}

impl TraceChannel {
    /// Tick of the first recorded bit.
    pub fn start_tick(&self) -> u32 {
        self.start_tick
    }

    /// Tick recorded after the last bit.
    pub fn end_tick(&self) -> u32 {
        self.end_tick
    }

    /// The recorded bit symbols, oldest first.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    fn clear(&mut self) {
        self.start_tick = 0;
        self.end_tick = 0;
        self.bits.clear();
    }

    #[cfg(feature = "log")]
    fn dump(&self, direction: &str) {
        if self.bits.is_empty() {
            log::debug!("{direction}: no data");
            return;
        }
        let mut bitstring: heapless::String<MAX_TRACE_BITS> = heapless::String::new();
        for &bit in self.bits.iter() {
            let _ = bitstring.push(if bit != 0 { '1' } else { '0' });
        }
        log::debug!(
            "{direction}: [ {:8} .. {:8} ] ( {:6} ) {:2} bits: {}",
            self.start_tick,
            self.end_tick,
            self.end_tick.wrapping_sub(self.start_tick),
            self.bits.len(),
            bitstring
        );
    }
}

/// Transmit and receive records for one transaction.
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TransactionTrace {
    /// Bits the reader modulated onto the field, RM preamble included.
    pub transmit: TraceChannel,
    /// Bits decoded from the tag.
    pub receive: TraceChannel,
}

impl TransactionTrace {
    /// Creates an empty trace.
    pub const fn new() -> Self {
        Self {
            transmit: TraceChannel {
                start_tick: 0,
                end_tick: 0,
                bits: Vec::new(),
            },
            receive: TraceChannel {
                start_tick: 0,
                end_tick: 0,
                bits: Vec::new(),
            },
        }
    }

    /// Clears both channels. Called at the start of every transaction.
    pub fn reset(&mut self) {
        self.transmit.clear();
        self.receive.clear();
    }

    /// Records one transmitted bit starting at `start_tick`.
    pub(crate) fn sent_bit(&mut self, start_tick: u32, bit: u8) {
        if self.transmit.bits.is_empty() {
            self.transmit.start_tick = start_tick;
        }
        let _ = self.transmit.bits.push(if bit != 0 { 1 } else { 0 });
    }

    /// Stamps the end of the most recent transmitted bit.
    pub(crate) fn sent_bit_end(&mut self, end_tick: u32) {
        self.transmit.end_tick = end_tick;
    }

    /// Stamps the start of reception, first call wins.
    pub(crate) fn received_start(&mut self, start_tick: u32) {
        if self.receive.start_tick == 0 {
            self.receive.start_tick = start_tick;
        }
    }

    /// Stamps the end of reception.
    pub(crate) fn received_end(&mut self, end_tick: u32) {
        self.receive.end_tick = end_tick;
    }

    /// Appends decoded bit symbols to the receive record.
    pub(crate) fn received_bits(&mut self, bits: &[u8]) {
        let _ = self.receive.bits.extend_from_slice(bits);
    }

    /// Renders both channels through `log`. A no-op without that feature.
    pub fn dump(&self) {
        #[cfg(feature = "log")]
        {
            self.transmit.dump("sent >>>");
            self.receive.dump("recv <<<");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sent_bit_stamps_start() {
        let mut trace = TransactionTrace::new();
        trace.sent_bit(1000, 0);
        trace.sent_bit(1384, 1);
        trace.sent_bit_end(1768);
        assert_eq!(trace.transmit.start_tick(), 1000);
        assert_eq!(trace.transmit.end_tick(), 1768);
        assert_eq!(trace.transmit.bits(), &[0, 1]);
    }

    #[test]
    fn test_receive_start_is_sticky() {
        let mut trace = TransactionTrace::new();
        trace.received_start(500);
        trace.received_start(900);
        assert_eq!(trace.receive.start_tick(), 500);
    }

    #[test]
    fn test_reset_clears_both_channels() {
        let mut trace = TransactionTrace::new();
        trace.sent_bit(10, 1);
        trace.received_bits(&[1, 0, 1]);
        trace.reset();
        assert!(trace.transmit.bits().is_empty());
        assert!(trace.receive.bits().is_empty());
        assert_eq!(trace.transmit.start_tick(), 0);
    }
}
