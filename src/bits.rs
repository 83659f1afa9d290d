//! Bit-symbol buffers for command transmission and reception.
//!
//! A [`BitBuffer`] stores one bit per byte. This is not a storage
//! optimization: the per-bit transmit and receive loops are timing
//! sensitive, and indexing a byte array keeps them free of shifts and
//! masks. Builders fill buffers most-significant-bit first, matching the
//! on-air bit order of every EM4x70 command.
//!
//! The module also provides [`pack_bits_reversed`], the bit-to-byte
//! conversion used when a received bitstream is handed back to the host:
//! bits are packed MSB first, but the resulting bytes are written in
//! reverse index order, so the oldest eight bits land in the *last* byte.
//! For the 20-bit authentication response, padded to 24 bits, the output
//! reads `{g3..g0 0000, g11..g4, g19..g12}`.

use crate::consts::NIBBLE_PARITY;
use crate::error::Error;
use heapless::Vec;

/// A bounded buffer of bit symbols, one bit per byte.
///
/// `N` is the capacity in bits. Outgoing command streams use
/// [`MAX_SEND_BITCOUNT`](crate::consts::MAX_SEND_BITCOUNT), incoming
/// streams [`MAX_RECEIVE_BITCOUNT`](crate::consts::MAX_RECEIVE_BITCOUNT).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct BitBuffer<const N: usize> {
    bits: Vec<u8, N>,
}

impl<const N: usize> BitBuffer<N> {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// Number of bits currently stored.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if no bits are stored.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The stored bits, oldest first, each byte holding 0 or 1.
    pub fn as_bits(&self) -> &[u8] {
        &self.bits
    }

    /// Removes all bits.
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Appends a single bit. Any nonzero value is stored as 1.
    pub fn push_bit(&mut self, bit: u8) -> Result<(), Error> {
        self.bits
            .push(if bit != 0 { 1 } else { 0 })
            .map_err(|_| Error::Validation)
    }

    /// Appends the 8 bits of `byte`, most significant first.
    pub fn push_byte(&mut self, byte: u8) -> Result<(), Error> {
        for shift in (0..8).rev() {
            self.push_bit((byte >> shift) & 1)?;
        }
        Ok(())
    }

    /// Appends the low 4 bits of `nibble`, most significant first.
    pub fn push_nibble(&mut self, nibble: u8) -> Result<(), Error> {
        for shift in (0..4).rev() {
            self.push_bit((nibble >> shift) & 1)?;
        }
        Ok(())
    }

    /// Appends the even-parity bit of the low 4 bits of `nibble`: the XOR
    /// of its four bits, looked up as bit `nibble` of 0x6996.
    pub fn push_nibble_parity(&mut self, nibble: u8) -> Result<(), Error> {
        let n = nibble & 0x0f;
        self.push_bit(((NIBBLE_PARITY >> n) & 1) as u8)
    }
}

/// Packs eight bit symbols into a byte, most significant bit first.
pub(crate) fn byte_from_bits(bits: &[u8]) -> u8 {
    let mut byte = 0u8;
    for &bit in bits.iter().take(8) {
        byte = (byte << 1) | (bit & 1);
    }
    byte
}

/// Converts a bit-symbol slice into bytes, writing the bytes in reverse
/// index order: the first eight bits land in `out[n - 1]`, the next eight
/// in `out[n - 2]`, and so on.
///
/// `bits.len()` must be a multiple of 8 and `out` must hold exactly
/// `bits.len() / 8` bytes; anything else is a caller error in the
/// bitstream shape.
pub(crate) fn pack_bits_reversed(bits: &[u8], out: &mut [u8]) -> Result<(), Error> {
    if bits.len() % 8 != 0 || out.len() != bits.len() / 8 {
        return Err(Error::Validation);
    }
    let num_bytes = bits.len() / 8;
    for (i, chunk) in bits.chunks_exact(8).enumerate() {
        out[num_bytes - 1 - i] = byte_from_bits(chunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_byte_msb_first() {
        let mut buf: BitBuffer<16> = BitBuffer::new();
        buf.push_byte(0xa5).unwrap();
        assert_eq!(buf.as_bits(), &[1, 0, 1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_push_nibble_msb_first() {
        let mut buf: BitBuffer<8> = BitBuffer::new();
        buf.push_nibble(0x0c).unwrap();
        buf.push_nibble(0x03).unwrap();
        assert_eq!(buf.as_bits(), &[1, 1, 0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_nibble_parity_matches_bit_xor() {
        for n in 0u8..16 {
            let mut buf: BitBuffer<1> = BitBuffer::new();
            buf.push_nibble_parity(n).unwrap();
            let xor = (n & 1) ^ ((n >> 1) & 1) ^ ((n >> 2) & 1) ^ ((n >> 3) & 1);
            assert_eq!(buf.as_bits()[0], xor, "nibble {n:#x}");
        }
    }

    #[test]
    fn test_push_past_capacity_is_validation_error() {
        let mut buf: BitBuffer<4> = BitBuffer::new();
        buf.push_nibble(0xf).unwrap();
        assert_eq!(buf.push_bit(1), Err(Error::Validation));
    }

    #[test]
    fn test_pack_reversed_inverts_msb_first_unpacking() {
        // Unpack MSB first, repack, expect the source bytes reversed.
        let source = [0x12u8, 0x34, 0x56, 0x78];
        let mut bits: BitBuffer<32> = BitBuffer::new();
        for b in source {
            bits.push_byte(b).unwrap();
        }
        let mut out = [0u8; 4];
        pack_bits_reversed(bits.as_bits(), &mut out).unwrap();
        assert_eq!(out, [0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_pack_rejects_ragged_input() {
        let bits = [1u8, 0, 1];
        let mut out = [0u8; 1];
        assert_eq!(
            pack_bits_reversed(&bits, &mut out),
            Err(Error::Validation)
        );
    }

    #[test]
    fn test_auth_response_layout() {
        // 20 bits of g(RN), oldest bit = g19, padded to 24 bits with
        // trailing zeros: bytes read {g3..g0 0000, g11..g4, g19..g12}.
        let mut bits: BitBuffer<24> = BitBuffer::new();
        // g(RN) = 0xfffff (all ones) makes the padding visible.
        for _ in 0..20 {
            bits.push_bit(1).unwrap();
        }
        for _ in 0..4 {
            bits.push_bit(0).unwrap();
        }
        let mut out = [0u8; 3];
        pack_bits_reversed(bits.as_bits(), &mut out).unwrap();
        assert_eq!(out, [0xf0, 0xff, 0xff]);
    }
}
