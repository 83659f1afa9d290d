//! Brute-force recovery of one 16-bit key word.
//!
//! The EM4x70 key is written in 16-bit words; a partially known key leaves
//! a 16-bit word to recover by sweeping all candidates. For each candidate
//! the reference nonce is mutated so that the tag's cipher sees the
//! candidate folded into the right key word, then a single authentication
//! is attempted. One attempt per candidate is a deliberate performance
//! trade; the RF link has to be stable for the sweep to be conclusive.
//!
//! The arithmetic runs over reflected bytes: the candidate and every nonce
//! byte are bit-reversed before the addition, and every stored byte is
//! reversed back. Normalizing the byte order earlier diverges on non-zero
//! inputs, so the recurrence is kept exactly as the cipher expects it.

use crate::error::Error;

/// The authentication transaction and housekeeping the sweep needs from
/// its caller. In production this is the live tag behind the reader; tests
/// substitute a scripted oracle.
pub trait AuthOracle {
    /// Runs one authentication; `true` on a full g(RN) response.
    fn try_auth(&mut self, rnd: &[u8; 7], frnd: &[u8; 4]) -> bool;

    /// Called every 256 candidates: report progress, feed the watchdog.
    fn checkpoint(&mut self, key: u16);

    /// Polled every iteration; `true` abandons the sweep.
    fn abort_requested(&mut self) -> bool;
}

/// Start index of the carry chain for each writable key word.
fn chain_start(address: u8) -> Result<usize, Error> {
    match address {
        9 => Ok(0),
        8 => Ok(2),
        7 => Ok(4),
        _ => Err(Error::Validation),
    }
}

/// Folds `key` into the reference nonce for the given key-word address.
///
/// The low candidate byte is added to the reflected nonce byte at the
/// chain start, the high byte (plus carry) to the next, and the carry
/// propagates through the remaining bytes. Bytes below the chain start
/// keep their original value.
pub fn candidate_nonce(address: u8, rnd: &[u8; 7], key: u16) -> Result<[u8; 7], Error> {
    let start = chain_start(address)?;
    let rk = key.reverse_bits();

    let mut out = *rnd;
    let mut carry: u16 = 0;
    for i in start..7 {
        let mut value = u16::from(rnd[i].reverse_bits()) + carry;
        if i == start {
            value += rk & 0xff;
        } else if i == start + 1 {
            value += rk >> 8;
        }
        carry = u16::from(value > 0xff);
        out[i] = (value as u8).reverse_bits();
    }
    Ok(out)
}

/// Sweeps `start_key..=0xFFFF`, one authentication per candidate.
///
/// Returns the recovered key as two big-endian bytes. The abort source is
/// polled every iteration; [`AuthOracle::checkpoint`] fires every 256
/// candidates.
pub fn search<O: AuthOracle>(
    address: u8,
    rnd: &[u8; 7],
    frnd: &[u8; 4],
    start_key: u16,
    oracle: &mut O,
) -> Result<[u8; 2], Error> {
    chain_start(address)?;

    for key in u32::from(start_key)..=0xffff {
        let key = key as u16;
        let temp_rnd = candidate_nonce(address, rnd, key)?;

        if key % 0x100 == 0 {
            oracle.checkpoint(key);
        }

        if oracle.try_auth(&temp_rnd, frnd) {
            return Ok(key.to_be_bytes());
        }

        if oracle.abort_requested() {
            return Err(Error::Aborted);
        }
    }

    Err(Error::KeyNotFound)
}
