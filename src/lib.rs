//! # em4x70
//!
//! A portable, no_std reader-side protocol engine for the EM4x70 family of
//! low-frequency (125 kHz) contactless identification tags (V4070/EM4070
//! and EM4170), as found in vehicle immobilizers.
//!
//! The engine drives a half-duplex amplitude-modulated link to a passive
//! tag using:
//! - a platform trait for the tick clock, ADC samples and the
//!   modulation/field pins (with an `embedded-hal` adapter),
//! - pre-generated one-bit-per-byte command bitstreams, shift-free in the
//!   timing-critical loops,
//! - a pulse-length listen-window detector for frame synchronization,
//! - an edge-timed pulse-length demodulator for the tag's responses.
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Disables `#![no_std]`; enables the host-side `critical-section` implementation for tests |
//! | `defmt-0-3` | `defmt::Format` derives on public types |
//! | `log`       | Renders transaction traces, key-sweep progress and parity warnings through `log` |
//!
//! ## Operations
//!
//! One session method per host command: read ID/UM1/UM2
//! ([`info`](driver::Em4x70::info)), write a word
//! ([`write`](driver::Em4x70::write)), authenticate
//! ([`auth`](driver::Em4x70::auth)), unlock with the PIN
//! ([`unlock`](driver::Em4x70::unlock)), change the PIN or key
//! ([`set_pin`](driver::Em4x70::set_pin),
//! [`set_key`](driver::Em4x70::set_key)), and recover one 16-bit key word
//! ([`brute`](driver::Em4x70::brute)).
//!
//! ## Usage
//!
//! Command bitstreams can be built and inspected without any hardware:
//!
//! ```rust
//! use em4x70::command::CommandBitstream;
//!
//! let cmd = CommandBitstream::auth(
//!     false,
//!     &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07],
//!     &[0x11, 0x22, 0x33, 0x44],
//! )
//! .unwrap();
//! assert_eq!(cmd.to_send.len(), 95);
//! assert_eq!(cmd.expected_receive_bits, 20);
//! ```
//!
//! Running against a tag takes a [`platform::Platform`]: either implement
//! the trait over your board's timer, ADC and pins, or assemble
//! [`platform::HalPlatform`] from `embedded-hal` parts, then drive a
//! [`driver::Em4x70`] session.
//!
//! ## Integration notes
//!
//! - All timing is busy-wait against the tick clock; run transactions
//!   with interrupts masked or accept retries.
//! - Only one session may touch the field at a time; the
//!   [`global`] module parks a session for shared access.
//! - The id48 cipher that derives f(RN) is out of scope; authentication
//!   takes the pre-computed value.
//!
//! --
//! Designed for `#![no_std]` use on bare-metal readers.

#![deny(
    bad_style,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub use critical_section;
pub use heapless;

pub mod bits;
pub mod brute;
pub mod command;
pub mod consts;
mod demod;
pub mod driver;
pub mod error;
pub mod global;
mod listen;
mod modulate;
pub mod platform;
mod pulse;
#[cfg(test)]
pub(crate) mod testutil;
pub mod trace;

#[cfg(test)]
mod tests {
    use crate::driver::{Em4x70, WriteArgs};
    use crate::error::Status;
    use crate::testutil::ScriptedPlatform;

    #[test]
    fn test_session_survives_failed_commands() {
        // A session is reusable: a failed command resets the tag image
        // and leaves the engine ready for the next one.
        let mut reader = Em4x70::new(ScriptedPlatform::dead_air());

        let response = reader.info(false);
        assert_eq!(response.status, Status::SoftError);
        assert!(response.data.is_empty());

        let response = reader.write(&WriteArgs {
            command_parity: false,
            word: 0xbeef,
            address: 1,
        });
        assert_eq!(response.status, Status::SoftError);
        assert_eq!(response.data.len(), 32);
        assert_eq!(reader.tag().data, [0; 32]);

        let platform = reader.release();
        assert_eq!(platform.field_on_count, 2);
    }
}
