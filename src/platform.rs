//! Platform abstraction consumed by the protocol engine.
//!
//! The engine is pure protocol logic; everything analog or chip-specific
//! sits behind the [`Platform`] trait: a free-running tick clock, the
//! peak-detected ADC sample stream, the modulation and field-enable pins,
//! the watchdog and the abort source.
//!
//! All timing is busy-wait against the tick clock. Implementations must
//! not buffer or reorder pin writes relative to tick reads; a modulation
//! edge is meaningful only at the tick it was commanded.
//!
//! For targets wired through `embedded-hal`, [`HalPlatform`] assembles a
//! ready-made `Platform` from two output pins, an abort input, a delay
//! provider, and the two capabilities `embedded-hal` does not model
//! ([`TickSource`] and [`AdcSource`]).

use crate::consts::{HIGH_SIGNAL_THRESHOLD, LOW_SIGNAL_THRESHOLD};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Edge polarity used by the pulse-length measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Edge {
    /// Measure from rising edge to rising edge.
    Rising,
    /// Measure from falling edge to falling edge.
    Falling,
}

/// Hardware capabilities required by the reader engine.
///
/// One tick is 1/12 of a carrier period; see
/// [`TICKS_PER_FC`](crate::consts::TICKS_PER_FC).
pub trait Platform {
    /// Current value of the free-running tick counter.
    fn now_ticks(&mut self) -> u32;

    /// Busy-waits for `ticks` ticks. The default implementation spins on
    /// [`now_ticks`](Platform::now_ticks).
    fn wait_ticks(&mut self, ticks: u32) {
        let start = self.now_ticks();
        while self.now_ticks().wrapping_sub(start) < ticks {}
    }

    /// Latest ADC sample of the demodulated field, midpoint around 127.
    fn sample(&mut self) -> u8;

    /// Drives the modulation pin high (drops the reader field).
    fn set_mod_high(&mut self);

    /// Drives the modulation pin low (restores the reader field).
    fn set_mod_low(&mut self);

    /// Enables the carrier field.
    fn field_on(&mut self);

    /// Blocks until the resonant antenna has settled, roughly 50 ms.
    fn field_settle(&mut self);

    /// Feeds the watchdog. Default: no watchdog.
    fn wdt_kick(&mut self) {}

    /// Returns `true` if the host or operator requested an abort.
    fn abort_requested(&mut self) -> bool {
        false
    }
}

/// `true` if `sample` reads as a high signal level.
///
/// The high and low bands deliberately overlap around the midpoint;
/// meaning is carried by edge transitions, not by absolute level.
pub(crate) fn is_high(sample: u8) -> bool {
    sample > LOW_SIGNAL_THRESHOLD
}

/// `true` if `sample` reads as a low signal level.
pub(crate) fn is_low(sample: u8) -> bool {
    sample < HIGH_SIGNAL_THRESHOLD
}

/// Ticks elapsed since `start`, tolerant of counter wraparound.
pub(crate) fn ticks_elapsed(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

/// A free-running tick counter, 1/12 carrier period per tick.
pub trait TickSource {
    /// Current counter value.
    fn now_ticks(&mut self) -> u32;
}

/// A source of peak-detected ADC samples.
pub trait AdcSource {
    /// Latest sample, midpoint around 127.
    fn sample(&mut self) -> u8;
}

/// A [`Platform`] assembled from `embedded-hal` parts.
///
/// - `MOD`: modulation output pin (high = field dropped),
/// - `FIELD`: field-enable output pin,
/// - `BTN`: abort input (operator button), active high,
/// - `D`: delay provider used for the antenna settle time,
/// - `T`, `A`: tick counter and ADC sample source.
#[derive(Debug)]
pub struct HalPlatform<MOD, FIELD, BTN, D, T, A>
where
    MOD: OutputPin,
    FIELD: OutputPin,
    BTN: InputPin,
    D: DelayNs,
    T: TickSource,
    A: AdcSource,
{
    /// Modulation pin.
    pub mod_pin: MOD,
    /// Field-enable pin.
    pub field_pin: FIELD,
    /// Abort button.
    pub button: BTN,
    delay: D,
    ticks: T,
    adc: A,
}

impl<MOD, FIELD, BTN, D, T, A> HalPlatform<MOD, FIELD, BTN, D, T, A>
where
    MOD: OutputPin,
    FIELD: OutputPin,
    BTN: InputPin,
    D: DelayNs,
    T: TickSource,
    A: AdcSource,
{
    /// Milliseconds the resonant antenna is given to settle.
    const SETTLE_MS: u32 = 50;

    /// Creates a platform from its parts. The modulation pin is driven
    /// low so the field is available as soon as it is enabled.
    pub fn new(mod_pin: MOD, field_pin: FIELD, button: BTN, delay: D, ticks: T, adc: A) -> Self {
        let mut mod_pin = mod_pin;
        let _ = mod_pin.set_low();
        Self {
            mod_pin,
            field_pin,
            button,
            delay,
            ticks,
            adc,
        }
    }

    /// Tears the platform back down into its parts.
    pub fn release(self) -> (MOD, FIELD, BTN, D, T, A) {
        (
            self.mod_pin,
            self.field_pin,
            self.button,
            self.delay,
            self.ticks,
            self.adc,
        )
    }
}

impl<MOD, FIELD, BTN, D, T, A> Platform for HalPlatform<MOD, FIELD, BTN, D, T, A>
where
    MOD: OutputPin,
    FIELD: OutputPin,
    BTN: InputPin,
    D: DelayNs,
    T: TickSource,
    A: AdcSource,
{
    fn now_ticks(&mut self) -> u32 {
        self.ticks.now_ticks()
    }

    fn sample(&mut self) -> u8 {
        self.adc.sample()
    }

    fn set_mod_high(&mut self) {
        let _ = self.mod_pin.set_high();
    }

    fn set_mod_low(&mut self) {
        let _ = self.mod_pin.set_low();
    }

    fn field_on(&mut self) {
        let _ = self.field_pin.set_high();
    }

    fn field_settle(&mut self) {
        self.delay.delay_ms(Self::SETTLE_MS);
    }

    fn abort_requested(&mut self) -> bool {
        self.button.is_high().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    struct FakeTicks(u32);
    impl TickSource for FakeTicks {
        fn now_ticks(&mut self) -> u32 {
            self.0 = self.0.wrapping_add(1);
            self.0
        }
    }

    struct FakeAdc(u8);
    impl AdcSource for FakeAdc {
        fn sample(&mut self) -> u8 {
            self.0
        }
    }

    #[test]
    fn test_signal_band_overlaps() {
        // 127 sits inside both bands; interpretation is by edges.
        assert!(is_high(127));
        assert!(is_low(127));
        assert!(!is_high(100));
        assert!(!is_low(180));
    }

    #[test]
    fn test_hal_platform_drives_pins() {
        let mod_pin = PinMock::new(&[
            PinTransaction::set(PinState::Low), // new() idles the pin
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let field_pin = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let button = PinMock::new(&[PinTransaction::get(PinState::Low)]);

        let mut p = HalPlatform::new(
            mod_pin,
            field_pin,
            button,
            NoopDelay::new(),
            FakeTicks(0),
            FakeAdc(127),
        );
        p.set_mod_high();
        p.set_mod_low();
        p.field_on();
        p.field_settle();
        assert!(!p.abort_requested());
        assert_eq!(p.sample(), 127);

        let (mut m, mut f, mut b, _, _, _) = p.release();
        m.done();
        f.done();
        b.done();
    }

    #[test]
    fn test_default_wait_ticks_spins_the_clock() {
        let mod_pin = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let field_pin = PinMock::new(&[]);
        let button = PinMock::new(&[]);
        let mut p = HalPlatform::new(
            mod_pin,
            field_pin,
            button,
            NoopDelay::new(),
            FakeTicks(0),
            FakeAdc(0),
        );
        let start = p.now_ticks();
        p.wait_ticks(10);
        assert!(p.now_ticks().wrapping_sub(start) >= 10);

        let (mut m, mut f, mut b, _, _, _) = p.release();
        m.done();
        f.done();
        b.done();
    }
}
