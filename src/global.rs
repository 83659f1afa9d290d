//! Process-wide reader singleton.
//!
//! The tag image and trace buffer back exactly one reader per field coil,
//! and no two host commands may run concurrently. When the reader has to
//! be reachable from interrupt context (button handling, host transport
//! callbacks), park it in a `critical_section::Mutex` and access it
//! through [`with_reader`].

use crate::driver::Em4x70;
use crate::platform::Platform;
use core::cell::RefCell;
use critical_section::Mutex;

/// Initializes the global static slot for the reader.
///
/// # Example
/// ```rust
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use em4x70::driver::Em4x70;
/// use em4x70::global::global_reader_init;
/// use em4x70::platform::Platform;
///
/// struct NullPlatform(u32);
/// impl Platform for NullPlatform {
///     fn now_ticks(&mut self) -> u32 {
///         self.0 = self.0.wrapping_add(1);
///         self.0
///     }
///     fn sample(&mut self) -> u8 { 127 }
///     fn set_mod_high(&mut self) {}
///     fn set_mod_low(&mut self) {}
///     fn field_on(&mut self) {}
///     fn field_settle(&mut self) {}
/// }
///
/// static READER: Mutex<RefCell<Option<Em4x70<NullPlatform>>>> =
///     global_reader_init::<NullPlatform>();
/// ```
pub const fn global_reader_init<P: Platform>() -> Mutex<RefCell<Option<Em4x70<P>>>> {
    Mutex::new(RefCell::new(None))
}

/// Parks a reader session in the global slot, replacing any previous one.
pub fn global_reader_setup<P: Platform>(
    global: &'static Mutex<RefCell<Option<Em4x70<P>>>>,
    reader: Em4x70<P>,
) {
    critical_section::with(|cs| {
        let _ = global.borrow(cs).replace(Some(reader));
    });
}

/// Runs `f` against the parked reader inside a critical section.
///
/// Returns `None` if no reader has been parked. The critical section
/// spans the whole call, which upholds the one-command-at-a-time
/// invariant; do not run a full transaction tree from interrupt context.
pub fn with_reader<P: Platform, R>(
    global: &'static Mutex<RefCell<Option<Em4x70<P>>>>,
    f: impl FnOnce(&mut Em4x70<P>) -> R,
) -> Option<R> {
    critical_section::with(|cs| {
        let mut slot = global.borrow(cs).borrow_mut();
        slot.as_mut().map(f)
    })
}

/// Removes and returns the parked reader, leaving the slot empty.
pub fn global_reader_take<P: Platform>(
    global: &'static Mutex<RefCell<Option<Em4x70<P>>>>,
) -> Option<Em4x70<P>> {
    critical_section::with(|cs| global.borrow(cs).take())
}
