//! Unified error type for ps2com.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A command was answered with something other than ACK (0xFA).
    /// Carries the reply byte actually received.
    Nack(u8),

    /// The byte after RESET was not the self-test pass code (0xAA).
    SelfTestFailed(u8),

    /// The device id reported after reset was not the mouse id (0x00).
    UnexpectedDeviceId(u8),
}
