//! Bit-banged PS/2 host-side port.
//!
//! The port is a two-wire open-collector bus: the device generates the
//! clock, both sides may drive the data line. Every byte travels in an
//! 11-bit frame (start, 8 data bits LSB-first, odd parity, stop); frames
//! sent by the host carry one extra device-generated acknowledge bit.
//!
//! Layering, bottom up:
//!   - [`bus::Ps2Bus`] - the line-level hardware seam,
//!   - [`queue::RxQueue`] - the interrupt-to-main-line byte queue,
//!   - [`port::Ps2Port`] - the per-edge frame state machine,
//!   - [`port::PortCell`] - the critical-section container shared between
//!     the clock interrupt and main-line code.
//!
//! Reference material:
//! * <https://wiki.osdev.org/PS/2_Mouse>
//! * <https://www.burtonsys.com/ps2_chapweske.htm>

pub mod bus;
pub mod port;
pub mod queue;
pub mod sim;

#[cfg(test)]
mod tests;

pub use bus::Ps2Bus;
pub use port::{PortCell, PortState, Ps2Port};
pub use queue::RxQueue;

/// Command bytes understood by a PS/2 mouse.
pub mod cmd {
    pub const RESET: u8 = 0xFF;
    pub const RESEND: u8 = 0xFE;
    pub const SET_DEFAULTS: u8 = 0xF6;
    pub const DISABLE_DATA_REPORTING: u8 = 0xF5;
    pub const ENABLE_DATA_REPORTING: u8 = 0xF4;
    pub const SET_SAMPLE_RATE: u8 = 0xF3;
    pub const GET_DEVICE_ID: u8 = 0xF2;
    pub const SET_REMOTE_MODE: u8 = 0xF0;
    pub const SET_WRAP_MODE: u8 = 0xEE;
    pub const RESET_WRAP_MODE: u8 = 0xEC;
    pub const READ_DATA: u8 = 0xEB;
    pub const SET_STREAM_MODE: u8 = 0xEA;
    pub const STATUS_REQUEST: u8 = 0xE9;
    pub const SET_RESOLUTION: u8 = 0xE8;
    pub const SET_SCALING: u8 = 0xE6;
}

/// Reply bytes sent by a PS/2 mouse.
pub mod reply {
    /// Command acknowledged.
    pub const ACK: u8 = 0xFA;
    /// Last byte arrived garbled, send it again.
    pub const RESEND: u8 = 0xFE;
    /// Power-on / reset self-test passed.
    pub const SELF_TEST_PASS: u8 = 0xAA;
    /// Device id of a plain three-button mouse.
    pub const MOUSE_ID: u8 = 0x00;
    /// Device id reported once the IntelliMouse wheel mode is unlocked.
    pub const WHEEL_MOUSE_ID: u8 = 0x03;
}
