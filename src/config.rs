//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// PS/2 port

/// Capacity of the receive queue between the clock interrupt and the
/// main-line code. One lost byte desynchronizes every later packet, so
/// the queue is sized generously for a 256-byte backlog.
pub const RX_QUEUE_LEN: usize = 256;

/// Minimum time the clock line is held low to signal a host-initiated
/// transmission (request-to-send). The protocol mandates at least 100 µs.
pub const RTS_CLOCK_HOLD_US: u32 = 100;

// Mouse session

/// Default sample rate requested from the mouse (10..=200 samples/s).
pub const SAMPLE_RATE: u8 = 40;

/// Probe for a scroll wheel (IntelliMouse extension) during the handshake.
pub const DETECT_WHEEL: bool = false;

/// SET_RESOLUTION argument for 8 counts/mm.
pub const RESOLUTION_8_PER_MM: u8 = 0x03;

// GPIO pin assignments (nRF52840-DK defaults)
//
// Both PS/2 lines are open-collector with external pull-ups; the pins
// idle as inputs and are only ever driven low.
//
//   PS/2 CLK   → P0.17
//   PS/2 DATA  → P0.20

/// Port 0 pin carrying the PS/2 clock signal.
pub const PS2_CLK_PIN: u8 = 17;

/// Port 0 pin carrying the PS/2 data signal.
pub const PS2_DATA_PIN: u8 = 20;

/// GPIOTE channel dedicated to clock falling-edge detection.
pub const PS2_GPIOTE_CH: usize = 0;

// Main loop

/// Idle pause between streaming-loop iterations (µs). Short enough that a
/// full 4-byte packet backlog never approaches the receive queue capacity.
pub const LOOP_IDLE_US: u64 = 500;
