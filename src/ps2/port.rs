//! PS/2 frame state machine and the interrupt-shared port state.
//!
//! [`Ps2Port::on_clock_edge`] implements the complete frame protocol from
//! single clock-edge events; it is the only code that runs in interrupt
//! context and it never blocks. Everything else runs main-line and reaches
//! the port through [`PortCell`], which wraps it in a critical-section
//! mutex so an interrupt can never observe a half-updated port.
//!
//! The frame phase is tracked as a countdown rather than an explicit enum:
//! the cursor starts at 11 and each edge selects its meaning from the
//! current value. This keeps the handler branch-minimal - at the maximum
//! protocol clock rate (~16.7 kHz) there are only ~30 µs between edges.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::RTS_CLOCK_HOLD_US;
use crate::error::Error;
use crate::ps2::bus::Ps2Bus;
use crate::ps2::queue::RxQueue;
use crate::ps2::reply;

/// Edges per frame; also the initial frame-cursor value for both
/// directions. A write frame's start bit is the data-low level set during
/// request-to-send and consumes no clock edge of its own.
pub const FRAME_BITS: u8 = 11;

// Frame-cursor values at which the per-direction phase logic branches.
// Values between the named positions are data bits, LSB first.
const READ_START_POS: u8 = 11;
const READ_PARITY_POS: u8 = 2;
const READ_STOP_POS: u8 = 1;
const WRITE_PARITY_POS: u8 = 3;
const WRITE_STOP_POS: u8 = 2;
const WRITE_ACK_POS: u8 = 1;

/// Direction/health of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortState {
    /// A framing, parity, acknowledge or overflow violation was detected.
    /// The engine ignores further edges until the port is re-initialized.
    Error,
    /// Idle / receiving frames from the device. The default state.
    Read,
    /// The host is clocking a byte out to the device.
    Write,
}

/// Odd parity over the 8 data bits of a frame.
pub(crate) fn odd_parity(byte: u8) -> u8 {
    (byte.count_ones() as u8 ^ 1) & 1
}

/// One PS/2 port: line driver, frame state machine and receive queue.
pub struct Ps2Port<B: Ps2Bus> {
    bus: B,
    state: PortState,
    /// Frame cursor, decremented once per clock edge.
    bit_pos: u8,
    /// Byte being assembled (read) or transmitted (write).
    shift: u8,
    /// Parity bit for the byte in `shift`, computed at write start.
    parity: u8,
    rx: RxQueue,
}

impl<B: Ps2Bus> Ps2Port<B> {
    /// Create a port in the idle receive state. Call
    /// [`init`](Self::init) before use to put the lines and the edge
    /// interrupt into a known state.
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            state: PortState::Read,
            bit_pos: FRAME_BITS,
            shift: 0,
            parity: 0,
            rx: RxQueue::new(),
        }
    }

    /// Release both lines, clear the receive queue, reset the frame state
    /// machine and arm the clock edge interrupt.
    pub fn init(&mut self) {
        self.bus.clock_release();
        self.bus.data_release();
        self.rx.clear();
        self.state = PortState::Read;
        self.bit_pos = FRAME_BITS;
        self.bus.irq_enable();
    }

    /// Current port state.
    pub fn state(&self) -> PortState {
        self.state
    }

    /// Latch the error state. Used when a command reply does not match;
    /// the port stays dead until re-initialized.
    pub fn fault(&mut self) {
        self.state = PortState::Error;
    }

    /// Number of decoded bytes waiting in the receive queue.
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Pop one decoded byte, if any.
    pub fn try_recv(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    /// Advance the frame state machine by one clock falling edge.
    ///
    /// Called from the clock interrupt handler (or from
    /// [`service`](Self::service) for busses that pend edges). Must never
    /// block. A port in the error state ignores edges entirely.
    pub fn on_clock_edge(&mut self) {
        match self.state {
            PortState::Error => return,
            PortState::Write => self.write_edge(),
            PortState::Read => self.read_edge(),
        }
        self.bit_pos -= 1;
    }

    fn write_edge(&mut self) {
        match self.bit_pos {
            WRITE_PARITY_POS => {
                if self.parity != 0 {
                    self.bus.data_release();
                } else {
                    self.bus.data_low();
                }
            }
            WRITE_STOP_POS => self.bus.data_release(),
            WRITE_ACK_POS => {
                // The device acknowledges by pulling data low.
                if self.bus.data_is_high() {
                    self.state = PortState::Error;
                } else {
                    self.state = PortState::Read;
                }
                self.bit_pos = FRAME_BITS + 1;
            }
            _ => {
                // Data bits, LSB first.
                if self.shift & 1 != 0 {
                    self.bus.data_release();
                } else {
                    self.bus.data_low();
                }
                self.shift >>= 1;
            }
        }
    }

    fn read_edge(&mut self) {
        match self.bit_pos {
            READ_START_POS => {
                // The start bit must be low.
                if self.bus.data_is_high() {
                    self.state = PortState::Error;
                }
            }
            READ_PARITY_POS => {
                let sampled = self.bus.data_is_high() as u8;
                if odd_parity(self.shift) != sampled {
                    self.state = PortState::Error;
                }
            }
            READ_STOP_POS => {
                if self.bus.data_is_high() {
                    // A full queue means bytes would be lost and every
                    // later frame misdecoded; fail the port instead.
                    if self.rx.push(self.shift).is_err() {
                        self.state = PortState::Error;
                    }
                } else {
                    self.state = PortState::Error;
                }
                self.bit_pos = FRAME_BITS + 1;
            }
            _ => {
                // Data bits arrive LSB first; fill from the top.
                self.shift >>= 1;
                if self.bus.data_is_high() {
                    self.shift |= 0x80;
                }
            }
        }
    }

    /// Start transmitting `byte` to the device (request-to-send).
    ///
    /// Executes the host handshake - clock held low for at least 100 µs,
    /// data pulled low, clock released - then arms the state machine in
    /// write mode. The device supplies the clock for the rest of the
    /// frame; this function does not wait for it. The receive queue is
    /// cleared because a write discards any half-received frame.
    pub fn begin_write(&mut self, byte: u8) {
        self.bus.irq_disable();

        self.bus.clock_low();
        self.bus.delay_us(RTS_CLOCK_HOLD_US);
        self.bus.data_low();
        self.bus.clock_release();

        self.rx.clear();
        self.state = PortState::Write;
        self.bit_pos = FRAME_BITS;
        self.shift = byte;
        self.parity = odd_parity(byte);

        self.bus.irq_enable();
    }

    /// Drain edges the bus pended for main-line servicing.
    ///
    /// A no-op on interrupt-driven hardware; the bus simulator delivers
    /// its scripted frames through this.
    pub fn service(&mut self) {
        while self.bus.poll_edge() {
            self.on_clock_edge();
        }
    }

    /// Borrow the line driver.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the line driver.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Place a byte straight into the receive queue, bypassing the wire.
    #[cfg(test)]
    pub(crate) fn push_rx(&mut self, byte: u8) {
        if self.rx.push(byte).is_err() {
            self.state = PortState::Error;
        }
    }
}

/// Critical-section container for a [`Ps2Port`] shared between the clock
/// interrupt and main-line code.
///
/// Every access - from either context - takes one short interrupt-masking
/// critical section, so the interrupt can never run against a port whose
/// queue indices or frame cursor are mid-update. Blocking operations lock
/// and unlock once per poll iteration and therefore never hold the
/// interrupt out for longer than one accessor call.
pub struct PortCell<B: Ps2Bus> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Ps2Port<B>>>,
}

impl<B: Ps2Bus> PortCell<B> {
    /// Wrap a port for cross-context sharing.
    pub const fn new(port: Ps2Port<B>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(port)),
        }
    }

    /// Run `f` on the port inside a critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ps2Port<B>) -> R) -> R {
        self.inner.lock(|port| f(&mut port.borrow_mut()))
    }

    /// See [`Ps2Port::init`].
    pub fn init(&self) {
        self.with(|p| p.init());
    }

    /// Current port state.
    pub fn state(&self) -> PortState {
        self.with(|p| p.state())
    }

    /// Latch the port error state.
    pub fn fault(&self) {
        self.with(|p| p.fault());
    }

    /// Number of decoded bytes waiting in the receive queue.
    pub fn rx_len(&self) -> usize {
        self.with(|p| p.rx_len())
    }

    /// Drain any main-line-pended edges. See [`Ps2Port::service`].
    pub fn service(&self) {
        self.with(|p| p.service());
    }

    /// Queue `byte` for transmission to the device without waiting for a
    /// reply. See [`Ps2Port::begin_write`].
    pub fn write_byte(&self, byte: u8) {
        self.with(|p| p.begin_write(byte));
    }

    /// Pop one decoded byte, if any.
    pub fn try_recv(&self) -> Option<u8> {
        self.with(|p| p.try_recv())
    }

    /// Busy-wait until a byte arrives, then return it.
    ///
    /// The system's only blocking primitive. Must never be called from
    /// interrupt context. There is no timeout: with no device on the
    /// connector this waits forever, and the watchdog supervisor outside
    /// this crate is the escape hatch.
    pub fn recv_blocking(&self) -> u8 {
        loop {
            if let Some(byte) = self.with(|p| {
                p.service();
                p.try_recv()
            }) {
                return byte;
            }
            core::hint::spin_loop();
        }
    }

    /// Send `byte` and wait for the device acknowledge.
    ///
    /// Any reply other than ACK latches the port error state; the caller
    /// recovers with a full re-initialization.
    pub fn send(&self, byte: u8) -> Result<(), Error> {
        self.write_byte(byte);
        let ack = self.recv_blocking();
        if ack != reply::ACK {
            self.fault();
            return Err(Error::Nack(ack));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::odd_parity;

    #[test]
    fn odd_parity_examples() {
        // Parity bit makes the total number of ones odd.
        assert_eq!(odd_parity(0x00), 1);
        assert_eq!(odd_parity(0x01), 0);
        assert_eq!(odd_parity(0xFF), 1);
        assert_eq!(odd_parity(0xFA), 1);
        assert_eq!(odd_parity(0b1010_1010), 1);
    }
}
