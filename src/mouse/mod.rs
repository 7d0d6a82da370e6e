//! PS/2 mouse session: reset handshake, streaming decode, recovery.
//!
//! A session owns the device-facing protocol above the port: it brings
//! the mouse through the reset/configuration sequence, decodes streamed
//! motion packets into accumulators, and re-runs the full handshake
//! whenever the port latches an error. The consumer drains the
//! accumulators through [`MouseSession::take_report`].

pub mod report;

pub use report::MotionReport;

use crate::config::{DETECT_WHEEL, RESOLUTION_8_PER_MM, SAMPLE_RATE};
use crate::error::Error;
use crate::ps2::{cmd, reply, PortCell, PortState, Ps2Bus};

/// Sample rates that unlock the IntelliMouse wheel mode when sent in
/// this order.
const WHEEL_KNOCK_RATES: [u8; 3] = [200, 100, 80];

/// Lifecycle of one mouse session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No handshake attempted yet.
    Uninitialized,
    /// Reset/configuration sequence in progress.
    Handshaking,
    /// Device is reporting motion packets.
    Streaming,
    /// The last handshake failed; the next [`MouseSession::process`]
    /// call retries it.
    Faulted,
}

/// Tunables for the handshake.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Probe for a scroll wheel during the handshake.
    pub detect_wheel: bool,
    /// Sample rate requested from the device (10..=200 samples/s).
    pub sample_rate: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detect_wheel: DETECT_WHEEL,
            sample_rate: SAMPLE_RATE,
        }
    }
}

/// Session protocol driver and motion accumulator.
///
/// `x`/`y`/`z` accumulate every decoded packet and are only taken out by
/// [`take_report`](Self::take_report); several packets may land between
/// drains without loss until a report clamps. All session code runs in
/// main-line context.
pub struct MouseSession<'a, B: Ps2Bus> {
    port: &'a PortCell<B>,
    config: SessionConfig,
    state: SessionState,
    /// Device streams 4-byte packets (wheel knock accepted).
    wheel: bool,
    buttons: u8,
    x: i16,
    y: i16,
    z: i16,
    /// Button mask as of the last drained report.
    last_buttons: u8,
    error_count: u16,
}

impl<'a, B: Ps2Bus> MouseSession<'a, B> {
    /// Create an idle session on an initialized port.
    pub fn new(port: &'a PortCell<B>, config: SessionConfig) -> Self {
        Self {
            port,
            config,
            state: SessionState::Uninitialized,
            wheel: false,
            buttons: 0,
            x: 0,
            y: 0,
            z: 0,
            last_buttons: 0,
            error_count: 0,
        }
    }

    /// Session lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the device was switched into 4-byte wheel packets.
    pub fn wheel_active(&self) -> bool {
        self.wheel
    }

    /// Handshakes performed because of a port error.
    pub fn error_count(&self) -> u16 {
        self.error_count
    }

    /// Current button mask (bit 0 = left, 1 = right, 2 = middle).
    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// Undrained accumulated motion `(x, y, z)`.
    pub fn motion(&self) -> (i16, i16, i16) {
        (self.x, self.y, self.z)
    }

    /// Whether the port is free of protocol errors. The reset supervisor
    /// outside this crate gates its watchdog pet on this.
    pub fn port_healthy(&self) -> bool {
        self.port.state() != PortState::Error
    }

    /// Run the reset/configuration handshake.
    ///
    /// Resets the device, verifies the self-test and device id replies,
    /// optionally probes for a wheel, then configures resolution and
    /// sample rate and enables streaming. Accumulated state is cleared.
    /// On any mismatch the port is faulted and the session ends up
    /// [`SessionState::Faulted`].
    ///
    /// Blocks on device replies without a timeout; with nothing on the
    /// connector this waits until the watchdog supervisor resets the
    /// system.
    pub fn start(&mut self) -> Result<(), Error> {
        self.state = SessionState::Handshaking;
        self.wheel = false;
        self.buttons = 0;
        self.last_buttons = 0;
        self.x = 0;
        self.y = 0;
        self.z = 0;

        match self.handshake() {
            Ok(()) => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                self.port.fault();
                self.state = SessionState::Faulted;
                Err(e)
            }
        }
    }

    fn handshake(&mut self) -> Result<(), Error> {
        self.port.send(cmd::RESET)?;
        let self_test = self.port.recv_blocking();
        if self_test != reply::SELF_TEST_PASS {
            return Err(Error::SelfTestFailed(self_test));
        }
        let id = self.port.recv_blocking();
        if id != reply::MOUSE_ID {
            return Err(Error::UnexpectedDeviceId(id));
        }

        if self.config.detect_wheel {
            for rate in WHEEL_KNOCK_RATES {
                self.port.send(cmd::SET_SAMPLE_RATE)?;
                self.port.send(rate)?;
            }
            self.port.send(cmd::GET_DEVICE_ID)?;
            self.wheel = self.port.recv_blocking() == reply::WHEEL_MOUSE_ID;
        }

        self.port.send(cmd::SET_RESOLUTION)?;
        self.port.send(RESOLUTION_8_PER_MM)?;
        self.port.send(cmd::SET_SAMPLE_RATE)?;
        self.port.send(self.config.sample_rate)?;
        self.port.send(cmd::ENABLE_DATA_REPORTING)?;
        Ok(())
    }

    /// Decode every complete packet waiting in the receive queue, then
    /// recover from a port error by re-running the handshake.
    ///
    /// Returns whether the session is still viable - `false` only when a
    /// recovery handshake was attempted and failed. Retries are
    /// unconditional and immediate; there is no bound or backoff.
    pub fn process(&mut self) -> bool {
        self.port.service();

        let len = self.packet_len();
        while let Some(packet) = self.pop_packet(len) {
            // Byte 0 carries the sign/overflow flags in its high bits;
            // they are ignored and the deltas are taken as plain
            // two's-complement, accepting wraparound on overflow.
            self.buttons = packet[0] & 0x07;
            self.x = self.x.saturating_add((packet[1] as i8) as i16);
            // PS/2 Y grows upward; the accumulator uses screen convention.
            self.y = self.y.saturating_sub((packet[2] as i8) as i16);
            if self.wheel {
                self.z = self.z.saturating_add((packet[3] as i8) as i16);
            }
        }

        if self.port.state() == PortState::Error {
            self.error_count = self.error_count.wrapping_add(1);
            return self.start().is_ok();
        }
        true
    }

    /// Pop one whole packet atomically, or nothing.
    fn pop_packet(&self, len: usize) -> Option<[u8; 4]> {
        self.port.with(|p| {
            if p.rx_len() < len {
                return None;
            }
            let mut packet = [0u8; 4];
            for slot in packet.iter_mut().take(len) {
                *slot = p.try_recv().unwrap_or(0);
            }
            Some(packet)
        })
    }

    fn packet_len(&self) -> usize {
        if self.wheel {
            4
        } else {
            3
        }
    }

    /// Drain one report step from the accumulators.
    ///
    /// Returns `None` while there is nothing to tell the host: no
    /// accumulated motion and no button change since the last report.
    /// Otherwise clamps one signed-byte step (wheel to the link's 4-bit
    /// range), subtracts it from the accumulators and returns it.
    pub fn take_report(&mut self) -> Option<MotionReport> {
        if self.buttons == self.last_buttons && self.x == 0 && self.y == 0 && self.z == 0 {
            return None;
        }

        let dx = self.x.clamp(-128, 127) as i8;
        self.x -= dx as i16;
        let dy = self.y.clamp(-128, 127) as i8;
        self.y -= dy as i16;
        let dz = self.z.clamp(-8, 7) as i8;
        self.z -= dz as i16;
        self.last_buttons = self.buttons;

        Some(MotionReport {
            buttons: self.buttons,
            x: dx,
            y: dy,
            wheel: dz,
        })
    }
}
