//! Wire-level PS/2 device simulator for host-side tests.
//!
//! [`SimBus`] implements [`Ps2Bus`] over a script of clock edges instead
//! of GPIO pins. Frames queued with [`SimBus::push_frame`] are clocked
//! into the bit engine one edge at a time through the `poll_edge` hook,
//! which the port's blocking primitives drain while they wait - so the
//! full command/reply handshake runs end to end on the host, edge
//! accurate, with no hardware.
//!
//! [`SimMouse`] models the device side of the session protocol: reset
//! replies, ACKs, the sample-rate knock that unlocks the wheel id.

use heapless::{Deque, Vec};

use crate::ps2::bus::Ps2Bus;
use crate::ps2::port::{odd_parity, FRAME_BITS};
use crate::ps2::{cmd, reply};

/// Upper bound on scripted edges pending at once (enough for a reset
/// reply burst plus a queued packet backlog).
const EDGE_CAPACITY: usize = 512;

/// Line and interrupt operations, recorded in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    ClockLow,
    ClockRelease,
    DataLow,
    DataRelease,
    Delay(u32),
    IrqEnable,
    IrqDisable,
}

/// Host-transmission progress of the simulated device.
#[derive(Clone, Copy)]
enum Phase {
    /// No host frame in flight; scripted edges are delivered as-is.
    Idle,
    /// Clocking the host's write frame. `edge` counts presented edges,
    /// `bits` collects the captured data and parity levels.
    HostFrame { edge: u8, bits: u16 },
}

/// Scriptable [`Ps2Bus`] double with an optional reactive mouse model.
pub struct SimBus {
    /// Device-driven data level for each upcoming edge (true = released).
    edges: Deque<bool, EDGE_CAPACITY>,
    /// Current device-side data drive (true = released).
    dev_data: bool,
    host_clock_low: bool,
    host_data_low: bool,
    listening: bool,
    phase: Phase,
    device: Option<SimMouse>,
    /// Whether the device acknowledges host frames (ack bit pulled low).
    pub ack_writes: bool,
    /// Bytes clocked out by the host, with the captured parity bit.
    pub written: Vec<(u8, u8), 64>,
    /// Earliest recorded bus operations (later ones are dropped).
    pub ops: Vec<BusOp, 32>,
}

impl SimBus {
    /// A bus with no device model: host frames are acknowledged and
    /// recorded, nothing answers.
    pub fn new() -> Self {
        Self {
            edges: Deque::new(),
            dev_data: true,
            host_clock_low: false,
            host_data_low: false,
            listening: false,
            phase: Phase::Idle,
            device: None,
            ack_writes: true,
            written: Vec::new(),
            ops: Vec::new(),
        }
    }

    /// A bus wired to a reactive [`SimMouse`].
    pub fn with_device(device: SimMouse) -> Self {
        let mut bus = Self::new();
        bus.device = Some(device);
        bus
    }

    /// Mutable access to the attached device model.
    pub fn device_mut(&mut self) -> Option<&mut SimMouse> {
        self.device.as_mut()
    }

    /// Queue one well-formed device-to-host frame for `byte`.
    pub fn push_frame(&mut self, byte: u8) {
        self.push_levels(&frame_levels(byte));
    }

    /// Queue one frame per byte of a motion packet.
    pub fn push_packet(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push_frame(b);
        }
    }

    /// Queue raw data-line levels, one per edge. Lets tests script
    /// deliberately malformed frames.
    pub fn push_levels(&mut self, levels: &[bool]) {
        for &level in levels {
            self.edges
                .push_back(level)
                .expect("sim edge script overflow");
        }
    }

    /// Scripted edges not yet delivered.
    pub fn pending_edges(&self) -> usize {
        self.edges.len()
    }

    fn record(&mut self, op: BusOp) {
        let _ = self.ops.push(op);
    }

    fn finish_host_frame(&mut self, bits: u16) {
        let byte = (bits & 0xFF) as u8;
        let parity = ((bits >> 8) & 1) as u8;
        let _ = self.written.push((byte, parity));

        // A frame that was not acknowledged never reached the device.
        if !self.ack_writes {
            return;
        }
        let mut replies: Vec<u8, 8> = Vec::new();
        if let Some(device) = self.device.as_mut() {
            device.on_byte(byte, &mut replies);
        }
        for &b in &replies {
            self.push_frame(b);
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Ps2Bus for SimBus {
    fn clock_low(&mut self) {
        self.host_clock_low = true;
        self.record(BusOp::ClockLow);
    }

    fn clock_release(&mut self) {
        self.record(BusOp::ClockRelease);
        // Releasing the clock while holding data low completes the
        // request-to-send: the device starts clocking the host frame.
        if self.host_clock_low && self.host_data_low {
            self.phase = Phase::HostFrame { edge: 0, bits: 0 };
        }
        self.host_clock_low = false;
    }

    fn data_low(&mut self) {
        self.host_data_low = true;
        self.record(BusOp::DataLow);
    }

    fn data_release(&mut self) {
        self.host_data_low = false;
        self.record(BusOp::DataRelease);
    }

    fn data_is_high(&self) -> bool {
        // Open collector: low if either side drives low.
        !self.host_data_low && self.dev_data
    }

    fn delay_us(&mut self, us: u32) {
        self.record(BusOp::Delay(us));
    }

    fn irq_enable(&mut self) {
        self.listening = true;
        self.record(BusOp::IrqEnable);
    }

    fn irq_disable(&mut self) {
        self.listening = false;
        self.record(BusOp::IrqDisable);
    }

    fn poll_edge(&mut self) -> bool {
        if !self.listening {
            return false;
        }

        if let Phase::HostFrame { edge, mut bits } = self.phase {
            // The level left on the line by the previous edge is the
            // host's bit for that position: edges 1..=8 capture the data
            // bits, edge 9 captures the parity bit.
            if (1..=9).contains(&edge) && self.data_is_high() {
                bits |= 1 << (edge - 1);
            }
            if edge < FRAME_BITS {
                // Present the next edge. The device releases data except
                // at the acknowledge position, where it pulls low to ack.
                self.dev_data = if edge == FRAME_BITS - 1 {
                    !self.ack_writes
                } else {
                    true
                };
                self.phase = Phase::HostFrame {
                    edge: edge + 1,
                    bits,
                };
                return true;
            }
            self.phase = Phase::Idle;
            self.finish_host_frame(bits);
        }

        match self.edges.pop_front() {
            Some(level) => {
                self.dev_data = level;
                true
            }
            None => false,
        }
    }
}

/// Data-line levels of a well-formed device-to-host frame: start low,
/// 8 data bits LSB first, odd parity, stop high.
pub fn frame_levels(byte: u8) -> [bool; FRAME_BITS as usize] {
    let mut levels = [true; FRAME_BITS as usize];
    levels[0] = false;
    for (i, level) in levels[1..9].iter_mut().enumerate() {
        *level = byte >> i & 1 != 0;
    }
    levels[9] = odd_parity(byte) != 0;
    levels
}

/// Behavioral model of a PS/2 mouse for handshake tests.
pub struct SimMouse {
    /// Whether the simulated hardware has a scroll wheel.
    pub wheel: bool,
    /// Byte sent after the RESET ack (0xAA on a healthy device).
    pub self_test_reply: u8,
    /// Device id sent after the self-test reply.
    pub reset_id: u8,
    /// Answer the next command with RESEND instead of ACK.
    pub force_resend: bool,
    /// Last three sample rates seen, for the wheel unlock knock.
    rates: Vec<u8, 3>,
    /// Command whose argument byte is expected next.
    awaiting_arg: Option<u8>,
}

impl SimMouse {
    /// A healthy three-button mouse without a wheel.
    pub fn new() -> Self {
        Self {
            wheel: false,
            self_test_reply: reply::SELF_TEST_PASS,
            reset_id: reply::MOUSE_ID,
            force_resend: false,
            rates: Vec::new(),
            awaiting_arg: None,
        }
    }

    /// A healthy wheel mouse (reports id 0x03 once unlocked).
    pub fn with_wheel() -> Self {
        let mut mouse = Self::new();
        mouse.wheel = true;
        mouse
    }

    fn device_id(&self) -> u8 {
        // The wheel id is only reported after the 200/100/80
        // sample-rate knock.
        if self.wheel && self.rates.as_slice() == [200, 100, 80] {
            reply::WHEEL_MOUSE_ID
        } else {
            reply::MOUSE_ID
        }
    }

    fn on_byte(&mut self, byte: u8, out: &mut Vec<u8, 8>) {
        if self.force_resend {
            self.force_resend = false;
            let _ = out.push(reply::RESEND);
            return;
        }
        if let Some(command) = self.awaiting_arg.take() {
            if command == cmd::SET_SAMPLE_RATE {
                if self.rates.is_full() {
                    self.rates.remove(0);
                }
                let _ = self.rates.push(byte);
            }
            let _ = out.push(reply::ACK);
            return;
        }

        match byte {
            cmd::RESET => {
                let _ = out.push(reply::ACK);
                let _ = out.push(self.self_test_reply);
                let _ = out.push(self.reset_id);
                self.rates.clear();
            }
            cmd::SET_SAMPLE_RATE | cmd::SET_RESOLUTION => {
                let _ = out.push(reply::ACK);
                self.awaiting_arg = Some(byte);
            }
            cmd::GET_DEVICE_ID => {
                let _ = out.push(reply::ACK);
                let _ = out.push(self.device_id());
            }
            // Remaining commands are ack-only for this model.
            _ => {
                let _ = out.push(reply::ACK);
            }
        }
    }
}

impl Default for SimMouse {
    fn default() -> Self {
        Self::new()
    }
}
