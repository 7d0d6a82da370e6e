//! nRF52840 bit-bang implementation of the PS/2 bus.
//!
//! Both PS/2 lines are open-collector with external pull-ups: a pin is
//! either an input (released) or an output driving low, switched through
//! the P0 direction register. The clock falling edge is detected by a
//! dedicated GPIOTE channel whose interrupt runs the bit engine directly,
//! preempting the thread-mode main loop - that preemption is what makes
//! the main loop's blocking poll primitives sound.

use cortex_m::peripheral::NVIC;
use embassy_nrf::pac::{self, interrupt};

use crate::config::{PS2_CLK_PIN, PS2_DATA_PIN, PS2_GPIOTE_CH};
use crate::ps2::{PortCell, Ps2Bus, Ps2Port};

/// Core clock at 64 MHz: cycles per microsecond for busy delays.
const CYCLES_PER_US: u32 = 64;

/// The shared PS/2 port, locked by both the GPIOTE handler and the
/// main-line session code.
pub static PS2_PORT: PortCell<HwBus> = PortCell::new(Ps2Port::new(HwBus::new()));

/// Open-collector line driver over the P0 GPIO and GPIOTE registers.
pub struct HwBus {
    clk: usize,
    dat: usize,
}

impl HwBus {
    const fn new() -> Self {
        Self {
            clk: PS2_CLK_PIN as usize,
            dat: PS2_DATA_PIN as usize,
        }
    }

    /// Stop driving `pin`; the external pull-up takes the line high.
    fn release(pin: usize) {
        pac::P0.pin_cnf(pin).write(|w| {
            w.set_dir(pac::gpio::vals::Dir::INPUT);
            w.set_input(pac::gpio::vals::Input::CONNECT);
        });
    }

    /// Drive `pin` low.
    fn drive_low(pin: usize) {
        pac::P0.outclr().write(|w| w.0 = 1 << pin);
        pac::P0.pin_cnf(pin).write(|w| {
            w.set_dir(pac::gpio::vals::Dir::OUTPUT);
            w.set_input(pac::gpio::vals::Input::CONNECT);
        });
    }

    fn level(pin: usize) -> bool {
        pac::P0.in_().read().0 & (1 << pin) != 0
    }
}

impl Ps2Bus for HwBus {
    fn clock_low(&mut self) {
        Self::drive_low(self.clk);
    }

    fn clock_release(&mut self) {
        Self::release(self.clk);
    }

    fn data_low(&mut self) {
        Self::drive_low(self.dat);
    }

    fn data_release(&mut self) {
        Self::release(self.dat);
    }

    fn data_is_high(&self) -> bool {
        Self::level(self.dat)
    }

    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us * CYCLES_PER_US);
    }

    fn irq_enable(&mut self) {
        // Clear a pended edge first: the request-to-send clock pull
        // registers as a falling edge and must not be decoded.
        pac::GPIOTE.events_in(PS2_GPIOTE_CH).write_value(0);
        pac::GPIOTE.intenset().write(|w| w.0 = 1 << PS2_GPIOTE_CH);
    }

    fn irq_disable(&mut self) {
        pac::GPIOTE.intenclr().write(|w| w.0 = 1 << PS2_GPIOTE_CH);
        pac::GPIOTE.events_in(PS2_GPIOTE_CH).write_value(0);
    }
}

/// Route the clock pin's falling edge to the GPIOTE channel and unmask
/// its interrupt. Call once at boot, before [`PS2_PORT`]`.init()`.
pub fn setup() {
    pac::GPIOTE.config(PS2_GPIOTE_CH).write(|w| {
        w.set_mode(pac::gpiote::vals::Mode::EVENT);
        w.set_psel(PS2_CLK_PIN);
        w.set_polarity(pac::gpiote::vals::Polarity::HI_TO_LO);
    });
    unsafe { NVIC::unmask(pac::Interrupt::GPIOTE) };
}

#[interrupt]
fn GPIOTE() {
    if pac::GPIOTE.events_in(PS2_GPIOTE_CH).read() != 0 {
        pac::GPIOTE.events_in(PS2_GPIOTE_CH).write_value(0);
        PS2_PORT.with(|p| p.on_clock_edge());
    }
}
