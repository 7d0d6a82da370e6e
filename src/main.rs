//! Embedded entry point: PS/2-to-serial mouse adapter on nRF52840.
//!
//! Boot order: HAL init, GPIOTE edge routing, PS/2 port init, mouse
//! handshake, then the streaming loop - decode packets, drain one motion
//! report per iteration and hand it to the serial link layer.

#![no_std]
#![no_main]

use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::Timer;
use panic_probe as _;

use ps2com::config::LOOP_IDLE_US;
use ps2com::hw::{self, PS2_PORT};
use ps2com::mouse::{MouseSession, SessionConfig};

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let _p = embassy_nrf::init(Default::default());
    info!("ps2com starting");

    hw::setup();
    PS2_PORT.init();

    // The handshake busy-waits on device replies; the GPIOTE interrupt
    // preempts this task to run the bit engine, so the wait terminates
    // as soon as the device answers.
    let mut session = MouseSession::new(&PS2_PORT, SessionConfig::default());
    match session.start() {
        Ok(()) => info!("mouse session up, wheel={}", session.wheel_active()),
        Err(e) => warn!("mouse handshake failed: {}", e),
    }

    loop {
        if !session.process() {
            warn!(
                "mouse recovery failed, retrying ({} errors so far)",
                session.error_count()
            );
        }

        if let Some(report) = session.take_report() {
            // The serial link layer consumes the report here.
            info!(
                "buttons={} dx={} dy={} wheel={}",
                report.buttons, report.x, report.y, report.wheel
            );
        }

        Timer::after_micros(LOOP_IDLE_US).await;
    }
}
