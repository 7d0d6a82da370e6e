//! Line-level hardware seam for the PS/2 port.
//!
//! Both PS/2 lines are open-collector with external pull-ups: a side
//! either drives its line low or releases it and lets it float high.
//! Implementations therefore only ever switch a pin between input
//! (released) and output-low (driven).

/// Line control and edge sourcing for one PS/2 port.
///
/// Implemented by the nRF52840 GPIO bit-bang driver and by the
/// [`sim::SimBus`](crate::ps2::sim::SimBus) test double.
pub trait Ps2Bus {
    /// Drive the clock line low.
    fn clock_low(&mut self);

    /// Release the clock line (float high).
    fn clock_release(&mut self);

    /// Drive the data line low.
    fn data_low(&mut self);

    /// Release the data line (float high).
    fn data_release(&mut self);

    /// Sample the data line.
    fn data_is_high(&self) -> bool;

    /// Busy-wait for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Arm the clock falling-edge interrupt, clearing any pended edge.
    fn irq_enable(&mut self);

    /// Disarm the clock falling-edge interrupt.
    fn irq_disable(&mut self);

    /// Report a clock falling edge that must be serviced from main-line
    /// context, updating the sampled line state to match.
    ///
    /// Interrupt-driven hardware runs the bit engine straight from the
    /// interrupt handler and always returns `false` here. The bus
    /// simulator uses this hook to clock scripted frames into the engine
    /// while main-line code polls in a blocking receive.
    fn poll_edge(&mut self) -> bool {
        false
    }
}
