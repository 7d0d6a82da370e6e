//! Host-testable library interface for ps2com.
//!
//! The PS/2 protocol engine and the mouse session logic are hardware
//! independent behind the [`ps2::Ps2Bus`] seam, so the whole stack runs
//! on the host against the wire-level bus simulator in [`ps2::sim`]:
//!
//! Usage: `cargo test`
//!
//! The embedded binary uses main.rs with #![no_std] and #![no_main] and
//! is built with `--features embedded` for the nRF52840 target.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod mouse;
pub mod ps2;

#[cfg(feature = "embedded")]
pub mod hw;

pub use error::Error;
pub use mouse::{MotionReport, MouseSession, SessionConfig, SessionState};
pub use ps2::{PortCell, PortState, Ps2Bus, Ps2Port};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - mouse session over the simulated wire
// ═══════════════════════════════════════════════════════════════════════════
