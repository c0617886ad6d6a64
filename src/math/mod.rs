//! Numerical building blocks.
//!
//! - `iir`: Butterworth design and zero-phase second-order-section filtering
//! - `stalta`: energy-ratio characteristic functions used by the built-in models

pub mod iir;
pub mod stalta;

pub use iir::{Sos, butter_bandpass, butter_highpass};
pub use stalta::{classic_sta_lta, logistic, moving_max};
