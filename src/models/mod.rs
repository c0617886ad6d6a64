//! Detection models.
//!
//! The pipeline only sees the capability traits in `model`; `builtin` is the
//! reference backend loaded by `ModelSet::load`.

pub mod builtin;
pub mod model;
pub mod picking;

pub use model::*;
