//! Shared utility helpers.

pub mod error;

pub use error::{FocusError, FocusResult, LimitStage, PeakDirection};
