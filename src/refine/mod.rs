//! Quadratic interpolation helpers for sub-pixel peak refinement.

pub(crate) mod quad1d;
pub(crate) mod quad2d;
