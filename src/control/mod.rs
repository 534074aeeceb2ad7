//! Pure signal and geometry helpers used by the scan loop.

pub mod geometry;
pub mod mode_filter;
