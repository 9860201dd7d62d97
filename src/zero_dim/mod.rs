//! Zero-dimensional (single zone) cylinder model
pub mod cylinder;
pub mod heat_transfer;
pub mod volumetric_efficiency;
