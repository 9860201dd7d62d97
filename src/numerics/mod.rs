//! Numerical building blocks shared by the models
pub mod interpolation;
